use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: crate::serve::config::Config,
    #[serde(default)]
    pub chain: Vec<crate::plugin::StepConfig>,
    /// Seeds the in-memory KV collaborator (`<family>/<name>` keys, per
    /// spec) since no external KV deployment is assumed out of the box.
    #[serde(default)]
    pub kv: HashMap<String, String>,
}

impl Config {
    pub fn load(path: &Path) -> Self {
        let conf = ::config::Config::builder()
            .add_source(::config::File::from(path).required(true))
            .add_source(::config::Environment::default().separator("_"))
            .build()
            .expect("unable to locate configuration file");
        conf.try_deserialize().expect("configuration format invalid")
    }
}
