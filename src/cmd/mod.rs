use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DNS-over-HTTPS proxy that filters, caches and forwards queries through a
/// configurable plugin chain
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "/etc/doh-proxy/doh-proxy.toml", env = "CONFIG_PATH")]
    config_path: PathBuf,
    #[command(subcommand)]
    inner: Commands,
}

impl Args {
    pub async fn run(self) {
        let config = crate::config::Config::load(&self.config_path);
        match self.inner {
            Commands::Serve(inner) => inner.run(config).await,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    Serve(crate::serve::Command),
}
