pub(crate) mod config;
pub(crate) mod handler;

use std::sync::Arc;

use clap::Args;

use crate::plugin::Registry;
use crate::plugins;

/// Starts the DoH proxy: builds the plugin chain from configuration and
/// serves it over HTTP.
#[derive(Args, Debug)]
pub struct Command;

impl Command {
    pub async fn run(&self, config: crate::config::Config) {
        tracing::info!("preparing doh proxy");

        let kv = Arc::new(doh_loader::MemoryKv::new(config.kv));
        let loader = Arc::new(doh_loader::Loader::new(kv, config.server.loader_config()));
        let cache_api = Arc::new(plugins::cache::MemoryCacheApi::new(config.server.cache_capacity));

        let mut registry = Registry::new();
        plugins::register_all(&mut registry, cache_api, loader);
        let chain = registry.build(config.chain);

        let address = config.server.address();
        let handler = handler::ChainHandler::new(chain);
        let app = doh_server::router(handler);

        tracing::info!(%address, "listening");
        axum::Server::bind(&address)
            .serve(app.into_make_service())
            .await
            .expect("unable to run http server")
    }
}
