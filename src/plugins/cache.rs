//! Consults and populates an external HTTP-response cache ahead of forwarding.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Deserialize;

use crate::context::{Context, OnResponseHook};
use crate::plugin::Plugin;

/// The external collaborator a deployment plugs in (in-process map, Redis,
/// an edge cache, ...).
#[async_trait::async_trait]
pub trait CacheApi: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn put(&self, key: String, body: Vec<u8>, max_age: Duration);
}

/// In-process reference implementation backed by `moka`.
pub struct MemoryCacheApi {
    inner: moka::future::Cache<String, (SystemTime, Vec<u8>)>,
}

impl MemoryCacheApi {
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: moka::future::Cache::new(capacity),
        }
    }
}

#[async_trait::async_trait]
impl CacheApi for MemoryCacheApi {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let (expires_at, body) = self.inner.get(key).await?;
        if expires_at > SystemTime::now() {
            Some(body)
        } else {
            self.inner.invalidate(key).await;
            None
        }
    }

    async fn put(&self, key: String, body: Vec<u8>, max_age: Duration) {
        self.inner.insert(key, (SystemTime::now() + max_age, body)).await;
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Args {
    #[serde(default = "Args::default_ttl")]
    ttl: u64,
}

impl Args {
    fn default_ttl() -> u64 {
        300
    }
}

struct WriteThroughHook {
    api: Arc<dyn CacheApi>,
    key: String,
    ttl: Duration,
}

impl OnResponseHook for WriteThroughHook {
    fn on_response(&self, response: &[u8]) {
        let api = self.api.clone();
        let key = self.key.clone();
        let body = response.to_vec();
        let ttl = self.ttl;
        tokio::spawn(async move {
            api.put(key, body, ttl).await;
        });
    }
}

pub struct CachePlugin {
    api: Arc<dyn CacheApi>,
}

impl CachePlugin {
    pub fn new(api: Arc<dyn CacheApi>) -> Self {
        Self { api }
    }
}

#[async_trait::async_trait]
impl Plugin for CachePlugin {
    async fn call(&self, ctx: &mut Context, args: &serde_json::Value) -> Result<bool, String> {
        if ctx.has_tag("bypass_cache") {
            ctx.add_tag("cache_bypassed");
            return Ok(false);
        }

        let args: Args = super::parse_args(args)?;
        let Some(domain) = ctx.query_domain().map(str::to_string) else {
            return Ok(false);
        };
        let key = format!("dns-{}-{}", domain, ctx.query_type());

        if let Some(body) = self.api.get(&key).await {
            ctx.response = Some(body);
            ctx.resolved = true;
            ctx.add_tag("cache_hit");
            return Ok(true);
        }

        let ttl = Duration::from_secs(args.ttl);
        ctx.metadata.cache_key = Some(key.clone());
        ctx.metadata.cache_ttl = Some(ttl);
        ctx.add_tag("cache_miss");
        ctx.register_on_response_hook(Box::new(WriteThroughHook {
            api: self.api.clone(),
            key,
            ttl,
        }));
        Ok(false)
    }
}
