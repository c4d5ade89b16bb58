//! Forwards the raw query to a configured DoH upstream.

use std::collections::HashMap;
use std::time::Duration;

use doh_resolver::http::HttpResolver;
use doh_resolver::prelude::Resolver;
use serde::Deserialize;

use crate::context::Context;
use crate::plugin::Plugin;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Args {
    upstream: String,
    #[serde(default = "Args::default_timeout_ms")]
    timeout_ms: u64,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    edns_client_subnet: bool,
}

impl Args {
    fn default_timeout_ms() -> u64 {
        5000
    }
}

fn normalize_upstream(upstream: &str) -> String {
    if upstream.starts_with("http://") || upstream.starts_with("https://") {
        upstream.to_string()
    } else {
        format!("https://{upstream}/dns-query")
    }
}

pub struct ForwardPlugin;

#[async_trait::async_trait]
impl Plugin for ForwardPlugin {
    async fn call(&self, ctx: &mut Context, args: &serde_json::Value) -> Result<bool, String> {
        let args: Args = super::parse_args(args)?;
        let Some(message) = ctx.dns_message.clone() else {
            return Ok(false);
        };

        if args.edns_client_subnet {
            tracing::debug!("edns_client_subnet requested; splicing an OPT record is not implemented, forwarding unmodified");
        }

        let endpoint = normalize_upstream(&args.upstream);
        let resolver = HttpResolver::new(endpoint.clone(), Duration::from_millis(args.timeout_ms));

        match resolver.resolve(&message, &args.headers).await {
            Ok(body) => {
                ctx.set_response(body);
                ctx.metadata.upstream = Some(endpoint);
                Ok(true)
            }
            Err(err) => {
                ctx.metadata.upstream_error = Some(err.to_string());
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_rewrite_bare_hostname_to_https_doh_query() {
        assert_eq!(
            normalize_upstream("doh.example.com"),
            "https://doh.example.com/dns-query"
        );
        assert_eq!(
            normalize_upstream("https://doh.example.com/dns-query"),
            "https://doh.example.com/dns-query"
        );
    }

    #[tokio::test]
    async fn should_return_false_when_no_dns_message_present() {
        let plugin = ForwardPlugin;
        let mut ctx = Context::new(None, None);
        let args = serde_json::json!({ "upstream": "doh.example.com" });
        let matched = plugin.call(&mut ctx, &args).await.unwrap();
        assert!(!matched);
        assert!(!ctx.resolved);
    }
}
