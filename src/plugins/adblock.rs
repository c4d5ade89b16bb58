//! Convenience substring-based blocklist with a whitelist escape hatch.

use serde::Deserialize;

use crate::context::Context;
use crate::matching::domain_matches_pattern;
use crate::plugin::Plugin;

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct Args {
    patterns: Vec<String>,
    whitelist: Vec<String>,
    #[serde(default = "Args::default_log")]
    log: bool,
}

impl Args {
    fn default_log() -> bool {
        true
    }
}

pub struct AdblockPlugin;

#[async_trait::async_trait]
impl Plugin for AdblockPlugin {
    async fn call(&self, ctx: &mut Context, args: &serde_json::Value) -> Result<bool, String> {
        let args: Args = super::parse_args(args)?;
        let domain = ctx.query_domain().unwrap_or_default();

        let blocked = args.patterns.iter().any(|pattern| domain.contains(pattern.as_str()));
        if !blocked {
            return Ok(false);
        }

        let whitelisted = args
            .whitelist
            .iter()
            .any(|entry| domain_matches_pattern(domain, entry, true));
        if whitelisted {
            return Ok(false);
        }

        if args.log {
            tracing::info!(domain, "adblock filtered query");
        }

        ctx.set_error(super::DEFAULT_REJECT_RCODE);
        ctx.resolved = true;
        ctx.add_tag("adblock_filtered");
        Ok(true)
    }
}
