//! Records a pending redirect for the forwarder to consult; never mutates
//! `dns_message` itself.

use serde::Deserialize;

use crate::context::{Context, RedirectHint};
use crate::matching::normalize_domain;
use crate::plugin::Plugin;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Rule {
    from: String,
    to: String,
    #[serde(rename = "type")]
    #[allow(dead_code)]
    qtype: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Args {
    rules: Vec<Rule>,
    #[serde(default = "Args::default_preserve_type")]
    #[allow(dead_code)]
    preserve_type: bool,
    #[serde(default = "Args::default_include_subdomains")]
    include_subdomains: bool,
}

impl Args {
    fn default_preserve_type() -> bool {
        true
    }

    fn default_include_subdomains() -> bool {
        true
    }
}

pub struct RedirectPlugin;

#[async_trait::async_trait]
impl Plugin for RedirectPlugin {
    async fn call(&self, ctx: &mut Context, args: &serde_json::Value) -> Result<bool, String> {
        let args: Args = super::parse_args(args)?;
        let Some(domain) = ctx.query_domain().map(str::to_string) else {
            return Ok(false);
        };

        for rule in &args.rules {
            let from = normalize_domain(&rule.from);
            let target = if domain == from {
                Some(rule.to.clone())
            } else if args.include_subdomains {
                domain
                    .strip_suffix(&format!(".{from}"))
                    .map(|sub| format!("{sub}.{}", rule.to))
            } else {
                None
            };

            if let Some(target) = target {
                ctx.metadata.redirect = Some(RedirectHint {
                    original: domain,
                    target,
                });
                ctx.add_tag("redirected");
                return Ok(true);
            }
        }

        Ok(false)
    }
}
