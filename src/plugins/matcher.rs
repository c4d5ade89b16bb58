//! Generic accept/reject matcher on domain patterns, optionally filtered by
//! query type.

use serde::Deserialize;

use crate::context::Context;
use crate::matching::{compile_regex, domain_contains, domain_matches_pattern};
use crate::plugin::Plugin;

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct Args {
    domain: Option<String>,
    domains: Vec<String>,
    patterns: Vec<String>,
    regexes: Vec<String>,
    #[serde(rename = "type")]
    qtype: Option<String>,
    types: Vec<String>,
    action: Action,
    rcode: Option<u8>,
    inverse: bool,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Action {
    Accept,
    #[default]
    Reject,
}

impl Args {
    fn domains(&self) -> impl Iterator<Item = &str> {
        self.domain.iter().map(String::as_str).chain(self.domains.iter().map(String::as_str))
    }

    fn wanted_types(&self) -> Vec<u16> {
        self.qtype
            .iter()
            .chain(self.types.iter())
            .map(|value| super::qtype_number(value))
            .collect()
    }
}

pub struct MatcherPlugin;

#[async_trait::async_trait]
impl Plugin for MatcherPlugin {
    async fn call(&self, ctx: &mut Context, args: &serde_json::Value) -> Result<bool, String> {
        let args: Args = super::parse_args(args)?;

        let wanted_types = args.wanted_types();
        if !wanted_types.is_empty() && !wanted_types.contains(&ctx.query_type()) {
            return Ok(false);
        }

        let has_any_pattern = args.domain.is_some() || !args.domains.is_empty() || !args.patterns.is_empty() || !args.regexes.is_empty();
        if !has_any_pattern {
            return Ok(false);
        }

        let domain = ctx.query_domain().unwrap_or_default();

        let mut matched = args.domains().any(|pattern| domain_matches_pattern(domain, pattern, false));
        if !matched {
            matched = args.patterns.iter().any(|pattern| {
                if let Some(substring) = pattern.strip_prefix('~') {
                    domain_contains(domain, substring)
                } else {
                    domain_matches_pattern(domain, pattern, false)
                }
            });
        }
        if !matched {
            matched = args
                .regexes
                .iter()
                .filter_map(|pattern| compile_regex(pattern))
                .any(|regex| crate::matching::domain_matches_regex(domain, &regex));
        }

        let matched = matched ^ args.inverse;
        if !matched {
            return Ok(false);
        }

        if args.action == Action::Reject {
            ctx.set_error(args.rcode.unwrap_or(super::DEFAULT_REJECT_RCODE));
            ctx.resolved = true;
            ctx.add_tag("matcher_rejected");
        } else {
            ctx.add_tag("matcher_accepted");
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_for(domain: &str) -> Context {
        Context::new(
            None,
            Some(doh_server::prelude::JsonQuery {
                name: domain.to_string(),
                qtype: None,
            }),
        )
    }

    #[tokio::test]
    async fn should_reject_unknown_configuration_key() {
        let plugin = MatcherPlugin;
        let args = serde_json::json!({ "domain": "example.com", "action": "reject", "bogus_key": true });

        let mut ctx = ctx_for("example.com");
        assert!(plugin.call(&mut ctx, &args).await.is_err());
    }

    #[tokio::test]
    async fn should_match_exact_domain_only() {
        let plugin = MatcherPlugin;
        let args = serde_json::json!({ "domain": "example.com", "action": "reject" });

        let mut ctx = ctx_for("example.com");
        assert!(plugin.call(&mut ctx, &args).await.unwrap());
        assert!(ctx.has_tag("matcher_rejected"));
        assert_eq!(ctx.error, Some(3));

        let mut ctx = ctx_for("sub.example.com");
        assert!(!plugin.call(&mut ctx, &args).await.unwrap());
    }

    #[tokio::test]
    async fn should_match_wildcard_subdomains_only() {
        let plugin = MatcherPlugin;
        let args = serde_json::json!({ "domain": "*.example.com", "action": "accept" });

        let mut ctx = ctx_for("sub.example.com");
        assert!(plugin.call(&mut ctx, &args).await.unwrap());

        let mut ctx = ctx_for("example.com");
        assert!(!plugin.call(&mut ctx, &args).await.unwrap());
    }

    #[tokio::test]
    async fn should_apply_inverse_after_evaluation() {
        let plugin = MatcherPlugin;
        let args = serde_json::json!({ "domain": "example.com", "action": "accept", "inverse": true });

        let mut ctx = ctx_for("example.com");
        assert!(!plugin.call(&mut ctx, &args).await.unwrap());

        let mut ctx = ctx_for("other.com");
        assert!(plugin.call(&mut ctx, &args).await.unwrap());
    }

    #[tokio::test]
    async fn should_return_false_on_empty_pattern_set() {
        let plugin = MatcherPlugin;
        let mut ctx = ctx_for("example.com");
        let args = serde_json::json!({ "action": "accept" });
        assert!(!plugin.call(&mut ctx, &args).await.unwrap());
    }

    #[tokio::test]
    async fn should_exclude_on_type_mismatch() {
        let plugin = MatcherPlugin;
        let args = serde_json::json!({ "domain": "example.com", "type": "AAAA", "action": "accept" });
        let mut ctx = ctx_for("example.com");
        assert!(!plugin.call(&mut ctx, &args).await.unwrap());
    }
}
