//! Built-in plugin implementations, one per kind in the registry.

pub mod adblock;
pub mod cache;
pub mod forward;
pub mod hosts;
pub mod ip_matcher;
pub mod load_balancer;
pub mod matcher;
pub mod redirect;
pub mod response_modifier;

use doh_proto::packet::header::ResponseCode;

pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: &serde_json::Value) -> Result<T, String> {
    serde_json::from_value(args.clone()).map_err(|err| format!("invalid plugin arguments: {err}"))
}

pub(crate) const DEFAULT_REJECT_RCODE: u8 = ResponseCode::NameError as u8;

/// Maps an RR type name (case-insensitive) or its numeric string form to the
/// wire type number. Unknown names fall back to `A`, matching the boundary's
/// own `?type=` handling.
pub(crate) fn qtype_number(value: &str) -> u16 {
    if let Ok(number) = value.parse::<u16>() {
        return number;
    }
    match value.to_ascii_uppercase().as_str() {
        "NS" => 2,
        "CNAME" => 5,
        "PTR" => 12,
        "MX" => 15,
        "TXT" => 16,
        "AAAA" => 28,
        _ => 1,
    }
}

/// Registers every built-in plugin under its canonical kind name.
pub fn register_all(
    registry: &mut crate::plugin::Registry,
    cache_api: std::sync::Arc<dyn cache::CacheApi>,
    loader: std::sync::Arc<doh_loader::Loader>,
) {
    registry.register("cache", cache::CachePlugin::new(cache_api));
    registry.register("forward", forward::ForwardPlugin);
    registry.register("hosts", hosts::HostsPlugin);
    registry.register("matcher", matcher::MatcherPlugin);
    registry.register("redirect", redirect::RedirectPlugin);
    registry.register("response-modifier", response_modifier::ResponseModifierPlugin);
    registry.register("ip-matcher", ip_matcher::IpMatcherPlugin::new(loader));
    registry.register("load-balancer", load_balancer::UnresolvedLoadBalancerPlugin);
    registry.register("adblock", adblock::AdblockPlugin);
}
