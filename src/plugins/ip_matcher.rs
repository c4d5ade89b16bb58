//! Matches the IPs carried by an already-set response against literal and
//! data-loader-backed IP lists.

use std::net::IpAddr;
use std::sync::Arc;

use doh_proto::buffer::BytePacketBuffer;
use doh_proto::packet::record::Record;
use doh_proto::packet::DnsPacket;
use serde::Deserialize;

use crate::context::Context;
use crate::matching::ip_matches_entry;
use crate::plugin::Plugin;

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Action {
    #[default]
    Accept,
    Reject,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct Args {
    files: Vec<String>,
    ips: Vec<String>,
    action: Action,
    inverse: bool,
    rcode: Option<u8>,
}

fn response_ips(response: &[u8]) -> Vec<IpAddr> {
    let Ok(packet) = DnsPacket::try_from(BytePacketBuffer::from_bytes(response)) else {
        return Vec::new();
    };
    packet
        .answers
        .iter()
        .filter_map(|record| match record {
            Record::A { addr, .. } => Some(IpAddr::V4(*addr)),
            Record::AAAA { addr, .. } => Some(IpAddr::V6(*addr)),
            _ => None,
        })
        .collect()
}

pub struct IpMatcherPlugin {
    loader: Arc<doh_loader::Loader>,
}

impl IpMatcherPlugin {
    pub fn new(loader: Arc<doh_loader::Loader>) -> Self {
        Self { loader }
    }
}

#[async_trait::async_trait]
impl Plugin for IpMatcherPlugin {
    async fn call(&self, ctx: &mut Context, args: &serde_json::Value) -> Result<bool, String> {
        let args: Args = super::parse_args(args)?;
        let Some(response) = ctx.response.clone() else {
            return Ok(false);
        };

        let ips = response_ips(&response);
        if ips.is_empty() {
            return Ok(false);
        }

        let mut entries = args.ips.clone();
        for key in &args.files {
            let loaded = self.loader.ips(key).await;
            entries.extend(loaded.iter().cloned());
        }

        let matched = ips
            .iter()
            .any(|ip| entries.iter().any(|entry| ip_matches_entry(ip, entry)));
        let matched = matched ^ args.inverse;
        if !matched {
            return Ok(false);
        }

        if args.action == Action::Reject {
            ctx.set_error(args.rcode.unwrap_or(super::DEFAULT_REJECT_RCODE));
            ctx.resolved = true;
            ctx.add_tag("ip_matcher_rejected");
        } else {
            ctx.add_tag("ip_matcher_accepted");
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doh_proto::packet::header::Header;
    use doh_proto::packet::question::Question;
    use doh_proto::packet::QueryType;
    use std::collections::HashMap;
    use std::sync::Arc as StdArc;

    fn response_with_ip(ip: &str) -> Vec<u8> {
        let mut packet = DnsPacket {
            header: Header::response(1),
            questions: vec![Question::new(String::from("example.com"), QueryType::A)],
            answers: vec![Record::A {
                domain: String::from("example.com"),
                addr: ip.parse().unwrap(),
                ttl: 60,
            }],
            ..Default::default()
        };
        packet.create_buffer().unwrap().buf.to_vec()
    }

    fn loader() -> StdArc<doh_loader::Loader> {
        StdArc::new(doh_loader::Loader::new(
            StdArc::new(doh_loader::MemoryKv::new(HashMap::new())),
            doh_loader::Config::default(),
        ))
    }

    #[tokio::test]
    async fn should_reject_matching_literal_ip() {
        let plugin = IpMatcherPlugin::new(loader());
        let mut ctx = Context::new(None, None);
        ctx.response = Some(response_with_ip("203.0.113.5"));
        let args = serde_json::json!({ "ips": ["203.0.113.5"], "action": "reject" });
        assert!(plugin.call(&mut ctx, &args).await.unwrap());
        assert!(ctx.has_tag("ip_matcher_rejected"));
        assert_eq!(ctx.error, Some(3));
    }

    #[tokio::test]
    async fn should_not_match_when_response_missing() {
        let plugin = IpMatcherPlugin::new(loader());
        let mut ctx = Context::new(None, None);
        let args = serde_json::json!({ "ips": ["203.0.113.5"], "action": "reject" });
        assert!(!plugin.call(&mut ctx, &args).await.unwrap());
    }

    #[tokio::test]
    async fn should_match_cidr_entries() {
        let plugin = IpMatcherPlugin::new(loader());
        let mut ctx = Context::new(None, None);
        ctx.response = Some(response_with_ip("10.1.2.3"));
        let args = serde_json::json!({ "ips": ["10.0.0.0/8"], "action": "accept" });
        assert!(plugin.call(&mut ctx, &args).await.unwrap());
        assert!(ctx.has_tag("ip_matcher_accepted"));
    }
}
