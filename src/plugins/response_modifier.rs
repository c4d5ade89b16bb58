//! Post-processes an already-set response: accept/reject, TTL clamping, IP
//! replacement.

use std::net::IpAddr;

use doh_proto::buffer::BytePacketBuffer;
use doh_proto::packet::record::Record;
use doh_proto::packet::DnsPacket;
use rand::seq::SliceRandom;
use serde::Deserialize;

use crate::context::Context;
use crate::matching::domain_matches_pattern;
use crate::plugin::Plugin;

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Action {
    Reject,
    Accept,
    #[default]
    Modify,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Args {
    action: Action,
    rcode: Option<u8>,
    ip: Option<String>,
    ips: Vec<String>,
    min_ttl: Option<u32>,
    max_ttl: Option<u32>,
    ttl: Option<u32>,
    domains: Vec<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            action: Action::default(),
            rcode: None,
            ip: None,
            ips: Vec::new(),
            min_ttl: None,
            max_ttl: None,
            ttl: None,
            domains: Vec::new(),
        }
    }
}

fn clamp_ttl(ttl: u32, min_ttl: Option<u32>, max_ttl: Option<u32>) -> u32 {
    let ttl = min_ttl.map(|min| ttl.max(min)).unwrap_or(ttl);
    max_ttl.map(|max| ttl.min(max)).unwrap_or(ttl)
}

fn replace_ip(record: &mut Record, new_ip: &IpAddr) {
    match (record, new_ip) {
        (Record::A { addr, .. }, IpAddr::V4(new)) => *addr = *new,
        (Record::AAAA { addr, .. }, IpAddr::V6(new)) => *addr = *new,
        _ => {}
    }
}

fn record_ttl_mut(record: &mut Record) -> &mut u32 {
    match record {
        Record::A { ttl, .. }
        | Record::AAAA { ttl, .. }
        | Record::CNAME { ttl, .. }
        | Record::NS { ttl, .. }
        | Record::PTR { ttl, .. }
        | Record::MX { ttl, .. }
        | Record::TXT { ttl, .. }
        | Record::Unknown { ttl, .. } => ttl,
    }
}

pub struct ResponseModifierPlugin;

#[async_trait::async_trait]
impl Plugin for ResponseModifierPlugin {
    async fn call(&self, ctx: &mut Context, args: &serde_json::Value) -> Result<bool, String> {
        let args: Args = super::parse_args(args)?;

        if args.action == Action::Reject {
            ctx.set_error(args.rcode.unwrap_or(super::DEFAULT_REJECT_RCODE));
            ctx.resolved = true;
            ctx.add_tag("response_rejected");
            return Ok(true);
        }
        if args.action == Action::Accept {
            ctx.resolved = true;
            ctx.add_tag("response_accepted");
            return Ok(true);
        }

        if !args.domains.is_empty() {
            let domain = ctx.query_domain().unwrap_or_default();
            if !args.domains.iter().any(|pattern| domain_matches_pattern(domain, pattern, false)) {
                return Ok(false);
            }
        }

        let Some(response) = ctx.response.clone() else {
            return Ok(false);
        };
        let buffer = BytePacketBuffer::from_bytes(&response);
        let mut packet = DnsPacket::try_from(buffer).map_err(|err| err.to_string())?;

        let mut tagged = false;

        if args.ttl.is_some() || args.min_ttl.is_some() || args.max_ttl.is_some() {
            for record in packet.answers.iter_mut() {
                let ttl = record_ttl_mut(record);
                *ttl = args.ttl.unwrap_or_else(|| clamp_ttl(*ttl, args.min_ttl, args.max_ttl));
            }
            ctx.add_tag("ttl_modified");
            tagged = true;
        }

        let replacement_pool: Vec<String> = args.ip.into_iter().chain(args.ips).collect();
        if !replacement_pool.is_empty() {
            if let Some(chosen) = replacement_pool.choose(&mut rand::thread_rng()) {
                if let Ok(new_ip) = chosen.parse::<IpAddr>() {
                    for record in packet.answers.iter_mut() {
                        replace_ip(record, &new_ip);
                    }
                    ctx.add_tag("ip_replaced");
                    tagged = true;
                }
            }
        }

        if tagged {
            let buffer = packet.create_buffer().map_err(|err| err.to_string())?;
            ctx.response = Some(buffer.buf.to_vec());
        }

        Ok(tagged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doh_proto::packet::header::Header;
    use doh_proto::packet::question::Question;
    use doh_proto::packet::QueryType;

    fn response_with_a_record(ttl: u32) -> Vec<u8> {
        let mut packet = DnsPacket {
            header: Header::response(1),
            questions: vec![Question::new(String::from("example.com"), QueryType::A)],
            answers: vec![Record::A {
                domain: String::from("example.com"),
                addr: "192.0.2.1".parse().unwrap(),
                ttl,
            }],
            ..Default::default()
        };
        packet.create_buffer().unwrap().buf.to_vec()
    }

    #[tokio::test]
    async fn should_reject_with_configured_rcode() {
        let plugin = ResponseModifierPlugin;
        let mut ctx = Context::new(None, None);
        let args = serde_json::json!({ "action": "reject", "rcode": 5 });
        assert!(plugin.call(&mut ctx, &args).await.unwrap());
        assert_eq!(ctx.error, Some(5));
        assert!(ctx.has_tag("response_rejected"));
    }

    #[tokio::test]
    async fn should_clamp_ttl_within_bounds() {
        let plugin = ResponseModifierPlugin;
        let mut ctx = Context::new(None, None);
        ctx.response = Some(response_with_a_record(1000));
        let args = serde_json::json!({ "max_ttl": 100 });
        assert!(plugin.call(&mut ctx, &args).await.unwrap());
        assert!(ctx.has_tag("ttl_modified"));

        let buffer = BytePacketBuffer::from_bytes(ctx.response.as_ref().unwrap());
        let packet = DnsPacket::try_from(buffer).unwrap();
        assert_eq!(packet.answers[0].ttl(), 100);
    }

    #[tokio::test]
    async fn should_replace_ip_in_answers() {
        let plugin = ResponseModifierPlugin;
        let mut ctx = Context::new(None, None);
        ctx.response = Some(response_with_a_record(60));
        let args = serde_json::json!({ "ip": "203.0.113.9" });
        assert!(plugin.call(&mut ctx, &args).await.unwrap());
        assert!(ctx.has_tag("ip_replaced"));

        let buffer = BytePacketBuffer::from_bytes(ctx.response.as_ref().unwrap());
        let packet = DnsPacket::try_from(buffer).unwrap();
        match &packet.answers[0] {
            Record::A { addr, .. } => assert_eq!(addr.to_string(), "203.0.113.9"),
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[tokio::test]
    async fn should_skip_when_domains_filter_excludes_query() {
        let plugin = ResponseModifierPlugin;
        let mut ctx = Context::new(
            None,
            Some(doh_server::prelude::JsonQuery {
                name: String::from("other.com"),
                qtype: None,
            }),
        );
        ctx.response = Some(response_with_a_record(60));
        let args = serde_json::json!({ "domains": ["example.com"], "ip": "203.0.113.9" });
        assert!(!plugin.call(&mut ctx, &args).await.unwrap());
    }
}
