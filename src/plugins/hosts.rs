//! Answers `A`/`AAAA` queries from a static domain → IP table.

use std::collections::HashMap;
use std::net::IpAddr;

use doh_proto::packet::header::Header;
use doh_proto::packet::question::Question;
use doh_proto::packet::record::Record;
use doh_proto::packet::{DnsPacket, QueryType};
use serde::Deserialize;

use crate::context::Context;
use crate::matching::normalize_domain;
use crate::plugin::Plugin;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IpOrList {
    One(String),
    Many(Vec<String>),
}

impl IpOrList {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(ip) => vec![ip],
            Self::Many(ips) => ips,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Args {
    hosts: HashMap<String, IpOrList>,
    #[serde(default = "Args::default_ttl")]
    ttl: u32,
    #[serde(default = "Args::default_pass_through")]
    pass_through: bool,
}

impl Args {
    fn default_ttl() -> u32 {
        300
    }

    fn default_pass_through() -> bool {
        true
    }
}

fn build_response(query_domain: &str, query_id: u16, qtype: QueryType, ips: &[IpAddr], ttl: u32) -> Vec<u8> {
    let mut packet = DnsPacket {
        header: Header::response(query_id),
        questions: vec![Question::new(query_domain.to_string(), qtype)],
        ..Default::default()
    };

    for ip in ips {
        let record = match ip {
            IpAddr::V4(addr) => Record::A {
                domain: query_domain.to_string(),
                addr: *addr,
                ttl,
            },
            IpAddr::V6(addr) => Record::AAAA {
                domain: query_domain.to_string(),
                addr: *addr,
                ttl,
            },
        };
        packet.answers.push(record);
    }

    packet
        .create_buffer()
        .expect("hosts response always fits in a packet buffer")
        .buf
        .to_vec()
}

pub struct HostsPlugin;

#[async_trait::async_trait]
impl Plugin for HostsPlugin {
    async fn call(&self, ctx: &mut Context, args: &serde_json::Value) -> Result<bool, String> {
        let qtype = ctx.query_type();
        if qtype != 1 && qtype != 28 {
            return Ok(false);
        }

        let args: Args = super::parse_args(args)?;
        let Some(domain) = ctx.query_domain().map(str::to_string) else {
            return Ok(false);
        };

        let Some(entry) = args
            .hosts
            .into_iter()
            .find(|(key, _)| normalize_domain(key) == domain)
            .map(|(_, value)| value)
        else {
            return Ok(false);
        };

        let wants_v6 = qtype == 28;
        let ips: Vec<IpAddr> = entry
            .into_vec()
            .into_iter()
            .filter_map(|raw| raw.parse::<IpAddr>().ok())
            .filter(|ip| ip.is_ipv6() == wants_v6)
            .collect();

        if ips.is_empty() {
            if args.pass_through {
                return Ok(false);
            }
            ctx.set_error(0);
            ctx.resolved = true;
            return Ok(true);
        }

        let query_id = ctx
            .dns_message
            .as_deref()
            .map(|bytes| u16::from_be_bytes([bytes[0], bytes[1]]))
            .unwrap_or(0);
        let qtype_enum = if wants_v6 { QueryType::AAAA } else { QueryType::A };
        let response = build_response(&domain, query_id, qtype_enum, &ips, args.ttl);

        ctx.add_tag("hosts_resolved");
        ctx.set_response(response);
        Ok(true)
    }
}
