//! The mutable object threaded through a single request's plugin chain.

use std::collections::HashMap;
use std::time::Duration;

use doh_proto::buffer::BytePacketBuffer;
use doh_proto::packet::DnsPacket;
use doh_server::prelude::JsonQuery;

use crate::matching::normalize_domain;

#[derive(Debug, Clone)]
pub struct RedirectHint {
    pub original: String,
    pub target: String,
}

#[derive(Debug, Clone)]
pub struct PluginError {
    pub plugin_tag: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Metadata {
    pub tags: Vec<String>,
    pub timings: HashMap<String, u128>,
    pub errors: Vec<PluginError>,
    pub upstream: Option<String>,
    pub upstream_error: Option<String>,
    pub redirect: Option<RedirectHint>,
    pub cache_key: Option<String>,
    pub cache_ttl: Option<Duration>,
}

/// Observer registered by a plugin (the Cache plugin's write-through) that
/// fires whenever a later plugin calls [`Context::set_response`].
pub trait OnResponseHook: Send + Sync {
    fn on_response(&self, response: &[u8]);
}

pub struct Context {
    pub dns_message: Option<Vec<u8>>,
    pub json_query: Option<JsonQuery>,
    pub response: Option<Vec<u8>>,
    pub error: Option<u8>,
    pub resolved: bool,
    pub metadata: Metadata,
    domain: Option<String>,
    qtype: u16,
    on_response_hooks: Vec<Box<dyn OnResponseHook>>,
}

impl Context {
    pub fn new(dns_message: Option<Vec<u8>>, json_query: Option<JsonQuery>) -> Self {
        let (domain, qtype) = dns_message
            .as_deref()
            .and_then(question_from_wire)
            .or_else(|| json_query.as_ref().map(question_from_json))
            .unwrap_or((None, 0));

        Self {
            dns_message,
            json_query,
            response: None,
            error: None,
            resolved: false,
            metadata: Metadata::default(),
            domain,
            qtype,
            on_response_hooks: Vec::new(),
        }
    }

    pub fn query_domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn query_type(&self) -> u16 {
        self.qtype
    }

    pub fn set_response(&mut self, response: Vec<u8>) {
        for hook in &self.on_response_hooks {
            hook.on_response(&response);
        }
        self.response = Some(response);
        self.resolved = true;
    }

    pub fn set_error(&mut self, rcode: u8) {
        self.error = Some(rcode);
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.metadata.tags.contains(&tag) {
            self.metadata.tags.push(tag);
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.metadata.tags.iter().any(|t| t == tag)
    }

    pub fn register_on_response_hook(&mut self, hook: Box<dyn OnResponseHook>) {
        self.on_response_hooks.push(hook);
    }

    /// A fresh context over the same query, for the independent sub-requests
    /// the `parallel` load-balancer strategy fans out to.
    pub fn fork(&self) -> Context {
        Context::new(self.dns_message.clone(), self.json_query.clone())
    }
}

fn question_from_wire(message: &[u8]) -> Option<(Option<String>, u16)> {
    let buffer = BytePacketBuffer::from_bytes(message);
    let packet = DnsPacket::try_from(buffer).ok()?;
    let question = packet.questions.first()?;
    Some((Some(normalize_domain(&question.name)), question.qtype.into_num()))
}

fn question_from_json(query: &JsonQuery) -> (Option<String>, u16) {
    let qtype = query
        .qtype
        .as_deref()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(1);
    (Some(normalize_domain(&query.name)), qtype)
}
