use doh_proto::buffer::BytePacketBuffer;
use doh_proto::packet::header::ResponseCode;
use doh_proto::packet::DnsPacket;
use doh_server::prelude::{DohReply, DohRequest, Handler};

use crate::context::Context;
use crate::plugin::Chain;

pub(crate) struct ChainHandler {
    chain: Chain,
}

impl ChainHandler {
    pub fn new(chain: Chain) -> Self {
        Self { chain }
    }
}

#[async_trait::async_trait]
impl Handler for ChainHandler {
    #[tracing::instrument(skip_all, fields(domain = tracing::field::Empty))]
    async fn handle(&self, request: DohRequest) -> DohReply {
        let wants_json = request.json_query.is_some();

        if let Err(err) = DnsPacket::try_from(BytePacketBuffer::from_bytes(&request.dns_message)) {
            tracing::warn!(%err, "rejecting malformed query with formerr");
            let response = DnsPacket::build_error_response(&request.dns_message, ResponseCode::FormatError);
            // A FORMERR reply is a fully-formed DNS response, not an
            // out-of-band chain error, so it travels as `response` and
            // leaves `response_code` unset the same way a normal resolution
            // would.
            return DohReply {
                resolved: true,
                response_code: None,
                response: Some(response),
                wants_json,
            };
        }

        let mut ctx = Context::new(Some(request.dns_message), request.json_query);
        tracing::Span::current().record("domain", ctx.query_domain().unwrap_or_default());

        self.chain.execute(&mut ctx).await;

        if !ctx.metadata.errors.is_empty() {
            for error in &ctx.metadata.errors {
                tracing::warn!(tag = %error.plugin_tag, message = %error.message, "plugin chain recorded an error");
            }
        }

        DohReply {
            resolved: ctx.resolved,
            response_code: ctx.error,
            response: ctx.response,
            wants_json,
        }
    }
}
