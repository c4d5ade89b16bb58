//! Decodes the four accepted shapes of a `/dns-query` request into a
//! [`DohRequest`], and renders a [`DohReply`] back into an HTTP response.

use axum::body::Bytes;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use doh_proto::base64url;
use doh_proto::packet::header::{Header, ResponseCode};
use doh_proto::packet::question::Question;
use doh_proto::packet::record::Record;
use doh_proto::packet::{DnsPacket, QueryType};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::prelude::{DohReply, DohRequest, JsonQuery};

#[derive(Debug)]
pub enum DecodeError {
    BadRequest(String),
}

impl IntoResponse for DecodeError {
    fn into_response(self) -> Response {
        let DecodeError::BadRequest(message) = self;
        (StatusCode::BAD_REQUEST, message).into_response()
    }
}

fn qtype_from_name(name: &str) -> QueryType {
    match name.to_ascii_uppercase().as_str() {
        "NS" => QueryType::NS,
        "CNAME" => QueryType::CNAME,
        "PTR" => QueryType::PTR,
        "MX" => QueryType::MX,
        "TXT" => QueryType::TXT,
        "AAAA" => QueryType::AAAA,
        _ => QueryType::A,
    }
}

fn synthesize_query(name: &str, qtype: Option<&str>) -> Vec<u8> {
    let qtype = match qtype {
        None => QueryType::A,
        Some(value) => value
            .parse::<u16>()
            .map(QueryType::from_num)
            .unwrap_or_else(|_| qtype_from_name(value)),
    };

    let id = rand::thread_rng().gen();
    let mut packet = DnsPacket {
        header: Header::question(id),
        questions: vec![Question::new(name.to_string(), qtype)],
        ..Default::default()
    };

    packet
        .create_buffer()
        .expect("freshly built query always fits in a packet buffer")
        .buf
        .to_vec()
}

/// `GET /dns-query?dns=<base64url>`
pub fn decode_get_wire(dns_param: &str) -> Result<DohRequest, DecodeError> {
    let dns_message = base64url::decode(dns_param)
        .map_err(|_| DecodeError::BadRequest(String::from("invalid dns parameter")))?;
    Ok(DohRequest {
        dns_message,
        json_query: None,
    })
}

/// `GET /dns-query?name=<fqdn>[&type=<rr>]`
pub fn decode_get_json(name: &str, qtype: Option<&str>) -> Result<DohRequest, DecodeError> {
    if name.is_empty() {
        return Err(DecodeError::BadRequest(String::from("missing name parameter")));
    }
    Ok(DohRequest {
        dns_message: synthesize_query(name, qtype),
        json_query: Some(JsonQuery {
            name: name.to_string(),
            qtype: qtype.map(String::from),
        }),
    })
}

/// `POST` with `Content-Type: application/dns-message`
pub fn decode_post_wire(body: Bytes) -> DohRequest {
    DohRequest {
        dns_message: body.to_vec(),
        json_query: None,
    }
}

#[derive(Deserialize)]
struct JsonQueryBody {
    name: String,
    #[serde(rename = "type")]
    qtype: Option<String>,
}

/// `POST` with `Content-Type: application/json`
pub fn decode_post_json(body: &[u8]) -> Result<DohRequest, DecodeError> {
    let parsed: JsonQueryBody = serde_json::from_slice(body)
        .map_err(|err| DecodeError::BadRequest(format!("invalid json body: {err}")))?;
    Ok(DohRequest {
        dns_message: synthesize_query(&parsed.name, parsed.qtype.as_deref()),
        json_query: Some(JsonQuery {
            name: parsed.name,
            qtype: parsed.qtype,
        }),
    })
}

#[derive(Serialize)]
struct DnsJsonQuestion {
    name: String,
    #[serde(rename = "type")]
    qtype: u16,
}

#[derive(Serialize)]
struct DnsJsonAnswer {
    name: String,
    #[serde(rename = "type")]
    qtype: u16,
    #[serde(rename = "TTL")]
    ttl: u32,
    data: String,
}

#[derive(Serialize)]
struct DnsJsonResponse {
    #[serde(rename = "Status")]
    status: u8,
    #[serde(rename = "TC")]
    tc: bool,
    #[serde(rename = "RD")]
    rd: bool,
    #[serde(rename = "RA")]
    ra: bool,
    #[serde(rename = "AD")]
    ad: bool,
    #[serde(rename = "CD")]
    cd: bool,
    #[serde(rename = "Question")]
    question: Vec<DnsJsonQuestion>,
    #[serde(rename = "Answer")]
    answer: Vec<DnsJsonAnswer>,
}

fn render_record_data(record: &Record) -> String {
    match record {
        Record::A { addr, .. } => addr.to_string(),
        Record::AAAA { addr, .. } => addr.to_string(),
        Record::CNAME { host, .. } => host.clone(),
        Record::NS { host, .. } => host.clone(),
        Record::PTR { host, .. } => host.clone(),
        Record::MX { priority, host, .. } => format!("{priority} {host}"),
        Record::TXT { data, .. } => data
            .iter()
            .map(|chunk| format!("\"{chunk}\""))
            .collect::<Vec<_>>()
            .join(" "),
        Record::Unknown { qtype, data_len, .. } => {
            format!("\\# {data_len} (unknown type {qtype})")
        }
    }
}

/// An upstream response that fails to parse is a resolution failure, not a
/// client-facing bad request: it is rendered as a SERVFAIL body rather than
/// an HTTP 400.
fn render_json(response: &[u8]) -> DnsJsonResponse {
    let buffer = doh_proto::buffer::BytePacketBuffer::from_bytes(response);
    let packet = match DnsPacket::try_from(buffer) {
        Ok(packet) => packet,
        Err(err) => {
            tracing::warn!(%err, "upstream returned a malformed response, rendering as servfail");
            let servfail = DnsPacket::build_error_response(response, ResponseCode::ServerFailure);
            let buffer = doh_proto::buffer::BytePacketBuffer::from_bytes(&servfail);
            DnsPacket::try_from(buffer).expect("a freshly synthesized servfail always parses")
        }
    };

    DnsJsonResponse {
        status: packet.header.response_code as u8,
        tc: packet.header.truncated_message,
        rd: packet.header.recursion_desired,
        ra: packet.header.recursion_available,
        ad: packet.header.authed_data,
        cd: packet.header.checking_disabled,
        question: packet
            .questions
            .iter()
            .map(|q| DnsJsonQuestion {
                name: q.name.clone(),
                qtype: q.qtype.into_num(),
            })
            .collect(),
        answer: packet
            .answers
            .iter()
            .map(|record| DnsJsonAnswer {
                name: record_domain(record).to_string(),
                qtype: record_qtype(record).into_num(),
                ttl: record.ttl(),
                data: render_record_data(record),
            })
            .collect(),
    }
}

fn record_domain(record: &Record) -> &str {
    match record {
        Record::A { domain, .. }
        | Record::AAAA { domain, .. }
        | Record::CNAME { domain, .. }
        | Record::NS { domain, .. }
        | Record::PTR { domain, .. }
        | Record::MX { domain, .. }
        | Record::TXT { domain, .. }
        | Record::Unknown { domain, .. } => domain,
    }
}

fn record_qtype(record: &Record) -> QueryType {
    match record {
        Record::A { .. } => QueryType::A,
        Record::AAAA { .. } => QueryType::AAAA,
        Record::CNAME { .. } => QueryType::CNAME,
        Record::NS { .. } => QueryType::NS,
        Record::PTR { .. } => QueryType::PTR,
        Record::MX { .. } => QueryType::MX,
        Record::TXT { .. } => QueryType::TXT,
        Record::Unknown { qtype, .. } => QueryType::Unknown(*qtype),
    }
}

const REFUSED: u8 = 5;

/// Renders a chain outcome into the HTTP reply the boundary sends back.
pub fn build_http_response(reply: DohReply) -> Response {
    if !reply.resolved && reply.response_code.is_none() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "not processed").into_response();
    }

    if reply.resolved {
        if let Some(code) = reply.response_code {
            let status = if code == REFUSED {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            return (status, "DNS server error").into_response();
        }
    }

    let Some(response) = reply.response else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "not processed").into_response();
    };

    if reply.wants_json {
        return (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/dns-json"),
                (header::CACHE_CONTROL, "max-age=300"),
            ],
            axum::Json(render_json(&response)),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/dns-message"),
            (header::CACHE_CONTROL, "max-age=300"),
        ],
        response,
    )
        .into_response()
}
