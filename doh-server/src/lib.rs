use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod boundary;
pub mod prelude;

use prelude::Handler;

#[derive(Debug, serde::Deserialize)]
pub struct DnsQueryParams {
    dns: Option<String>,
    name: Option<String>,
    #[serde(rename = "type")]
    qtype: Option<String>,
}

struct AppState<H> {
    handler: H,
}

async fn handle_get<H: Handler + 'static>(
    State(state): State<Arc<AppState<H>>>,
    Query(params): Query<DnsQueryParams>,
) -> Response {
    let request = if let Some(dns) = params.dns.as_deref() {
        boundary::decode_get_wire(dns)
    } else if let Some(name) = params.name.as_deref() {
        boundary::decode_get_json(name, params.qtype.as_deref())
    } else {
        Err(boundary::DecodeError::BadRequest(String::from(
            "expected dns= or name= parameter",
        )))
    };

    match request {
        Ok(request) => {
            let reply = state.handler.handle(request).await;
            boundary::build_http_response(reply)
        }
        Err(err) => err.into_response(),
    }
}

async fn handle_post<H: Handler + 'static>(
    State(state): State<Arc<AppState<H>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let request = if content_type.starts_with("application/dns-message") {
        Ok(boundary::decode_post_wire(body))
    } else if content_type.starts_with("application/json") {
        boundary::decode_post_json(&body)
    } else {
        Err(boundary::DecodeError::BadRequest(format!(
            "unsupported content-type: {content_type}"
        )))
    };

    match request {
        Ok(request) => {
            let reply = state.handler.handle(request).await;
            boundary::build_http_response(reply)
        }
        Err(err) => err.into_response(),
    }
}

async fn method_not_allowed() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}

/// Builds the full HTTP surface: `/dns-query` (GET and POST forms) plus the
/// administrative `/api/status`.
pub fn router<H: Handler + 'static>(handler: H) -> Router {
    let state = Arc::new(AppState { handler });

    Router::new()
        .route(
            "/dns-query",
            get(handle_get::<H>)
                .post(handle_post::<H>)
                .fallback(method_not_allowed),
        )
        .route("/api/status", get(admin::status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
