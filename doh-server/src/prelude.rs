/// A decoded DoH query, stripped of its HTTP envelope.
#[derive(Debug, Clone)]
pub struct DohRequest {
    pub dns_message: Vec<u8>,
    pub json_query: Option<JsonQuery>,
}

#[derive(Debug, Clone)]
pub struct JsonQuery {
    pub name: String,
    pub qtype: Option<String>,
}

/// What the plugin chain produced for a request, in boundary-neutral form.
#[derive(Debug, Clone, Default)]
pub struct DohReply {
    pub resolved: bool,
    pub response_code: Option<u8>,
    pub response: Option<Vec<u8>>,
    pub wants_json: bool,
}

#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: DohRequest) -> DohReply;
}
