use std::collections::HashMap;
use std::time::Duration;

use crate::prelude::{Resolver, ResolverError};

/// Calls a DoH upstream (RFC 8484 POST form) with the wire-format query as
/// the body.
#[derive(Debug)]
pub struct HttpResolver {
    identifier: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpResolver {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let endpoint = endpoint.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client configuration is valid");

        Self {
            identifier: endpoint.clone(),
            endpoint,
            client,
        }
    }

    fn build_request(
        &self,
        message: &[u8],
        headers: &HashMap<String, String>,
    ) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/dns-message")
            .header("accept", "application/dns-message")
            .body(message.to_vec());

        for (key, value) in headers {
            request = request.header(key, value);
        }

        request
    }
}

#[async_trait::async_trait]
impl Resolver for HttpResolver {
    fn kind(&self) -> &'static str {
        "http"
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn resolve(
        &self,
        message: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<Vec<u8>, ResolverError> {
        let response = self
            .build_request(message, headers)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ResolverError::Timeout
                } else {
                    ResolverError::Http(err.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(ResolverError::Http(response.status().to_string()));
        }

        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|err| ResolverError::Http(err.to_string()))
    }
}
