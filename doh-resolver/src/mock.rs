use std::collections::HashMap;

use crate::prelude::{Resolver, ResolverError};

#[derive(Debug, Default)]
pub struct MockResolver {
    identifier: String,
    responses: HashMap<Vec<u8>, Vec<u8>>,
}

impl MockResolver {
    pub fn new<I: Into<String>>(identifier: I) -> Self {
        Self {
            identifier: identifier.into(),
            responses: Default::default(),
        }
    }

    pub fn with_response(mut self, query: Vec<u8>, response: Vec<u8>) -> Self {
        self.responses.insert(query, response);
        self
    }
}

#[async_trait::async_trait]
impl Resolver for MockResolver {
    fn kind(&self) -> &'static str {
        "mock-resolver"
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn resolve(
        &self,
        message: &[u8],
        _headers: &HashMap<String, String>,
    ) -> Result<Vec<u8>, ResolverError> {
        self.responses
            .get(message)
            .cloned()
            .ok_or(ResolverError::Unknown)
    }
}
