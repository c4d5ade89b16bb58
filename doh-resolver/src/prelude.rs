use std::collections::HashMap;

#[derive(Clone, Debug)]
pub enum ResolverError {
    Timeout,
    Http(String),
    Unknown,
}

impl std::fmt::Display for ResolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "resolver timed out"),
            Self::Http(msg) => write!(f, "resolver http error: {msg}"),
            Self::Unknown => write!(f, "resolver failed"),
        }
    }
}

impl std::error::Error for ResolverError {}

/// An upstream able to answer a raw DNS wire-format query with a raw
/// wire-format response. Queries and responses travel as opaque bytes so a
/// resolver never needs to parse the message it forwards.
#[async_trait::async_trait]
pub trait Resolver: std::fmt::Debug + Send + Sync {
    fn kind(&self) -> &'static str;
    fn identifier(&self) -> &str;

    async fn resolve(
        &self,
        message: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<Vec<u8>, ResolverError>;
}
