pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod prelude;

#[derive(Clone, Debug)]
pub enum ManagerBuilderError {
    NoResolver,
}

#[derive(Default)]
pub struct ManagerBuilder {
    resolvers: Vec<Box<dyn prelude::Resolver>>,
}

impl ManagerBuilder {
    pub fn add_resolver(&mut self, value: Box<dyn prelude::Resolver>) {
        self.resolvers.push(value);
    }

    pub fn with_resolver(mut self, value: Box<dyn prelude::Resolver>) -> Self {
        self.resolvers.push(value);
        self
    }

    pub fn build(self) -> Result<Manager, ManagerBuilderError> {
        if self.resolvers.is_empty() {
            return Err(ManagerBuilderError::NoResolver);
        }
        Ok(Manager {
            resolvers: self.resolvers,
        })
    }
}

#[derive(Clone, Debug)]
pub enum ManagerError {
    Failed(Vec<prelude::ResolverError>),
}

/// Fans a query out across resolvers in order, returning the first success.
/// Grounds the `fallback` strategy of the load-balancer plugin.
pub struct Manager {
    resolvers: Vec<Box<dyn prelude::Resolver>>,
}

impl Manager {
    pub async fn resolve(
        &self,
        message: &[u8],
        headers: &std::collections::HashMap<String, String>,
    ) -> Result<(Vec<u8>, Vec<prelude::ResolverError>), ManagerError> {
        let mut errors = Vec::new();
        for resolver in self.resolvers.iter() {
            match resolver.resolve(message, headers).await {
                Ok(found) => return Ok((found, errors)),
                Err(err) => errors.push(err),
            };
        }
        Err(ManagerError::Failed(errors))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::mock::MockResolver;

    #[test]
    fn manager_builder_should_error_if_no_resolver() {
        let builder = super::ManagerBuilder::default().build();
        assert!(builder.is_err());
    }

    #[tokio::test]
    async fn manager_should_report_errors_when_no_resolver_matches() {
        let manager = super::ManagerBuilder::default()
            .with_resolver(Box::new(MockResolver::new("first")))
            .build()
            .unwrap();
        let err = manager.resolve(b"query", &HashMap::new()).await.unwrap_err();
        match err {
            super::ManagerError::Failed(errors) => assert_eq!(errors.len(), 1),
        }
    }

    #[tokio::test]
    async fn manager_should_return_first_successful_resolver() {
        let manager = super::ManagerBuilder::default()
            .with_resolver(Box::new(MockResolver::new("first")))
            .with_resolver(
                Box::new(MockResolver::new("second").with_response(b"query".to_vec(), b"reply".to_vec())),
            )
            .build()
            .unwrap();
        let (response, errors) = manager.resolve(b"query", &HashMap::new()).await.unwrap();
        assert_eq!(response, b"reply");
        assert_eq!(errors.len(), 1);
    }
}
