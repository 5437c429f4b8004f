//! Server context - dependency injection container

use std::sync::Arc;

use metaads_domain::{Config, Result};
use metaads_infra::{AuthManager, GraphClient};

/// Holds the services every tool handler needs.
pub struct ServerContext {
    pub config: Config,
    pub auth: Arc<AuthManager>,
    pub client: Arc<GraphClient>,
}

impl ServerContext {
    /// Wire up auth and the Graph client from configuration.
    pub fn new(config: Config) -> Result<Self> {
        let auth = Arc::new(AuthManager::new(config.auth.clone()));
        let client = Arc::new(GraphClient::new(&config, Arc::clone(&auth))?);
        Ok(Self { config, auth, client })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wires_services_from_config() {
        let ctx = ServerContext::new(Config::from_access_token("tok")).expect("context");
        assert_eq!(ctx.config.auth.access_token, "tok");
        assert!(ctx.client.tracked_accounts().is_empty());
    }
}
