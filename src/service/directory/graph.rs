//! Microsoft Graph implementation of directory sync.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    base::{
        config::Config,
        types::{Res, WorkLocation},
    },
    service::auth::ClientCredentials,
};

use super::{DirectoryClient, GenericDirectoryClient};

const GRAPH_BASE_URL: &str = "https://graph.microsoft.com";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

// Extra methods on `DirectoryClient` applied by the graph implementation.

impl DirectoryClient {
    /// Creates a Graph backed client, if directory credentials are configured.
    pub fn graph(config: &Config) -> Res<Option<Self>> {
        if !config.directory_sync_enabled() {
            return Ok(None);
        }

        let client = GraphDirectoryClient::new(config)?;
        Ok(Some(Self { inner: Arc::new(client) }))
    }
}

/// Graph directory client implementation.
pub struct GraphDirectoryClient {
    client: reqwest::Client,
    credentials: ClientCredentials,
    base_url: String,
    profile_field: String,
}

impl GraphDirectoryClient {
    pub fn new(config: &Config) -> Res<Self> {
        let client = reqwest::Client::builder().timeout(std::time::Duration::from_secs(10)).build()?;

        let tenant = config.graph_tenant_id.as_deref().unwrap_or_default();
        let client_id = config.graph_client_id.as_deref().unwrap_or_default();
        let client_secret = config.graph_client_secret.as_deref().unwrap_or_default();

        let credentials = ClientCredentials::new(client.clone(), ClientCredentials::microsoft_token_url(tenant), client_id, client_secret, GRAPH_SCOPE);

        Ok(Self {
            client,
            credentials,
            base_url: GRAPH_BASE_URL.to_string(),
            profile_field: config.graph_profile_field.clone(),
        })
    }
}

#[async_trait]
impl GenericDirectoryClient for GraphDirectoryClient {
    #[instrument(name = "GraphDirectoryClient::update_external_profile_location", skip(self))]
    async fn update_external_profile_location(&self, email: &str, location: WorkLocation) -> Res<bool> {
        let Some(body) = profile_patch(&self.profile_field, location) else {
            return Ok(false);
        };

        if email.is_empty() || email.contains('/') {
            return Err(anyhow::anyhow!("Refusing to sync an invalid email address."));
        }

        let token = self.credentials.token().await?;
        let url = format!("{}/v1.0/users/{email}", self.base_url);

        let response = self.client.patch(&url).bearer_auth(token).json(&body).send().await?;

        debug!("Graph responded with {}.", response.status());

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Graph profile update failed with status {}.", response.status()));
        }

        Ok(true)
    }
}

/// The PATCH body for a location, or `None` for locations that are not mirrored.
fn profile_patch(field: &str, location: WorkLocation) -> Option<Value> {
    match location {
        WorkLocation::Remote | WorkLocation::Office => {
            let mut body = serde_json::Map::new();
            body.insert(field.to_string(), Value::String(location.label().to_string()));
            Some(Value::Object(body))
        }
        WorkLocation::Hybrid => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::base::config::ConfigInner;

    #[test]
    fn test_profile_patch() {
        assert_eq!(profile_patch("officeLocation", WorkLocation::Office), Some(json!({ "officeLocation": "Office" })));
        assert_eq!(profile_patch("officeLocation", WorkLocation::Hybrid), None);
    }

    #[test]
    fn test_graph_requires_all_credentials() {
        let config = Config::from(ConfigInner {
            graph_tenant_id: Some("tenant".to_string()),
            ..Default::default()
        });
        assert!(DirectoryClient::graph(&config).unwrap().is_none());

        let config = Config::from(ConfigInner {
            graph_tenant_id: Some("tenant".to_string()),
            graph_client_id: Some("client".to_string()),
            graph_client_secret: Some("secret".to_string()),
            ..Default::default()
        });
        assert!(DirectoryClient::graph(&config).unwrap().is_some());
    }
}
