//! Docker model runner. Listed in the provider table so its endpoint can be
//! probed, but it has no live discovery yet.

use async_trait::async_trait;
use reqwest::Client;

use super::http::{check_connectivity, endpoint};
use super::{ModelConnector, ScanResult};
use crate::errors::LumenResult;
use crate::providers::ProviderId;

pub const NOT_IMPLEMENTED: &str = "Docker model scanning not yet implemented";

pub struct DockerConnector {
    client: Client,
    base_url: String,
}

impl DockerConnector {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ModelConnector for DockerConnector {
    fn provider(&self) -> ProviderId {
        ProviderId::Docker
    }

    async fn scan(&self) -> ScanResult {
        ScanResult::failure(NOT_IMPLEMENTED)
    }

    async fn check_health(&self) -> LumenResult<()> {
        check_connectivity(
            &self.client,
            &endpoint(&self.base_url, ProviderId::Docker.discovery_path()),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scan_never_touches_the_network() {
        // Nothing listens on port 9; a real request would fail differently.
        let connector = DockerConnector::new(Client::new(), "http://127.0.0.1:9");
        let result = connector.scan().await;
        assert_eq!(result, ScanResult::failure(NOT_IMPLEMENTED));
        assert!(!connector.supports_chat());
    }
}
