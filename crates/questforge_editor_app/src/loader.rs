// SPDX-License-Identifier: MIT OR Apache-2.0
//! Remote object loader backed by the design API.

use crate::config::RemoteConfig;
use crate::error::AppError;
use futures::future::{BoxFuture, FutureExt};
use questforge_editor_graph::{LoadError, ObjectKey, ObjectLoader, RemoteObject};
use reqwest::{Client, StatusCode, Url};

/// Fetches objects with `GET {base}/{endpoint}?id={id}`
#[derive(Debug, Clone)]
pub struct HttpObjectLoader {
    client: Client,
    remote: RemoteConfig,
}

impl HttpObjectLoader {
    /// Create a loader for the configured API
    pub fn new(remote: RemoteConfig) -> Result<Self, AppError> {
        tracing::debug!(
            base_url = %remote.base_url,
            timeout_ms = remote.timeout_ms,
            "Creating HTTP object loader"
        );
        let client = Client::builder().timeout(remote.timeout()).build()?;
        Ok(Self { client, remote })
    }

    /// URL of the request for an object
    pub fn url_for(&self, key: &ObjectKey) -> Result<Url, LoadError> {
        let base = self.remote.base_url.trim_end_matches('/');
        let endpoint = self.remote.endpoint(key.kind).trim_start_matches('/');
        Url::parse_with_params(&format!("{base}/{endpoint}"), [("id", key.id.as_str())])
            .map_err(|e| failed(key, e))
    }
}

fn failed(key: &ObjectKey, err: impl std::fmt::Display) -> LoadError {
    LoadError::Failed {
        key: key.clone(),
        message: err.to_string(),
    }
}

impl ObjectLoader for HttpObjectLoader {
    fn fetch(&self, key: &ObjectKey) -> BoxFuture<'static, Result<RemoteObject, LoadError>> {
        let key = key.clone();
        let request = self.url_for(&key).map(|url| self.client.get(url));
        async move {
            let response = request?.send().await.map_err(|e| failed(&key, e))?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(LoadError::NotFound(key));
            }
            let response = response.error_for_status().map_err(|e| failed(&key, e))?;
            response.json::<RemoteObject>().await.map_err(|e| failed(&key, e))
        }
        .boxed()
    }
}

/// Loader for commands that never look at remote objects
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineLoader;

impl ObjectLoader for OfflineLoader {
    fn fetch(&self, key: &ObjectKey) -> BoxFuture<'static, Result<RemoteObject, LoadError>> {
        let err = failed(key, "remote lookups are disabled for this command");
        async move { Err(err) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questforge_editor_graph::ResourceKind;

    #[test]
    fn test_request_url() {
        let remote = RemoteConfig {
            base_url: "https://design.example.org/api/".to_string(),
            ..RemoteConfig::default()
        };
        let loader = HttpObjectLoader::new(remote).unwrap();

        let url = loader.url_for(&ObjectKey::new(ResourceKind::Npc, "42")).unwrap();
        assert_eq!(url.as_str(), "https://design.example.org/api/npcs?id=42");

        let url = loader
            .url_for(&ObjectKey::new(ResourceKind::WikiPage, "Old Mill & Bridge"))
            .unwrap();
        assert_eq!(url.path(), "/api/wiki/pages");
        assert_eq!(url.query_pairs().next().unwrap().1, "Old Mill & Bridge");
    }

    #[tokio::test]
    async fn test_offline_loader_never_fetches() {
        let key = ObjectKey::new(ResourceKind::Npc, "42");
        assert!(matches!(OfflineLoader.fetch(&key).await, Err(LoadError::Failed { .. })));
    }

    #[test]
    fn test_invalid_base_url_fails_the_load() {
        let remote = RemoteConfig {
            base_url: "not a url".to_string(),
            ..RemoteConfig::default()
        };
        let loader = HttpObjectLoader::new(remote).unwrap();
        assert!(matches!(
            loader.url_for(&ObjectKey::new(ResourceKind::Item, "1")),
            Err(LoadError::Failed { .. })
        ));
    }
}
