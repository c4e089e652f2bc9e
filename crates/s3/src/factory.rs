//! Client factory
//!
//! Backends are expensive to build (credential chain, HTTP connector), so
//! the factory caches one per endpoint and credential set. Clients for
//! different paths on the same host share it.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use bucketfs_core::address::endpoint_host;
use bucketfs_core::{HostConfig, ResourceAddress, Result, StorageApi, is_virtual_host_style};

use crate::client::S3Client;

/// Where a backend connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEndpoint {
    /// Host including the port; virtual-host names reduced to the provider
    /// endpoint
    pub host: String,
    pub secure: bool,
    /// Bucket is addressed through the host name
    pub virtual_style: bool,
}

impl BackendEndpoint {
    /// Resolve the endpoint of a target URL
    pub fn from_address(target: &ResourceAddress) -> Self {
        Self {
            host: endpoint_host(&target.host).to_string(),
            secure: target.is_secure(),
            virtual_style: is_virtual_host_style(&target.host),
        }
    }

    /// Endpoint URL handed to the SDK
    pub fn url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}", self.host)
    }
}

/// Constructs storage backends for the factory
#[async_trait]
pub trait BackendBuilder: Send + Sync {
    async fn build(
        &self,
        endpoint: &BackendEndpoint,
        config: &HostConfig,
    ) -> Result<Arc<dyn StorageApi>>;
}

/// Creates clients, reusing backends across equal endpoints and credentials
pub struct ClientFactory<B> {
    builder: B,
    cache: Mutex<HashMap<u64, Arc<dyn StorageApi>>>,
}

impl<B: BackendBuilder> ClientFactory<B> {
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Client for the URL of `config`
    pub async fn get_or_create(&self, config: &HostConfig) -> Result<S3Client> {
        let target = ResourceAddress::parse(&config.url)?;
        let endpoint = BackendEndpoint::from_address(&target);
        let key = cache_key(&endpoint.host, &config.access_key, &config.secret_key);

        let mut cache = self.cache.lock().await;
        let api = match cache.get(&key) {
            Some(api) => {
                tracing::debug!(host = %endpoint.host, alias = %config.alias, "reusing cached backend");
                Arc::clone(api)
            }
            None => {
                tracing::debug!(host = %endpoint.host, alias = %config.alias, "building backend");
                let api = self.builder.build(&endpoint, config).await?;
                cache.insert(key, Arc::clone(&api));
                api
            }
        };
        drop(cache);

        Ok(S3Client::new(api, target))
    }

    /// Number of cached backends
    pub async fn cached(&self) -> usize {
        self.cache.lock().await.len()
    }
}

fn cache_key(host: &str, access_key: &str, secret_key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    host.hash(&mut hasher);
    access_key.hash(&mut hasher);
    secret_key.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bucketfs_core::{Error, MockStorageApi};

    use super::*;

    #[derive(Default)]
    struct CountingBuilder {
        builds: AtomicUsize,
        endpoints: std::sync::Mutex<Vec<BackendEndpoint>>,
    }

    #[async_trait]
    impl BackendBuilder for CountingBuilder {
        async fn build(
            &self,
            endpoint: &BackendEndpoint,
            _config: &HostConfig,
        ) -> Result<Arc<dyn StorageApi>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            self.endpoints.lock().unwrap().push(endpoint.clone());
            Ok(Arc::new(MockStorageApi::new()))
        }
    }

    #[tokio::test]
    async fn test_backend_shared_per_host_and_credentials() {
        let factory = ClientFactory::new(CountingBuilder::default());

        let a = factory
            .get_or_create(&HostConfig::new("a", "http://localhost:9000/photos", "ak", "sk"))
            .await
            .unwrap();
        let b = factory
            .get_or_create(&HostConfig::new("b", "http://localhost:9000/videos/x", "ak", "sk"))
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&a.api, &b.api));
        assert_eq!(b.bucket_and_object(), ("videos".to_string(), "x".to_string()));

        factory
            .get_or_create(&HostConfig::new("c", "http://localhost:9000/photos", "other", "sk"))
            .await
            .unwrap();
        assert_eq!(factory.builder.builds.load(Ordering::SeqCst), 2);
        assert_eq!(factory.cached().await, 2);
    }

    #[tokio::test]
    async fn test_virtual_host_normalized() {
        let factory = ClientFactory::new(CountingBuilder::default());

        let photos = factory
            .get_or_create(&HostConfig::new("p", "https://photos.s3.amazonaws.com/a", "ak", "sk"))
            .await
            .unwrap();
        factory
            .get_or_create(&HostConfig::new("v", "https://videos.s3.amazonaws.com/b", "ak", "sk"))
            .await
            .unwrap();

        assert!(photos.is_virtual_style());
        assert_eq!(factory.builder.builds.load(Ordering::SeqCst), 1);
        let endpoints = factory.builder.endpoints.lock().unwrap();
        assert_eq!(
            endpoints[0],
            BackendEndpoint {
                host: "s3.amazonaws.com".to_string(),
                secure: true,
                virtual_style: true,
            }
        );
        assert_eq!(endpoints[0].url(), "https://s3.amazonaws.com");
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let factory = ClientFactory::new(CountingBuilder::default());
        let result = factory
            .get_or_create(&HostConfig::new("x", "not a url", "ak", "sk"))
            .await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
        assert_eq!(factory.builder.builds.load(Ordering::SeqCst), 0);
    }
}
