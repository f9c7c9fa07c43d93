//! Node lookup seam and ready-made key functions.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::extract::Request;

/// Resolves a routing key to the base URL of the node that owns it.
///
/// Implementations typically consult a consistent-hash ring.
#[async_trait]
pub trait NodeLookup: Send + Sync {
    async fn get(&self, key: &[u8]) -> anyhow::Result<String>;
}

/// Extracts the routing key from an inbound HTTP request.
pub type RedirectKeyFunc = Arc<dyn Fn(&Request) -> anyhow::Result<Vec<u8>> + Send + Sync>;

/// A lookup that sends every key to the same node.
#[derive(Debug, Clone)]
pub struct FixedNode {
    url: String,
}

impl FixedNode {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl NodeLookup for FixedNode {
    async fn get(&self, _key: &[u8]) -> anyhow::Result<String> {
        Ok(self.url.clone())
    }
}

/// Key function that reads the key from header `name`.
pub fn header_key(name: impl Into<String>) -> RedirectKeyFunc {
    let name = name.into();
    Arc::new(move |request: &Request| {
        request
            .headers()
            .get(name.as_str())
            .map(|value| value.as_bytes().to_vec())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow!("missing {name} header"))
    })
}
