//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::SectionResult;

/// Endpoint used when none is given.
pub const DEFAULT_ENDPOINT: &str = "/";

/// Settings for a [`SectionClient`](crate::SectionClient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Origin that relative endpoints are resolved against.
    pub base_url: Url,
    /// Endpoint for single-section fetches (`?section_id=`).
    #[serde(default = "default_endpoint")]
    pub section_endpoint: String,
    /// Endpoint for multi-section fetches (`?sections=`).
    #[serde(default = "default_endpoint")]
    pub sections_endpoint: String,
    /// Per-request timeout. `None` waits indefinitely.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_user_agent() -> String {
    format!("section-render/{}", env!("CARGO_PKG_VERSION"))
}

impl ClientConfig {
    /// Create a config for the given origin with default endpoints.
    pub fn new(base_url: &str) -> SectionResult<Self> {
        Ok(Self::from_url(Url::parse(base_url)?))
    }

    pub fn from_url(base_url: Url) -> Self {
        Self {
            base_url,
            section_endpoint: default_endpoint(),
            sections_endpoint: default_endpoint(),
            timeout_ms: None,
            user_agent: default_user_agent(),
        }
    }

    pub fn with_section_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.section_endpoint = endpoint.into();
        self
    }

    pub fn with_sections_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.sections_endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Resolve an endpoint (absolute or relative) against the base URL.
    pub fn resolve(&self, endpoint: &str) -> SectionResult<Url> {
        Ok(self.base_url.join(endpoint)?)
    }
}
