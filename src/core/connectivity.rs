//! Reachability probe consulted for plugins that declare `needsinternet`.

use std::time::Duration;

use tracing::{debug, warn};

/// How long a single probe may take before the network counts as down.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Answers whether the outside world is reachable right now.
#[async_trait::async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn probe(&self) -> bool;
}

/// Probe issuing one HTTP GET against a well-known endpoint.
///
/// Any response, whatever its status, proves connectivity. Results are not
/// cached: every call performs a fresh request.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Self::with_timeout(url, PROBE_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn probe(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(resp) => {
                debug!("Connectivity probe to {} answered {}", self.url, resp.status());
                true
            }
            Err(e) => {
                warn!("Connectivity probe to {} failed: {}", self.url, e);
                false
            }
        }
    }
}

/// Probe with a fixed answer, for offline deployments and tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

#[async_trait::async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn probe(&self) -> bool {
        self.0
    }
}
