//! HTTP reachability probes
//!
//! Implements [`ConnectivityProbe`] with two cheap requests: a HEAD against
//! a small static resource for wide-area internet, and a GET against the
//! backend health endpoint for local reachability. Every failure mode
//! (timeout, DNS, refused connection, bad status) classifies as
//! unreachable; nothing here returns an error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use trailhead_core::ConnectivityProbe;
use trailhead_domain::{ProbeConfig, Result, TrailheadError};

use crate::errors::InfraError;

pub struct HttpProbe {
    client: Client,
    config: ProbeConfig,
}

impl HttpProbe {
    pub fn new(config: ProbeConfig) -> Result<Self> {
        // Per-request timeouts come from the config; the client-level
        // timeout is a backstop only.
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| TrailheadError::from(InfraError::from(err)))?;
        Ok(Self { client, config })
    }

    /// Append a cache-busting timestamp so intermediaries can never answer
    /// the probe from cache.
    fn bust_cache(url: &str) -> String {
        let separator = if url.contains('?') { '&' } else { '?' };
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        format!("{url}{separator}ts={ts}")
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn probe_internet(&self) -> bool {
        let url = Self::bust_cache(&self.config.internet_url);
        let request = self.client.head(&url).timeout(self.config.internet_timeout);

        // Any response at all proves the uplink; the resource's status is
        // irrelevant.
        match request.send().await {
            Ok(_) => true,
            Err(error) => {
                debug!(%error, "Internet probe failed");
                false
            }
        }
    }

    async fn probe_backend(&self) -> bool {
        let url = Self::bust_cache(&self.config.backend_url);
        let request = self.client.get(&url).timeout(self.config.backend_timeout);

        match request.send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!(status = %response.status(), "Backend probe returned failure status");
                false
            }
            Err(error) => {
                debug!(%error, "Backend probe failed");
                false
            }
        }
    }
}
