// HTTP GET capability used by the health monitor

use crate::health::ProbeFailure;
use async_trait::async_trait;
use std::time::Duration;

/// A single GET against a health endpoint
#[async_trait]
pub trait HealthProbe: Send + Sync + 'static {
    /// Returns the response status code or a classified transport failure
    async fn get(&self, url: &str, timeout: Duration) -> Result<u16, ProbeFailure>;
}

/// `HealthProbe` backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("svcreg/", env!("CARGO_PKG_VERSION")))
            // Health endpoints are host-local services
            .no_proxy()
            // The endpoint's own status decides health, not a redirect target
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn get(&self, url: &str, timeout: Duration) -> Result<u16, ProbeFailure> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        Ok(response.status().as_u16())
    }
}

fn classify(error: reqwest::Error) -> ProbeFailure {
    if error.is_timeout() {
        ProbeFailure::timeout()
    } else if error.is_connect() {
        ProbeFailure::connect(error.to_string())
    } else {
        ProbeFailure::other(format!("Error: {}", error))
    }
}
