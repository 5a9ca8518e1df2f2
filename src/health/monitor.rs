// Cached, deduplicated health probing of registered services

use crate::health::{
    HealthCache, HealthProbe, HealthProbeResult, HealthSettings, ProbeFailure, ServiceHealth,
    ServiceHealthReport,
};
use crate::registry::ServiceRecord;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

type InFlightProbe = Shared<BoxFuture<'static, HealthProbeResult>>;

/// Join a base URL and a health endpoint path.
///
/// Returns None when the service has no health endpoint.
pub fn build_health_url(base_url: &str, endpoint: Option<&str>) -> Option<String> {
    let endpoint = endpoint?;
    let base = base_url.trim_end_matches('/');
    if endpoint.starts_with('/') {
        Some(format!("{}{}", base, endpoint))
    } else {
        Some(format!("{}/{}", base, endpoint))
    }
}

/// Probes health endpoints and serves recent results from a TTL cache.
///
/// Concurrent checks of the same URL share one probe, and at most
/// `max_concurrent_probes` requests are outstanding at any time.
pub struct HealthMonitor {
    probe: Arc<dyn HealthProbe>,
    settings: HealthSettings,
    cache: Arc<Mutex<HealthCache>>,
    in_flight: Mutex<HashMap<String, InFlightProbe>>,
    permits: Arc<Semaphore>,
}

impl HealthMonitor {
    pub fn new(probe: Arc<dyn HealthProbe>, settings: HealthSettings) -> Self {
        Self {
            probe,
            cache: Arc::new(Mutex::new(HealthCache::new(
                settings.cache_ttl,
                settings.cache_capacity,
            ))),
            in_flight: Mutex::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(settings.max_concurrent_probes.max(1))),
            settings,
        }
    }

    /// Check `url`, answering from cache when allowed and fresh.
    ///
    /// Every outcome, including failures, is cached under `url`.
    pub async fn check_health(&self, url: &str, use_cache: bool) -> HealthProbeResult {
        if use_cache {
            if let Some(cached) = self.cache.lock().await.get_fresh(url, Instant::now()) {
                tracing::debug!("Health cache hit for {}", url);
                return cached;
            }
        }

        let probe = match self.join_or_start(url, use_cache).await {
            Ok(cached) => return cached,
            Err(probe) => probe,
        };

        let result = probe.clone().await;

        let mut in_flight = self.in_flight.lock().await;
        if in_flight.get(url).is_some_and(|current| current.ptr_eq(&probe)) {
            in_flight.remove(url);
        }

        result
    }

    /// Health of a registered service; Unknown when it has no health URL
    pub async fn check_service(&self, service: &ServiceRecord) -> ServiceHealthReport {
        let health_url = service
            .base_url
            .as_deref()
            .and_then(|base| build_health_url(base, service.health_endpoint.as_deref()));

        let probe = match &health_url {
            Some(url) => Some(self.check_health(url, true).await),
            None => None,
        };

        let health = match &probe {
            Some(result) if result.healthy => ServiceHealth::Healthy,
            Some(_) => ServiceHealth::Unhealthy,
            None => ServiceHealth::Unknown,
        };

        ServiceHealthReport {
            name: service.name.clone(),
            health_url,
            health,
            probe,
        }
    }

    /// Check many services concurrently, keeping input order
    pub async fn check_services(&self, services: &[ServiceRecord]) -> Vec<ServiceHealthReport> {
        join_all(services.iter().map(|service| self.check_service(service))).await
    }

    /// Drop every cached result
    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }

    /// A fresh cached result (`Ok`) or the probe to wait on (`Err`)
    async fn join_or_start(&self, url: &str, use_cache: bool) -> Result<HealthProbeResult, InFlightProbe> {
        let mut in_flight = self.in_flight.lock().await;

        if let Some(probe) = in_flight.get(url) {
            tracing::debug!("Joining in-flight probe for {}", url);
            return Err(probe.clone());
        }

        // A probe may have finished between the first cache lookup and now
        if use_cache {
            if let Some(cached) = self.cache.lock().await.get_fresh(url, Instant::now()) {
                return Ok(cached);
            }
        }

        let probe = self.start_probe(url);
        in_flight.insert(url.to_string(), probe.clone());
        Err(probe)
    }

    fn start_probe(&self, url: &str) -> InFlightProbe {
        let probe = self.probe.clone();
        let cache = self.cache.clone();
        let permits = self.permits.clone();
        let timeout = self.settings.timeout;
        let url = url.to_string();

        async move {
            let _permit = permits.acquire_owned().await.ok();
            tracing::debug!("Probing {}", url);

            let result = match tokio::time::timeout(timeout, probe.get(&url, timeout)).await {
                Ok(Ok(status_code)) => HealthProbeResult::from_status(status_code),
                Ok(Err(failure)) => HealthProbeResult::from_failure(failure),
                Err(_) => HealthProbeResult::from_failure(ProbeFailure::timeout()),
            };

            if !result.healthy {
                tracing::info!(
                    "Health check failed for {}: status={:?} error={:?}",
                    url,
                    result.status_code,
                    result.error
                );
            }

            cache.lock().await.insert(&url, result.clone(), Instant::now());
            result
        }
        .boxed()
        .shared()
    }
}
