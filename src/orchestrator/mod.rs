//! Dashboard orchestration
//!
//! Coordinates concurrent fetches for the dashboard's logical resources, merges
//! partial failures, exposes the current snapshot and endpoint health map, and
//! drives the auto-refresh ticker.
//!
//! A refresh never fails as a whole: each resource settles on its own, failed
//! resources keep their previously-held values (stale-in-place), and the failure
//! count is logged as a warning.

use crate::access::{AccessLayer, Endpoint, HttpTransport};
use crate::cache::CacheStore;
use crate::clock::{Clock, SystemClock};
use crate::config::StormdeckConfig;
use crate::ratelimit::SlidingWindowLimiter;
use crate::Result;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Read-only view of the latest resource values for the presentation layer
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub cyclone_track: Option<Value>,
    pub district_risks: Option<Value>,
    pub advisories: Option<Value>,
    pub shelters: Option<Value>,

    /// Completion time of the last refresh cycle (epoch ms)
    pub last_refresh: Option<i64>,

    /// A refresh cycle is currently in flight
    pub loading: bool,

    /// Human-readable summary of the last cycle's failures, if any
    pub error: Option<String>,
}

impl Snapshot {
    fn slot_mut(&mut self, endpoint: &Endpoint) -> Option<&mut Option<Value>> {
        match endpoint {
            Endpoint::CycloneTrack => Some(&mut self.cyclone_track),
            Endpoint::DistrictRisks => Some(&mut self.district_risks),
            Endpoint::Advisories => Some(&mut self.advisories),
            Endpoint::Shelters => Some(&mut self.shelters),
            _ => None,
        }
    }
}

/// Coordinates the access layer, snapshot state, and refresh scheduling
pub struct Orchestrator {
    access: Arc<AccessLayer>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    refresh_interval: Duration,
    snapshot: Snapshot,
    health: HashMap<String, bool>,
    snapshot_tx: watch::Sender<Snapshot>,
}

impl Orchestrator {
    /// Assemble from explicitly constructed parts
    pub fn new(
        access: Arc<AccessLayer>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        refresh_interval: Duration,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(Snapshot::default());
        Self {
            access,
            clock,
            ttl,
            refresh_interval,
            snapshot: Snapshot::default(),
            health: HashMap::new(),
            snapshot_tx,
        }
    }

    /// Wire up the production stack from configuration
    pub fn from_config(config: &StormdeckConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let transport = Arc::new(HttpTransport::new(
            config.api.base_url.clone(),
            config.api.request_timeout(),
        )?);
        let access = AccessLayer::with_parts(
            transport,
            CacheStore::new(clock.clone()),
            SlidingWindowLimiter::with_limits(
                clock.clone(),
                config.rate_limit.max_requests,
                config.rate_limit.window(),
            ),
            config.retry.to_retry_config(),
        );
        Ok(Self::new(
            Arc::new(access),
            clock,
            config.cache.ttl(),
            config.refresh_interval(),
        ))
    }

    /// Current snapshot, cloned
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.clone()
    }

    /// Subscribe to snapshot updates
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Latest endpoint health map
    pub fn health(&self) -> HashMap<String, bool> {
        self.health.clone()
    }

    /// Shared access layer, for freshness and budget queries
    pub fn access(&self) -> &AccessLayer {
        &self.access
    }

    fn publish(&self) {
        // No receivers is fine; the snapshot is also readable directly
        let _ = self.snapshot_tx.send(self.snapshot.clone());
    }

    /// Refresh all dashboard resources in parallel, applying whatever succeeds
    pub async fn refresh_all(&mut self) {
        self.snapshot.loading = true;
        self.publish();

        let endpoints = Endpoint::dashboard_resources();
        let fetches = endpoints.iter().map(|e| self.access.fetch(e, self.ttl));
        let results = futures::future::join_all(fetches).await;

        let mut failures = 0usize;
        for (endpoint, result) in endpoints.iter().zip(results) {
            match result {
                Ok(Some(value)) => {
                    if let Some(slot) = self.snapshot.slot_mut(endpoint) {
                        *slot = Some(value);
                    }
                }
                // Rate limited with nothing cached: leave previous state in place
                Ok(None) => {}
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        endpoint = %endpoint,
                        error = %e,
                        "Resource refresh failed, keeping previous state"
                    );
                }
            }
        }

        self.snapshot.loading = false;
        self.snapshot.last_refresh = Some(self.clock.now_ms());
        self.snapshot.error = if failures > 0 {
            Some(format!(
                "{} of {} resources failed to refresh",
                failures,
                endpoints.len()
            ))
        } else {
            None
        };

        if failures > 0 {
            tracing::warn!(failures, total = endpoints.len(), "Partial refresh");
        } else {
            tracing::debug!("Refresh cycle complete");
        }
        self.publish();
    }

    /// Hazard analysis for a route, through the same cache/limit/retry policy
    pub async fn analyze_route(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<Option<Value>> {
        let endpoint = Endpoint::RouteAnalysis {
            source: source.to_string(),
            destination: destination.to_string(),
        };
        self.access.fetch(&endpoint, self.ttl).await
    }

    /// Aggregate hazard summary, through the same cache/limit/retry policy
    pub async fn fetch_summary(&self) -> Result<Option<Value>> {
        self.access.fetch(&Endpoint::Summary, self.ttl).await
    }

    /// Probe each upstream endpoint once and record reachability
    ///
    /// Best-effort: any probe error is swallowed into `false` for that endpoint,
    /// so a catastrophic transport failure yields an all-false map.
    pub async fn check_health(&mut self) -> HashMap<String, bool> {
        let mut health = HashMap::new();

        for endpoint in Endpoint::dashboard_resources() {
            let healthy = match self.access.probe(&endpoint).await {
                // Reachable means the service answered, even with a client error
                Ok(response) => response.status < 500,
                Err(e) => {
                    tracing::debug!(endpoint = %endpoint, error = %e, "Health probe failed");
                    false
                }
            };
            health.insert(endpoint.key(), healthy);
        }

        self.health = health.clone();
        health
    }

    /// Auto-refresh loop: refresh immediately, then on every tick until the
    /// shutdown signal flips to true
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            interval_secs = self.refresh_interval.as_secs(),
            "Starting auto-refresh loop"
        );

        let mut interval = tokio::time::interval(self.refresh_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.refresh_all().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Auto-refresh loop stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{RetryConfig, Transport, TransportResponse};
    use crate::clock::ManualClock;
    use crate::StormdeckError;
    use serde_json::json;
    use std::sync::Mutex;

    /// Transport with canned per-path responses; unknown paths fail as network errors
    struct MapTransport {
        responses: Mutex<HashMap<String, Result<TransportResponse>>>,
    }

    impl MapTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(HashMap::new()),
            })
        }

        fn respond(&self, path: &str, result: Result<TransportResponse>) {
            self.responses
                .lock()
                .unwrap()
                .insert(path.to_string(), result);
        }

        fn respond_ok(&self, path: &str, body: Value) {
            self.respond(path, Ok(TransportResponse { status: 200, body }));
        }
    }

    #[async_trait::async_trait]
    impl Transport for MapTransport {
        async fn request(&self, path: &str) -> Result<TransportResponse> {
            match self.responses.lock().unwrap().get(path) {
                Some(Ok(response)) => Ok(response.clone()),
                Some(Err(e)) => Err(StormdeckError::Other(e.to_string())),
                None => Err(StormdeckError::Network(format!("unreachable: {}", path))),
            }
        }
    }

    fn orchestrator_with(transport: Arc<MapTransport>) -> Orchestrator {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let access = AccessLayer::with_parts(
            transport,
            CacheStore::new(clock.clone()),
            SlidingWindowLimiter::new(clock.clone()),
            RetryConfig::quick(),
        );
        Orchestrator::new(
            Arc::new(access),
            clock,
            Duration::from_secs(300),
            Duration::from_millis(50),
        )
    }

    fn respond_all_ok(transport: &MapTransport) {
        transport.respond_ok("/api/cyclone/track", json!({"name": "Belal"}));
        transport.respond_ok("/api/districts/risk", json!([{"district": "Moka"}]));
        transport.respond_ok("/api/advisories", json!([{"class": 2}]));
        transport.respond_ok("/api/shelters", json!([]));
    }

    #[tokio::test]
    async fn test_refresh_all_applies_every_success() {
        let transport = MapTransport::new();
        respond_all_ok(&transport);
        let mut orch = orchestrator_with(transport);

        orch.refresh_all().await;

        let snapshot = orch.snapshot();
        assert_eq!(snapshot.cyclone_track, Some(json!({"name": "Belal"})));
        assert_eq!(snapshot.district_risks, Some(json!([{"district": "Moka"}])));
        assert_eq!(snapshot.advisories, Some(json!([{"class": 2}])));
        assert_eq!(snapshot.shelters, Some(json!([])));
        assert!(!snapshot.loading);
        assert!(snapshot.last_refresh.is_some());
        assert_eq!(snapshot.error, None);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_previous_state() {
        let transport = MapTransport::new();
        respond_all_ok(&transport);
        let mut orch = orchestrator_with(transport.clone());

        orch.refresh_all().await;
        assert_eq!(orch.snapshot().error, None);

        // Districts start failing with a non-retryable client error; its cache
        // entry must expire for the failure to surface at all
        transport.respond(
            "/api/districts/risk",
            Ok(TransportResponse {
                status: 404,
                body: Value::Null,
            }),
        );
        orch.access.invalidate(Some(&Endpoint::DistrictRisks));

        orch.refresh_all().await;

        let snapshot = orch.snapshot();
        // Previous district data is kept in place
        assert_eq!(snapshot.district_risks, Some(json!([{"district": "Moka"}])));
        assert_eq!(
            snapshot.error,
            Some("1 of 4 resources failed to refresh".to_string())
        );
        // The other resources still refreshed
        assert_eq!(snapshot.cyclone_track, Some(json!({"name": "Belal"})));
    }

    #[tokio::test]
    async fn test_snapshot_subscription_sees_updates() {
        let transport = MapTransport::new();
        respond_all_ok(&transport);
        let mut orch = orchestrator_with(transport);

        let rx = orch.subscribe();
        orch.refresh_all().await;

        let seen = rx.borrow().clone();
        assert!(seen.last_refresh.is_some());
        assert_eq!(seen.cyclone_track, Some(json!({"name": "Belal"})));
    }

    #[tokio::test]
    async fn test_check_health_mixed() {
        let transport = MapTransport::new();
        transport.respond_ok("/api/cyclone/track", json!({}));
        transport.respond(
            "/api/districts/risk",
            Ok(TransportResponse {
                status: 404,
                body: Value::Null,
            }),
        );
        transport.respond(
            "/api/advisories",
            Ok(TransportResponse {
                status: 503,
                body: Value::Null,
            }),
        );
        // Shelters unmapped: network error

        let mut orch = orchestrator_with(transport);
        let health = orch.check_health().await;

        assert_eq!(health.get("cyclone_track"), Some(&true));
        // 4xx means the service answered: reachable
        assert_eq!(health.get("district_risks"), Some(&true));
        assert_eq!(health.get("advisories"), Some(&false));
        assert_eq!(health.get("shelters"), Some(&false));
        assert_eq!(orch.health(), health);
    }

    #[tokio::test]
    async fn test_all_endpoints_down_yields_all_false() {
        let transport = MapTransport::new();
        let mut orch = orchestrator_with(transport);

        let health = orch.check_health().await;
        assert_eq!(health.len(), 4);
        assert!(health.values().all(|&healthy| !healthy));
    }

    #[tokio::test]
    async fn test_analyze_route_uses_parameterized_endpoint() {
        let transport = MapTransport::new();
        transport.respond_ok(
            "/api/routes/analysis?from=Moka&to=Flacq",
            json!({"risk": "moderate"}),
        );
        let orch = orchestrator_with(transport);

        let result = orch.analyze_route("Moka", "Flacq").await.unwrap();
        assert_eq!(result, Some(json!({"risk": "moderate"})));
    }

    #[tokio::test]
    async fn test_fetch_summary() {
        let transport = MapTransport::new();
        transport.respond_ok("/api/summary", json!({"overall": "orange"}));
        let orch = orchestrator_with(transport);

        let summary = orch.fetch_summary().await.unwrap();
        assert_eq!(summary, Some(json!({"overall": "orange"})));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let transport = MapTransport::new();
        respond_all_ok(&transport);
        let mut orch = orchestrator_with(transport);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            orch.run(shutdown_rx).await.unwrap();
            orch
        });

        // Let at least one tick fire, then stop
        tokio::time::sleep(Duration::from_millis(80)).await;
        shutdown_tx.send(true).unwrap();

        let orch = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
        assert!(orch.snapshot().last_refresh.is_some());
    }
}
