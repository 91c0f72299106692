//! Liveness and readiness
//!
//! Liveness never looks at a dependency. Readiness runs every registered
//! dependency check, each under its own timeout, and folds the results:
//!
//! | required checks | optional checks | verdict     |
//! |-----------------|-----------------|-------------|
//! | all pass        | all pass        | `healthy`   |
//! | all pass        | any fail        | `degraded`  |
//! | any fail        | anything        | `unhealthy` |
//!
//! The verdict is recomputed on every call; nothing is remembered between calls.

use crate::StockroomError;
use crate::cache::CacheClient;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::warn;

/// Longest failure detail exposed to clients
pub const MAX_DETAIL_CHARS: usize = 256;

/// Tri-state health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Whether orchestrators should send traffic
    pub fn is_serving(self) -> bool {
        !matches!(self, Self::Unhealthy)
    }
}

/// Result of one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub ok: bool,
    pub detail: Option<String>,
}

impl ProbeOutcome {
    pub fn ok() -> Self {
        Self {
            ok: true,
            detail: None,
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

/// Something that can report whether a dependency is usable
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self) -> ProbeOutcome;
}

#[async_trait]
impl<F, Fut> Probe for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ProbeOutcome> + Send,
{
    async fn probe(&self) -> ProbeOutcome {
        self().await
    }
}

/// A named probe and whether its failure makes the service unready
#[derive(Clone)]
pub struct DependencyCheck {
    pub name: String,
    pub required: bool,
    probe: Arc<dyn Probe>,
}

impl DependencyCheck {
    pub fn new(name: impl Into<String>, required: bool, probe: impl Probe + 'static) -> Self {
        Self {
            name: name.into(),
            required,
            probe: Arc::new(probe),
        }
    }
}

impl std::fmt::Debug for DependencyCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyCheck")
            .field("name", &self.name)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

/// Per-check entry of a verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub status: HealthStatus,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub latency_ms: u64,
}

/// Aggregated readiness
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthVerdict {
    pub status: HealthStatus,
    pub checks: BTreeMap<String, CheckReport>,
}

impl HealthVerdict {
    fn from_reports(checks: BTreeMap<String, CheckReport>) -> Self {
        let status = aggregate(
            checks
                .values()
                .map(|r| (r.status == HealthStatus::Healthy, r.required)),
        );
        Self { status, checks }
    }
}

/// Fold `(passed, required)` pairs into a verdict
pub fn aggregate<I>(results: I) -> HealthStatus
where
    I: IntoIterator<Item = (bool, bool)>,
{
    let mut optional_failed = false;
    for (passed, required) in results {
        if !passed {
            if required {
                return HealthStatus::Unhealthy;
            }
            optional_failed = true;
        }
    }
    if optional_failed {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

/// Keep the first line only and bound its length, so no backtrace or
/// multi-line internal state reaches a response body
pub fn sanitize_detail(detail: &str) -> String {
    let line = detail.lines().next().unwrap_or("").trim();
    if line.chars().count() > MAX_DETAIL_CHARS {
        let mut cut: String = line.chars().take(MAX_DETAIL_CHARS - 3).collect();
        cut.push_str("...");
        cut
    } else {
        line.to_string()
    }
}

/// Fixed set of dependency checks, registered at start-up
#[derive(Debug, Clone)]
pub struct HealthAggregator {
    checks: Vec<DependencyCheck>,
    probe_timeout: Duration,
}

impl HealthAggregator {
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            checks: Vec::new(),
            probe_timeout,
        }
    }

    /// Register a check. Names key the verdict, so a repeated name is rejected.
    pub fn with_check(mut self, check: DependencyCheck) -> crate::Result<Self> {
        if self.checks.iter().any(|c| c.name == check.name) {
            return Err(StockroomError::DuplicateCheck(check.name));
        }
        self.checks.push(check);
        Ok(self)
    }

    pub fn checks(&self) -> &[DependencyCheck] {
        &self.checks
    }

    /// Process is up and answering. Touches no dependency.
    pub fn liveness(&self) -> HealthStatus {
        HealthStatus::Healthy
    }

    /// Probe every dependency concurrently and aggregate
    pub async fn readiness(&self) -> HealthVerdict {
        let runs = self.checks.iter().map(|check| {
            let probe = Arc::clone(&check.probe);
            let limit = self.probe_timeout;
            async move {
                let started = Instant::now();
                // Spawned so a panicking probe fails its check instead of the request
                let outcome = match tokio::spawn(async move { timeout(limit, probe.probe()).await }).await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(_)) => ProbeOutcome::failed(format!("timed out after {}ms", limit.as_millis())),
                    Err(_) => ProbeOutcome::failed("probe aborted"),
                };
                (check, outcome, started.elapsed())
            }
        });

        let mut reports = BTreeMap::new();
        for (check, outcome, elapsed) in futures::future::join_all(runs).await {
            if !outcome.ok {
                warn!(
                    check = %check.name,
                    required = check.required,
                    detail = outcome.detail.as_deref().unwrap_or(""),
                    "Dependency check failed"
                );
            }
            reports.insert(
                check.name.clone(),
                CheckReport {
                    status: if outcome.ok {
                        HealthStatus::Healthy
                    } else {
                        HealthStatus::Unhealthy
                    },
                    required: check.required,
                    detail: outcome.detail.as_deref().map(sanitize_detail),
                    latency_ms: elapsed.as_millis() as u64,
                },
            );
        }

        HealthVerdict::from_reports(reports)
    }
}

/// Readiness probe for the cache client
pub struct CacheCheck {
    cache: CacheClient,
}

impl CacheCheck {
    pub fn new(cache: CacheClient) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Probe for CacheCheck {
    async fn probe(&self) -> ProbeOutcome {
        match self.cache.ping().await {
            Ok(()) => ProbeOutcome::ok(),
            Err(e) => ProbeOutcome::failed(e.to_string()),
        }
    }
}
