//! Instance health check with the start-from-stopped wait loop.

use crate::config::StartPolicy;
use crate::error::Result;
use crate::ports::{InstanceApi, RunState};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HealthReport {
    pub initialized: bool,
    /// The check started a stopped instance. Only meaningful when
    /// `initialized` is true: the caller re-stops it to restore prior state.
    pub started_from_stopped: bool,
}

pub struct HealthChecker<'a> {
    api: &'a dyn InstanceApi,
    policy: StartPolicy,
}

impl<'a> HealthChecker<'a> {
    pub fn new(api: &'a dyn InstanceApi, policy: StartPolicy) -> Self {
        Self { api, policy }
    }

    /// Healthy iff the instance is `running` and both status checks are `ok`.
    ///
    /// A `stopped` instance is started and polled every `poll_interval` until
    /// it is healthy or `wait_budget` has elapsed. This suspends the whole
    /// invocation; there is no cancellation besides the runtime's own limit.
    pub async fn check(&self, instance_id: &str) -> Result<HealthReport> {
        let Some(obs) = self.api.observe(instance_id).await? else {
            tracing::info!(instance = instance_id, "instance not found");
            return Ok(HealthReport::default());
        };

        if obs.is_initialized() {
            tracing::info!(instance = instance_id, "instance running and initialized");
            return Ok(HealthReport {
                initialized: true,
                started_from_stopped: false,
            });
        }

        if obs.run_state != RunState::Stopped {
            tracing::info!(
                instance = instance_id,
                state = %obs.run_state,
                system_ok = obs.system_ok,
                instance_ok = obs.instance_ok,
                "instance not fully initialized"
            );
            return Ok(HealthReport::default());
        }

        tracing::info!(instance = instance_id, "instance stopped, starting it");
        self.api.start(instance_id).await?;
        let initialized = self.wait_until_initialized(instance_id).await?;
        Ok(HealthReport {
            initialized,
            started_from_stopped: true,
        })
    }

    async fn wait_until_initialized(&self, instance_id: &str) -> Result<bool> {
        let budget = self.policy.wait_budget();
        let interval = self.policy.poll_interval();
        let mut waited = Duration::ZERO;

        while waited < budget {
            tokio::time::sleep(interval).await;
            waited += interval;
            if let Some(obs) = self.api.observe(instance_id).await? {
                if obs.is_initialized() {
                    tracing::info!(
                        instance = instance_id,
                        waited_secs = waited.as_secs(),
                        "started instance became healthy"
                    );
                    return Ok(true);
                }
                tracing::debug!(
                    instance = instance_id,
                    state = %obs.run_state,
                    waited_secs = waited.as_secs(),
                    "waiting for started instance"
                );
            }
        }

        tracing::warn!(
            instance = instance_id,
            budget_secs = budget.as_secs(),
            "started instance not healthy within wait budget"
        );
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SignalerError;
    use crate::memory::MemoryInstances;
    use crate::ports::InstanceObservation;

    fn policy() -> StartPolicy {
        StartPolicy {
            wait_seconds: 300,
            poll_seconds: 10,
        }
    }

    #[tokio::test]
    async fn healthy_instance_reports_initialized() {
        let api = MemoryInstances::new();
        api.script("i-1", vec![InstanceObservation::healthy()]);
        let report = HealthChecker::new(&api, policy()).check("i-1").await.unwrap();
        assert_eq!(
            report,
            HealthReport {
                initialized: true,
                started_from_stopped: false
            }
        );
        assert!(api.started().is_empty());
    }

    #[tokio::test]
    async fn pending_and_missing_report_unhealthy_without_side_effects() {
        let api = MemoryInstances::new();
        api.script(
            "i-1",
            vec![InstanceObservation {
                run_state: RunState::Pending,
                system_ok: false,
                instance_ok: false,
            }],
        );
        let checker = HealthChecker::new(&api, policy());
        assert!(!checker.check("i-1").await.unwrap().initialized);
        assert!(!checker.check("i-missing").await.unwrap().initialized);
        assert!(api.started().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_instance_is_started_and_polled_until_healthy() {
        let api = MemoryInstances::new();
        api.script(
            "i-1",
            vec![
                InstanceObservation::stopped(),
                InstanceObservation::initializing(),
                InstanceObservation::initializing(),
                InstanceObservation::healthy(),
            ],
        );
        let started = tokio::time::Instant::now();
        let report = HealthChecker::new(&api, policy()).check("i-1").await.unwrap();
        assert!(report.initialized);
        assert!(report.started_from_stopped);
        assert_eq!(api.started(), vec!["i-1".to_string()]);
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_budget_elapses_without_health() {
        let api = MemoryInstances::new();
        api.script(
            "i-1",
            vec![InstanceObservation::stopped(), InstanceObservation::initializing()],
        );
        let started = tokio::time::Instant::now();
        let report = HealthChecker::new(&api, policy()).check("i-1").await.unwrap();
        assert!(!report.initialized);
        assert!(report.started_from_stopped);
        assert_eq!(started.elapsed(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn query_errors_propagate_as_status_check_failed() {
        let api = MemoryInstances::new();
        api.fail_observe("throttled");
        let err = HealthChecker::new(&api, policy())
            .check("i-1")
            .await
            .unwrap_err();
        assert!(matches!(err, SignalerError::StatusCheckFailed { .. }), "{err:?}");
    }
}
