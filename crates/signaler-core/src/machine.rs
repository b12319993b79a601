//! Convergence state machine.
//!
//! State lives entirely outside the process: the [`CounterToken`] in the
//! counter store plus the schedule rule's enabled flag. Each tick loads the
//! token, decides one transition, and persists the result.
//!
//! ```text
//! bootstrap ──► enabled_increment_0 + ENABLED
//!
//! tick(enabled_increment_n):
//!   disabled flag          → Err(RuleDisabled)
//!   _success marker        → reset, DISABLE, tag complete, signal SUCCESS   (Converged)
//!   n >= threshold         → tag compromised, incident, reset, DISABLE      (Incident)
//!   healthy                → enabled_increment_n_success
//!   unhealthy              → enabled_increment_(n+1)
//! ```
//!
//! A healthy observation is committed only on the following tick, so a single
//! flaky reading never converges a cycle.
//!
//! The counter and schedule are not transactionally coupled and overlapping
//! ticks are not excluded; a crash between steps leaves partial state that
//! the next tick picks up as-is.

use crate::config::DeploymentContext;
use crate::error::{Result, SignalerError};
use crate::event::ResourceProperties;
use crate::health::{HealthChecker, HealthReport};
use crate::instance::resolve_monitored_instance;
use crate::ports::{Incident, Ports, ResourceSignal, ScheduleState, SignalStatus};
use crate::token::CounterToken;
use serde::Serialize;

pub const STATUS_TAG_KEY: &str = "ConvergenceStatus";
pub const STATUS_COMPLETE: &str = "complete";
pub const STATUS_COMPROMISED: &str = "compromised";

// ---------------------------------------------------------------------------
// CycleKeys
// ---------------------------------------------------------------------------

/// External names one cycle operates on, after per-event overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleKeys {
    pub stack_name: String,
    pub counter_key: String,
    pub schedule_name: String,
}

impl CycleKeys {
    /// Event `ResourceProperties` win over configured values.
    pub fn resolve(ctx: &DeploymentContext, props: &ResourceProperties) -> Result<Self> {
        fn pick(over: Option<&String>, fallback: &str) -> String {
            over.map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .unwrap_or(fallback.trim())
                .to_string()
        }

        let counter_key = pick(props.scheduler_ssm_parameter.as_ref(), &ctx.counter_key);
        if counter_key.is_empty() {
            return Err(SignalerError::NoCounterConfigured);
        }
        Ok(Self {
            stack_name: pick(props.stack_name.as_ref(), &ctx.stack_name),
            counter_key,
            schedule_name: pick(props.event.as_ref(), &ctx.schedule_name),
        })
    }
}

// ---------------------------------------------------------------------------
// TickOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// Success committed: schedule disabled, SUCCESS signalled.
    Converged { instance_id: Option<String> },
    /// Threshold reached without convergence.
    IncidentRaised {
        attempts: u32,
        instance_id: Option<String>,
    },
    /// Unhealthy observation; one more attempt consumed.
    Incremented {
        token: CounterToken,
        instance_id: Option<String>,
    },
    /// Healthy observation recorded; committed by the next tick.
    SuccessRecorded {
        token: CounterToken,
        instance_id: Option<String>,
    },
}

impl TickOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TickOutcome::Converged { .. } | TickOutcome::IncidentRaised { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// ConvergenceMachine
// ---------------------------------------------------------------------------

pub struct ConvergenceMachine<'a> {
    ctx: &'a DeploymentContext,
    ports: &'a Ports,
}

impl<'a> ConvergenceMachine<'a> {
    pub fn new(ctx: &'a DeploymentContext, ports: &'a Ports) -> Self {
        Self { ctx, ports }
    }

    /// Re-arm a cycle: counter to `enabled_increment_0`, schedule enabled.
    pub async fn bootstrap(&self, keys: &CycleKeys) -> Result<()> {
        self.write_token(keys, CounterToken::INITIAL).await?;
        self.set_schedule(&keys.schedule_name, ScheduleState::Enabled).await?;
        tracing::info!(
            stack = %keys.stack_name,
            counter = %keys.counter_key,
            schedule = %keys.schedule_name,
            "convergence cycle bootstrapped"
        );
        Ok(())
    }

    pub async fn load_token(&self, keys: &CycleKeys) -> Result<CounterToken> {
        let raw = self.ports.counter.get(&keys.counter_key).await?;
        tracing::debug!(counter = %keys.counter_key, token = %raw, "loaded counter");
        raw.parse()
    }

    /// Run one scheduled tick.
    pub async fn tick(&self, keys: &CycleKeys) -> Result<TickOutcome> {
        let token = self.load_token(keys).await?;
        if !token.is_enabled() {
            return Err(SignalerError::RuleDisabled(token.to_string()));
        }

        let instance = resolve_monitored_instance(&*self.ports.directory, &keys.stack_name).await?;

        if token.success {
            return self.converge(keys, token, instance).await;
        }
        if token.reached(self.ctx.threshold) {
            return self.raise_incident(keys, token, instance).await;
        }

        let report = match &instance {
            Some(id) => {
                HealthChecker::new(&*self.ports.instances, self.ctx.start)
                    .check(id)
                    .await?
            }
            None => HealthReport::default(),
        };

        if report.initialized {
            let next = token.with_success();
            self.write_token(keys, next).await?;
            tracing::info!(
                from = %token,
                to = %next,
                instance = instance.as_deref().unwrap_or("-"),
                attempt = token.attempts,
                threshold = self.ctx.threshold,
                "healthy observation recorded"
            );
            if report.started_from_stopped {
                if let Some(id) = &instance {
                    self.restore_stopped(id).await;
                }
            }
            return Ok(TickOutcome::SuccessRecorded {
                token: next,
                instance_id: instance,
            });
        }

        let next = token.incremented();
        self.write_token(keys, next).await?;
        tracing::info!(
            from = %token,
            to = %next,
            instance = instance.as_deref().unwrap_or("-"),
            attempt = next.attempts,
            threshold = self.ctx.threshold,
            "counter incremented"
        );
        Ok(TickOutcome::Incremented {
            token: next,
            instance_id: instance,
        })
    }

    // -----------------------------------------------------------------------
    // Terminal branches
    // -----------------------------------------------------------------------

    async fn converge(
        &self,
        keys: &CycleKeys,
        token: CounterToken,
        instance: Option<String>,
    ) -> Result<TickOutcome> {
        self.write_token(keys, CounterToken::INITIAL).await?;
        self.set_schedule(&keys.schedule_name, ScheduleState::Disabled).await?;
        self.tag_instance(instance.as_deref(), STATUS_COMPLETE).await?;

        let signal = ResourceSignal {
            stack: keys.stack_name.clone(),
            logical_resource_id: self.ctx.logical_resource_id.clone(),
            unique_id: instance
                .clone()
                .unwrap_or_else(|| self.ctx.logical_resource_id.clone()),
            status: SignalStatus::Success,
        };
        self.ports.signaler.signal(&signal).await?;

        tracing::info!(
            from = %token,
            to = %CounterToken::INITIAL,
            stack = %keys.stack_name,
            instance = instance.as_deref().unwrap_or("-"),
            "cycle converged"
        );
        Ok(TickOutcome::Converged {
            instance_id: instance,
        })
    }

    async fn raise_incident(
        &self,
        keys: &CycleKeys,
        token: CounterToken,
        instance: Option<String>,
    ) -> Result<TickOutcome> {
        self.tag_instance(instance.as_deref(), STATUS_COMPROMISED).await?;

        let incident = Incident {
            title: format!(
                "{} in {} did not converge",
                self.ctx.logical_resource_id, keys.stack_name
            ),
            message: format!(
                "{} attempts made without a healthy observation (threshold {})",
                token.attempts, self.ctx.threshold
            ),
            stack_name: keys.stack_name.clone(),
            logical_resource_id: self.ctx.logical_resource_id.clone(),
            instance_id: instance.clone(),
            attempts: token.attempts,
            threshold: self.ctx.threshold,
        };
        self.ports.incidents.raise(&incident).await?;

        self.write_token(keys, CounterToken::INITIAL).await?;
        self.set_schedule(&keys.schedule_name, ScheduleState::Disabled).await?;

        tracing::warn!(
            from = %token,
            to = %CounterToken::INITIAL,
            attempt = token.attempts,
            threshold = self.ctx.threshold,
            "incident raised"
        );
        Ok(TickOutcome::IncidentRaised {
            attempts: token.attempts,
            instance_id: instance,
        })
    }

    // -----------------------------------------------------------------------
    // Adapter calls
    // -----------------------------------------------------------------------

    async fn write_token(&self, keys: &CycleKeys, token: CounterToken) -> Result<()> {
        let value = token.to_string();
        self.ports.counter.put(&keys.counter_key, &value).await?;
        tracing::debug!(counter = %keys.counter_key, token = %value, "counter written");
        Ok(())
    }

    /// Apply `desired`, then read the rule back. A mismatch is only logged.
    async fn set_schedule(&self, rule: &str, desired: ScheduleState) -> Result<()> {
        match desired {
            ScheduleState::Enabled => self.ports.schedule.enable(rule).await?,
            ScheduleState::Disabled => self.ports.schedule.disable(rule).await?,
        }
        match self.ports.schedule.describe(rule).await {
            Ok(observed) if observed == desired => {
                tracing::info!(schedule = rule, state = %observed, "schedule updated");
            }
            Ok(observed) => {
                tracing::warn!(
                    schedule = rule,
                    desired = %desired,
                    observed = %observed,
                    "schedule read-back mismatch"
                );
            }
            Err(e) => {
                tracing::warn!(schedule = rule, error = %e, "schedule read-back failed");
            }
        }
        Ok(())
    }

    async fn tag_instance(&self, instance: Option<&str>, value: &str) -> Result<()> {
        let Some(id) = instance else {
            tracing::warn!(tag = value, "no monitored instance to tag");
            return Ok(());
        };
        self.ports.tagger.tag(id, STATUS_TAG_KEY, value).await?;
        tracing::info!(instance = id, key = STATUS_TAG_KEY, value, "instance tagged");
        Ok(())
    }

    /// Stop an instance the health check had to start. Failures are swallowed.
    async fn restore_stopped(&self, instance_id: &str) {
        match self.ports.instances.stop(instance_id).await {
            Ok(()) => tracing::info!(instance = instance_id, "re-stopped instance after check"),
            Err(e) => tracing::warn!(
                instance = instance_id,
                error = %e,
                "failed to re-stop instance after check"
            ),
        }
    }
}
