//! Adapter seams between the convergence core and the outside world.
//!
//! Every external system the core touches sits behind one of these traits.
//! Production implementations live in `signaler-aws`; [`crate::memory`] holds
//! in-process doubles. A [`Ports`] bundle is built once per process and passed
//! by reference into the state machine and dispatcher.

use crate::error::Result;
use crate::response::AckSender;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Counter store
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<String>;
    async fn put(&self, key: &str, value: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Schedule controller
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleState {
    Enabled,
    Disabled,
}

impl ScheduleState {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleState::Enabled => "ENABLED",
            ScheduleState::Disabled => "DISABLED",
        }
    }
}

impl fmt::Display for ScheduleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait ScheduleController: Send + Sync {
    async fn enable(&self, rule: &str) -> Result<()>;
    async fn disable(&self, rule: &str) -> Result<()>;
    async fn describe(&self, rule: &str) -> Result<ScheduleState>;
}

// ---------------------------------------------------------------------------
// Instance status / lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
    Other(String),
}

impl RunState {
    /// Map an EC2 instance-state name.
    pub fn from_api(name: &str) -> Self {
        match name {
            "pending" => RunState::Pending,
            "running" => RunState::Running,
            "shutting-down" => RunState::ShuttingDown,
            "terminated" => RunState::Terminated,
            "stopping" => RunState::Stopping,
            "stopped" => RunState::Stopped,
            other => RunState::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RunState::Pending => "pending",
            RunState::Running => "running",
            RunState::ShuttingDown => "shutting-down",
            RunState::Terminated => "terminated",
            RunState::Stopping => "stopping",
            RunState::Stopped => "stopped",
            RunState::Other(s) => s,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reading of an instance's run state and both status checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceObservation {
    pub run_state: RunState,
    pub system_ok: bool,
    pub instance_ok: bool,
}

impl InstanceObservation {
    pub fn healthy() -> Self {
        Self {
            run_state: RunState::Running,
            system_ok: true,
            instance_ok: true,
        }
    }

    pub fn initializing() -> Self {
        Self {
            run_state: RunState::Running,
            system_ok: false,
            instance_ok: false,
        }
    }

    pub fn stopped() -> Self {
        Self {
            run_state: RunState::Stopped,
            system_ok: false,
            instance_ok: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.run_state == RunState::Running && self.system_ok && self.instance_ok
    }
}

#[async_trait]
pub trait InstanceApi: Send + Sync {
    /// `None` when the instance does not exist.
    async fn observe(&self, instance_id: &str) -> Result<Option<InstanceObservation>>;
    async fn start(&self, instance_id: &str) -> Result<()>;
    async fn stop(&self, instance_id: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub instance_id: String,
    pub launch_time: DateTime<Utc>,
}

#[async_trait]
pub trait InstanceDirectory: Send + Sync {
    /// Instances carrying the CloudFormation stack-name tag for `stack_name`.
    async fn find_by_stack(&self, stack_name: &str) -> Result<Vec<InstanceSummary>>;
}

#[async_trait]
pub trait ResourceTagger: Send + Sync {
    async fn tag(&self, instance_id: &str, key: &str, value: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    Success,
    /// Never sent by the convergence machine, which lets an exhausted cycle
    /// time out on the stack side. Kept so adapters map the full wire enum.
    Failure,
}

impl SignalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalStatus::Success => "SUCCESS",
            SignalStatus::Failure => "FAILURE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSignal {
    pub stack: String,
    pub logical_resource_id: String,
    pub unique_id: String,
    pub status: SignalStatus,
}

#[async_trait]
pub trait StackSignaler: Send + Sync {
    async fn signal(&self, signal: &ResourceSignal) -> Result<()>;
}

/// Stack status value that marks an update-triggered replacement.
pub const UPDATE_IN_PROGRESS: &str = "UPDATE_IN_PROGRESS";

#[async_trait]
pub trait StackStatusReader: Send + Sync {
    /// `None` when the stack does not exist.
    async fn stack_status(&self, stack_name: &str) -> Result<Option<String>>;
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub title: String,
    pub message: String,
    pub stack_name: String,
    pub logical_resource_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub attempts: u32,
    pub threshold: u32,
}

#[async_trait]
pub trait IncidentSink: Send + Sync {
    async fn raise(&self, incident: &Incident) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Ports bundle
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Ports {
    pub counter: Arc<dyn CounterStore>,
    pub schedule: Arc<dyn ScheduleController>,
    pub instances: Arc<dyn InstanceApi>,
    pub directory: Arc<dyn InstanceDirectory>,
    pub tagger: Arc<dyn ResourceTagger>,
    pub signaler: Arc<dyn StackSignaler>,
    pub stack_status: Arc<dyn StackStatusReader>,
    pub incidents: Arc<dyn IncidentSink>,
    pub ack: Arc<dyn AckSender>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_state_maps_api_names() {
        for name in ["pending", "running", "shutting-down", "terminated", "stopping", "stopped"] {
            assert_eq!(RunState::from_api(name).as_str(), name);
        }
        assert_eq!(
            RunState::from_api("rebooting"),
            RunState::Other("rebooting".into())
        );
    }

    #[test]
    fn initialized_requires_running_and_both_checks() {
        assert!(InstanceObservation::healthy().is_initialized());
        assert!(!InstanceObservation::initializing().is_initialized());
        let half = InstanceObservation {
            run_state: RunState::Running,
            system_ok: true,
            instance_ok: false,
        };
        assert!(!half.is_initialized());
        let stopped_but_ok = InstanceObservation {
            run_state: RunState::Stopped,
            system_ok: true,
            instance_ok: true,
        };
        assert!(!stopped_but_ok.is_initialized());
    }

    #[test]
    fn schedule_state_wire_names() {
        assert_eq!(
            serde_json::to_string(&ScheduleState::Enabled).unwrap(),
            "\"ENABLED\""
        );
        assert_eq!(ScheduleState::Disabled.to_string(), "DISABLED");
        assert_eq!(SignalStatus::Failure.as_str(), "FAILURE");
    }
}
