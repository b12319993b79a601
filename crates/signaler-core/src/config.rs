use crate::error::{Result, SignalerError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_LOGICAL_RESOURCE_ID: &str = "LogicalResourceId";
pub const ENV_SCHEDULER_NAME: &str = "SchedulerName";
pub const ENV_THRESHOLD: &str = "Threshold";
pub const ENV_COUNTER_PARAMETER: &str = "SchedulerSSMParameter";
pub const ENV_STACK_NAME: &str = "StackName";
pub const ENV_START_WAIT_SECONDS: &str = "StartWaitSeconds";
pub const ENV_START_POLL_SECONDS: &str = "StartPollSeconds";

// ---------------------------------------------------------------------------
// StartPolicy
// ---------------------------------------------------------------------------

/// Bounds for waiting on an instance that had to be started from `stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartPolicy {
    #[serde(default = "default_wait_seconds")]
    pub wait_seconds: u64,
    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,
}

fn default_wait_seconds() -> u64 {
    300
}

fn default_poll_seconds() -> u64 {
    10
}

impl Default for StartPolicy {
    fn default() -> Self {
        Self {
            wait_seconds: default_wait_seconds(),
            poll_seconds: default_poll_seconds(),
        }
    }
}

impl StartPolicy {
    pub fn wait_budget(&self) -> Duration {
        Duration::from_secs(self.wait_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_seconds)
    }
}

// ---------------------------------------------------------------------------
// DeploymentContext
// ---------------------------------------------------------------------------

/// Per-deployment settings, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentContext {
    pub stack_name: String,
    pub logical_resource_id: String,
    pub schedule_name: String,
    /// Attempts already made at which the cycle gives up.
    pub threshold: u32,
    pub counter_key: String,
    #[serde(default)]
    pub start: StartPolicy,
}

impl DeploymentContext {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup. `from_env` delegates here.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| SignalerError::InvalidConfig(format!("{key} is not set")))
        };
        let seconds = |key: &str, default: u64| -> Result<u64> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => raw.trim().parse().map_err(|_| {
                    SignalerError::InvalidConfig(format!(
                        "{key} must be a whole number of seconds, got '{raw}'"
                    ))
                }),
            }
        };

        let raw_threshold = required(ENV_THRESHOLD)?;
        let threshold = raw_threshold.parse::<u32>().map_err(|_| {
            SignalerError::InvalidConfig(format!(
                "{ENV_THRESHOLD} must be a non-negative integer, got '{raw_threshold}'"
            ))
        })?;

        let ctx = Self {
            stack_name: required(ENV_STACK_NAME)?,
            logical_resource_id: required(ENV_LOGICAL_RESOURCE_ID)?,
            schedule_name: required(ENV_SCHEDULER_NAME)?,
            threshold,
            counter_key: required(ENV_COUNTER_PARAMETER)?,
            start: StartPolicy {
                wait_seconds: seconds(ENV_START_WAIT_SECONDS, default_wait_seconds())?,
                poll_seconds: seconds(ENV_START_POLL_SECONDS, default_poll_seconds())?,
            },
        };
        ctx.validate()?;
        Ok(ctx)
    }

    /// Load from a YAML file with snake_case field names.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let ctx: DeploymentContext = serde_yaml::from_str(&data)?;
        ctx.validate()?;
        Ok(ctx)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("stack_name", &self.stack_name),
            ("logical_resource_id", &self.logical_resource_id),
            ("schedule_name", &self.schedule_name),
            ("counter_key", &self.counter_key),
        ] {
            if value.trim().is_empty() {
                return Err(SignalerError::InvalidConfig(format!("{name} must not be empty")));
            }
        }
        if self.start.poll_seconds == 0 {
            return Err(SignalerError::InvalidConfig(
                "start poll interval must be greater than zero".into(),
            ));
        }
        if self.start.poll_seconds > self.start.wait_seconds {
            return Err(SignalerError::InvalidConfig(format!(
                "start poll interval ({}s) exceeds wait budget ({}s)",
                self.start.poll_seconds, self.start.wait_seconds
            )));
        }
        Ok(())
    }
}
