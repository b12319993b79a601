use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalerError {
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("no counter parameter configured")]
    NoCounterConfigured,

    #[error("invalid counter token '{0}': expected (enabled|disabled)_increment_<n>[_success]")]
    InvalidToken(String),

    #[error("failed to read counter '{key}': {reason}")]
    CounterReadFailed { key: String, reason: String },

    #[error("failed to write counter '{key}': {reason}")]
    CounterWriteFailed { key: String, reason: String },

    #[error("status check failed for {instance}: {reason}")]
    StatusCheckFailed { instance: String, reason: String },

    #[error("tick arrived while counter is disabled: {0}")]
    RuleDisabled(String),

    #[error("schedule rule not found: {0}")]
    ScheduleRuleNotFound(String),

    #[error("schedule rule '{rule}' error: {reason}")]
    ScheduleRuleError { rule: String, reason: String },

    #[error("failed to query stack status for {stack}: {reason}")]
    StackStatusFailed { stack: String, reason: String },

    #[error("failed to signal {logical_id} in {stack}: {reason}")]
    SignalFailed {
        stack: String,
        logical_id: String,
        reason: String,
    },

    #[error("failed to tag {instance}: {reason}")]
    TagFailed { instance: String, reason: String },

    #[error("failed to deliver provisioning acknowledgement: {0}")]
    AckFailed(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    GenericFailure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SignalerError {
    /// Stable identifier used in acknowledgement reasons and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            SignalerError::MalformedEvent(_) => "MalformedEvent",
            SignalerError::NoCounterConfigured => "NoCounterConfigured",
            SignalerError::InvalidToken(_) => "InvalidToken",
            SignalerError::CounterReadFailed { .. } => "CounterReadFailed",
            SignalerError::CounterWriteFailed { .. } => "CounterWriteFailed",
            SignalerError::StatusCheckFailed { .. } => "StatusCheckFailed",
            SignalerError::RuleDisabled(_) => "RuleDisabled",
            SignalerError::ScheduleRuleNotFound(_) => "ScheduleRuleNotFound",
            SignalerError::ScheduleRuleError { .. } => "ScheduleRuleError",
            SignalerError::StackStatusFailed { .. } => "StackStatusFailed",
            SignalerError::SignalFailed { .. } => "SignalFailed",
            SignalerError::TagFailed { .. } => "TagFailed",
            SignalerError::AckFailed(_) => "AckFailed",
            SignalerError::InvalidConfig(_) => "InvalidConfig",
            SignalerError::GenericFailure(_)
            | SignalerError::Io(_)
            | SignalerError::Yaml(_)
            | SignalerError::Json(_) => "GenericFailure",
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        SignalerError::MalformedEvent(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SignalerError>;
