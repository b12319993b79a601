use crate::describe;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_eventbridge::error::SdkError;
use aws_sdk_eventbridge::types::RuleState;
use aws_sdk_eventbridge::Client;
use signaler_core::ports::{ScheduleController, ScheduleState};
use signaler_core::{Result, SignalerError};
use std::fmt::Debug;

/// Schedule rule on the default EventBridge bus.
pub struct EventBridgeSchedule {
    client: Client,
}

impl EventBridgeSchedule {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

/// `ResourceNotFoundException` maps to its own variant; the rule is never
/// created here.
fn rule_error<E, R>(rule: &str, err: SdkError<E, R>, not_found: fn(&E) -> bool) -> SignalerError
where
    E: std::error::Error + 'static,
    R: Debug,
{
    if err.as_service_error().is_some_and(not_found) {
        return SignalerError::ScheduleRuleNotFound(rule.to_string());
    }
    SignalerError::ScheduleRuleError {
        rule: rule.to_string(),
        reason: describe(&err),
    }
}

pub(crate) fn schedule_state(state: Option<&RuleState>) -> ScheduleState {
    match state {
        Some(RuleState::Disabled) | None => ScheduleState::Disabled,
        Some(_) => ScheduleState::Enabled,
    }
}

#[async_trait]
impl ScheduleController for EventBridgeSchedule {
    async fn enable(&self, rule: &str) -> Result<()> {
        self.client
            .enable_rule()
            .name(rule)
            .send()
            .await
            .map_err(|e| rule_error(rule, e, |e| e.is_resource_not_found_exception()))?;
        tracing::debug!(schedule = rule, "eventbridge enable_rule");
        Ok(())
    }

    async fn disable(&self, rule: &str) -> Result<()> {
        self.client
            .disable_rule()
            .name(rule)
            .send()
            .await
            .map_err(|e| rule_error(rule, e, |e| e.is_resource_not_found_exception()))?;
        tracing::debug!(schedule = rule, "eventbridge disable_rule");
        Ok(())
    }

    async fn describe(&self, rule: &str) -> Result<ScheduleState> {
        let out = self
            .client
            .describe_rule()
            .name(rule)
            .send()
            .await
            .map_err(|e| rule_error(rule, e, |e| e.is_resource_not_found_exception()))?;
        Ok(schedule_state(out.state()))
    }
}
