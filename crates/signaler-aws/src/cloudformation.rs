use crate::describe;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudformation::error::ProvideErrorMetadata;
use aws_sdk_cloudformation::types::ResourceSignalStatus;
use aws_sdk_cloudformation::Client;
use signaler_core::ports::{ResourceSignal, SignalStatus, StackSignaler, StackStatusReader};
use signaler_core::{Result, SignalerError};

pub struct CloudFormationStack {
    client: Client,
}

impl CloudFormationStack {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn signal_status(status: SignalStatus) -> ResourceSignalStatus {
    match status {
        SignalStatus::Success => ResourceSignalStatus::Success,
        SignalStatus::Failure => ResourceSignalStatus::Failure,
    }
}

/// DescribeStacks reports a missing stack as a `ValidationError`.
fn is_missing_stack(code: Option<&str>, message: Option<&str>) -> bool {
    code == Some("ValidationError") && message.is_some_and(|m| m.contains("does not exist"))
}

#[async_trait]
impl StackSignaler for CloudFormationStack {
    async fn signal(&self, signal: &ResourceSignal) -> Result<()> {
        self.client
            .signal_resource()
            .stack_name(&signal.stack)
            .logical_resource_id(&signal.logical_resource_id)
            .unique_id(&signal.unique_id)
            .status(signal_status(signal.status))
            .send()
            .await
            .map_err(|e| SignalerError::SignalFailed {
                stack: signal.stack.clone(),
                logical_id: signal.logical_resource_id.clone(),
                reason: describe(&e),
            })?;
        tracing::info!(
            stack = %signal.stack,
            logical_id = %signal.logical_resource_id,
            unique_id = %signal.unique_id,
            status = signal.status.as_str(),
            "cloudformation signal_resource"
        );
        Ok(())
    }
}

#[async_trait]
impl StackStatusReader for CloudFormationStack {
    async fn stack_status(&self, stack_name: &str) -> Result<Option<String>> {
        let out = match self.client.describe_stacks().stack_name(stack_name).send().await {
            Ok(out) => out,
            Err(e) if is_missing_stack(e.code(), e.message()) => return Ok(None),
            Err(e) => {
                return Err(SignalerError::StackStatusFailed {
                    stack: stack_name.to_string(),
                    reason: describe(&e),
                })
            }
        };
        let status = out
            .stacks()
            .first()
            .and_then(|s| s.stack_status())
            .map(|s| s.as_str().to_string());
        tracing::debug!(stack = stack_name, status = ?status, "cloudformation describe_stacks");
        Ok(status)
    }
}
