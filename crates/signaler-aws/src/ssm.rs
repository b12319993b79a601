use crate::describe;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ssm::types::ParameterType;
use aws_sdk_ssm::Client;
use signaler_core::ports::CounterStore;
use signaler_core::{Result, SignalerError};

/// Counter token kept in an SSM String parameter.
pub struct SsmCounterStore {
    client: Client,
}

impl SsmCounterStore {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl CounterStore for SsmCounterStore {
    async fn get(&self, key: &str) -> Result<String> {
        let out = self
            .client
            .get_parameter()
            .name(key)
            .send()
            .await
            .map_err(|e| SignalerError::CounterReadFailed {
                key: key.to_string(),
                reason: describe(&e),
            })?;

        let value = out
            .parameter()
            .and_then(|p| p.value())
            .ok_or_else(|| SignalerError::CounterReadFailed {
                key: key.to_string(),
                reason: "parameter has no value".into(),
            })?;
        tracing::debug!(counter = key, value, "ssm get_parameter");
        Ok(value.to_string())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.client
            .put_parameter()
            .name(key)
            .value(value)
            .r#type(ParameterType::String)
            .overwrite(true)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(counter = key, error = %describe(&e), "ssm put_parameter failed");
                SignalerError::CounterWriteFailed {
                    key: key.to_string(),
                    reason: describe(&e),
                }
            })?;
        tracing::debug!(counter = key, value, "ssm put_parameter");
        Ok(())
    }
}
