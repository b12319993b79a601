//! AWS SDK implementations of the `signaler-core` ports.

pub mod cloudformation;
pub mod ec2;
pub mod events;
pub mod incident;
pub mod ssm;

use aws_config::SdkConfig;
use signaler_core::ports::Ports;
use signaler_core::response::HttpAckSender;
use signaler_core::Result;
use std::sync::Arc;

pub use cloudformation::CloudFormationStack;
pub use ec2::Ec2Instances;
pub use events::EventBridgeSchedule;
pub use incident::LogIncidentSink;
pub use ssm::SsmCounterStore;

/// Build every adapter from the ambient AWS configuration. Called once per
/// cold start.
pub async fn ports_from_env() -> Result<Ports> {
    let config = aws_config::load_from_env().await;
    ports_from_config(&config)
}

pub fn ports_from_config(config: &SdkConfig) -> Result<Ports> {
    let ec2 = Arc::new(Ec2Instances::new(config));
    let stack = Arc::new(CloudFormationStack::new(config));
    Ok(Ports {
        counter: Arc::new(SsmCounterStore::new(config)),
        schedule: Arc::new(EventBridgeSchedule::new(config)),
        instances: ec2.clone(),
        directory: ec2.clone(),
        tagger: ec2,
        signaler: stack.clone(),
        stack_status: stack,
        incidents: Arc::new(LogIncidentSink),
        ack: Arc::new(HttpAckSender::new()?),
    })
}

/// Flatten an SDK error and its sources into one line.
pub(crate) fn describe<E: std::error::Error>(err: &E) -> String {
    aws_sdk_ssm::error::DisplayErrorContext(err).to_string()
}
