//! EC2 status checks, start/stop, stack-tag lookup and tagging.

use crate::describe;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ec2::error::ProvideErrorMetadata;
use aws_sdk_ec2::types::{Filter, Instance, InstanceStateName, InstanceStatus, SummaryStatus, Tag};
use aws_sdk_ec2::Client;
use chrono::{DateTime, Utc};
use signaler_core::event::STACK_NAME_TAG;
use signaler_core::ports::{
    InstanceApi, InstanceDirectory, InstanceObservation, InstanceSummary, ResourceTagger, RunState,
};
use signaler_core::{Result, SignalerError};

const INSTANCE_NOT_FOUND: &str = "InvalidInstanceID.NotFound";

pub struct Ec2Instances {
    client: Client,
}

impl Ec2Instances {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn status_failed(instance_id: &str, reason: String) -> SignalerError {
    SignalerError::StatusCheckFailed {
        instance: instance_id.to_string(),
        reason,
    }
}

pub(crate) fn to_observation(status: &InstanceStatus) -> InstanceObservation {
    let is_ok = |s: Option<&SummaryStatus>| s == Some(&SummaryStatus::Ok);
    InstanceObservation {
        run_state: status
            .instance_state()
            .and_then(|s| s.name())
            .map(|n| RunState::from_api(n.as_str()))
            .unwrap_or_else(|| RunState::Other("unknown".into())),
        system_ok: is_ok(status.system_status().and_then(|s| s.status())),
        instance_ok: is_ok(status.instance_status().and_then(|s| s.status())),
    }
}

/// Non-terminated instances with an id and a launch time.
pub(crate) fn to_summary(instance: &Instance) -> Option<InstanceSummary> {
    let state = instance.state().and_then(|s| s.name());
    if state == Some(&InstanceStateName::Terminated) {
        return None;
    }
    let launched = instance.launch_time()?;
    Some(InstanceSummary {
        instance_id: instance.instance_id()?.to_string(),
        launch_time: DateTime::<Utc>::from_timestamp(launched.secs(), launched.subsec_nanos())?,
    })
}

#[async_trait]
impl InstanceApi for Ec2Instances {
    async fn observe(&self, instance_id: &str) -> Result<Option<InstanceObservation>> {
        let out = match self
            .client
            .describe_instance_status()
            .instance_ids(instance_id)
            .include_all_instances(true)
            .send()
            .await
        {
            Ok(out) => out,
            Err(e) if e.code() == Some(INSTANCE_NOT_FOUND) => return Ok(None),
            Err(e) => return Err(status_failed(instance_id, describe(&e))),
        };

        let observation = out.instance_statuses().first().map(to_observation);
        if let Some(obs) = &observation {
            tracing::debug!(
                instance = instance_id,
                state = %obs.run_state,
                system_ok = obs.system_ok,
                instance_ok = obs.instance_ok,
                "ec2 describe_instance_status"
            );
        }
        Ok(observation)
    }

    async fn start(&self, instance_id: &str) -> Result<()> {
        self.client
            .start_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| status_failed(instance_id, describe(&e)))?;
        tracing::info!(instance = instance_id, "ec2 start_instances");
        Ok(())
    }

    async fn stop(&self, instance_id: &str) -> Result<()> {
        self.client
            .stop_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| status_failed(instance_id, describe(&e)))?;
        tracing::info!(instance = instance_id, "ec2 stop_instances");
        Ok(())
    }
}

#[async_trait]
impl InstanceDirectory for Ec2Instances {
    async fn find_by_stack(&self, stack_name: &str) -> Result<Vec<InstanceSummary>> {
        let filter = Filter::builder()
            .name(format!("tag:{STACK_NAME_TAG}"))
            .values(stack_name)
            .build();
        let mut pages = self
            .client
            .describe_instances()
            .filters(filter)
            .into_paginator()
            .send();

        let mut found = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                SignalerError::GenericFailure(format!(
                    "describe_instances for stack {stack_name}: {}",
                    describe(&e)
                ))
            })?;
            found.extend(
                page.reservations()
                    .iter()
                    .flat_map(|r| r.instances())
                    .filter_map(to_summary),
            );
        }
        tracing::debug!(stack = stack_name, count = found.len(), "ec2 describe_instances");
        Ok(found)
    }
}

#[async_trait]
impl ResourceTagger for Ec2Instances {
    async fn tag(&self, instance_id: &str, key: &str, value: &str) -> Result<()> {
        self.client
            .create_tags()
            .resources(instance_id)
            .tags(Tag::builder().key(key).value(value).build())
            .send()
            .await
            .map_err(|e| SignalerError::TagFailed {
                instance: instance_id.to_string(),
                reason: describe(&e),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::primitives::DateTime as SmithyDateTime;
    use aws_sdk_ec2::types::{InstanceState, InstanceStatusSummary};

    fn status(
        name: InstanceStateName,
        system: SummaryStatus,
        instance: SummaryStatus,
    ) -> InstanceStatus {
        InstanceStatus::builder()
            .instance_id("i-1")
            .instance_state(InstanceState::builder().name(name).build())
            .system_status(InstanceStatusSummary::builder().status(system).build())
            .instance_status(InstanceStatusSummary::builder().status(instance).build())
            .build()
    }

    #[test]
    fn running_with_both_checks_ok_is_initialized() {
        let obs = to_observation(&status(
            InstanceStateName::Running,
            SummaryStatus::Ok,
            SummaryStatus::Ok,
        ));
        assert!(obs.is_initialized());
    }

    #[test]
    fn initializing_checks_are_not_ok() {
        let obs = to_observation(&status(
            InstanceStateName::Running,
            SummaryStatus::Ok,
            SummaryStatus::Initializing,
        ));
        assert_eq!(obs.run_state, RunState::Running);
        assert!(obs.system_ok);
        assert!(!obs.instance_ok);
        assert!(!obs.is_initialized());
    }

    #[test]
    fn stopped_instance_maps_run_state() {
        let obs = to_observation(&status(
            InstanceStateName::Stopped,
            SummaryStatus::NotApplicable,
            SummaryStatus::NotApplicable,
        ));
        assert_eq!(obs.run_state, RunState::Stopped);
    }

    fn instance(id: &str, name: InstanceStateName, secs: i64) -> Instance {
        Instance::builder()
            .instance_id(id)
            .state(InstanceState::builder().name(name).build())
            .launch_time(SmithyDateTime::from_secs(secs))
            .build()
    }

    #[test]
    fn summaries_skip_terminated_instances() {
        let stopped = instance("i-live", InstanceStateName::Stopped, 1_716_984_000);
        let live = to_summary(&stopped).unwrap();
        assert_eq!(live.instance_id, "i-live");
        assert_eq!(live.launch_time.timestamp(), 1_716_984_000);
        assert!(to_summary(&instance("i-dead", InstanceStateName::Terminated, 1)).is_none());
    }

    #[test]
    fn summaries_need_a_launch_time() {
        let bare = Instance::builder().instance_id("i-1").build();
        assert!(to_summary(&bare).is_none());
    }
}
