//! Top-level dispatch: classify a payload, run the matching branch, and turn
//! every outcome into the process return value.
//!
//! This is the only place errors stop propagating. Provisioning requests are
//! always acknowledged; tick and lifecycle failures are logged and reported
//! as a 400 without compensating action.

use crate::classifier::{classify, LifecycleMatch, Trigger};
use crate::config::DeploymentContext;
use crate::error::{Result, SignalerError};
use crate::event::{
    CustomResourceRequest, Invocation, RequestType, ResourceProperties, ScheduledTick,
};
use crate::machine::{ConvergenceMachine, CycleKeys, TickOutcome};
use crate::ports::{Ports, UPDATE_IN_PROGRESS};
use crate::response::{Ack, AckStatus};
use crate::token::CounterToken;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;

// ---------------------------------------------------------------------------
// Return value
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Succeeded,
    Failed,
    Passed,
    IncidentRaised,
    CounterIncremented(CounterToken),
    SuccessAppended(CounterToken),
}

impl fmt::Display for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Succeeded => f.write_str("SUCCEEDED"),
            ResponseBody::Failed => f.write_str("FAILED"),
            ResponseBody::Passed => f.write_str("PASSED"),
            ResponseBody::IncidentRaised => f.write_str("INCIDENT_RAISED"),
            ResponseBody::CounterIncremented(t) => write!(f, "Counter_incrementer:{t}"),
            ResponseBody::SuccessAppended(t) => write!(f, "Success_suffix_appended_{t}"),
        }
    }
}

impl Serialize for ResponseBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<TickOutcome> for ResponseBody {
    fn from(outcome: TickOutcome) -> Self {
        match outcome {
            TickOutcome::Converged { .. } => ResponseBody::Succeeded,
            TickOutcome::IncidentRaised { .. } => ResponseBody::IncidentRaised,
            TickOutcome::Incremented { token, .. } => ResponseBody::CounterIncremented(token),
            TickOutcome::SuccessRecorded { token, .. } => ResponseBody::SuccessAppended(token),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusCode {
    #[serde(rename = "200")]
    Ok,
    #[serde(rename = "400")]
    BadRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: StatusCode,
    pub body: ResponseBody,
}

impl HandlerResponse {
    pub fn ok(body: ResponseBody) -> Self {
        Self {
            status_code: StatusCode::Ok,
            body,
        }
    }

    pub fn failed() -> Self {
        Self {
            status_code: StatusCode::BadRequest,
            body: ResponseBody::Failed,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == StatusCode::Ok
    }
}

fn failure_reason(err: &SignalerError) -> String {
    format!("{}: {err}", err.code())
}

// ---------------------------------------------------------------------------
// Signaler
// ---------------------------------------------------------------------------

/// Context plus adapters, built once per process.
#[derive(Clone)]
pub struct Signaler {
    ctx: DeploymentContext,
    ports: Ports,
}

impl Signaler {
    pub fn new(ctx: DeploymentContext, ports: Ports) -> Self {
        Self { ctx, ports }
    }

    pub fn context(&self) -> &DeploymentContext {
        &self.ctx
    }

    fn machine(&self) -> ConvergenceMachine<'_> {
        ConvergenceMachine::new(&self.ctx, &self.ports)
    }

    /// Handle one inbound payload. Never fails; errors become a 400 response.
    pub async fn handle(&self, payload: &Value, invocation: &Invocation) -> HandlerResponse {
        tracing::debug!(
            request_id = %invocation.request_id,
            payload = %payload,
            "received event"
        );

        let trigger = match classify(payload, &self.ctx) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(code = e.code(), error = %e, "event rejected");
                if let Some(ack) = Ack::salvage(payload, invocation, failure_reason(&e)) {
                    if let Err(ack_err) = self.ports.ack.send(&ack).await {
                        tracing::error!(error = %ack_err, "failed to acknowledge rejected request");
                    }
                }
                return HandlerResponse::failed();
            }
        };

        let result = match &trigger {
            Trigger::Provisioning(req) => return self.provision(req, invocation).await,
            Trigger::LifecycleBootstrap(m) => self.lifecycle(m).await,
            Trigger::ScheduledTick(tick) => self.tick(tick).await,
            Trigger::Unrecognized => {
                tracing::info!("unrecognized event, passing through");
                Ok(ResponseBody::Passed)
            }
        };

        match result {
            Ok(body) => {
                tracing::info!(kind = trigger.kind(), body = %body, "event handled");
                HandlerResponse::ok(body)
            }
            Err(e) => {
                tracing::error!(kind = trigger.kind(), code = e.code(), error = %e, "event failed");
                HandlerResponse::failed()
            }
        }
    }

    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    async fn provision(
        &self,
        req: &CustomResourceRequest,
        invocation: &Invocation,
    ) -> HandlerResponse {
        let (status, reason, response) = match self.apply_provisioning(req).await {
            Ok(()) => (
                AckStatus::Success,
                None,
                HandlerResponse::ok(ResponseBody::Succeeded),
            ),
            Err(e) => {
                tracing::error!(
                    request_type = req.request_type.as_str(),
                    code = e.code(),
                    error = %e,
                    "provisioning request failed"
                );
                (AckStatus::Failed, Some(failure_reason(&e)), HandlerResponse::failed())
            }
        };

        let ack = Ack::for_request(req, invocation, status, reason, json!({}));
        match self.ports.ack.send(&ack).await {
            Ok(()) => response,
            Err(e) => {
                tracing::error!(request_id = %req.request_id, error = %e, "acknowledgement failed");
                HandlerResponse::failed()
            }
        }
    }

    async fn apply_provisioning(&self, req: &CustomResourceRequest) -> Result<()> {
        match &req.request_type {
            RequestType::Create | RequestType::Delete => {
                tracing::info!(
                    request_type = req.request_type.as_str(),
                    "nothing to provision"
                );
                Ok(())
            }
            RequestType::Update | RequestType::Other(_) => {
                let keys = CycleKeys::resolve(&self.ctx, &req.resource_properties)?;
                self.machine().bootstrap(&keys).await
            }
        }
    }

    async fn lifecycle(&self, matched: &LifecycleMatch) -> Result<ResponseBody> {
        let keys = CycleKeys::resolve(&self.ctx, &ResourceProperties::default())?;
        let status = self.ports.stack_status.stack_status(&keys.stack_name).await?;
        if status.as_deref() != Some(UPDATE_IN_PROGRESS) {
            tracing::info!(
                stack = %keys.stack_name,
                status = status.as_deref().unwrap_or("-"),
                "stack not updating, ignoring lifecycle event"
            );
            return Ok(ResponseBody::Passed);
        }
        tracing::info!(
            stack = %keys.stack_name,
            instance = matched.instance_id.as_deref().unwrap_or("-"),
            "replacement instance launched during update"
        );
        self.machine().bootstrap(&keys).await?;
        Ok(ResponseBody::Succeeded)
    }

    async fn tick(&self, tick: &ScheduledTick) -> Result<ResponseBody> {
        let keys = CycleKeys::resolve(&self.ctx, &tick.resource_properties)?;
        let outcome = self.machine().tick(&keys).await?;
        Ok(outcome.into())
    }
}
