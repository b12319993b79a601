use crate::config::DeploymentContext;
use crate::error::{Result, SignalerError};
use crate::event::{
    CustomResourceRequest, ManagementEventDetail, ScheduledTick, TICK_REQUEST_ID,
};
use serde::Serialize;
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Trigger (output)
// ---------------------------------------------------------------------------

/// Which of the four request origins a payload represents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    Provisioning(CustomResourceRequest),
    LifecycleBootstrap(LifecycleMatch),
    ScheduledTick(ScheduledTick),
    Unrecognized,
}

impl Trigger {
    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::Provisioning(_) => "provisioning",
            Trigger::LifecycleBootstrap(_) => "lifecycle_bootstrap",
            Trigger::ScheduledTick(_) => "scheduled_tick",
            Trigger::Unrecognized => "unrecognized",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleMatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A fn-pointer rule. `build` returning `Ok(None)` means the payload had the
/// rule's shape but is not addressed to this deployment.
struct Rule {
    id: &'static str,
    applies: fn(&Map<String, Value>) -> bool,
    build: fn(&Value, &DeploymentContext) -> Result<Option<Trigger>>,
}

fn request_id(obj: &Map<String, Value>) -> Option<&str> {
    obj.get("RequestId").and_then(Value::as_str)
}

fn rules() -> [Rule; 3] {
    [
        Rule {
            id: "provisioning",
            applies: |obj| {
                obj.contains_key("RequestType")
                    && obj.contains_key("StackId")
                    && obj.contains_key("RequestId")
                    && request_id(obj) != Some(TICK_REQUEST_ID)
            },
            build: |payload, _| {
                let req: CustomResourceRequest = serde_json::from_value(payload.clone())
                    .map_err(|e| SignalerError::malformed(format!("provisioning request: {e}")))?;
                Ok(Some(Trigger::Provisioning(req)))
            },
        },
        Rule {
            id: "scheduled_tick",
            applies: |obj| request_id(obj) == Some(TICK_REQUEST_ID),
            build: |payload, _| {
                let tick: ScheduledTick = serde_json::from_value(payload.clone())
                    .map_err(|e| SignalerError::malformed(format!("scheduled tick: {e}")))?;
                Ok(Some(Trigger::ScheduledTick(tick)))
            },
        },
        Rule {
            id: "lifecycle_bootstrap",
            applies: |obj| obj.get("detail").is_some_and(Value::is_object),
            build: |payload, ctx| {
                let detail: ManagementEventDetail =
                    serde_json::from_value(payload["detail"].clone()).map_err(|e| {
                        SignalerError::malformed(format!("management event: {e}"))
                    })?;
                if !detail.management_event
                    || !detail.tags_instance(&ctx.stack_name, &ctx.logical_resource_id)
                {
                    return Ok(None);
                }
                Ok(Some(Trigger::LifecycleBootstrap(LifecycleMatch {
                    instance_id: detail.launched_instance_id().map(str::to_string),
                    event_name: detail.event_name,
                })))
            },
        },
    ]
}

// ---------------------------------------------------------------------------
// classify
// ---------------------------------------------------------------------------

/// Classify an inbound payload. Only field access inside a matched shape can
/// fail; anything that matches no shape is [`Trigger::Unrecognized`].
pub fn classify(payload: &Value, ctx: &DeploymentContext) -> Result<Trigger> {
    let Some(obj) = payload.as_object() else {
        return Ok(Trigger::Unrecognized);
    };
    for rule in rules() {
        if (rule.applies)(obj) {
            let trigger = (rule.build)(payload, ctx)?.unwrap_or(Trigger::Unrecognized);
            tracing::debug!(rule = rule.id, kind = trigger.kind(), "classified event");
            return Ok(trigger);
        }
    }
    Ok(Trigger::Unrecognized)
}
