use crate::output::{print_fields, print_json};
use signaler_core::classifier::{classify, Trigger};
use signaler_core::config::{DeploymentContext, StartPolicy};
use std::path::Path;

pub fn run(event: &Path, stack_name: &str, logical_id: &str, json: bool) -> anyhow::Result<()> {
    let payload = super::read_event(event)?;
    // Classification only looks at the stack and logical id.
    let ctx = DeploymentContext {
        stack_name: stack_name.to_string(),
        logical_resource_id: logical_id.to_string(),
        schedule_name: String::new(),
        threshold: 0,
        counter_key: String::new(),
        start: StartPolicy::default(),
    };
    let trigger = classify(&payload, &ctx)?;

    if json {
        return print_json(&trigger);
    }

    let mut fields = vec![("kind", trigger.kind().to_string())];
    match &trigger {
        Trigger::Provisioning(req) => {
            fields.push(("request_type", req.request_type.as_str().to_string()));
            fields.push(("request_id", req.request_id.clone()));
            fields.push(("logical_id", req.logical_resource_id.clone()));
        }
        Trigger::LifecycleBootstrap(m) => {
            fields.push(("event_name", m.event_name.clone().unwrap_or_else(|| "-".into())));
            fields.push(("instance", m.instance_id.clone().unwrap_or_else(|| "-".into())));
        }
        Trigger::ScheduledTick(tick) => {
            let props = &tick.resource_properties;
            fields.push(("stack", props.stack_name.clone().unwrap_or_else(|| "-".into())));
            fields.push(("schedule", props.event.clone().unwrap_or_else(|| "-".into())));
        }
        Trigger::Unrecognized => {}
    }
    print_fields(&fields);
    Ok(())
}
