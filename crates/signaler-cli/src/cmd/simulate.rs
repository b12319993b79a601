use crate::output::{print_fields, print_json, print_table};
use chrono::{TimeZone, Utc};
use serde::Serialize;
use serde_json::json;
use signaler_core::config::{DeploymentContext, StartPolicy};
use signaler_core::event::{Invocation, TICK_REQUEST_ID};
use signaler_core::handler::{HandlerResponse, ResponseBody};
use signaler_core::memory::MemoryPorts;
use signaler_core::ports::{Incident, InstanceObservation, InstanceSummary, ResourceSignal};
use signaler_core::Signaler;

const INSTANCE: &str = "i-0simulated000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    /// Running, both status checks ok
    Healthy,
    /// Running, status checks still initializing
    Unhealthy,
    /// Stopped; becomes healthy once started
    Stopped,
    /// Instance not found by the status query
    Missing,
}

impl Health {
    fn readings(self) -> Vec<InstanceObservation> {
        match self {
            Health::Healthy => vec![InstanceObservation::healthy()],
            Health::Unhealthy => vec![InstanceObservation::initializing()],
            Health::Stopped => vec![InstanceObservation::stopped(), InstanceObservation::healthy()],
            Health::Missing => Vec::new(),
        }
    }
}

#[derive(Serialize)]
struct SimTick {
    tick: usize,
    health: Health,
    before: String,
    after: String,
    schedule: String,
    response: HandlerResponse,
}

#[derive(Serialize)]
struct SimReport {
    ticks: Vec<SimTick>,
    signals: Vec<ResourceSignal>,
    incidents: Vec<Incident>,
    tags: Vec<(String, String, String)>,
    started: Vec<String>,
    stopped: Vec<String>,
}

fn context(threshold: u32) -> DeploymentContext {
    DeploymentContext {
        stack_name: "SimStack".into(),
        logical_resource_id: "SimInstance".into(),
        schedule_name: "SimSchedule".into(),
        threshold,
        counter_key: "SimStack/Signaler/Counter".into(),
        // One short poll keeps `stopped` ticks fast.
        start: StartPolicy {
            wait_seconds: 1,
            poll_seconds: 1,
        },
    }
}

fn is_terminal(response: &HandlerResponse) -> bool {
    !response.is_ok()
        || matches!(
            response.body,
            ResponseBody::Succeeded | ResponseBody::IncidentRaised
        )
}

async fn simulate(threshold: u32, health: &[Health]) -> SimReport {
    let ctx = context(threshold);
    let mem = MemoryPorts::seeded(&ctx);
    mem.instances.add_instance(
        &ctx.stack_name,
        InstanceSummary {
            instance_id: INSTANCE.into(),
            launch_time: Utc.timestamp_opt(0, 0).single().unwrap_or_default(),
        },
    );

    let counter_key = ctx.counter_key.clone();
    let schedule_name = ctx.schedule_name.clone();
    let signaler = Signaler::new(ctx, mem.ports());
    let payload = json!({
        "RequestId": TICK_REQUEST_ID,
        "ResourceProperties": {"StackName": "SimStack", "Event": "SimSchedule"}
    });

    let mut ticks = Vec::new();
    for (i, &h) in health.iter().enumerate() {
        mem.instances.script(INSTANCE, h.readings());
        let before = mem.counter.value(&counter_key).unwrap_or_default();
        let invocation = Invocation {
            request_id: format!("sim-{}", i + 1),
            log_stream_name: "simulate".into(),
        };
        let response = signaler.handle(&payload, &invocation).await;
        let done = is_terminal(&response);
        ticks.push(SimTick {
            tick: i + 1,
            health: h,
            before,
            after: mem.counter.value(&counter_key).unwrap_or_default(),
            schedule: mem
                .schedule
                .state(&schedule_name)
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".into()),
            response,
        });
        if done {
            break;
        }
    }

    SimReport {
        ticks,
        signals: mem.stack.signals(),
        incidents: mem.incidents.raised(),
        tags: mem.instances.tags(),
        started: mem.instances.started(),
        stopped: mem.instances.stopped(),
    }
}

pub fn run(threshold: u32, health: &[Health], json: bool) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = rt.block_on(simulate(threshold, health));

    if json {
        return print_json(&report);
    }

    let rows: Vec<Vec<String>> = report
        .ticks
        .iter()
        .map(|t| {
            vec![
                t.tick.to_string(),
                format!("{:?}", t.health).to_lowercase(),
                t.before.clone(),
                t.after.clone(),
                t.schedule.clone(),
                t.response.body.to_string(),
            ]
        })
        .collect();
    print_table(&["TICK", "HEALTH", "BEFORE", "AFTER", "SCHEDULE", "RESULT"], &rows);
    println!();
    print_fields(&[
        ("signals", report.signals.len().to_string()),
        ("incidents", report.incidents.len().to_string()),
        (
            "tags",
            report
                .tags
                .iter()
                .map(|(_, k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", "),
        ),
    ]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unhealthy_run_ends_in_incident() {
        let report = simulate(2, &[Health::Unhealthy; 5]).await;
        let after: Vec<&str> = report.ticks.iter().map(|t| t.after.as_str()).collect();
        assert_eq!(
            after,
            vec!["enabled_increment_1", "enabled_increment_2", "enabled_increment_0"]
        );
        assert_eq!(report.incidents.len(), 1);
        assert_eq!(report.ticks[2].schedule, "DISABLED");
    }

    #[tokio::test]
    async fn healthy_run_converges_on_second_tick() {
        let report = simulate(2, &[Health::Healthy, Health::Healthy]).await;
        assert_eq!(report.ticks[0].after, "enabled_increment_0_success");
        assert_eq!(report.ticks[1].response.body, ResponseBody::Succeeded);
        assert_eq!(report.signals.len(), 1);
    }
}
