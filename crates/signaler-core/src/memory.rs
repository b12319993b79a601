//! In-process implementations of every port.
//!
//! Used by the test suite and by the CLI `simulate` command. State lives
//! behind `std::sync::Mutex`; each adapter records the calls it receives so
//! callers can inspect side effects afterwards.
//!
//! Not suitable for production: nothing is shared across processes and all
//! state is lost on exit.

use crate::config::DeploymentContext;
use crate::error::{Result, SignalerError};
use crate::ports::{
    CounterStore, Incident, IncidentSink, InstanceApi, InstanceDirectory, InstanceObservation,
    InstanceSummary, Ports, ResourceSignal, ResourceTagger, ScheduleController, ScheduleState,
    StackSignaler, StackStatusReader,
};
use crate::response::{Ack, AckSender};
use crate::token::CounterToken;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryCounterStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    values: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<String>>,
    write_error: Mutex<Option<String>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: &str) {
        lock(&self.values).insert(key.to_string(), value.to_string());
    }

    pub fn value(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    /// Every value written through the port, in order.
    pub fn writes(&self) -> Vec<String> {
        lock(&self.writes).clone()
    }

    pub fn fail_writes(&self, reason: &str) {
        *lock(&self.write_error) = Some(reason.to_string());
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> Result<String> {
        self.value(key).ok_or_else(|| SignalerError::CounterReadFailed {
            key: key.to_string(),
            reason: "parameter not found".into(),
        })
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        if let Some(reason) = lock(&self.write_error).clone() {
            return Err(SignalerError::CounterWriteFailed {
                key: key.to_string(),
                reason,
            });
        }
        self.set(key, value);
        lock(&self.writes).push(value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemorySchedule
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemorySchedule {
    rules: Mutex<HashMap<String, ScheduleState>>,
    calls: Mutex<Vec<(String, ScheduleState)>>,
}

impl MemorySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&self, name: &str, state: ScheduleState) {
        lock(&self.rules).insert(name.to_string(), state);
    }

    pub fn state(&self, name: &str) -> Option<ScheduleState> {
        lock(&self.rules).get(name).copied()
    }

    /// Enable/disable calls received, in order.
    pub fn calls(&self) -> Vec<(String, ScheduleState)> {
        lock(&self.calls).clone()
    }

    fn apply(&self, rule: &str, state: ScheduleState) -> Result<()> {
        let mut rules = lock(&self.rules);
        let current = rules
            .get_mut(rule)
            .ok_or_else(|| SignalerError::ScheduleRuleNotFound(rule.to_string()))?;
        *current = state;
        lock(&self.calls).push((rule.to_string(), state));
        Ok(())
    }
}

#[async_trait]
impl ScheduleController for MemorySchedule {
    async fn enable(&self, rule: &str) -> Result<()> {
        self.apply(rule, ScheduleState::Enabled)
    }

    async fn disable(&self, rule: &str) -> Result<()> {
        self.apply(rule, ScheduleState::Disabled)
    }

    async fn describe(&self, rule: &str) -> Result<ScheduleState> {
        self.state(rule)
            .ok_or_else(|| SignalerError::ScheduleRuleNotFound(rule.to_string()))
    }
}

// ---------------------------------------------------------------------------
// MemoryInstances
// ---------------------------------------------------------------------------

/// Scripted EC2 double. Each `observe` consumes the next scripted reading;
/// the last reading repeats forever.
#[derive(Debug, Default)]
pub struct MemoryInstances {
    scripts: Mutex<HashMap<String, VecDeque<InstanceObservation>>>,
    by_stack: Mutex<HashMap<String, Vec<InstanceSummary>>>,
    observe_error: Mutex<Option<String>>,
    stop_error: Mutex<Option<String>>,
    started: Mutex<Vec<String>>,
    stopped: Mutex<Vec<String>>,
    tags: Mutex<Vec<(String, String, String)>>,
}

impl MemoryInstances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, instance_id: &str, readings: Vec<InstanceObservation>) {
        lock(&self.scripts).insert(instance_id.to_string(), readings.into());
    }

    pub fn add_instance(&self, stack_name: &str, summary: InstanceSummary) {
        lock(&self.by_stack)
            .entry(stack_name.to_string())
            .or_default()
            .push(summary);
    }

    pub fn fail_observe(&self, reason: &str) {
        *lock(&self.observe_error) = Some(reason.to_string());
    }

    pub fn fail_stop(&self, reason: &str) {
        *lock(&self.stop_error) = Some(reason.to_string());
    }

    pub fn started(&self) -> Vec<String> {
        lock(&self.started).clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        lock(&self.stopped).clone()
    }

    /// `(instance, key, value)` for every tag written.
    pub fn tags(&self) -> Vec<(String, String, String)> {
        lock(&self.tags).clone()
    }
}

#[async_trait]
impl InstanceApi for MemoryInstances {
    async fn observe(&self, instance_id: &str) -> Result<Option<InstanceObservation>> {
        if let Some(reason) = lock(&self.observe_error).clone() {
            return Err(SignalerError::StatusCheckFailed {
                instance: instance_id.to_string(),
                reason,
            });
        }
        let mut scripts = lock(&self.scripts);
        let Some(queue) = scripts.get_mut(instance_id) else {
            return Ok(None);
        };
        if queue.len() > 1 {
            Ok(queue.pop_front())
        } else {
            Ok(queue.front().cloned())
        }
    }

    async fn start(&self, instance_id: &str) -> Result<()> {
        lock(&self.started).push(instance_id.to_string());
        Ok(())
    }

    async fn stop(&self, instance_id: &str) -> Result<()> {
        if let Some(reason) = lock(&self.stop_error).clone() {
            return Err(SignalerError::StatusCheckFailed {
                instance: instance_id.to_string(),
                reason,
            });
        }
        lock(&self.stopped).push(instance_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl InstanceDirectory for MemoryInstances {
    async fn find_by_stack(&self, stack_name: &str) -> Result<Vec<InstanceSummary>> {
        Ok(lock(&self.by_stack)
            .get(stack_name)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ResourceTagger for MemoryInstances {
    async fn tag(&self, instance_id: &str, key: &str, value: &str) -> Result<()> {
        lock(&self.tags).push((instance_id.to_string(), key.to_string(), value.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStack
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStack {
    signals: Mutex<Vec<ResourceSignal>>,
    statuses: Mutex<HashMap<String, String>>,
}

impl MemoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, stack_name: &str, status: &str) {
        lock(&self.statuses).insert(stack_name.to_string(), status.to_string());
    }

    pub fn signals(&self) -> Vec<ResourceSignal> {
        lock(&self.signals).clone()
    }
}

#[async_trait]
impl StackSignaler for MemoryStack {
    async fn signal(&self, signal: &ResourceSignal) -> Result<()> {
        lock(&self.signals).push(signal.clone());
        Ok(())
    }
}

#[async_trait]
impl StackStatusReader for MemoryStack {
    async fn stack_status(&self, stack_name: &str) -> Result<Option<String>> {
        Ok(lock(&self.statuses).get(stack_name).cloned())
    }
}

// ---------------------------------------------------------------------------
// MemoryIncidents / MemoryAcks
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryIncidents {
    raised: Mutex<Vec<Incident>>,
}

impl MemoryIncidents {
    pub fn raised(&self) -> Vec<Incident> {
        lock(&self.raised).clone()
    }
}

#[async_trait]
impl IncidentSink for MemoryIncidents {
    async fn raise(&self, incident: &Incident) -> Result<()> {
        lock(&self.raised).push(incident.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAcks {
    sent: Mutex<Vec<Ack>>,
    error: Mutex<Option<String>>,
}

impl MemoryAcks {
    pub fn sent(&self) -> Vec<Ack> {
        lock(&self.sent).clone()
    }

    pub fn fail_sends(&self, reason: &str) {
        *lock(&self.error) = Some(reason.to_string());
    }
}

#[async_trait]
impl AckSender for MemoryAcks {
    async fn send(&self, ack: &Ack) -> Result<()> {
        if let Some(reason) = lock(&self.error).clone() {
            return Err(SignalerError::AckFailed(reason));
        }
        lock(&self.sent).push(ack.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryPorts
// ---------------------------------------------------------------------------

/// Typed handles to every in-memory adapter plus the [`Ports`] view of them.
#[derive(Clone, Default)]
pub struct MemoryPorts {
    pub counter: Arc<MemoryCounterStore>,
    pub schedule: Arc<MemorySchedule>,
    pub instances: Arc<MemoryInstances>,
    pub stack: Arc<MemoryStack>,
    pub incidents: Arc<MemoryIncidents>,
    pub acks: Arc<MemoryAcks>,
}

impl MemoryPorts {
    /// Counter at `enabled_increment_0`, schedule rule present and enabled.
    pub fn seeded(ctx: &DeploymentContext) -> Self {
        let ports = Self::default();
        ports
            .counter
            .set(&ctx.counter_key, &CounterToken::INITIAL.to_string());
        ports
            .schedule
            .add_rule(&ctx.schedule_name, ScheduleState::Enabled);
        ports
    }

    pub fn ports(&self) -> Ports {
        Ports {
            counter: self.counter.clone(),
            schedule: self.schedule.clone(),
            instances: self.instances.clone(),
            directory: self.instances.clone(),
            tagger: self.instances.clone(),
            signaler: self.stack.clone(),
            stack_status: self.stack.clone(),
            incidents: self.incidents.clone(),
            ack: self.acks.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counter_read_of_missing_key_fails() {
        let store = MemoryCounterStore::new();
        let err = store.get("missing").await.unwrap_err();
        assert_eq!(err.code(), "CounterReadFailed");
        store.put("k", "enabled_increment_0").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), "enabled_increment_0");
        assert_eq!(store.writes(), vec!["enabled_increment_0".to_string()]);
    }

    #[tokio::test]
    async fn schedule_unknown_rule_is_not_found() {
        let schedule = MemorySchedule::new();
        let err = schedule.enable("nope").await.unwrap_err();
        assert!(matches!(err, SignalerError::ScheduleRuleNotFound(ref r) if r == "nope"));
        schedule.add_rule("r", ScheduleState::Disabled);
        schedule.enable("r").await.unwrap();
        assert_eq!(schedule.describe("r").await.unwrap(), ScheduleState::Enabled);
    }

    #[tokio::test]
    async fn scripted_readings_repeat_last() {
        let ec2 = MemoryInstances::new();
        ec2.script(
            "i-1",
            vec![InstanceObservation::stopped(), InstanceObservation::healthy()],
        );
        assert_eq!(
            ec2.observe("i-1").await.unwrap(),
            Some(InstanceObservation::stopped())
        );
        for _ in 0..3 {
            assert_eq!(
                ec2.observe("i-1").await.unwrap(),
                Some(InstanceObservation::healthy())
            );
        }
        assert_eq!(ec2.observe("i-2").await.unwrap(), None);
    }
}
