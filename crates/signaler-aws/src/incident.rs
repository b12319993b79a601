use async_trait::async_trait;
use signaler_core::ports::{Incident, IncidentSink};
use signaler_core::Result;

/// Emits the incident as an `error` record for log-based alerting.
pub struct LogIncidentSink;

#[async_trait]
impl IncidentSink for LogIncidentSink {
    async fn raise(&self, incident: &Incident) -> Result<()> {
        tracing::error!(
            title = %incident.title,
            message = %incident.message,
            stack = %incident.stack_name,
            logical_id = %incident.logical_resource_id,
            instance = incident.instance_id.as_deref().unwrap_or("-"),
            attempts = incident.attempts,
            threshold = incident.threshold,
            "incident raised"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn raising_never_fails() {
        let incident = Incident {
            title: "EC2Instance in MyStack did not converge".into(),
            message: "2 attempts".into(),
            stack_name: "MyStack".into(),
            logical_resource_id: "EC2Instance".into(),
            instance_id: None,
            attempts: 2,
            threshold: 2,
        };
        LogIncidentSink.raise(&incident).await.unwrap();
    }
}
