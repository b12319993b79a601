use crate::error::Result;
use crate::ports::{InstanceDirectory, InstanceSummary};

pub const NO_INSTANCES_FOUND: &str = "No instances found with the specified tag.";

/// The newest-launched instance; later entries win launch-time ties.
pub fn newest(instances: &[InstanceSummary]) -> Option<&InstanceSummary> {
    instances.iter().max_by_key(|i| i.launch_time)
}

/// Resolve the instance correlated to the current cycle. Called fresh on
/// every tick, never cached.
pub async fn resolve_monitored_instance(
    directory: &dyn InstanceDirectory,
    stack_name: &str,
) -> Result<Option<String>> {
    let instances = directory.find_by_stack(stack_name).await?;
    match newest(&instances) {
        Some(found) => {
            tracing::info!(
                stack = stack_name,
                instance = %found.instance_id,
                candidates = instances.len(),
                "resolved monitored instance"
            );
            Ok(Some(found.instance_id.clone()))
        }
        None => {
            tracing::info!(stack = stack_name, "{NO_INSTANCES_FOUND}");
            Ok(None)
        }
    }
}
