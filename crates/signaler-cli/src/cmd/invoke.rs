use crate::output::print_json;
use anyhow::Context;
use signaler_core::config::DeploymentContext;
use signaler_core::event::Invocation;
use signaler_core::Signaler;
use std::path::Path;

pub fn run(event: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let payload = super::read_event(event)?;
    let ctx = match config {
        Some(path) => DeploymentContext::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => DeploymentContext::from_env().context("invalid environment configuration")?,
    };

    let rt = tokio::runtime::Runtime::new()?;
    let response = rt.block_on(async {
        let ports = signaler_aws::ports_from_env()
            .await
            .context("failed to build AWS clients")?;
        let invocation = Invocation {
            request_id: format!("cli-{}", std::process::id()),
            log_stream_name: "local".into(),
        };
        anyhow::Ok(Signaler::new(ctx, ports).handle(&payload, &invocation).await)
    })?;

    print_json(&response)?;
    if !response.is_ok() {
        anyhow::bail!("event handling failed");
    }
    Ok(())
}
