use anyhow::Context;
use lambda_runtime::{service_fn, LambdaEvent};
use serde_json::Value;
use signaler_core::config::DeploymentContext;
use signaler_core::event::Invocation;
use signaler_core::{HandlerResponse, Signaler};

const LOG_STREAM_ENV: &str = "AWS_LAMBDA_LOG_STREAM_NAME";

pub fn run() -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let ctx = DeploymentContext::from_env().context("invalid function configuration")?;
        let ports = signaler_aws::ports_from_env()
            .await
            .context("failed to build AWS clients")?;
        tracing::info!(
            stack = %ctx.stack_name,
            logical_id = %ctx.logical_resource_id,
            threshold = ctx.threshold,
            "signaler cold start"
        );

        let signaler = Signaler::new(ctx, ports);
        let log_stream = std::env::var(LOG_STREAM_ENV).unwrap_or_default();

        lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
            let signaler = signaler.clone();
            let invocation = Invocation {
                request_id: event.context.request_id.clone(),
                log_stream_name: log_stream.clone(),
            };
            async move {
                Ok::<HandlerResponse, lambda_runtime::Error>(
                    signaler.handle(&event.payload, &invocation).await,
                )
            }
        }))
        .await
        .map_err(|e| anyhow::anyhow!(e))
    })
}
