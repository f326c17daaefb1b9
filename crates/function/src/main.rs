//! `event-dispatch` binary entry point.
//!
//! Composition root for the reference function:
//!
//! 1. **Load configuration** from `EVENT_DISPATCH_*` environment variables.
//! 2. **Wire observability**: JSON or pretty stdout logs plus optional OTLP
//!    span export. Every `tracing` event in the workspace flows through here.
//! 3. **Register the dispatcher** with the Lambda runtime in the configured
//!    mode (`single` or `batch`), logging middleware outermost.

use anyhow::{anyhow, Context as _, Result};
use dispatch::DispatcherBuilder;
use function::{Request, Response, Service};
use host::{init_telemetry, shutdown_telemetry, HostConfig, StartExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = HostConfig::from_env().context("failed to load configuration")?;
    let tracer_provider = init_telemetry(&config.telemetry())?;

    tracing::info!(
        mode = %config.mode,
        service = %config.service_name,
        otel = config.otel_enabled,
        "starting event-dispatch"
    );

    let result = DispatcherBuilder::<Request, Response>::new(Service)
        .start_with_mode(config.mode)
        .await
        .map_err(|e| anyhow!(e));

    if let Err(e) = &result {
        tracing::error!(error = %e, "runtime exited with an error");
    }

    shutdown_telemetry(tracer_provider);
    result
}
