//! Tracing subscriber and OpenTelemetry wiring.
//!
//! Library crates only emit `tracing` events and spans; this module decides
//! where they go. Logs are written to stdout (JSON by default, which the
//! serverless log pipeline ingests as structured records). When OTLP export
//! is enabled, spans are also shipped to a collector over gRPC.

use anyhow::Result;
use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace::TracerProvider, Resource};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the stdout log layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human-readable output for local runs.
    Pretty,
}

/// Configuration for telemetry initialisation.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `service.name` resource attribute on exported spans.
    pub service_name: String,
    /// OTLP gRPC collector endpoint.
    pub otel_endpoint: String,
    /// Export spans over OTLP; logging is installed either way.
    pub otel_enabled: bool,
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Output format of the logging layer.
    pub log_format: LogFormat,
}

/// Installs the global subscriber.
///
/// Returns the tracer provider when OTLP export is enabled; pass it to
/// [`shutdown_telemetry`] before the process exits so buffered spans are
/// flushed.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Option<TracerProvider>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let json_layer = (config.log_format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
    });
    let pretty_layer =
        (config.log_format == LogFormat::Pretty).then(|| tracing_subscriber::fmt::layer().pretty());

    let tracer_provider = if config.otel_enabled {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&config.otel_endpoint)
            .build()?;

        let resource = Resource::new(vec![KeyValue::new(
            "service.name",
            config.service_name.clone(),
        )]);

        Some(
            TracerProvider::builder()
                .with_batch_exporter(exporter, runtime::Tokio)
                .with_resource(resource)
                .build(),
        )
    } else {
        None
    };

    let otel_layer = tracer_provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(tracer_provider)
}

/// Flushes and shuts down the tracer provider, if one was installed.
pub fn shutdown_telemetry(provider: Option<TracerProvider>) {
    if let Some(provider) = provider {
        if let Err(e) = provider.shutdown() {
            eprintln!("Error shutting down tracer provider: {:?}", e);
        }
    }
}
