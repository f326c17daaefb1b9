//! Serverless host binding for the event dispatcher.
//!
//! Registers a [`dispatch::Dispatcher`] with the AWS Lambda runtime and owns
//! everything process-wide: environment configuration and the tracing /
//! OpenTelemetry subscriber.
//!
//! ## Entry Points
//!
//! | Entry point | Mode | Notes |
//! |-------------|------|-------|
//! | [`start`] | single | logging middleware outermost |
//! | [`start_batch`] | batch | logging middleware outermost |
//! | [`StartExt::start`] / [`StartExt::start_batch`] | single / batch | on a configured [`dispatch::DispatcherBuilder`] |
//! | [`run`] | as built | for a dispatcher assembled by hand |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** The runtime client, configuration loading and
//! exporter setup live here. The [`dispatch`] crate sees only
//! [`dispatch::InvocationContext`] and [`dispatch::RawPayload`].

pub mod config;
pub mod runtime;
pub mod telemetry;

pub use config::{HostConfig, ENV_PREFIX};
pub use runtime::{invocation_context, invoke, run, start, start_batch, Error, StartExt};
pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat, TelemetryConfig};
