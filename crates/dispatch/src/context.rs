//! Per-invocation context and the logging capability.
//!
//! An [`InvocationContext`] is created by the host for every invocation and
//! handed to the handler (through every middleware) on each call. It carries
//! the request identifier, the host deadline, a cooperative cancellation
//! token, and optionally an injected [`EventLogger`].
//!
//! The dispatcher never enforces the deadline or checks the token itself;
//! both are there for the business handler.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::identifiers::RequestId;

/// Key-value attachment for a log call.
pub type LogFields = Map<String, Value>;

// ---------------------------------------------------------------------------
// Logging capability
// ---------------------------------------------------------------------------

/// Narrow structured-logging interface used by middleware and handlers.
pub trait EventLogger: Send + Sync {
    /// Debug-level message.
    fn debug(&self, message: &str, fields: &LogFields);
    /// Info-level message.
    fn info(&self, message: &str, fields: &LogFields);
    /// Error-level message.
    fn error(&self, message: &str, fields: &LogFields);
}

/// [`EventLogger`] backed by `tracing` events.
///
/// The attachment is rendered as one JSON `fields` value so that arbitrary
/// request/response shapes survive any subscriber format.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger;

impl EventLogger for TracingLogger {
    fn debug(&self, message: &str, fields: &LogFields) {
        let fields = Value::Object(fields.clone());
        tracing::debug!(fields = %fields, "{message}");
    }

    fn info(&self, message: &str, fields: &LogFields) {
        let fields = Value::Object(fields.clone());
        tracing::info!(fields = %fields, "{message}");
    }

    fn error(&self, message: &str, fields: &LogFields) {
        let fields = Value::Object(fields.clone());
        tracing::error!(fields = %fields, "{message}");
    }
}

/// Builds a single-entry attachment.
pub fn field(key: &str, value: Value) -> LogFields {
    let mut fields = LogFields::new();
    fields.insert(key.to_string(), value);
    fields
}

// ---------------------------------------------------------------------------
// Invocation context
// ---------------------------------------------------------------------------

/// Context passed to every handler call. Cheap to clone.
#[derive(Clone)]
pub struct InvocationContext {
    request_id: RequestId,
    deadline: Option<DateTime<Utc>>,
    cancellation: CancellationToken,
    logger: Option<Arc<dyn EventLogger>>,
}

impl InvocationContext {
    /// Creates a context for the given request with no deadline and no
    /// injected logger.
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            deadline: None,
            cancellation: CancellationToken::new(),
            logger: None,
        }
    }

    /// Creates a context with a generated request id (tests, local runs).
    pub fn detached() -> Self {
        Self::new(RequestId::generate())
    }

    /// Sets the wall-clock deadline supplied by the host.
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Replaces the cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Injects a logger.
    pub fn with_logger(mut self, logger: Arc<dyn EventLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The invocation's request id.
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// The host deadline, if known.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Time left before the deadline; `None` without a deadline, zero once it
    /// has passed.
    pub fn remaining(&self) -> Option<std::time::Duration> {
        self.deadline
            .map(|d| (d - Utc::now()).to_std().unwrap_or_default())
    }

    /// The cooperative cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns `true` once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns `true` if a logger was injected.
    pub fn has_logger(&self) -> bool {
        self.logger.is_some()
    }

    /// The injected logger, or a [`TracingLogger`] when none was injected.
    pub fn logger(&self) -> Arc<dyn EventLogger> {
        match &self.logger {
            Some(logger) => Arc::clone(logger),
            None => Arc::new(TracingLogger),
        }
    }
}

impl std::fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationContext")
            .field("request_id", &self.request_id)
            .field("deadline", &self.deadline)
            .field("cancelled", &self.is_cancelled())
            .field("has_logger", &self.has_logger())
            .finish()
    }
}
