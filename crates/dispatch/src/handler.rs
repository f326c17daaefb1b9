//! The handler contract and the dispatcher.
//!
//! [`Dispatcher::event_handler`] is the single boundary the host calls. It
//! classifies the payload and then runs one of three flows:
//!
//! | Flow | Sources | Per-record failure |
//! |------|---------|--------------------|
//! | sync | `SyncRequest` | error returned, no response |
//! | event | `Queue`, `Topic`, `ChangeStream`, `ScheduledDetail` | first error aborts the remaining records |
//! | batch | `Queue`, `ChangeStream` | record id reported, processing continues |
//!
//! Records are always processed sequentially in arrival order. The
//! dispatcher holds no per-invocation state, so one instance may serve
//! concurrent invocations.
//!
//! Batch mode reads each record on its own: a record that cannot be decoded
//! (no body, no change data, an image of the wrong shape) is reported by its
//! id like a handler failure. Only a record without an id, or a payload that
//! is not a record list at all, fails the invocation.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn, Instrument};

use crate::attribute::decode_image;
use crate::batch::{BatchReport, ChangeStreamBatchReport, QueueBatchReport};
use crate::classifier::{classify, Classification, EventSource};
use crate::context::InvocationContext;
use crate::decode::{decode_slice, decode_str, decode_value, RawPayload};
use crate::envelope::{
    decode_classified, queue_body, record_identifier, scheduled_detail, ChangeStreamEnvelope,
    ChangeStreamRecord, Envelope, QueueEnvelope, QueueRecord, RecordBatch, ScheduledEnvelope,
    TopicEnvelope,
};
use crate::errors::{DecodeError, DispatchError, HandlerError};
use crate::identifiers::{EventId, MessageId};
use crate::middleware::{compose, Middleware};

// ---------------------------------------------------------------------------
// Handler contract
// ---------------------------------------------------------------------------

/// A business handler: one typed request in, one typed response (or an
/// opaque error) out.
///
/// The dispatcher calls it once per logical record and never retries.
#[async_trait]
pub trait Handler<I, O>: Send + Sync {
    /// Handles one request.
    async fn call(&self, ctx: InvocationContext, input: I) -> Result<O, HandlerError>;
}

/// A shared, type-erased handler. Middleware consumes and produces these.
pub type BoxHandler<I, O> = Arc<dyn Handler<I, O>>;

/// Adapter turning an async closure into a [`Handler`]. See [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F>(F);

/// Wraps `f(ctx, input) -> impl Future<Output = Result<O, HandlerError>>`
/// as a [`Handler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn(f)
}

#[async_trait]
impl<I, O, F, Fut> Handler<I, O> for HandlerFn<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(InvocationContext, I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, HandlerError>> + Send,
{
    async fn call(&self, ctx: InvocationContext, input: I) -> Result<O, HandlerError> {
        (self.0)(ctx, input).await
    }
}

// ---------------------------------------------------------------------------
// Mode and outcome
// ---------------------------------------------------------------------------

/// Whether multi-record sources fail fast or report partial failures.
///
/// Deserialisation goes through [`FromStr`], so `"Batch"` is accepted
/// wherever `"batch"` is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum DispatchMode {
    /// Sync and event flows; the first record failure aborts.
    #[default]
    Single,
    /// Partial batch failures for queue and change-stream sources only.
    Batch,
}

/// Returned when a mode string is neither `single` nor `batch`.
#[derive(Debug, Error)]
#[error("unknown dispatch mode '{0}' (expected 'single' or 'batch')")]
pub struct ParseModeError(String);

impl FromStr for DispatchMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "batch" => Ok(Self::Batch),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

impl TryFrom<String> for DispatchMode {
    type Error = ParseModeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

/// Successful result of one invocation.
///
/// Serialises to what the host should return: the response itself, `null`
/// for completed events, or a batch failure report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DispatchOutcome<O> {
    /// Sync flow: the handler's response, verbatim.
    Response(O),
    /// Event flow: every record was handled.
    Completed,
    /// Batch flow over a queue envelope.
    QueueBatch(QueueBatchReport),
    /// Batch flow over a change-stream envelope.
    ChangeStreamBatch(ChangeStreamBatchReport),
}

impl<O> DispatchOutcome<O> {
    /// The sync response, if this outcome carries one.
    pub fn into_response(self) -> Option<O> {
        match self {
            Self::Response(out) => Some(out),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Routes classified payloads to a composed handler.
pub struct Dispatcher<I, O> {
    handler: BoxHandler<I, O>,
    mode: DispatchMode,
}

impl<I, O> Clone for Dispatcher<I, O> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            mode: self.mode,
        }
    }
}

impl<I, O> std::fmt::Debug for Dispatcher<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl<I, O> Dispatcher<I, O>
where
    I: DeserializeOwned + Send + 'static,
    O: Send + 'static,
{
    /// Creates a single-mode dispatcher, wrapping `handler` in `middlewares`
    /// (first registered outermost). No middleware is added implicitly; use
    /// [`crate::DispatcherBuilder`] to get the logging middleware.
    pub fn new(handler: BoxHandler<I, O>, middlewares: &[Middleware<I, O>]) -> Self {
        Self {
            handler: compose(handler, middlewares),
            mode: DispatchMode::Single,
        }
    }

    /// Switches to batch mode.
    pub fn batch(mut self) -> Self {
        self.mode = DispatchMode::Batch;
        self
    }

    /// Sets the mode explicitly.
    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// The configured mode.
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Entry point for one invocation.
    pub async fn event_handler(
        &self,
        ctx: InvocationContext,
        raw: &RawPayload,
    ) -> Result<DispatchOutcome<O>, DispatchError> {
        let classification = classify(raw);
        let span = tracing::info_span!(
            "invocation",
            request_id = %ctx.request_id(),
            source = %classification,
            mode = %self.mode,
        );

        async move {
            debug!("payload classified");
            let result = match (self.mode, classification.source()) {
                (DispatchMode::Batch, _) => self.with_batch_report(&ctx, &classification, raw).await,
                (DispatchMode::Single, Some(EventSource::SyncRequest)) => self
                    .with_response(&ctx, raw)
                    .await
                    .map(DispatchOutcome::Response),
                (DispatchMode::Single, _) => self
                    .without_response(&ctx, &classification, raw)
                    .await
                    .map(|()| DispatchOutcome::Completed),
            };
            match &result {
                Ok(_) => debug!("invocation completed"),
                Err(err) => warn!(error = %err, "invocation failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn with_response(
        &self,
        ctx: &InvocationContext,
        raw: &RawPayload,
    ) -> Result<O, DispatchError> {
        let input = decode_slice(raw.as_bytes(), "sync request")?;
        debug!("sync request decoded");
        self.invoke(ctx, input).await
    }

    async fn without_response(
        &self,
        ctx: &InvocationContext,
        classification: &Classification,
        raw: &RawPayload,
    ) -> Result<(), DispatchError> {
        let envelope = decode_classified(classification, raw)?;
        debug!(records = envelope.record_count(), "envelope decoded");
        self.handle(ctx, envelope).await
    }

    /// Runs the fail-fast event flow over an already-decoded envelope.
    pub async fn handle(
        &self,
        ctx: &InvocationContext,
        envelope: Envelope,
    ) -> Result<(), DispatchError> {
        let source = envelope.source();
        match envelope {
            Envelope::Queue(e) => self.handle_queue(ctx, &e).await,
            Envelope::Topic(e) => self.handle_topic(ctx, &e).await,
            Envelope::ChangeStream(e) => self.handle_change_stream(ctx, &e).await,
            Envelope::Scheduled(e) => self.handle_scheduled(ctx, &e).await,
            Envelope::ObjectStore(_) | Envelope::Sync(_) => Err(DispatchError::UnsupportedSource {
                tag: source.tag().to_string(),
            }),
        }
    }

    /// Handles every queue message in order, stopping at the first failure.
    pub async fn handle_queue(
        &self,
        ctx: &InvocationContext,
        envelope: &QueueEnvelope,
    ) -> Result<(), DispatchError> {
        for (index, record) in envelope.records.iter().enumerate() {
            debug!(
                index,
                message_id = record.message_id.as_deref().unwrap_or_default(),
                "invoking handler for queue record"
            );
            self.queue_record(ctx, record).await?;
        }
        Ok(())
    }

    /// Handles every topic notification in order, stopping at the first failure.
    pub async fn handle_topic(
        &self,
        ctx: &InvocationContext,
        envelope: &TopicEnvelope,
    ) -> Result<(), DispatchError> {
        for (index, record) in envelope.records.iter().enumerate() {
            debug!(index, "invoking handler for topic record");
            self.process(ctx, decode_str(&record.sns.message, "topic message"))
                .await?;
        }
        Ok(())
    }

    /// Handles every change-stream record in order, stopping at the first
    /// failure. Requests are decoded from each record's new image.
    pub async fn handle_change_stream(
        &self,
        ctx: &InvocationContext,
        envelope: &ChangeStreamEnvelope,
    ) -> Result<(), DispatchError> {
        for (index, record) in envelope.records.iter().enumerate() {
            debug!(index, event_id = %record.event_id, "invoking handler for change-stream record");
            self.change_stream_record(ctx, record).await?;
        }
        Ok(())
    }

    /// Handles the single detail payload of a scheduled event.
    pub async fn handle_scheduled(
        &self,
        ctx: &InvocationContext,
        envelope: &ScheduledEnvelope,
    ) -> Result<(), DispatchError> {
        debug!("invoking handler for scheduled event detail");
        self.process(ctx, decode_value(scheduled_detail(envelope), "scheduled event detail"))
            .await
    }

    async fn with_batch_report(
        &self,
        ctx: &InvocationContext,
        classification: &Classification,
        raw: &RawPayload,
    ) -> Result<DispatchOutcome<O>, DispatchError> {
        match classification.source() {
            Some(EventSource::Queue) => {
                let batch = RecordBatch::decode(raw, "queue envelope")?;
                let mut report = QueueBatchReport::default();
                for (index, record) in batch.records.iter().enumerate() {
                    let id = record_identifier(record, "messageId")
                        .and_then(MessageId::new)
                        .ok_or(DecodeError::MissingIdentifier {
                            index,
                            field: "messageId",
                        })?;
                    let outcome = match decode_value::<QueueRecord>(record, "queue record") {
                        Ok(record) => self.queue_record(ctx, &record).await,
                        Err(err) => Err(err.into()),
                    };
                    settle(&mut report, index, id, outcome)?;
                }
                debug!(failed = report.len(), total = batch.records.len(), "queue batch processed");
                Ok(DispatchOutcome::QueueBatch(report))
            }
            Some(EventSource::ChangeStream) => {
                let batch = RecordBatch::decode(raw, "change-stream envelope")?;
                let mut report = ChangeStreamBatchReport::default();
                for (index, record) in batch.records.iter().enumerate() {
                    let id = record_identifier(record, "eventID")
                        .and_then(EventId::new)
                        .ok_or(DecodeError::MissingIdentifier {
                            index,
                            field: "eventID",
                        })?;
                    let outcome =
                        match decode_value::<ChangeStreamRecord>(record, "change-stream record") {
                            Ok(record) => self.change_stream_record(ctx, &record).await,
                            Err(err) => Err(err.into()),
                        };
                    settle(&mut report, index, id, outcome)?;
                }
                debug!(failed = report.len(), total = batch.records.len(), "change-stream batch processed");
                Ok(DispatchOutcome::ChangeStreamBatch(report))
            }
            _ => Err(DispatchError::InvalidBatchSource {
                tag: classification.tag().to_string(),
            }),
        }
    }

    /// Handles every message of an already-decoded queue envelope, reporting
    /// the ids of the ones that failed to decode or whose handler call failed.
    ///
    /// Fails only for a message without an id.
    pub async fn handle_queue_batch(
        &self,
        ctx: &InvocationContext,
        envelope: &QueueEnvelope,
    ) -> Result<QueueBatchReport, DispatchError> {
        let mut report = QueueBatchReport::default();
        for (index, record) in envelope.records.iter().enumerate() {
            let id = record
                .message_id
                .as_deref()
                .and_then(MessageId::new)
                .ok_or(DecodeError::MissingIdentifier {
                    index,
                    field: "messageId",
                })?;
            let outcome = self.queue_record(ctx, record).await;
            settle(&mut report, index, id, outcome)?;
        }
        Ok(report)
    }

    /// Handles every record of an already-decoded change-stream envelope,
    /// reporting the event ids of the ones that failed to decode or whose
    /// handler call failed.
    ///
    /// Fails only for a record without an event id.
    pub async fn handle_change_stream_batch(
        &self,
        ctx: &InvocationContext,
        envelope: &ChangeStreamEnvelope,
    ) -> Result<ChangeStreamBatchReport, DispatchError> {
        let mut report = ChangeStreamBatchReport::default();
        for (index, record) in envelope.records.iter().enumerate() {
            let id = EventId::new(record.event_id.as_str()).ok_or(
                DecodeError::MissingIdentifier {
                    index,
                    field: "eventID",
                },
            )?;
            let outcome = self.change_stream_record(ctx, record).await;
            settle(&mut report, index, id, outcome)?;
        }
        Ok(report)
    }

    async fn queue_record(
        &self,
        ctx: &InvocationContext,
        record: &QueueRecord,
    ) -> Result<(), DispatchError> {
        let decoded = queue_body(record).and_then(|body| decode_str(body, "queue message body"));
        self.process(ctx, decoded).await
    }

    async fn change_stream_record(
        &self,
        ctx: &InvocationContext,
        record: &ChangeStreamRecord,
    ) -> Result<(), DispatchError> {
        self.process(ctx, decode_image(&record.change.new_image))
            .await
    }

    async fn process(
        &self,
        ctx: &InvocationContext,
        decoded: Result<I, DecodeError>,
    ) -> Result<(), DispatchError> {
        let input = decoded?;
        self.invoke(ctx, input).await.map(drop)
    }

    async fn invoke(&self, ctx: &InvocationContext, input: I) -> Result<O, DispatchError> {
        self.handler
            .call(ctx.clone(), input)
            .await
            .map_err(DispatchError::Handler)
    }
}

/// Folds one record's outcome into `report`. Record-level failures are
/// listed under `id`; anything else aborts the batch.
fn settle<R>(
    report: &mut R,
    index: usize,
    id: R::Id,
    outcome: Result<(), DispatchError>,
) -> Result<(), DispatchError>
where
    R: BatchReport,
    R::Id: std::fmt::Display,
{
    match outcome {
        Ok(()) => Ok(()),
        Err(err) if err.is_record_level() => {
            warn!(index, id = %id, error = %err, "batch record failed");
            report.record_failure(id);
            Ok(())
        }
        Err(err) => Err(err),
    }
}
