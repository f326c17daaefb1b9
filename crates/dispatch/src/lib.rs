//! Event-source dispatch for serverless function invocations.
//!
//! A single entry point ([`Dispatcher::event_handler`]) accepts an opaque JSON
//! payload, works out which kind of event produced it, decodes it into the
//! caller's request type and invokes the business handler once per logical
//! record. For queue and change-stream sources a batch mode reports failed
//! records individually instead of failing the whole invocation.
//!
//! ## Architectural Layer
//!
//! **Routing + port definitions.** This crate has no I/O dependencies and
//! never interprets the request. The `host` crate binds a [`Dispatcher`] to
//! the serverless runtime.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`decode`] | [`RawPayload`] and generic JSON decoding |
//! | [`classifier`] | Ordered classification rules and [`EventSource`] |
//! | [`envelope`] | Origin envelopes and [`identify_and_decode`] |
//! | [`attribute`] | Change-stream image decoding |
//! | [`context`] | [`InvocationContext`] and the [`EventLogger`] capability |
//! | [`middleware`] | Middleware composition and the logging middleware |
//! | [`handler`] | [`Handler`] contract and the [`Dispatcher`] |
//! | [`batch`] | Partial batch failure reports |
//! | [`builder`] | [`DispatcherBuilder`] |
//! | [`identifiers`] | Record and request identifiers |
//! | [`errors`] | [`DecodeError`] and [`DispatchError`] |

pub mod attribute;
pub mod batch;
pub mod builder;
pub mod classifier;
pub mod context;
pub mod decode;
pub mod envelope;
pub mod errors;
pub mod handler;
pub mod identifiers;
pub mod middleware;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use attribute::{decode_image, AttributeValue, Image};
pub use batch::{BatchReport, ChangeStreamBatchReport, QueueBatchReport};
pub use builder::DispatcherBuilder;
pub use classifier::{classify, classify_source, classify_value, Classification, EventSource};
pub use context::{field, EventLogger, InvocationContext, LogFields, TracingLogger};
pub use decode::RawPayload;
pub use envelope::{
    identify_and_decode, queue_body, record_identifier, scheduled_detail, ChangeStreamEnvelope,
    ChangeStreamRecord, Envelope, ObjectStoreEnvelope, ObjectStoreRecord, QueueEnvelope,
    QueueRecord, RecordBatch, ScheduledEnvelope, StreamChange, TopicEnvelope, TopicMessage,
    TopicRecord,
};
pub use errors::{DecodeError, DispatchError, HandlerError};
pub use handler::{
    handler_fn, BoxHandler, DispatchMode, DispatchOutcome, Dispatcher, Handler, HandlerFn,
    ParseModeError,
};
pub use identifiers::{EventId, MessageId, RequestId};
pub use middleware::{compose, logging, middleware, Middleware};
