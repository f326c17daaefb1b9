//! Origin-specific envelopes and the envelope unmarshaler.
//!
//! The envelope shapes are the host's own event types from
//! `aws_lambda_events`; this module names them by role and decides which of
//! them may be dispatched. Batch mode does not decode a whole envelope up
//! front: it reads the records array untyped ([`RecordBatch`]) and decodes
//! each record on its own, so one malformed record cannot fail its siblings.

use aws_lambda_events::event::{cloudwatch_events, dynamodb, s3, sns, sqs};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classifier::{classify, Classification, EventSource};
use crate::decode::{decode_slice, RawPayload};
use crate::errors::{DecodeError, DispatchError};

// ---------------------------------------------------------------------------
// Envelope shapes
// ---------------------------------------------------------------------------

/// A batch of queue messages.
pub type QueueEnvelope = sqs::SqsEvent;
/// One queue message; the request is its JSON-encoded `body`.
pub type QueueRecord = sqs::SqsMessage;

/// A set of topic notifications.
pub type TopicEnvelope = sns::SnsEvent;
/// One topic notification.
pub type TopicRecord = sns::SnsRecord;
/// The published message inside a topic notification.
pub type TopicMessage = sns::SnsMessage;

/// A batch of change-stream records.
pub type ChangeStreamEnvelope = dynamodb::Event;
/// One change-stream record; the request is decoded from its new image.
pub type ChangeStreamRecord = dynamodb::EventRecord;
/// Item images and stream position for one change.
pub type StreamChange = dynamodb::StreamRecord;

/// A set of object-store notifications. Decodable, but not dispatched.
pub type ObjectStoreEnvelope = s3::S3Event;
/// One object-store notification.
pub type ObjectStoreRecord = s3::S3EventRecord;

/// A scheduled or alert event. The `detail` payload is the single record.
pub type ScheduledEnvelope = cloudwatch_events::CloudWatchEvent;

/// The JSON-encoded request carried by a queue message.
///
/// A missing or empty body is a record-level decode failure.
pub fn queue_body(record: &QueueRecord) -> Result<&str, DecodeError> {
    match record.body.as_deref() {
        Some(body) if !body.is_empty() => Ok(body),
        _ => Err(DecodeError::MissingField {
            target: "queue record",
            field: "body",
        }),
    }
}

/// The request payload of a scheduled event; `null` when it has no detail.
pub fn scheduled_detail(envelope: &ScheduledEnvelope) -> &Value {
    envelope.detail.as_ref().unwrap_or(&Value::Null)
}

// ---------------------------------------------------------------------------
// Untyped records (batch mode)
// ---------------------------------------------------------------------------

/// The records array of a batchable envelope, each record still untyped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordBatch {
    /// Records in delivery order.
    #[serde(rename = "Records", default)]
    pub records: Vec<Value>,
}

impl RecordBatch {
    /// Decodes the records array of `raw`. Fails only when the payload is not
    /// a JSON object with a `Records` array.
    pub fn decode(raw: &RawPayload, target: &'static str) -> Result<Self, DecodeError> {
        decode_slice(raw.as_bytes(), target)
    }
}

/// Reads the string identifier `field` from an untyped record. Missing,
/// non-string and empty values all yield `None`.
pub fn record_identifier<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A decoded envelope, one variant per [`EventSource`].
#[derive(Debug, Clone)]
pub enum Envelope {
    /// Queue messages.
    Queue(QueueEnvelope),
    /// Topic notifications.
    Topic(TopicEnvelope),
    /// Change-stream records.
    ChangeStream(ChangeStreamEnvelope),
    /// Object-store notifications.
    ObjectStore(ObjectStoreEnvelope),
    /// Scheduled event with a single detail payload.
    Scheduled(ScheduledEnvelope),
    /// Synchronous request; the whole payload.
    Sync(Value),
}

impl Envelope {
    /// Decodes `raw` as the envelope for `source`.
    pub fn decode(source: EventSource, raw: &RawPayload) -> Result<Self, DispatchError> {
        let bytes = raw.as_bytes();
        Ok(match source {
            EventSource::Queue => Self::Queue(decode_slice(bytes, "queue envelope")?),
            EventSource::Topic => Self::Topic(decode_slice(bytes, "topic envelope")?),
            EventSource::ChangeStream => {
                Self::ChangeStream(decode_slice(bytes, "change-stream envelope")?)
            }
            EventSource::ObjectStore => {
                Self::ObjectStore(decode_slice(bytes, "object-store envelope")?)
            }
            EventSource::ScheduledDetail => {
                Self::Scheduled(decode_slice(bytes, "scheduled event envelope")?)
            }
            EventSource::SyncRequest => Self::Sync(decode_slice(bytes, "sync request")?),
        })
    }

    /// The source this envelope was decoded for.
    pub fn source(&self) -> EventSource {
        match self {
            Self::Queue(_) => EventSource::Queue,
            Self::Topic(_) => EventSource::Topic,
            Self::ChangeStream(_) => EventSource::ChangeStream,
            Self::ObjectStore(_) => EventSource::ObjectStore,
            Self::Scheduled(_) => EventSource::ScheduledDetail,
            Self::Sync(_) => EventSource::SyncRequest,
        }
    }

    /// Number of logical records the dispatcher will invoke the handler for.
    pub fn record_count(&self) -> usize {
        match self {
            Self::Queue(e) => e.records.len(),
            Self::Topic(e) => e.records.len(),
            Self::ChangeStream(e) => e.records.len(),
            Self::ObjectStore(e) => e.records.len(),
            Self::Scheduled(_) | Self::Sync(_) => 1,
        }
    }
}

/// Returns `true` for sources that [`identify_and_decode`] accepts.
fn is_dispatchable_event(source: EventSource) -> bool {
    match source {
        EventSource::Queue
        | EventSource::Topic
        | EventSource::ChangeStream
        | EventSource::ScheduledDetail => true,
        EventSource::ObjectStore | EventSource::SyncRequest => false,
    }
}

/// Classifies `raw` and decodes it into the envelope of a dispatchable event
/// source.
///
/// Fails with [`DispatchError::UnsupportedSource`] ("invalid event") for
/// object-store notifications, synchronous requests and unrecognised tags.
pub fn identify_and_decode(raw: &RawPayload) -> Result<Envelope, DispatchError> {
    decode_classified(&classify(raw), raw)
}

/// As [`identify_and_decode`], reusing an existing classification.
pub fn decode_classified(
    classification: &Classification,
    raw: &RawPayload,
) -> Result<Envelope, DispatchError> {
    match classification.source() {
        Some(source) if is_dispatchable_event(source) => Envelope::decode(source, raw),
        _ => Err(DispatchError::UnsupportedSource {
            tag: classification.tag().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::decode_image;
    use serde_json::json;

    const SQS: &str = include_str!("../tests/fixtures/sqs.json");
    const SNS: &str = include_str!("../tests/fixtures/sns.json");
    const DYNAMODB: &str = include_str!("../tests/fixtures/dynamodb.json");
    const CLOUDWATCH: &str = include_str!("../tests/fixtures/cloudwatch.json");
    const S3: &str = include_str!("../tests/fixtures/s3.json");

    fn raw(value: Value) -> RawPayload {
        RawPayload::from(value.to_string())
    }

    #[test]
    fn test_queue_envelope_decodes_records_in_order() {
        let Envelope::Queue(envelope) = identify_and_decode(&RawPayload::from(SQS)).unwrap() else {
            panic!("expected a queue envelope");
        };

        let ids: Vec<_> = envelope
            .records
            .iter()
            .map(|r| r.message_id.as_deref())
            .collect();
        assert_eq!(ids, [Some("MessageID_1"), Some("MessageID_2")]);
        assert_eq!(
            queue_body(&envelope.records[0]).unwrap(),
            r#"{"user_uuid":"iao","operation_id":"123"}"#
        );
    }

    #[test]
    fn test_queue_body_must_be_present_and_non_empty() {
        let payload = raw(json!({
            "Records": [
                { "eventSource": "aws:sqs", "messageId": "A" },
                { "eventSource": "aws:sqs", "messageId": "B", "body": "" },
            ]
        }));

        let Envelope::Queue(envelope) = identify_and_decode(&payload).unwrap() else {
            panic!("expected a queue envelope");
        };

        for record in &envelope.records {
            let err = queue_body(record).unwrap_err();
            assert_eq!(err.to_string(), "queue record has no 'body'");
        }
    }

    #[test]
    fn test_topic_envelope_carries_the_message() {
        let Envelope::Topic(envelope) = identify_and_decode(&RawPayload::from(SNS)).unwrap() else {
            panic!("expected a topic envelope");
        };

        assert_eq!(
            envelope.records[0].sns.message,
            r#"{"user_uuid":"iao","operation_id":"123"}"#
        );
    }

    #[test]
    fn test_change_stream_envelope_keeps_images() {
        let Envelope::ChangeStream(envelope) =
            identify_and_decode(&RawPayload::from(DYNAMODB)).unwrap()
        else {
            panic!("expected a change-stream envelope");
        };

        #[derive(Debug, Deserialize)]
        struct Keyed {
            user_uuid: String,
        }

        let first = &envelope.records[0];
        assert_eq!(first.event_id, "c4ca4238a0b923820dcc509a6f75849b");
        let keyed: Keyed = decode_image(&first.change.new_image).unwrap();
        assert_eq!(keyed.user_uuid, "iao");
        assert_eq!(envelope.records.len(), 2);
    }

    #[test]
    fn test_scheduled_envelope_carries_detail() {
        let envelope = identify_and_decode(&RawPayload::from(CLOUDWATCH)).unwrap();

        assert_eq!(envelope.source(), EventSource::ScheduledDetail);
        assert_eq!(envelope.record_count(), 1);
        let Envelope::Scheduled(scheduled) = envelope else {
            unreachable!()
        };
        assert_eq!(
            scheduled_detail(&scheduled),
            &json!({ "user_uuid": "iao", "operation_id": "123" })
        );
    }

    #[test]
    fn test_object_store_is_an_invalid_event() {
        let payload = RawPayload::from(S3);

        let err = identify_and_decode(&payload).unwrap_err();
        assert!(matches!(err, DispatchError::UnsupportedSource { ref tag } if tag == "aws:s3"));

        // The envelope itself is still decodable on request.
        let envelope = Envelope::decode(EventSource::ObjectStore, &payload).unwrap();
        assert_eq!(envelope.record_count(), 1);
    }

    #[test]
    fn test_sync_and_unknown_tags_are_invalid_events() {
        let sync = raw(json!({ "user_uuid": "ok" }));
        let unknown = raw(json!({ "Records": [{ "eventSource": "aws:kinesis" }] }));

        assert!(matches!(
            identify_and_decode(&sync),
            Err(DispatchError::UnsupportedSource { .. })
        ));
        assert!(matches!(
            identify_and_decode(&unknown),
            Err(DispatchError::UnsupportedSource { ref tag }) if tag == "aws:kinesis"
        ));
    }

    #[test]
    fn test_shape_mismatch_is_a_decode_error() {
        // Tagged as a queue, but the records are not objects.
        let payload = raw(json!({ "Records": [{ "eventSource": "aws:sqs" }, 42] }));

        let err = identify_and_decode(&payload).unwrap_err();
        assert!(matches!(err, DispatchError::Decode(_)));
        assert!(err.to_string().contains("queue envelope"));
    }

    #[test]
    fn test_record_batch_keeps_records_untyped() {
        let payload = raw(json!({
            "Records": [
                { "eventSource": "aws:sqs", "messageId": "A", "body": "{}" },
                { "eventSource": "aws:sqs", "messageId": "" },
                { "eventSource": "aws:sqs" },
            ]
        }));

        let batch = RecordBatch::decode(&payload, "queue envelope").unwrap();

        let ids: Vec<_> = batch
            .records
            .iter()
            .map(|r| record_identifier(r, "messageId"))
            .collect();
        assert_eq!(ids, [Some("A"), None, None]);
    }

    #[test]
    fn test_record_batch_rejects_non_objects() {
        let payload = RawPayload::from("\"not an envelope\"");
        assert!(RecordBatch::decode(&payload, "queue envelope").is_err());
    }
}
