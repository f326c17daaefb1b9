//! Event-source classification.
//!
//! Payloads arrive without an explicit type tag. The source is guessed from
//! the payload's shape using a short, ordered list of rules: the first rule
//! that matches decides, and a payload that matches nothing is treated as a
//! synchronous request. No schema validation backs up the guess, so the rule
//! order in [`RULES`] is the whole basis of correctness.
//!
//! | Order | JSON pointer | Rule |
//! |-------|--------------|------|
//! | 1 | `/Records/0/eventSource` | tag value mapped to a source |
//! | 2 | `/Records/0/EventSource` | tag value mapped to a source (topic records) |
//! | 3 | `/source` | presence alone means [`EventSource::ScheduledDetail`] |
//! | - | (none) | [`EventSource::SyncRequest`] |

use serde_json::Value;

use crate::decode::RawPayload;

// ---------------------------------------------------------------------------
// Source tags
// ---------------------------------------------------------------------------

/// The closed set of payload origins the dispatcher knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    /// Queue messages (`aws:sqs`). Batchable, identified by message id.
    Queue,
    /// Topic notifications (`aws:sns`).
    Topic,
    /// Change-stream records (`aws:dynamodb`). Batchable, identified by event id.
    ChangeStream,
    /// Object-store notifications (`aws:s3`). Recognised but never dispatched.
    ObjectStore,
    /// Scheduled or alert events carrying a single `detail` payload.
    ScheduledDetail,
    /// Synchronous request/response; the whole payload is the request.
    SyncRequest,
}

impl EventSource {
    /// Every source, in declaration order.
    pub const ALL: [EventSource; 6] = [
        EventSource::Queue,
        EventSource::Topic,
        EventSource::ChangeStream,
        EventSource::ObjectStore,
        EventSource::ScheduledDetail,
        EventSource::SyncRequest,
    ];

    /// Canonical wire tag for this source.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Queue => "aws:sqs",
            Self::Topic => "aws:sns",
            Self::ChangeStream => "aws:dynamodb",
            Self::ObjectStore => "aws:s3",
            Self::ScheduledDetail => "aws:cw",
            Self::SyncRequest => "aws:apigw",
        }
    }

    /// Maps a records-array tag value to a source.
    ///
    /// Only the four sources that carry their tag inside `Records` are
    /// matched; the scheduled and sync tags never appear on the wire.
    pub fn from_record_tag(tag: &str) -> Option<Self> {
        match tag {
            "aws:sqs" => Some(Self::Queue),
            "aws:sns" => Some(Self::Topic),
            "aws:dynamodb" => Some(Self::ChangeStream),
            "aws:s3" => Some(Self::ObjectStore),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

// ---------------------------------------------------------------------------
// Classification result
// ---------------------------------------------------------------------------

/// Outcome of classifying a payload.
///
/// A records-array tag that does not map to a known source is kept rather
/// than rejected: classification never fails, and the unmarshal stage turns
/// it into an "invalid event" error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The payload matched a known source.
    Source(EventSource),
    /// The payload carried a records-array tag with an unknown value.
    Unrecognized(String),
}

impl Classification {
    /// Returns the known source, if any.
    pub fn source(&self) -> Option<EventSource> {
        match self {
            Self::Source(source) => Some(*source),
            Self::Unrecognized(_) => None,
        }
    }

    /// Returns the tag used in diagnostics: the canonical tag for known
    /// sources, the literal value otherwise.
    pub fn tag(&self) -> &str {
        match self {
            Self::Source(source) => source.tag(),
            Self::Unrecognized(tag) => tag,
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// What a matching rule concludes.
#[derive(Debug, Clone, Copy)]
enum Verdict {
    /// The value at the pointer is a source tag.
    SourceTag,
    /// The presence of the pointer alone selects the given source.
    Presence(EventSource),
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    pointer: &'static str,
    verdict: Verdict,
}

impl Rule {
    fn evaluate(&self, payload: &Value) -> Option<Classification> {
        let found = payload.pointer(self.pointer)?;
        match self.verdict {
            Verdict::SourceTag => {
                let tag = match found {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some(match EventSource::from_record_tag(&tag) {
                    Some(source) => Classification::Source(source),
                    None => Classification::Unrecognized(tag),
                })
            }
            Verdict::Presence(source) => Some(Classification::Source(source)),
        }
    }
}

/// Rules in priority order. Records-array tags come before the scheduled
/// `source` field.
const RULES: [Rule; 3] = [
    Rule {
        pointer: "/Records/0/eventSource",
        verdict: Verdict::SourceTag,
    },
    Rule {
        pointer: "/Records/0/EventSource",
        verdict: Verdict::SourceTag,
    },
    Rule {
        pointer: "/source",
        verdict: Verdict::Presence(EventSource::ScheduledDetail),
    },
];

/// Classifies a raw payload.
///
/// Payloads that are not valid JSON match no rule and classify as
/// [`EventSource::SyncRequest`]; decoding them then fails on the sync path.
pub fn classify(raw: &RawPayload) -> Classification {
    match raw.parse() {
        Some(payload) => classify_value(&payload),
        None => Classification::Source(EventSource::SyncRequest),
    }
}

/// Classifies an already-parsed payload.
pub fn classify_value(payload: &Value) -> Classification {
    RULES
        .iter()
        .find_map(|rule| rule.evaluate(payload))
        .unwrap_or(Classification::Source(EventSource::SyncRequest))
}

/// Classifies a raw payload, returning `None` for unrecognised tags.
pub fn classify_source(raw: &RawPayload) -> Option<EventSource> {
    classify(raw).source()
}
