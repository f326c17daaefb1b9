//! Error types for classification, decoding and dispatch.
//!
//! [`DispatchError`] is what the host runtime sees when an invocation fails.
//! The host never learns which internal stage raised an error, so every
//! variant renders a message that names the stage and the offending source.
//!
//! Handler failures are the exception: they are passed through verbatim
//! ([`DispatchError::Handler`] is `#[error(transparent)]`) so the business
//! handler's own message is what surfaces.

use thiserror::Error;

/// Opaque failure returned by a business handler.
///
/// Same shape as the error type used by the Lambda runtime so handler errors
/// cross the host boundary without conversion.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

/// A payload, envelope or record could not be decoded into its typed shape.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The JSON was malformed or did not match the expected shape.
    #[error("failed to decode {target}: {source}")]
    Json {
        /// What was being decoded (e.g. `"queue envelope"`, `"topic message"`).
        target: &'static str,
        /// Underlying parser error.
        #[source]
        source: serde_json::Error,
    },

    /// A record lacks a field its payload is read from (e.g. a queue message
    /// without a `body`). Missing and empty values are treated alike.
    #[error("{target} has no '{field}'")]
    MissingField {
        /// What was being decoded (e.g. `"queue record"`).
        target: &'static str,
        /// Wire name of the missing field.
        field: &'static str,
    },

    /// A batch record carries no identifier, so its failure could not be
    /// reported on its own.
    #[error("batch record {index} has no '{field}' to report it by")]
    MissingIdentifier {
        /// Zero-based position of the record in the batch.
        index: usize,
        /// Wire name of the identifier field (`messageId` or `eventID`).
        field: &'static str,
    },

    /// A change-stream image did not map onto the request type (unparseable
    /// attribute value or shape mismatch).
    #[error("change-stream image does not match the request shape: {source}")]
    Image {
        /// Underlying attribute-value error.
        #[source]
        source: serde_dynamo::Error,
    },
}

impl DecodeError {
    pub(crate) fn json(target: &'static str, source: serde_json::Error) -> Self {
        Self::Json { target, source }
    }
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

/// Errors surfaced by [`crate::Dispatcher::event_handler`].
///
/// In batch mode only [`DispatchError::UnsupportedSource`],
/// [`DispatchError::InvalidBatchSource`] and envelope-level
/// [`DispatchError::Decode`] errors reach the caller; record-level failures
/// are folded into the batch report instead.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Decoding failed (malformed JSON, shape mismatch, image mapping).
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The payload was classified as a source with no dispatch path.
    #[error("invalid event: source '{tag}' has no dispatch path")]
    UnsupportedSource {
        /// The classified source tag (or the unrecognised literal tag).
        tag: String,
    },

    /// Batch mode was used with a source that cannot report partial failures.
    #[error("invalid batch event: source '{tag}' does not support partial batch failures")]
    InvalidBatchSource {
        /// The classified source tag (or the unrecognised literal tag).
        tag: String,
    },

    /// The business handler failed. The handler's error is returned unchanged.
    #[error(transparent)]
    Handler(HandlerError),
}

impl DispatchError {
    /// Returns `true` for failures scoped to a single record (decode and
    /// handler errors). Batch mode isolates these per record; anything else
    /// aborts the batch.
    pub fn is_record_level(&self) -> bool {
        match self {
            Self::Decode(DecodeError::MissingIdentifier { .. }) => false,
            Self::Decode(_) | Self::Handler(_) => true,
            Self::UnsupportedSource { .. } | Self::InvalidBatchSource { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_message_is_passed_through() {
        let err = DispatchError::Handler("oops".into());
        assert_eq!(err.to_string(), "oops");
        assert!(err.is_record_level());
    }

    #[test]
    fn test_source_errors_carry_the_canonical_prefixes() {
        let unsupported = DispatchError::UnsupportedSource {
            tag: "aws:s3".to_string(),
        };
        let batch = DispatchError::InvalidBatchSource {
            tag: "aws:cw".to_string(),
        };

        assert!(unsupported.to_string().starts_with("invalid event"));
        assert!(batch.to_string().starts_with("invalid batch event"));
        assert!(!unsupported.is_record_level());
        assert!(!batch.is_record_level());
    }

    #[test]
    fn test_decode_error_names_its_target() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = DispatchError::from(DecodeError::json("queue envelope", source));
        assert!(err.to_string().starts_with("failed to decode queue envelope"));
        assert!(err.is_record_level());
    }

    #[test]
    fn test_missing_identifier_is_not_record_level() {
        let err = DispatchError::from(DecodeError::MissingIdentifier {
            index: 3,
            field: "messageId",
        });
        assert_eq!(err.to_string(), "batch record 3 has no 'messageId' to report it by");
        assert!(!err.is_record_level());
    }
}
