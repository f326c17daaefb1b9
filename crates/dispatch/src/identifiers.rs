//! Newtype identifiers for records and invocations.
//!
//! Queue messages and change-stream records are both identified by strings,
//! but the host runtime interprets them differently when it redrives a batch:
//! a [`MessageId`] names one queue message, an [`EventId`] names one change in
//! the stream. Keeping them as distinct types stops a change-stream failure
//! from ever being reported in a queue batch response (and vice versa).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), into_string(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the inner string.
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id! {
    /// Identifies one queue message within a queue envelope (`messageId`).
    ///
    /// Reported back to the host in a queue batch response so that only the
    /// failed message is made visible again.
    MessageId
}

string_id! {
    /// Identifies one change-stream record (`eventID`).
    ///
    /// Reported back to the host in a change-stream batch response; the host
    /// resumes the shard from the first reported record.
    EventId
}

string_id! {
    /// Identifies a single invocation of the dispatcher.
    ///
    /// Supplied by the host runtime when available; otherwise generated.
    RequestId
}

impl RequestId {
    /// Generates a random request identifier for invocations that did not
    /// arrive through a host runtime (tests, local runs).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}
