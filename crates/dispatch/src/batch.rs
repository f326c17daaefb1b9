//! Partial batch failure reports.
//!
//! The reports are the host's own response types, so they serialise in the
//! shape the host expects (`{"batchItemFailures": [{"itemIdentifier": "..."}]}`)
//! and the host redrives only the listed records. An empty list means every
//! record succeeded and is serialised as `[]`, never `null`.
//!
//! Queue and change-stream reports stay distinct types: a [`QueueBatchReport`]
//! only accepts [`MessageId`]s and a [`ChangeStreamBatchReport`] only
//! [`EventId`]s.

use aws_lambda_events::event::sqs::{BatchItemFailure, SqsBatchResponse};
use aws_lambda_events::event::streams::{DynamoDbBatchItemFailure, DynamoDbEventResponse};
use serde::Serialize;

use crate::identifiers::{EventId, MessageId};

/// Failure report for a queue batch, keyed by message id.
pub type QueueBatchReport = SqsBatchResponse;

/// Failure report for a change-stream batch, keyed by event id.
pub type ChangeStreamBatchReport = DynamoDbEventResponse;

/// Common surface of the batch failure reports.
pub trait BatchReport: Default + Serialize {
    /// Identifier type of the records this report lists.
    type Id;

    /// Appends a failed record. Call in input order.
    fn record_failure(&mut self, id: Self::Id);

    /// The failed identifiers, in input order.
    fn failed_ids(&self) -> Vec<&str>;

    /// Number of failed records.
    fn len(&self) -> usize {
        self.failed_ids().len()
    }

    /// Returns `true` if no record failed.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BatchReport for SqsBatchResponse {
    type Id = MessageId;

    fn record_failure(&mut self, id: MessageId) {
        let mut failure = BatchItemFailure::default();
        failure.item_identifier = id.into_string();
        self.batch_item_failures.push(failure);
    }

    fn failed_ids(&self) -> Vec<&str> {
        self.batch_item_failures
            .iter()
            .map(|f| f.item_identifier.as_str())
            .collect()
    }
}

impl BatchReport for DynamoDbEventResponse {
    type Id = EventId;

    fn record_failure(&mut self, id: EventId) {
        let mut failure = DynamoDbBatchItemFailure::default();
        failure.item_identifier = Some(id.into_string());
        self.batch_item_failures.push(failure);
    }

    fn failed_ids(&self) -> Vec<&str> {
        self.batch_item_failures
            .iter()
            .filter_map(|f| f.item_identifier.as_deref())
            .collect()
    }
}
