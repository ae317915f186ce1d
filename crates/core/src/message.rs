//! Record type delivered by a consumer client.

use serde::{Deserialize, Serialize};

/// A single record read from a topic partition.
///
/// Immutable once produced by the client; the poll loop only hands out
/// shared references to handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Optional record key (brokers use it for partition routing).
    pub key: Option<String>,

    /// Record payload.
    pub value: String,

    /// Partition the record was read from.
    pub partition: i32,

    /// Position of the record within its partition.
    pub offset: i64,
}
