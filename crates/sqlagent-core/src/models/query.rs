use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::{QueryId, ThreadId};

/// Lifecycle of a query as reported by the backend.
///
/// Only the server moves a record between states; the client displays
/// whatever was last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Pending,
    Running,
    #[serde(alias = "success")]
    Succeeded,
    Failed,
}

impl QueryStatus {
    /// `succeeded` and `failed` are final; everything else may still move.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one query, as listed in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: QueryId,
    pub question: String,
    pub status: QueryStatus,
    pub created_at: jiff::Timestamp,
}

/// Full representation of one query and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDetail {
    pub id: QueryId,
    pub question: String,
    pub status: QueryStatus,
    pub created_at: jiff::Timestamp,
    /// Present only once the query succeeded.
    pub response_text: Option<String>,
    /// Present only once the query failed.
    pub error_message: Option<String>,
    pub thread_id: Option<ThreadId>,
    pub latency_seconds: Option<f64>,
    pub updated_at: Option<jiff::Timestamp>,
    /// Opaque agent output kept by the backend for tracing.
    pub raw_result: Option<serde_json::Value>,
}

impl QueryDetail {
    /// Summary-level detail for a record seen only in a listing.
    pub fn from_record(record: QueryRecord) -> Self {
        Self {
            id: record.id,
            question: record.question,
            status: record.status,
            created_at: record.created_at,
            response_text: None,
            error_message: None,
            thread_id: None,
            latency_seconds: None,
            updated_at: None,
            raw_result: None,
        }
    }

    pub fn summary(&self) -> QueryRecord {
        QueryRecord {
            id: self.id.clone(),
            question: self.question.clone(),
            status: self.status,
            created_at: self.created_at,
        }
    }
}
