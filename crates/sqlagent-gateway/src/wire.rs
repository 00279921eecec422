//! Wire shapes of the query API and their conversion into domain types.
//!
//! Timestamps stay strings here and are parsed exactly once, when a wire
//! record becomes a [`QueryRecord`] or [`QueryDetail`].

use jiff::Timestamp;
use jiff::civil::DateTime;
use jiff::tz::TimeZone;
use serde::{Deserialize, Serialize};

use sqlagent_core::models::{QueryDetail, QueryId, QueryRecord, QueryStatus, ThreadId};

use crate::error::GatewayError;

#[derive(Debug, Serialize)]
pub(crate) struct CreateQueryBody<'a> {
    pub question: &'a str,
    pub thread_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireQuery {
    id: String,
    question: String,
    status: QueryStatus,
    created_at: String,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    response_text: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(default)]
    latency_seconds: Option<f64>,
    #[serde(default)]
    raw_result: Option<serde_json::Value>,
}

/// The listing is either a bare array or the backend's page envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireListing {
    Bare(Vec<WireQuery>),
    Page {
        items: Vec<WireQuery>,
        #[serde(default)]
        #[allow(dead_code)]
        count: Option<u64>,
    },
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireHealth {
    pub status: String,
}

impl WireListing {
    pub fn into_records(self) -> Result<Vec<QueryRecord>, GatewayError> {
        let items = match self {
            WireListing::Bare(items) => items,
            WireListing::Page { items, .. } => items,
        };
        items.into_iter().map(WireQuery::into_record).collect()
    }
}

impl WireQuery {
    pub fn into_record(self) -> Result<QueryRecord, GatewayError> {
        Ok(QueryRecord {
            created_at: parse_timestamp(&self.created_at)?,
            id: QueryId::from(self.id),
            question: self.question,
            status: self.status,
        })
    }

    pub fn into_detail(self) -> Result<QueryDetail, GatewayError> {
        let updated_at = self.updated_at.as_deref().map(parse_timestamp).transpose()?;
        Ok(QueryDetail {
            created_at: parse_timestamp(&self.created_at)?,
            id: QueryId::from(self.id),
            question: self.question,
            status: self.status,
            response_text: self.response_text,
            error_message: self.error_message,
            thread_id: self.thread_id.filter(|t| !t.is_empty()).map(ThreadId::from),
            latency_seconds: self.latency_seconds,
            updated_at,
            raw_result: self.raw_result,
        })
    }
}

/// Parse an ISO-8601 timestamp. Values without an offset are taken as UTC,
/// which is how the backend stores them.
pub fn parse_timestamp(value: &str) -> Result<Timestamp, GatewayError> {
    if let Ok(ts) = value.parse::<Timestamp>() {
        return Ok(ts);
    }

    value
        .parse::<DateTime>()
        .and_then(|dt| dt.to_zoned(TimeZone::UTC))
        .map(|zoned| zoned.timestamp())
        .map_err(|e| GatewayError::InvalidResponse(format!("bad timestamp {value:?}: {e}")))
}
