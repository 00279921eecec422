//! Backend path conventions.
//!
//! Pure string functions — no HTTP dependency. These define the canonical
//! routes of the query API relative to its base URL.

use crate::models::QueryId;

pub const QUERIES: &str = "/queries";

pub const HEALTH: &str = "/health";

/// Detail route for one query. The id is percent-encoded.
pub fn query(id: &QueryId) -> String {
    format!("{QUERIES}/{}", urlencoding::encode(id.as_str()))
}

/// Listing route, with the optional page size the backend accepts.
pub fn queries(limit: Option<u32>) -> String {
    match limit {
        Some(limit) => format!("{QUERIES}?limit={limit}"),
        None => QUERIES.to_string(),
    }
}

/// Join a base URL and a route without doubling or dropping the slash.
pub fn join(base_url: &str, route: &str) -> String {
    format!("{}{route}", base_url.trim_end_matches('/'))
}
