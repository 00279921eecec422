use reqwest::{Client, StatusCode};
use tracing::debug;

use sqlagent_core::endpoints;
use sqlagent_core::models::{QueryDetail, QueryId, QueryRecord, ThreadId};

use crate::error::GatewayError;
use crate::http::check_response;
use crate::wire::{CreateQueryBody, WireHealth, WireListing, WireQuery};

/// Submit a natural-language question. `POST /queries`.
///
/// The backend runs the agent before answering, so this call lasts as long
/// as the query does.
pub async fn create_query(
    client: &Client,
    base_url: &str,
    question: &str,
    thread_id: Option<&ThreadId>,
) -> Result<QueryDetail, GatewayError> {
    let url = endpoints::join(base_url, endpoints::QUERIES);
    debug!(%url, thread_id = ?thread_id.map(ThreadId::as_str), "submitting query");

    let body = CreateQueryBody {
        question,
        thread_id: thread_id.map(ThreadId::as_str),
    };
    let resp = check_response(client.post(&url).json(&body).send().await?).await?;
    let wire: WireQuery = resp.json().await?;
    wire.into_detail()
}

/// List past queries, newest first. `GET /queries`.
///
/// Zero records is an empty vector, not an error.
pub async fn list_queries(
    client: &Client,
    base_url: &str,
    limit: Option<u32>,
) -> Result<Vec<QueryRecord>, GatewayError> {
    let url = endpoints::join(base_url, &endpoints::queries(limit));
    debug!(%url, "listing queries");

    let resp = check_response(client.get(&url).send().await?).await?;
    let listing: WireListing = resp.json().await?;
    listing.into_records()
}

/// Fetch one query's detail. `GET /queries/{id}`.
pub async fn get_query(
    client: &Client,
    base_url: &str,
    id: &QueryId,
) -> Result<QueryDetail, GatewayError> {
    let url = endpoints::join(base_url, &endpoints::query(id));
    debug!(%url, "fetching query detail");

    let resp = client.get(&url).send().await?;
    if resp.status() == StatusCode::NOT_FOUND {
        return Err(GatewayError::NotFound { id: id.clone() });
    }

    let resp = check_response(resp).await?;
    let wire: WireQuery = resp.json().await?;
    wire.into_detail()
}

/// Backend liveness. `GET /health`. Returns the reported status string.
pub async fn health(client: &Client, base_url: &str) -> Result<String, GatewayError> {
    let url = endpoints::join(base_url, endpoints::HEALTH);
    let resp = check_response(client.get(&url).send().await?).await?;
    let health: WireHealth = resp.json().await?;
    Ok(health.status)
}
