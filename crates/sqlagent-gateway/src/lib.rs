//! sqlagent-gateway
//!
//! Remote query gateway: the three network operations against the query
//! API, plus a health check. Thin wrapper around `reqwest`; no retries and
//! no caching.
//!
//! Public API:
//! - [`queries`] — stateless route functions taking a client and base URL
//! - [`QueryGateway`] — the seam the session layer is generic over
//! - [`HttpGateway`] — the production implementation

use std::future::Future;

pub mod client;
pub mod error;
pub mod http;
pub mod queries;
pub mod wire;

pub use crate::client::{GatewayConfig, build_client};
pub use crate::error::GatewayError;

use sqlagent_core::models::{QueryDetail, QueryId, QueryRecord, ThreadId};

/// The three backend operations the session layer depends on.
///
/// Every failure is surfaced unchanged to the caller.
pub trait QueryGateway: Send + Sync {
    fn submit(
        &self,
        question: &str,
        thread_id: Option<&ThreadId>,
    ) -> impl Future<Output = Result<QueryDetail, GatewayError>> + Send;

    fn list_history(&self) -> impl Future<Output = Result<Vec<QueryRecord>, GatewayError>> + Send;

    fn fetch_detail(
        &self,
        id: &QueryId,
    ) -> impl Future<Output = Result<QueryDetail, GatewayError>> + Send;
}

/// [`QueryGateway`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    history_limit: Option<u32>,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            http: build_client(config.timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            history_limit: config.history_limit,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<String, GatewayError> {
        queries::health(&self.http, &self.base_url).await
    }
}

impl QueryGateway for HttpGateway {
    async fn submit(
        &self,
        question: &str,
        thread_id: Option<&ThreadId>,
    ) -> Result<QueryDetail, GatewayError> {
        queries::create_query(&self.http, &self.base_url, question, thread_id).await
    }

    async fn list_history(&self) -> Result<Vec<QueryRecord>, GatewayError> {
        queries::list_queries(&self.http, &self.base_url, self.history_limit).await
    }

    async fn fetch_detail(&self, id: &QueryId) -> Result<QueryDetail, GatewayError> {
        queries::get_query(&self.http, &self.base_url, id).await
    }
}
