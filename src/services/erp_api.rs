//! HTTP client for the remote ERP REST API.
//!
//! Every listing endpoint is paginated and the whole API sits behind one
//! per-credential rate limit, so callers are expected to route requests
//! through [`crate::services::rate_limiter::RateLimiter`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::services::credentials::ApiCredential;

/// Remote resources the sync touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErpResource {
    Invoices,
    Receivables,
    SalesOrders,
    Products,
}

impl ErpResource {
    pub fn path(&self) -> &'static str {
        match self {
            ErpResource::Invoices => "invoices",
            ErpResource::Receivables => "accounts-receivable",
            ErpResource::SalesOrders => "sales-orders",
            ErpResource::Products => "products",
        }
    }
}

/// Date-range filters applied to listing endpoints.
#[derive(Debug, Clone, Default)]
pub struct PageFilters {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct PageResponse {
    pub items: Vec<serde_json::Value>,
    pub total_pages: u32,
}

#[derive(Debug, Error)]
pub enum ErpApiError {
    /// 429-shaped response; `retry_after` is already parsed from the header
    /// when the remote sent one.
    #[error("rate limited by ERP API (status {status})")]
    RateLimited {
        status: u16,
        retry_after: Option<Duration>,
    },
    #[error("ERP API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected ERP payload: {0}")]
    Decode(String),
}

impl ErpApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ErpApiError::RateLimited { .. })
    }
}

#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Fetch one page of a listing. `page` is 1-based.
    async fn fetch_page(
        &self,
        credential: &ApiCredential,
        resource: ErpResource,
        filters: &PageFilters,
        page: u32,
    ) -> Result<PageResponse, ErpApiError>;

    /// Fetch the full detail payload of one record.
    async fn fetch_detail(
        &self,
        credential: &ApiCredential,
        resource: ErpResource,
        id: &str,
    ) -> Result<serde_json::Value, ErpApiError>;
}

// The ERP wraps listings in a small envelope; field names vary between
// endpoint generations, hence the aliases.
#[derive(Debug, Deserialize)]
struct PageEnvelope {
    #[serde(default, alias = "items")]
    data: Vec<serde_json::Value>,
    #[serde(default = "one_page", alias = "totalPages", alias = "pages")]
    total_pages: u32,
}

fn one_page() -> u32 {
    1
}

#[derive(Clone)]
pub struct ErpClient {
    client: Client,
    base_url: String,
}

impl ErpClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn check_status(response: Response) -> Result<Response, ErpApiError> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(ErpApiError::RateLimited {
                status: status.as_u16(),
                retry_after,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ErpApiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl RemoteApi for ErpClient {
    async fn fetch_page(
        &self,
        credential: &ApiCredential,
        resource: ErpResource,
        filters: &PageFilters,
        page: u32,
    ) -> Result<PageResponse, ErpApiError> {
        let url = format!("{}/{}", self.base_url, resource.path());

        let mut query: Vec<(&str, String)> = vec![("page", page.to_string())];
        if let Some(start) = filters.start_date {
            query.push(("start_date", start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = filters.end_date {
            query.push(("end_date", end.format("%Y-%m-%d").to_string()));
        }

        tracing::debug!("Fetching {} page {}", resource.path(), page);

        let response = self
            .client
            .get(&url)
            .bearer_auth(credential.token())
            .header("accept", "application/json")
            .query(&query)
            .send()
            .await?;

        let response = Self::check_status(response).await?;

        let envelope: PageEnvelope = response
            .json()
            .await
            .map_err(|e| ErpApiError::Decode(e.to_string()))?;

        Ok(PageResponse {
            items: envelope.data,
            total_pages: envelope.total_pages,
        })
    }

    async fn fetch_detail(
        &self,
        credential: &ApiCredential,
        resource: ErpResource,
        id: &str,
    ) -> Result<serde_json::Value, ErpApiError> {
        let url = format!("{}/{}/{}", self.base_url, resource.path(), id);

        tracing::debug!("Fetching {} detail {}", resource.path(), id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(credential.token())
            .header("accept", "application/json")
            .send()
            .await?;

        let response = Self::check_status(response).await?;

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ErpApiError::Decode(e.to_string()))?;

        // Detail endpoints wrap the record in {"data": {...}} on newer
        // API versions and return it bare on older ones.
        match payload {
            serde_json::Value::Object(mut map) if map.contains_key("data") => {
                Ok(map.remove("data").unwrap_or(serde_json::Value::Null))
            }
            other => Ok(other),
        }
    }
}

/// Parse a Retry-After header value: either delta-seconds or an HTTP-date.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc) - Utc::now();
    match delta.to_std() {
        Ok(d) => Some(d),
        // Date already passed; retry immediately
        Err(_) => Some(Duration::ZERO),
    }
}
