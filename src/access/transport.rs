//! HTTP transport for the upstream hazard-data provider
//!
//! Defines the logical endpoints, the injectable `Transport` seam, and the
//! reqwest-backed production implementation. Connect failures and timeouts map to
//! network errors (retryable); success bodies that fail to decode as JSON map to
//! validation errors (not retryable), while error-status bodies are never required
//! to decode.

use crate::Result;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use std::time::Duration;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Logical upstream endpoints
///
/// The cache and rate limiter key on the logical endpoint, not the URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Active cyclone track
    CycloneTrack,
    /// Per-district risk measurements
    DistrictRisks,
    /// Official advisories
    Advisories,
    /// Shelter locations and capacity
    Shelters,
    /// Route hazard analysis between two points
    RouteAnalysis { source: String, destination: String },
    /// Aggregate summary of all hazards
    Summary,
}

impl Endpoint {
    /// Request path relative to the provider's base URL
    pub fn path(&self) -> String {
        match self {
            Endpoint::CycloneTrack => "/api/cyclone/track".to_string(),
            Endpoint::DistrictRisks => "/api/districts/risk".to_string(),
            Endpoint::Advisories => "/api/advisories".to_string(),
            Endpoint::Shelters => "/api/shelters".to_string(),
            Endpoint::RouteAnalysis {
                source,
                destination,
            } => format!(
                "/api/routes/analysis?from={}&to={}",
                urlencoding::encode(source),
                urlencoding::encode(destination)
            ),
            Endpoint::Summary => "/api/summary".to_string(),
        }
    }

    /// Logical key used by the cache store and rate limiter
    pub fn key(&self) -> String {
        match self {
            Endpoint::CycloneTrack => "cyclone_track".to_string(),
            Endpoint::DistrictRisks => "district_risks".to_string(),
            Endpoint::Advisories => "advisories".to_string(),
            Endpoint::Shelters => "shelters".to_string(),
            Endpoint::RouteAnalysis {
                source,
                destination,
            } => format!("route_analysis:{}:{}", source, destination),
            Endpoint::Summary => "summary".to_string(),
        }
    }

    /// The four always-refreshed dashboard resources
    pub fn dashboard_resources() -> [Endpoint; 4] {
        [
            Endpoint::CycloneTrack,
            Endpoint::DistrictRisks,
            Endpoint::Advisories,
            Endpoint::Shelters,
        ]
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Response from one transport round-trip
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Value,
}

/// Injectable transport seam
///
/// Returns `Err(Network)` when no response was obtained at all; any response with
/// a status code resolves to `Ok`, leaving status interpretation to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, path: &str) -> Result<TransportResponse>;
}

/// Production transport over reqwest
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport against the given base URL
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers({
                let mut headers = header::HeaderMap::new();
                headers.insert(
                    header::USER_AGENT,
                    header::HeaderValue::from_static("stormdeck/0.3"),
                );
                headers.insert(
                    header::ACCEPT,
                    header::HeaderValue::from_static("application/json"),
                );
                headers
            })
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, path: &str) -> Result<TransportResponse> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Dispatching request");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                crate::StormdeckError::Network(format!("{}: {}", url, e))
            } else {
                crate::StormdeckError::Http(e)
            }
        })?;

        let status = response.status().as_u16();
        // Only success bodies are about to be trusted as data. Error responses
        // often carry HTML from a proxy or crashed upstream; their body is
        // irrelevant to status classification, so decode failures collapse to null
        // instead of masking a retryable status as a validation error.
        let body = if status == 204 {
            Value::Null
        } else if (200..300).contains(&status) {
            response.json::<Value>().await.map_err(|e| {
                crate::StormdeckError::Validation(format!("undecodable body from {}: {}", url, e))
            })?
        } else {
            response.json::<Value>().await.unwrap_or(Value::Null)
        };

        Ok(TransportResponse { status, body })
    }
}
