//! Typed REST gateway for the remote entity tables.
//!
//! The remote API is PostgREST-shaped: filter predicates travel as query
//! parameters (`eq.`, `gte.`, `order`, `limit`) and create/update return the
//! stored representation when asked via the `Prefer` header.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;

use skyspot_core::sync::{
    RemoteGatewayTrait, RemoteNewSpot, RemoteNewSpotMedia, RemoteSpot, RemoteSpotMedia,
    RemoteSpotUpdate, RemoteSunSnapshot,
};

use crate::config::RemoteConfig;
use crate::error::{RemoteError, Result};

const SPOTS_TABLE: &str = "spots";
const SPOT_MEDIA_TABLE: &str = "spot_media";
const SUN_SNAPSHOTS_TABLE: &str = "sun_snapshots";
const MAX_LOG_BODY_CHARS: usize = 512;

/// Error payload shape returned by the remote service.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// `eq.` filter value.
fn eq_filter(value: &str) -> String {
    format!("eq.{}", value)
}

/// Inclusive-or-later `gte.` filter on a timestamp column.
fn updated_since_filter(since: DateTime<Utc>) -> String {
    format!("gte.{}", since.to_rfc3339())
}

/// Client for the remote entity tables.
#[derive(Debug, Clone)]
pub struct RemoteGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RemoteGateway {
    /// Create a new gateway from the remote configuration.
    pub fn new(config: &RemoteConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Headers common to every API request.
    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let api_key_value = HeaderValue::from_str(&self.api_key)
            .map_err(|_| RemoteError::invalid_request("Invalid API key format"))?;
        headers.insert("apikey", api_key_value);

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| RemoteError::invalid_request("Invalid API key format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        Ok(headers)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    /// Parse a JSON response body, decoding the service's error shape on
    /// non-success statuses.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                let code = error.code.unwrap_or_default();
                return Err(RemoteError::api(
                    status.as_u16(),
                    format!("{}: {}", code, error.message),
                ));
            }
            return Err(RemoteError::api(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "Failed to deserialize response. Body: {}, Error: {}",
                body,
                e
            );
            RemoteError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    /// POST one row and return the stored representation.
    async fn create_row<T, B>(&self, table: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let response = self
            .client
            .post(self.table_url(table))
            .headers(self.headers()?)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let mut rows: Vec<T> = Self::parse_response(response).await?;
        if rows.is_empty() {
            return Err(RemoteError::invalid_request(format!(
                "Create on '{}' returned no representation",
                table
            )));
        }
        Ok(rows.remove(0))
    }

    async fn fetch_rows<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let response = self
            .client
            .get(self.table_url(table))
            .headers(self.headers()?)
            .query(query)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn fetch_spots_impl(
        &self,
        updated_since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<RemoteSpot>> {
        let mut query = vec![
            ("status", eq_filter("active")),
            ("order", "updated_at.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(since) = updated_since {
            query.push(("updated_at", updated_since_filter(since)));
        }
        self.fetch_rows(SPOTS_TABLE, &query).await
    }

    async fn update_spot_impl(&self, id: &str, update: &RemoteSpotUpdate) -> Result<RemoteSpot> {
        let response = self
            .client
            .patch(self.table_url(SPOTS_TABLE))
            .headers(self.headers()?)
            .header("Prefer", "return=representation")
            .query(&[("id", eq_filter(id))])
            .json(update)
            .send()
            .await?;
        let rows: Vec<RemoteSpot> = Self::parse_response(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RemoteError::api(404, format!("Spot {} not found", id)))
    }

    /// Soft delete: flip the status field rather than removing the row.
    async fn delete_spot_impl(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .patch(self.table_url(SPOTS_TABLE))
            .headers(self.headers()?)
            .query(&[("id", eq_filter(id))])
            .json(&serde_json::json!({ "status": "deleted" }))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await?;
        Self::log_response(status, &body);
        Err(RemoteError::api(status.as_u16(), body))
    }
}

#[async_trait]
impl RemoteGatewayTrait for RemoteGateway {
    async fn create_spot(&self, spot: RemoteNewSpot) -> skyspot_core::Result<RemoteSpot> {
        Ok(self.create_row(SPOTS_TABLE, &spot).await?)
    }

    async fn find_spot_by_client_token(
        &self,
        token: &str,
    ) -> skyspot_core::Result<Option<RemoteSpot>> {
        let query = [
            ("client_token", eq_filter(token)),
            ("limit", "1".to_string()),
        ];
        let rows: Vec<RemoteSpot> = self.fetch_rows(SPOTS_TABLE, &query).await?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_spots_updated_since(
        &self,
        updated_since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> skyspot_core::Result<Vec<RemoteSpot>> {
        Ok(self.fetch_spots_impl(updated_since, limit).await?)
    }

    async fn update_spot(
        &self,
        id: &str,
        update: RemoteSpotUpdate,
    ) -> skyspot_core::Result<RemoteSpot> {
        Ok(self.update_spot_impl(id, &update).await?)
    }

    async fn delete_spot(&self, id: &str) -> skyspot_core::Result<()> {
        Ok(self.delete_spot_impl(id).await?)
    }

    async fn create_media(
        &self,
        media: RemoteNewSpotMedia,
    ) -> skyspot_core::Result<RemoteSpotMedia> {
        Ok(self.create_row(SPOT_MEDIA_TABLE, &media).await?)
    }

    async fn fetch_media_for_spot(
        &self,
        spot_id: &str,
        updated_since: Option<DateTime<Utc>>,
    ) -> skyspot_core::Result<Vec<RemoteSpotMedia>> {
        let mut query = vec![("spot_id", eq_filter(spot_id))];
        if let Some(since) = updated_since {
            query.push(("updated_at", updated_since_filter(since)));
        }
        Ok(self.fetch_rows(SPOT_MEDIA_TABLE, &query).await?)
    }

    async fn fetch_sun_snapshots_for_spot(
        &self,
        spot_id: &str,
    ) -> skyspot_core::Result<Vec<RemoteSunSnapshot>> {
        // No updated_since support on this table: full fetch scoped by parent.
        let query = [("spot_id", eq_filter(spot_id))];
        Ok(self.fetch_rows(SUN_SNAPSHOTS_TABLE, &query).await?)
    }
}
