//! Remote wire shapes and the gateway/uploader contracts.
//!
//! The remote service speaks snake_case; these DTOs serialize with their Rust
//! field names, which is the exact wire mapping. Local domain models rename
//! to camelCase. Both mappings are part of the contract surface.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::spots::{SpotLicense, SpotPrivacy, SpotStatus};

/// GeoJSON-style point. Coordinates are `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [longitude, latitude],
        }
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }
}

/// Stored remote spot row; the service assigns identity and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSpot {
    pub id: String,
    pub owner_id: String,
    pub client_token: Option<String>,
    pub title: String,
    pub geo: Option<GeoPoint>,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<i32>,
    pub elevation: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub difficulty: i32,
    pub privacy: SpotPrivacy,
    pub license: SpotLicense,
    pub status: SpotStatus,
    pub votes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a remote spot. The coordinate travels both as a
/// structured geo point and as raw scalars; some remote consumers read one,
/// some the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteNewSpot {
    pub owner_id: String,
    pub client_token: String,
    pub title: String,
    pub geo: GeoPoint,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<i32>,
    pub elevation: Option<i32>,
    pub tags: Vec<String>,
    pub difficulty: i32,
    pub privacy: SpotPrivacy,
    pub license: SpotLicense,
    pub status: SpotStatus,
    pub votes: i32,
}

/// Partial update for a remote spot. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteSpotUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy: Option<SpotPrivacy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<SpotLicense>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SpotStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<i32>,
}

/// Stored remote media row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSpotMedia {
    pub id: String,
    pub spot_id: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub asset_id: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a remote media row linked to a spot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteNewSpotMedia {
    pub spot_id: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub asset_id: Option<String>,
    pub captured_at: DateTime<Utc>,
}

/// Stored remote sun snapshot row. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSunSnapshot {
    pub id: String,
    pub spot_id: String,
    pub date: NaiveDate,
    pub sunrise_at: DateTime<Utc>,
    pub sunset_at: DateTime<Utc>,
    pub golden_hour_start: DateTime<Utc>,
    pub golden_hour_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Result of one binary asset upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    pub id: String,
    pub url: String,
    pub secure_url: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub thumbnail_url: String,
    pub optimized_url: String,
}

/// Typed CRUD + filter operations against the remote entity tables.
///
/// `updated_since` filtering is inclusive-or-later and honored server-side.
/// Sun snapshots do not support it; their fetch is a full scan scoped by
/// parent spot.
#[async_trait]
pub trait RemoteGatewayTrait: Send + Sync {
    async fn create_spot(&self, spot: RemoteNewSpot) -> Result<RemoteSpot>;

    /// Resolve a previously created spot by its client idempotency token.
    async fn find_spot_by_client_token(&self, token: &str) -> Result<Option<RemoteSpot>>;

    /// Active spots changed at or after `updated_since` (all active spots
    /// when `None`), newest first, bounded by `limit`.
    async fn fetch_spots_updated_since(
        &self,
        updated_since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<RemoteSpot>>;

    async fn update_spot(&self, id: &str, update: RemoteSpotUpdate) -> Result<RemoteSpot>;

    /// Soft delete: flips the status field, never removes the row.
    async fn delete_spot(&self, id: &str) -> Result<()>;

    async fn create_media(&self, media: RemoteNewSpotMedia) -> Result<RemoteSpotMedia>;

    async fn fetch_media_for_spot(
        &self,
        spot_id: &str,
        updated_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteSpotMedia>>;

    async fn fetch_sun_snapshots_for_spot(&self, spot_id: &str) -> Result<Vec<RemoteSunSnapshot>>;
}

/// Binary asset storage. At-least-once: duplicate uploads of identical
/// content are acceptable; dedup, if desired, is the caller's concern.
#[async_trait]
pub trait AssetUploaderTrait: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, owner_hint: &str) -> Result<UploadResult>;
}
