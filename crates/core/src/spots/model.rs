//! Spot domain models shared between the local store and the sync engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fallback coordinate substituted when a remote record carries an invalid
/// location (non-finite or out of range). Golden Gate Park, San Francisco.
pub const FALLBACK_LATITUDE: f64 = 37.7749;
pub const FALLBACK_LONGITUDE: f64 = -122.4194;

/// Returns true when both values are finite and inside [-90, 90] / [-180, 180].
pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// Spot visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpotPrivacy {
    Public,
    Unlisted,
    Private,
}

/// License attached to a spot's media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpotLicense {
    AllRights,
    CcBy,
    CcByNc,
}

/// Lifecycle status. Remote deletion is soft: the status flips to `Deleted`
/// rather than the row being removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpotStatus {
    Active,
    Draft,
    Deleted,
}

/// Where a media item's bytes live, and with it the item's sync state.
///
/// `LocalPending` bytes sit in the on-device image cache under `cache_key`;
/// `Uploaded` bytes are durably retrievable at `url`. An item never reverts
/// to `LocalPending` once uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MediaState {
    LocalPending { cache_key: String },
    Uploaded { url: String },
}

impl MediaState {
    pub fn is_local_pending(&self) -> bool {
        matches!(self, Self::LocalPending { .. })
    }

    /// Cache key while the item is still pending upload.
    pub fn cache_key(&self) -> Option<&str> {
        match self {
            Self::LocalPending { cache_key } => Some(cache_key),
            Self::Uploaded { .. } => None,
        }
    }

    /// Remote URL once uploaded.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Uploaded { url } => Some(url),
            Self::LocalPending { .. } => None,
        }
    }
}

/// A photo (or video frame) attached to a spot. The spot owns its media;
/// `spot_id` is a back-reference only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotMedia {
    pub id: String,
    pub spot_id: String,
    pub remote_id: Option<String>,
    pub state: MediaState,
    pub thumbnail_url: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl SpotMedia {
    /// New locally captured media whose bytes live in the image cache.
    pub fn new_local(spot_id: impl Into<String>, cache_key: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            spot_id: spot_id.into(),
            remote_id: None,
            state: MediaState::LocalPending {
                cache_key: cache_key.into(),
            },
            thumbnail_url: None,
            captured_at: Utc::now(),
            last_synced_at: None,
        }
    }
}

/// A scenic photo spot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spot {
    pub id: String,
    /// Service-of-record identity; assigned exactly once, immutable after.
    pub remote_id: Option<String>,
    /// Client-generated idempotency token, fixed at creation. The remote
    /// create treats a duplicate token as a conflict resolved by fetch.
    pub client_token: String,
    pub title: String,
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
    pub is_local_only: bool,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub media: Vec<SpotMedia>,
}

impl Spot {
    /// New locally created spot, not yet known to the remote store.
    pub fn new_local(title: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            remote_id: None,
            client_token: Uuid::new_v4().to_string(),
            title: title.into(),
            latitude,
            longitude,
            heading: None,
            elevation: None,
            tags: Vec::new(),
            difficulty: 1,
            privacy: SpotPrivacy::Public,
            license: SpotLicense::AllRights,
            status: SpotStatus::Active,
            votes: 0,
            is_local_only: true,
            published: false,
            created_at: now,
            updated_at: now,
            last_synced_at: None,
            media: Vec::new(),
        }
    }

    /// Media items still waiting for upload.
    pub fn pending_media(&self) -> impl Iterator<Item = &SpotMedia> {
        self.media.iter().filter(|m| m.state.is_local_pending())
    }

    /// Advance `last_synced_at`, keeping it monotone non-decreasing.
    pub fn touch_synced(&mut self, at: DateTime<Utc>) {
        match self.last_synced_at {
            Some(prev) if prev >= at => {}
            _ => self.last_synced_at = Some(at),
        }
    }
}

/// Per-spot, per-date sun ephemeris. Immutable after creation: one row per
/// spot per date, never mutated locally after upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SunSnapshot {
    pub id: String,
    pub remote_id: String,
    pub spot_id: String,
    pub date: NaiveDate,
    pub sunrise_at: DateTime<Utc>,
    pub sunset_at: DateTime<Utc>,
    pub golden_hour_start: DateTime<Utc>,
    pub golden_hour_end: DateTime<Utc>,
}
