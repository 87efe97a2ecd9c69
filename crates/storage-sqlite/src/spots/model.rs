//! Row types and conversions between domain models and SQLite columns.
//!
//! Timestamps are stored as RFC3339 TEXT, booleans as INTEGER 0/1, tags as a
//! JSON array in TEXT, and enums as their snake_case wire names. A media
//! item's state is split across two columns: `state` carries the variant tag
//! and `location` carries the cache key or the remote URL.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;

use skyspot_core::errors::Result;
use skyspot_core::spots::{MediaState, Spot, SpotMedia, SunSnapshot};

use crate::errors::StorageError;
use crate::schema::{spot_media, spots, sun_snapshots, sync_ledger};

pub const MEDIA_STATE_LOCAL_PENDING: &str = "local_pending";
pub const MEDIA_STATE_UPLOADED: &str = "uploaded";

/// Serialize an enum to its bare snake_case name (serde output minus quotes).
pub(crate) fn enum_to_db<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;
    Ok(json.trim_matches('"').to_string())
}

pub(crate) fn enum_from_db<T: DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_str(&format!("\"{}\"", value))?)
}

pub(crate) fn timestamp_to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub(crate) fn timestamp_from_db(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::CorruptRow(format!("Bad timestamp '{}': {}", raw, e)).into())
}

fn optional_timestamp_from_db(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(timestamp_from_db).transpose()
}

#[derive(
    Debug, Clone, Queryable, Identifiable, Insertable, AsChangeset, Selectable, QueryableByName,
)]
#[diesel(table_name = spots)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SpotDB {
    pub id: String,
    pub remote_id: Option<String>,
    pub client_token: String,
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<i32>,
    pub elevation: Option<i32>,
    pub tags: String,
    pub difficulty: i32,
    pub privacy: String,
    pub license: String,
    pub status: String,
    pub votes: i32,
    pub is_local_only: i32,
    pub published: i32,
    pub created_at: String,
    pub updated_at: String,
    pub last_synced_at: Option<String>,
}

impl SpotDB {
    pub fn from_domain(spot: &Spot) -> Result<Self> {
        Ok(Self {
            id: spot.id.clone(),
            remote_id: spot.remote_id.clone(),
            client_token: spot.client_token.clone(),
            title: spot.title.clone(),
            latitude: spot.latitude,
            longitude: spot.longitude,
            heading: spot.heading,
            elevation: spot.elevation,
            tags: serde_json::to_string(&spot.tags)?,
            difficulty: spot.difficulty,
            privacy: enum_to_db(&spot.privacy)?,
            license: enum_to_db(&spot.license)?,
            status: enum_to_db(&spot.status)?,
            votes: spot.votes,
            is_local_only: spot.is_local_only as i32,
            published: spot.published as i32,
            created_at: timestamp_to_db(spot.created_at),
            updated_at: timestamp_to_db(spot.updated_at),
            last_synced_at: spot.last_synced_at.map(timestamp_to_db),
        })
    }

    /// Domain spot with its media rows attached.
    pub fn into_domain(self, media: Vec<SpotMedia>) -> Result<Spot> {
        Ok(Spot {
            id: self.id,
            remote_id: self.remote_id,
            client_token: self.client_token,
            title: self.title,
            latitude: self.latitude,
            longitude: self.longitude,
            heading: self.heading,
            elevation: self.elevation,
            tags: serde_json::from_str(&self.tags)?,
            difficulty: self.difficulty,
            privacy: enum_from_db(&self.privacy)?,
            license: enum_from_db(&self.license)?,
            status: enum_from_db(&self.status)?,
            votes: self.votes,
            is_local_only: self.is_local_only != 0,
            published: self.published != 0,
            created_at: timestamp_from_db(&self.created_at)?,
            updated_at: timestamp_from_db(&self.updated_at)?,
            last_synced_at: optional_timestamp_from_db(self.last_synced_at.as_deref())?,
            media,
        })
    }
}

#[derive(
    Debug, Clone, Queryable, Identifiable, Insertable, AsChangeset, Selectable, QueryableByName,
)]
#[diesel(table_name = spot_media)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SpotMediaDB {
    pub id: String,
    pub spot_id: String,
    pub remote_id: Option<String>,
    pub state: String,
    pub location: String,
    pub thumbnail_url: Option<String>,
    pub captured_at: String,
    pub last_synced_at: Option<String>,
}

impl SpotMediaDB {
    pub fn from_domain(media: &SpotMedia) -> Self {
        let (state, location) = match &media.state {
            MediaState::LocalPending { cache_key } => {
                (MEDIA_STATE_LOCAL_PENDING, cache_key.clone())
            }
            MediaState::Uploaded { url } => (MEDIA_STATE_UPLOADED, url.clone()),
        };
        Self {
            id: media.id.clone(),
            spot_id: media.spot_id.clone(),
            remote_id: media.remote_id.clone(),
            state: state.to_string(),
            location,
            thumbnail_url: media.thumbnail_url.clone(),
            captured_at: timestamp_to_db(media.captured_at),
            last_synced_at: media.last_synced_at.map(timestamp_to_db),
        }
    }

    pub fn into_domain(self) -> Result<SpotMedia> {
        let state = match self.state.as_str() {
            MEDIA_STATE_LOCAL_PENDING => MediaState::LocalPending {
                cache_key: self.location,
            },
            MEDIA_STATE_UPLOADED => MediaState::Uploaded { url: self.location },
            other => {
                return Err(
                    StorageError::CorruptRow(format!("Unknown media state '{}'", other)).into(),
                )
            }
        };
        Ok(SpotMedia {
            id: self.id,
            spot_id: self.spot_id,
            remote_id: self.remote_id,
            state,
            thumbnail_url: self.thumbnail_url,
            captured_at: timestamp_from_db(&self.captured_at)?,
            last_synced_at: optional_timestamp_from_db(self.last_synced_at.as_deref())?,
        })
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Insertable, AsChangeset, Selectable)]
#[diesel(table_name = sun_snapshots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SunSnapshotDB {
    pub id: String,
    pub remote_id: String,
    pub spot_id: String,
    pub date: String,
    pub sunrise_at: String,
    pub sunset_at: String,
    pub golden_hour_start: String,
    pub golden_hour_end: String,
}

impl SunSnapshotDB {
    pub fn from_domain(snapshot: &SunSnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            remote_id: snapshot.remote_id.clone(),
            spot_id: snapshot.spot_id.clone(),
            date: snapshot.date.format("%Y-%m-%d").to_string(),
            sunrise_at: timestamp_to_db(snapshot.sunrise_at),
            sunset_at: timestamp_to_db(snapshot.sunset_at),
            golden_hour_start: timestamp_to_db(snapshot.golden_hour_start),
            golden_hour_end: timestamp_to_db(snapshot.golden_hour_end),
        }
    }

    pub fn into_domain(self) -> Result<SunSnapshot> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|e| StorageError::CorruptRow(format!("Bad date '{}': {}", self.date, e)))?;
        Ok(SunSnapshot {
            id: self.id,
            remote_id: self.remote_id,
            spot_id: self.spot_id,
            date,
            sunrise_at: timestamp_from_db(&self.sunrise_at)?,
            sunset_at: timestamp_from_db(&self.sunset_at)?,
            golden_hour_start: timestamp_from_db(&self.golden_hour_start)?,
            golden_hour_end: timestamp_from_db(&self.golden_hour_end)?,
        })
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Insertable, AsChangeset, Selectable)]
#[diesel(table_name = sync_ledger)]
#[diesel(primary_key(resource))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncLedgerDB {
    pub resource: String,
    pub last_attempt_at: Option<String>,
    pub last_watermark: Option<String>,
}

impl SyncLedgerDB {
    pub fn last_attempt(&self) -> Result<Option<DateTime<Utc>>> {
        optional_timestamp_from_db(self.last_attempt_at.as_deref())
    }

    pub fn watermark(&self) -> Result<Option<DateTime<Utc>>> {
        optional_timestamp_from_db(self.last_watermark.as_deref())
    }
}
