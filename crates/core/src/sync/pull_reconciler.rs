//! Pull reconciler: fetches remote spots changed since the last watermark,
//! upserts them and their sub-resources locally, and repairs invalid
//! coordinates on the way in.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::Result;
use crate::spots::{
    is_valid_coordinate, MediaState, PullBatch, Spot, SpotMedia, SpotRepositoryTrait, SunSnapshot,
    FALLBACK_LATITUDE, FALLBACK_LONGITUDE,
};
use crate::sync::model::{SyncConfig, SyncLedgerTrait, SyncReport, SyncResource};
use crate::sync::remote_model::{RemoteGatewayTrait, RemoteSpot};

/// Pulls remote changes into the local store incrementally.
///
/// The ledger watermark is recorded as the time the sync *started*, so remote
/// writes landing during the pass are not skipped by the next incremental
/// pull. It only advances after the batch commits without a transport-level
/// failure; per-item failures inside the batch do not block it.
pub struct PullReconciler {
    spot_repository: Arc<dyn SpotRepositoryTrait>,
    gateway: Arc<dyn RemoteGatewayTrait>,
    ledger: Arc<dyn SyncLedgerTrait>,
    config: SyncConfig,
}

impl PullReconciler {
    pub fn new(
        spot_repository: Arc<dyn SpotRepositoryTrait>,
        gateway: Arc<dyn RemoteGatewayTrait>,
        ledger: Arc<dyn SyncLedgerTrait>,
        config: SyncConfig,
    ) -> Self {
        Self {
            spot_repository,
            gateway,
            ledger,
            config,
        }
    }

    /// Run one pull pass. A rate-limited call is a no-op, not an error.
    pub async fn run(&self) -> Result<SyncReport> {
        if !self
            .ledger
            .should_allow_sync(SyncResource::Spots, self.config.min_pull_interval)?
        {
            debug!("Pull throttled: last attempt is within the minimum interval");
            return Ok(SyncReport::noop("Pull throttled"));
        }

        let watermark = self.ledger.last_watermark(SyncResource::Spots)?;
        let sync_started_at = Utc::now();
        self.ledger
            .record_attempt(SyncResource::Spots, sync_started_at)
            .await?;

        let remote_spots = self
            .gateway
            .fetch_spots_updated_since(watermark, self.config.pull_batch_limit)
            .await?;

        if remote_spots.is_empty() {
            // Nothing to have missed; the start time is safe to record.
            self.ledger
                .record_watermark(SyncResource::Spots, sync_started_at)
                .await?;
            return Ok(SyncReport::noop("No remote changes"));
        }
        debug!(
            "Pulling {} remote spot(s) (watermark: {:?})",
            remote_spots.len(),
            watermark
        );

        let mut batch = PullBatch::default();
        let mut succeeded = 0usize;
        let mut errors: Vec<String> = Vec::new();
        let is_incremental = watermark.is_some();

        for remote in remote_spots {
            let remote_id = remote.id.clone();
            match self
                .stage_remote_spot(remote, is_incremental, sync_started_at, &mut batch)
                .await
            {
                Ok(()) => succeeded += 1,
                Err(err) => {
                    warn!("Pull failed for remote spot {}: {}", remote_id, err);
                    errors.push(format!("Spot {}: {}", remote_id, err));
                }
            }
        }

        // One unit of local change for the whole batch.
        let outcome = self.spot_repository.apply_pull_batch(batch).await?;

        self.ledger
            .record_watermark(SyncResource::Spots, sync_started_at)
            .await?;

        let summary = format!(
            "Pulled {} spot(s) ({} media, {} sun snapshot(s)), {} error(s)",
            succeeded,
            outcome.media_written,
            outcome.snapshots_created,
            errors.len()
        );
        info!("{}", summary);
        Ok(SyncReport::new(succeeded, errors, summary))
    }

    /// Stage one remote spot plus its sub-resources into the pull batch.
    async fn stage_remote_spot(
        &self,
        remote: RemoteSpot,
        is_incremental: bool,
        synced_at: DateTime<Utc>,
        batch: &mut PullBatch,
    ) -> Result<()> {
        let existing = self.spot_repository.find_spot_by_remote_id(&remote.id)?;

        let local_spot = match existing {
            None => from_remote(&remote, synced_at),
            Some(existing) => merge_remote(existing, &remote, is_incremental, synced_at),
        };
        let local_spot_id = local_spot.id.clone();
        batch.spots.push(local_spot);

        // Media upsert always runs, even for spots that already existed, so
        // remote-side metadata enrichment propagates.
        let remote_media = self.gateway.fetch_media_for_spot(&remote.id, None).await?;
        for media in remote_media {
            batch.media.push(SpotMedia {
                id: Uuid::new_v4().to_string(),
                spot_id: local_spot_id.clone(),
                remote_id: Some(media.id),
                state: MediaState::Uploaded { url: media.url },
                thumbnail_url: media.thumbnail_url,
                captured_at: media.captured_at,
                last_synced_at: Some(synced_at),
            });
        }

        // Sun snapshots are immutable: created if absent, never updated.
        let snapshots = self.gateway.fetch_sun_snapshots_for_spot(&remote.id).await?;
        for snapshot in snapshots {
            batch.snapshots.push(SunSnapshot {
                id: Uuid::new_v4().to_string(),
                remote_id: snapshot.id,
                spot_id: local_spot_id.clone(),
                date: snapshot.date,
                sunrise_at: snapshot.sunrise_at,
                sunset_at: snapshot.sunset_at,
                golden_hour_start: snapshot.golden_hour_start,
                golden_hour_end: snapshot.golden_hour_end,
            });
        }

        Ok(())
    }
}

/// Valid remote coordinates, or the fallback with a warning. Never fails the
/// record.
fn resolve_coordinates(remote: &RemoteSpot) -> (f64, f64) {
    if is_valid_coordinate(remote.latitude, remote.longitude) {
        (remote.latitude, remote.longitude)
    } else {
        warn!(
            "Remote spot {} has invalid coordinates ({}, {}); using fallback",
            remote.id, remote.latitude, remote.longitude
        );
        (FALLBACK_LATITUDE, FALLBACK_LONGITUDE)
    }
}

/// Materialize a remote spot locally for the first time. Records originating
/// from the remote source of truth are published and not local-only.
fn from_remote(remote: &RemoteSpot, synced_at: DateTime<Utc>) -> Spot {
    let (latitude, longitude) = resolve_coordinates(remote);
    Spot {
        id: Uuid::new_v4().to_string(),
        remote_id: Some(remote.id.clone()),
        client_token: remote
            .client_token
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        title: remote.title.clone(),
        latitude,
        longitude,
        heading: remote.heading,
        elevation: remote.elevation,
        tags: remote.tags.clone(),
        difficulty: remote.difficulty,
        privacy: remote.privacy,
        license: remote.license,
        status: remote.status,
        votes: remote.votes,
        is_local_only: false,
        published: true,
        created_at: remote.created_at,
        updated_at: remote.updated_at,
        last_synced_at: Some(synced_at),
        media: Vec::new(),
    }
}

/// Fold remote changes into an existing local spot. Mutable business fields
/// are overwritten on incremental sync only; invalid local coordinates are
/// repaired regardless of sync mode.
fn merge_remote(
    mut local: Spot,
    remote: &RemoteSpot,
    is_incremental: bool,
    synced_at: DateTime<Utc>,
) -> Spot {
    if is_incremental {
        local.title = remote.title.clone();
        local.tags = remote.tags.clone();
        local.difficulty = remote.difficulty;
        local.privacy = remote.privacy;
        local.license = remote.license;
        local.status = remote.status;
        local.votes = remote.votes;
        local.updated_at = remote.updated_at;
        if is_valid_coordinate(remote.latitude, remote.longitude) {
            local.latitude = remote.latitude;
            local.longitude = remote.longitude;
        }
    }

    if !is_valid_coordinate(local.latitude, local.longitude) {
        let (latitude, longitude) = resolve_coordinates(remote);
        warn!(
            "Repairing invalid local coordinates for spot {} ({:?})",
            local.id, local.remote_id
        );
        local.latitude = latitude;
        local.longitude = longitude;
    }

    local.is_local_only = false;
    local.published = true;
    local.touch_synced(synced_at);
    local
}
