//! Local store adapter contract for spots and their sub-resources.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::spots::{Spot, SpotMedia, SunSnapshot};

/// One pull's worth of local changes, committed as a single transaction.
///
/// Spots are upserted by local id, media by remote media id (create if
/// absent, refresh metadata if present), sun snapshots by remote id
/// (create-if-absent only; existing rows are never touched).
#[derive(Debug, Clone, Default)]
pub struct PullBatch {
    pub spots: Vec<Spot>,
    pub media: Vec<SpotMedia>,
    pub snapshots: Vec<SunSnapshot>,
}

impl PullBatch {
    pub fn is_empty(&self) -> bool {
        self.spots.is_empty() && self.media.is_empty() && self.snapshots.is_empty()
    }
}

/// Row counts actually written by [`SpotRepositoryTrait::apply_pull_batch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullBatchOutcome {
    pub spots_written: usize,
    pub media_written: usize,
    pub snapshots_created: usize,
}

/// Local store adapter. Reads are synchronous on the connection pool; writes
/// go through the serialized write handle and are awaited to completion.
#[async_trait]
pub trait SpotRepositoryTrait: Send + Sync {
    /// Spots with at least one media item still in the local-pending state.
    /// Media are loaded alongside each spot.
    fn fetch_unsynced_spots(&self) -> Result<Vec<Spot>>;

    /// Look up a local spot (with media) by its remote identity.
    fn find_spot_by_remote_id(&self, remote_id: &str) -> Result<Option<Spot>>;

    /// Number of media items still waiting for upload, across all spots.
    fn count_pending_media(&self) -> Result<i64>;

    /// Persist a spot's own fields (media rows are not written here).
    async fn save_spot(&self, spot: Spot) -> Result<Spot>;

    /// Transition a media item to uploaded. No-op guard: an item already
    /// holding a remote URL is never reverted.
    async fn update_media_uploaded(
        &self,
        media_id: &str,
        remote_id: &str,
        url: &str,
        thumbnail_url: Option<String>,
        synced_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Commit one pull batch in a single transaction.
    async fn apply_pull_batch(&self, batch: PullBatch) -> Result<PullBatchOutcome>;

    /// Remove a spot and its media locally. Does not cascade to the remote
    /// store; a spot with a remote identity leaves an orphaned remote record.
    async fn delete_spot(&self, spot_id: &str) -> Result<usize>;
}
