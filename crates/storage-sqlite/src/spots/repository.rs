//! SQLite-backed implementation of the spot store contract.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::{debug, warn};

use skyspot_core::errors::{Error, Result};
use skyspot_core::spots::{PullBatch, PullBatchOutcome, Spot, SpotMedia, SpotRepositoryTrait};

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{spot_media, spots, sun_snapshots};
use crate::spots::model::{
    timestamp_to_db, SpotDB, SpotMediaDB, SunSnapshotDB, MEDIA_STATE_LOCAL_PENDING,
    MEDIA_STATE_UPLOADED,
};

fn db_err(e: diesel::result::Error) -> Error {
    StorageError::Query(e).into()
}

pub struct SpotRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SpotRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    fn load_spots_with_media(
        conn: &mut SqliteConnection,
        rows: Vec<SpotDB>,
    ) -> Result<Vec<Spot>> {
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let media_rows: Vec<SpotMediaDB> = spot_media::table
            .filter(spot_media::spot_id.eq_any(&ids))
            .order(spot_media::captured_at.asc())
            .load(conn)
            .map_err(db_err)?;

        let mut by_spot: HashMap<String, Vec<SpotMedia>> = HashMap::new();
        for row in media_rows {
            let spot_id = row.spot_id.clone();
            by_spot.entry(spot_id).or_default().push(row.into_domain()?);
        }

        rows.into_iter()
            .map(|row| {
                let media = by_spot.remove(&row.id).unwrap_or_default();
                row.into_domain(media)
            })
            .collect()
    }

    /// Insert a freshly captured media row. Spot mutations go through
    /// [`SpotRepositoryTrait::save_spot`]; media rows are created here.
    pub async fn add_media(&self, media: SpotMedia) -> Result<SpotMedia> {
        let row = SpotMediaDB::from_domain(&media);
        self.writer
            .exec(move |conn| {
                diesel::insert_into(spot_media::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(db_err)?;
                Ok(())
            })
            .await?;
        Ok(media)
    }
}

#[async_trait]
impl SpotRepositoryTrait for SpotRepository {
    fn fetch_unsynced_spots(&self) -> Result<Vec<Spot>> {
        let mut conn = get_connection(&self.pool)?;

        let pending_spot_ids = spot_media::table
            .filter(spot_media::state.eq(MEDIA_STATE_LOCAL_PENDING))
            .select(spot_media::spot_id)
            .distinct();

        let rows: Vec<SpotDB> = spots::table
            .filter(spots::id.eq_any(pending_spot_ids))
            .order(spots::created_at.asc())
            .load(&mut conn)
            .map_err(db_err)?;

        Self::load_spots_with_media(&mut conn, rows)
    }

    fn find_spot_by_remote_id(&self, remote_id: &str) -> Result<Option<Spot>> {
        let mut conn = get_connection(&self.pool)?;
        let row: Option<SpotDB> = spots::table
            .filter(spots::remote_id.eq(remote_id))
            .first(&mut conn)
            .optional()
            .map_err(db_err)?;

        match row {
            Some(row) => Ok(Self::load_spots_with_media(&mut conn, vec![row])?.pop()),
            None => Ok(None),
        }
    }

    fn count_pending_media(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        spot_media::table
            .filter(spot_media::state.eq(MEDIA_STATE_LOCAL_PENDING))
            .count()
            .get_result(&mut conn)
            .map_err(db_err)
    }

    async fn save_spot(&self, spot: Spot) -> Result<Spot> {
        let row = SpotDB::from_domain(&spot)?;
        self.writer
            .exec(move |conn| {
                diesel::insert_into(spots::table)
                    .values(&row)
                    .on_conflict(spots::id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(db_err)?;
                Ok(())
            })
            .await?;
        Ok(spot)
    }

    async fn update_media_uploaded(
        &self,
        media_id: &str,
        remote_id: &str,
        url: &str,
        thumbnail_url: Option<String>,
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        let media_id = media_id.to_string();
        let remote_id = remote_id.to_string();
        let url = url.to_string();
        self.writer
            .exec(move |conn| {
                let updated = diesel::update(
                    spot_media::table.filter(
                        spot_media::id
                            .eq(&media_id)
                            .and(spot_media::state.eq(MEDIA_STATE_LOCAL_PENDING)),
                    ),
                )
                .set((
                    spot_media::remote_id.eq(remote_id.clone()),
                    spot_media::state.eq(MEDIA_STATE_UPLOADED),
                    spot_media::location.eq(url.clone()),
                    spot_media::thumbnail_url.eq(thumbnail_url.clone()),
                    spot_media::last_synced_at.eq(timestamp_to_db(synced_at)),
                ))
                .execute(conn)
                .map_err(db_err)?;

                if updated == 0 {
                    debug!("Media {} already uploaded, leaving row untouched", media_id);
                }
                Ok(())
            })
            .await
    }

    async fn apply_pull_batch(&self, batch: PullBatch) -> Result<PullBatchOutcome> {
        let spot_rows: Vec<SpotDB> = batch
            .spots
            .iter()
            .map(SpotDB::from_domain)
            .collect::<Result<_>>()?;
        let media_rows: Vec<SpotMediaDB> =
            batch.media.iter().map(SpotMediaDB::from_domain).collect();
        let snapshot_rows: Vec<SunSnapshotDB> = batch
            .snapshots
            .iter()
            .map(SunSnapshotDB::from_domain)
            .collect();

        self.writer
            .exec(move |conn| {
                conn.transaction::<PullBatchOutcome, StorageError, _>(|conn| {
                    let mut outcome = PullBatchOutcome::default();

                    for row in &spot_rows {
                        diesel::insert_into(spots::table)
                            .values(row)
                            .on_conflict(spots::id)
                            .do_update()
                            .set(row)
                            .execute(conn)?;
                        outcome.spots_written += 1;
                    }

                    for row in &media_rows {
                        let Some(remote_id) = row.remote_id.as_deref() else {
                            warn!("Pulled media {} without a remote id, skipping", row.id);
                            continue;
                        };
                        let existing: Option<String> = spot_media::table
                            .filter(spot_media::remote_id.eq(remote_id))
                            .select(spot_media::id)
                            .first(conn)
                            .optional()?;
                        match existing {
                            Some(local_id) => {
                                diesel::update(
                                    spot_media::table.filter(spot_media::id.eq(&local_id)),
                                )
                                .set((
                                    spot_media::state.eq(row.state.clone()),
                                    spot_media::location.eq(row.location.clone()),
                                    spot_media::thumbnail_url.eq(row.thumbnail_url.clone()),
                                    spot_media::captured_at.eq(row.captured_at.clone()),
                                    spot_media::last_synced_at.eq(row.last_synced_at.clone()),
                                ))
                                .execute(conn)?;
                            }
                            None => {
                                diesel::insert_into(spot_media::table)
                                    .values(row)
                                    .execute(conn)?;
                            }
                        }
                        outcome.media_written += 1;
                    }

                    for row in &snapshot_rows {
                        let created = diesel::insert_into(sun_snapshots::table)
                            .values(row)
                            .on_conflict(sun_snapshots::remote_id)
                            .do_nothing()
                            .execute(conn)?;
                        outcome.snapshots_created += created;
                    }

                    Ok(outcome)
                })
                .map_err(Error::from)
            })
            .await
    }

    async fn delete_spot(&self, spot_id: &str) -> Result<usize> {
        let spot_id = spot_id.to_string();
        self.writer
            .exec(move |conn| {
                conn.transaction::<usize, StorageError, _>(|conn| {
                    diesel::delete(sun_snapshots::table.filter(sun_snapshots::spot_id.eq(&spot_id)))
                        .execute(conn)?;
                    diesel::delete(spot_media::table.filter(spot_media::spot_id.eq(&spot_id)))
                        .execute(conn)?;
                    Ok(diesel::delete(spots::table.filter(spots::id.eq(&spot_id)))
                        .execute(conn)?)
                })
                .map_err(Error::from)
            })
            .await
    }
}
