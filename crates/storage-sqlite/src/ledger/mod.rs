//! Persistent per-resource sync ledger: last attempt time and pull watermark.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;

use skyspot_core::errors::{Error, Result};
use skyspot_core::sync::{SyncLedgerTrait, SyncResource};

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::sync_ledger;
use crate::spots::model::{timestamp_to_db, SyncLedgerDB};

fn db_err(e: diesel::result::Error) -> Error {
    StorageError::Query(e).into()
}

pub struct SyncLedger {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SyncLedger {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    fn load_row(&self, resource: SyncResource) -> Result<Option<SyncLedgerDB>> {
        let mut conn = get_connection(&self.pool)?;
        sync_ledger::table
            .filter(sync_ledger::resource.eq(resource.as_str()))
            .first(&mut conn)
            .optional()
            .map_err(db_err)
    }
}

#[async_trait]
impl SyncLedgerTrait for SyncLedger {
    fn should_allow_sync(&self, resource: SyncResource, min_interval: Duration) -> Result<bool> {
        let last_attempt = match self.load_row(resource)? {
            Some(row) => row.last_attempt()?,
            None => None,
        };
        Ok(match last_attempt {
            Some(at) => Utc::now() - at >= min_interval,
            None => true,
        })
    }

    async fn record_attempt(&self, resource: SyncResource, at: DateTime<Utc>) -> Result<()> {
        let resource = resource.as_str().to_string();
        let at = timestamp_to_db(at);
        self.writer
            .exec(move |conn| {
                diesel::insert_into(sync_ledger::table)
                    .values((
                        sync_ledger::resource.eq(&resource),
                        sync_ledger::last_attempt_at.eq(&at),
                    ))
                    .on_conflict(sync_ledger::resource)
                    .do_update()
                    .set(sync_ledger::last_attempt_at.eq(&at))
                    .execute(conn)
                    .map_err(db_err)?;
                Ok(())
            })
            .await
    }

    fn last_watermark(&self, resource: SyncResource) -> Result<Option<DateTime<Utc>>> {
        match self.load_row(resource)? {
            Some(row) => row.watermark(),
            None => Ok(None),
        }
    }

    async fn record_watermark(&self, resource: SyncResource, at: DateTime<Utc>) -> Result<()> {
        let resource = resource.as_str().to_string();
        let at = timestamp_to_db(at);
        self.writer
            .exec(move |conn| {
                diesel::insert_into(sync_ledger::table)
                    .values((
                        sync_ledger::resource.eq(&resource),
                        sync_ledger::last_watermark.eq(&at),
                    ))
                    .on_conflict(sync_ledger::resource)
                    .do_update()
                    .set(sync_ledger::last_watermark.eq(&at))
                    .execute(conn)
                    .map_err(db_err)?;
                Ok(())
            })
            .await
    }
}
