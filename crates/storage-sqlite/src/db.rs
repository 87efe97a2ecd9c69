//! Connection pool and serialized write handle.

use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::debug;
use std::sync::Arc;
use tokio::sync::Mutex;

use skyspot_core::errors::{DatabaseError, Error, Result};

use crate::errors::StorageError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Debug)]
struct ConnectionOptions;

impl diesel::r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error>
    for ConnectionOptions
{
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
        use diesel::connection::SimpleConnection;
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Build the pool and bring the schema up to date.
pub fn create_pool(database_url: &str) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = Pool::builder()
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)
        .map_err(|e| StorageError::Pool(e.into()))
        .map_err(Error::from)?;

    let mut conn = get_connection_inner(&pool)?;
    run_migrations(&mut conn)?;
    Ok(Arc::new(pool))
}

fn run_migrations(conn: &mut SqliteConnection) -> Result<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::from(StorageError::Migration(e.to_string())))?;
    if !applied.is_empty() {
        debug!("Applied {} pending migration(s)", applied.len());
    }
    Ok(())
}

fn get_connection_inner(pool: &DbPool) -> Result<DbConnection> {
    pool.get()
        .map_err(|e| Error::Database(DatabaseError::Pool(e.to_string())))
}

/// Check out a connection for a read.
pub fn get_connection(pool: &Arc<DbPool>) -> Result<DbConnection> {
    get_connection_inner(pool)
}

/// Serialized writer: all mutations run one at a time on a blocking thread,
/// so there is never more than one concurrent SQLite writer.
#[derive(Clone)]
pub struct WriteHandle {
    pool: Arc<DbPool>,
    lock: Arc<Mutex<()>>,
}

impl WriteHandle {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self {
            pool,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Run a write closure to completion before the next one starts.
    pub async fn exec<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.lock.lock().await;
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || {
            let mut conn = get_connection_inner(&pool)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| Error::Database(DatabaseError::Internal(format!("Write task failed: {}", e))))?
    }
}
