//! SQLite persistence for skyspot: connection pooling, schema migrations,
//! the spot repository, and the sync ledger.

pub mod db;
pub mod errors;
pub mod ledger;
pub mod schema;
pub mod spots;

pub use db::{create_pool, get_connection, DbPool, WriteHandle, MIGRATIONS};
pub use errors::StorageError;
pub use ledger::SyncLedger;
pub use spots::SpotRepository;
