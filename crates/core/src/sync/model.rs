//! Sync domain models and the service contracts consumed by the reconcilers.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Resource types tracked independently by the timestamp ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncResource {
    Spots,
    SpotMedia,
    SunSnapshots,
}

impl SyncResource {
    /// Durable ledger key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spots => "spots",
            Self::SpotMedia => "spot_media",
            Self::SunSnapshots => "sun_snapshots",
        }
    }
}

/// Tuning knobs for the reconcilers, constructed once at process start.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Minimum interval between incremental pulls for the same resource.
    pub min_pull_interval: Duration,
    /// Upper bound on remote spots fetched per pull pass.
    pub pull_batch_limit: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            min_pull_interval: Duration::minutes(5),
            pull_batch_limit: 100,
        }
    }
}

/// Outcome of one reconciler pass. Item-level failures are accumulated here
/// rather than aborting sibling items; the pass degrades to "partially
/// synced, here is what failed".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub succeeded: usize,
    pub errors: Vec<String>,
    pub summary: String,
}

impl SyncReport {
    pub fn new(succeeded: usize, errors: Vec<String>, summary: impl Into<String>) -> Self {
        Self {
            succeeded,
            errors,
            summary: summary.into(),
        }
    }

    /// A pass that did no work (rate-limited, already running, nothing to do).
    pub fn noop(summary: impl Into<String>) -> Self {
        Self::new(0, Vec::new(), summary)
    }
}

/// Caller-facing sync state summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "detail")]
pub enum SyncStatus {
    Synced,
    Pending(i64),
    Error(String),
}

/// Events broadcast to dependent views after a reconciler pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "event")]
pub enum SyncEvent {
    PullCompleted { pulled: usize },
    PushCompleted { pushed: usize },
}

/// Timestamp ledger: durable per-resource pull watermarks plus the
/// rate-limit attempt clock. Survives process restart.
#[async_trait]
pub trait SyncLedgerTrait: Send + Sync {
    /// False when `now - last_attempt(resource) < min_interval`.
    /// Pure read; callers stamp the clock with [`record_attempt`].
    ///
    /// [`record_attempt`]: SyncLedgerTrait::record_attempt
    fn should_allow_sync(&self, resource: SyncResource, min_interval: Duration) -> Result<bool>;

    /// Stamp the rate-limit clock for `resource`.
    async fn record_attempt(&self, resource: SyncResource, at: DateTime<Utc>) -> Result<()>;

    /// Watermark of the last successful pull; `None` on first use (full sync).
    fn last_watermark(&self, resource: SyncResource) -> Result<Option<DateTime<Utc>>>;

    /// Durably persist the watermark. A failed persist must surface as an
    /// error so the next run re-syncs instead of believing it is caught up.
    async fn record_watermark(&self, resource: SyncResource, at: DateTime<Utc>) -> Result<()>;
}

/// Provider of the opaque current-user identity.
pub trait AuthProviderTrait: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

/// On-device cache holding bytes for media not yet uploaded.
pub trait ImageCacheTrait: Send + Sync {
    /// `Ok(None)` when the key is unknown or the bytes were evicted.
    fn read(&self, cache_key: &str) -> Result<Option<Vec<u8>>>;
}
