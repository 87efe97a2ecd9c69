//! Caller-facing sync service: single-flight guards around the reconcilers,
//! the sync-status surface, and post-sync event notification.

use log::{debug, error};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::spots::SpotRepositoryTrait;
use crate::sync::model::{
    AuthProviderTrait, ImageCacheTrait, SyncConfig, SyncEvent, SyncLedgerTrait, SyncReport,
    SyncStatus,
};
use crate::sync::pull_reconciler::PullReconciler;
use crate::sync::push_reconciler::PushReconciler;
use crate::sync::remote_model::{AssetUploaderTrait, RemoteGatewayTrait};

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Entry point exposed to UI actions and background timers.
///
/// Each direction carries a boolean single-flight guard: a concurrent call
/// observes the guard and returns immediately rather than queuing. The two
/// directions are independent of each other; mutually excluding them is the
/// surrounding application's responsibility.
pub struct SyncService {
    push: PushReconciler,
    pull: PullReconciler,
    spot_repository: Arc<dyn SpotRepositoryTrait>,
    is_pushing: AtomicBool,
    is_pulling: AtomicBool,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        spot_repository: Arc<dyn SpotRepositoryTrait>,
        gateway: Arc<dyn RemoteGatewayTrait>,
        uploader: Arc<dyn AssetUploaderTrait>,
        image_cache: Arc<dyn ImageCacheTrait>,
        ledger: Arc<dyn SyncLedgerTrait>,
        auth: Arc<dyn AuthProviderTrait>,
        config: SyncConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let push = PushReconciler::new(
            Arc::clone(&spot_repository),
            Arc::clone(&gateway),
            uploader,
            image_cache,
            auth,
        );
        let pull = PullReconciler::new(Arc::clone(&spot_repository), gateway, ledger, config);
        Self {
            push,
            pull,
            spot_repository,
            is_pushing: AtomicBool::new(false),
            is_pulling: AtomicBool::new(false),
            events,
        }
    }

    /// Subscribe to sync events so dependent views can refresh.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Push locally created spots and pending media to the remote store.
    /// Never panics or bubbles an error; a fatal pass failure degrades to a
    /// report carrying the message.
    pub async fn push_local_changes(&self) -> SyncReport {
        if self
            .is_pushing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Push already in progress; rejecting concurrent call");
            return SyncReport::noop("Push already in progress");
        }

        let report = match self.push.run().await {
            Ok(report) => {
                let _ = self.events.send(SyncEvent::PushCompleted {
                    pushed: report.succeeded,
                });
                report
            }
            Err(err) => {
                error!("Push pass failed: {}", err);
                SyncReport::new(0, vec![err.to_string()], format!("Push failed: {}", err))
            }
        };

        self.is_pushing.store(false, Ordering::SeqCst);
        report
    }

    /// Pull remote changes into the local store incrementally.
    pub async fn pull_remote_changes(&self) -> SyncReport {
        if self
            .is_pulling
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Pull already in progress; rejecting concurrent call");
            return SyncReport::noop("Pull already in progress");
        }

        let report = match self.pull.run().await {
            Ok(report) => {
                let _ = self.events.send(SyncEvent::PullCompleted {
                    pulled: report.succeeded,
                });
                report
            }
            Err(err) => {
                error!("Pull pass failed: {}", err);
                SyncReport::new(0, vec![err.to_string()], format!("Pull failed: {}", err))
            }
        };

        self.is_pulling.store(false, Ordering::SeqCst);
        report
    }

    /// Quick summary of outstanding local work.
    pub fn check_sync_status(&self) -> SyncStatus {
        match self.spot_repository.count_pending_media() {
            Ok(0) => SyncStatus::Synced,
            Ok(pending) => SyncStatus::Pending(pending),
            Err(err) => SyncStatus::Error(err.to_string()),
        }
    }
}
