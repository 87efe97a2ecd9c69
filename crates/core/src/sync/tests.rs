//! Reconciler tests against in-memory doubles of the service contracts.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::errors::{Result, SyncError};
use crate::spots::{
    MediaState, PullBatch, PullBatchOutcome, Spot, SpotMedia, SpotRepositoryTrait, SunSnapshot,
    FALLBACK_LATITUDE, FALLBACK_LONGITUDE,
};
use crate::sync::{
    AssetUploaderTrait, AuthProviderTrait, GeoPoint, ImageCacheTrait, RemoteGatewayTrait,
    RemoteNewSpot, RemoteNewSpotMedia, RemoteSpot, RemoteSpotMedia, RemoteSpotUpdate,
    RemoteSunSnapshot, SyncConfig, SyncLedgerTrait, SyncResource, SyncService, SyncStatus,
    UploadResult,
};
use async_trait::async_trait;

// ─────────────────────────────────────────────────────────────────────────
// Test doubles
// ─────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct InMemorySpotRepository {
    state: Mutex<RepoState>,
}

#[derive(Default)]
struct RepoState {
    spots: Vec<Spot>,
    snapshots: Vec<SunSnapshot>,
}

impl InMemorySpotRepository {
    fn seed_spot(&self, spot: Spot) {
        self.state.lock().unwrap().spots.push(spot);
    }

    fn spots(&self) -> Vec<Spot> {
        self.state.lock().unwrap().spots.clone()
    }

    fn snapshots(&self) -> Vec<SunSnapshot> {
        self.state.lock().unwrap().snapshots.clone()
    }
}

#[async_trait]
impl SpotRepositoryTrait for InMemorySpotRepository {
    fn fetch_unsynced_spots(&self) -> Result<Vec<Spot>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .spots
            .iter()
            .filter(|s| s.media.iter().any(|m| m.state.is_local_pending()))
            .cloned()
            .collect())
    }

    fn find_spot_by_remote_id(&self, remote_id: &str) -> Result<Option<Spot>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .spots
            .iter()
            .find(|s| s.remote_id.as_deref() == Some(remote_id))
            .cloned())
    }

    fn count_pending_media(&self) -> Result<i64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .spots
            .iter()
            .flat_map(|s| &s.media)
            .filter(|m| m.state.is_local_pending())
            .count() as i64)
    }

    async fn save_spot(&self, spot: Spot) -> Result<Spot> {
        let mut state = self.state.lock().unwrap();
        match state.spots.iter_mut().find(|s| s.id == spot.id) {
            Some(existing) => {
                // Spot-level fields only; media rows are written separately.
                let media = std::mem::take(&mut existing.media);
                *existing = spot.clone();
                existing.media = media;
            }
            None => state.spots.push(spot.clone()),
        }
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
        let mut state = self.state.lock().unwrap();
        for spot in &mut state.spots {
            if let Some(media) = spot.media.iter_mut().find(|m| m.id == media_id) {
                if media.state.is_local_pending() {
                    media.state = MediaState::Uploaded {
                        url: url.to_string(),
                    };
                    media.remote_id = Some(remote_id.to_string());
                    media.thumbnail_url = thumbnail_url;
                    media.last_synced_at = Some(synced_at);
                }
                // Media ids are unique across spots.
                break;
            }
        }
        Ok(())
    }

    async fn apply_pull_batch(&self, batch: PullBatch) -> Result<PullBatchOutcome> {
        let mut state = self.state.lock().unwrap();
        let mut outcome = PullBatchOutcome::default();

        for spot in batch.spots {
            match state.spots.iter_mut().find(|s| s.id == spot.id) {
                Some(existing) => {
                    let media = std::mem::take(&mut existing.media);
                    *existing = spot;
                    existing.media = media;
                }
                None => state.spots.push(spot),
            }
            outcome.spots_written += 1;
        }

        for media in batch.media {
            let remote_id = media.remote_id.clone();
            let mut updated = false;
            for spot in &mut state.spots {
                if let Some(existing) = spot
                    .media
                    .iter_mut()
                    .find(|m| m.remote_id == remote_id && remote_id.is_some())
                {
                    existing.state = media.state.clone();
                    existing.thumbnail_url = media.thumbnail_url.clone();
                    existing.captured_at = media.captured_at;
                    existing.last_synced_at = media.last_synced_at;
                    updated = true;
                }
            }
            if !updated {
                if let Some(spot) = state.spots.iter_mut().find(|s| s.id == media.spot_id) {
                    spot.media.push(media);
                }
            }
            outcome.media_written += 1;
        }

        for snapshot in batch.snapshots {
            let exists = state
                .snapshots
                .iter()
                .any(|s| s.remote_id == snapshot.remote_id);
            if !exists {
                state.snapshots.push(snapshot);
                outcome.snapshots_created += 1;
            }
        }

        Ok(outcome)
    }

    async fn delete_spot(&self, spot_id: &str) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        let before = state.spots.len();
        state.spots.retain(|s| s.id != spot_id);
        Ok(before - state.spots.len())
    }
}

#[derive(Default)]
struct MockGateway {
    state: Mutex<GatewayState>,
    fetch_calls: AtomicUsize,
    spot_seq: AtomicUsize,
    media_seq: AtomicUsize,
    conflict_on_create: bool,
}

#[derive(Default)]
struct GatewayState {
    spots: Vec<RemoteSpot>,
    media_by_spot: HashMap<String, Vec<RemoteSpotMedia>>,
    snapshots_by_spot: HashMap<String, Vec<RemoteSunSnapshot>>,
    last_fetch_at: Option<DateTime<Utc>>,
}

impl MockGateway {
    fn with_conflict_on_create() -> Self {
        Self {
            conflict_on_create: true,
            ..Default::default()
        }
    }

    fn seed_spot(&self, spot: RemoteSpot) {
        self.state.lock().unwrap().spots.push(spot);
    }

    fn seed_media(&self, spot_id: &str, media: RemoteSpotMedia) {
        self.state
            .lock()
            .unwrap()
            .media_by_spot
            .entry(spot_id.to_string())
            .or_default()
            .push(media);
    }

    fn seed_snapshot(&self, spot_id: &str, snapshot: RemoteSunSnapshot) {
        self.state
            .lock()
            .unwrap()
            .snapshots_by_spot
            .entry(spot_id.to_string())
            .or_default()
            .push(snapshot);
    }

    fn created_spot_count(&self) -> usize {
        self.spot_seq.load(Ordering::SeqCst)
    }

    fn created_media_count(&self) -> usize {
        self.media_seq.load(Ordering::SeqCst)
    }

    fn last_fetch_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().unwrap().last_fetch_at
    }
}

#[async_trait]
impl RemoteGatewayTrait for MockGateway {
    async fn create_spot(&self, spot: RemoteNewSpot) -> Result<RemoteSpot> {
        if self.conflict_on_create {
            return Err(
                SyncError::RemoteConflict(format!("duplicate client_token {}", spot.client_token))
                    .into(),
            );
        }
        let seq = self.spot_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let stored = RemoteSpot {
            id: format!("remote-spot-{}", seq),
            owner_id: spot.owner_id,
            client_token: Some(spot.client_token),
            title: spot.title,
            geo: Some(spot.geo),
            latitude: spot.latitude,
            longitude: spot.longitude,
            heading: spot.heading,
            elevation: spot.elevation,
            tags: spot.tags,
            difficulty: spot.difficulty,
            privacy: spot.privacy,
            license: spot.license,
            status: spot.status,
            votes: spot.votes,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().spots.push(stored.clone());
        Ok(stored)
    }

    async fn find_spot_by_client_token(&self, token: &str) -> Result<Option<RemoteSpot>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .spots
            .iter()
            .find(|s| s.client_token.as_deref() == Some(token))
            .cloned())
    }

    async fn fetch_spots_updated_since(
        &self,
        updated_since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<RemoteSpot>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.last_fetch_at = Some(Utc::now());
        Ok(state
            .spots
            .iter()
            .filter(|s| updated_since.map_or(true, |since| s.updated_at >= since))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn update_spot(&self, id: &str, update: RemoteSpotUpdate) -> Result<RemoteSpot> {
        let mut state = self.state.lock().unwrap();
        let spot = state
            .spots
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| SyncError::RemoteNotFound(id.to_string()))?;
        if let Some(title) = update.title {
            spot.title = title;
        }
        if let Some(status) = update.status {
            spot.status = status;
        }
        spot.updated_at = Utc::now();
        Ok(spot.clone())
    }

    async fn delete_spot(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let spot = state
            .spots
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| SyncError::RemoteNotFound(id.to_string()))?;
        spot.status = crate::spots::SpotStatus::Deleted;
        Ok(())
    }

    async fn create_media(&self, media: RemoteNewSpotMedia) -> Result<RemoteSpotMedia> {
        let seq = self.media_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let stored = RemoteSpotMedia {
            id: format!("remote-media-{}", seq),
            spot_id: media.spot_id.clone(),
            url: media.url,
            thumbnail_url: media.thumbnail_url,
            asset_id: media.asset_id,
            captured_at: media.captured_at,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .unwrap()
            .media_by_spot
            .entry(media.spot_id)
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn fetch_media_for_spot(
        &self,
        spot_id: &str,
        _updated_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteSpotMedia>> {
        // Simulated network latency so watermark assertions can distinguish
        // the pass start from its finish.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let state = self.state.lock().unwrap();
        Ok(state.media_by_spot.get(spot_id).cloned().unwrap_or_default())
    }

    async fn fetch_sun_snapshots_for_spot(&self, spot_id: &str) -> Result<Vec<RemoteSunSnapshot>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .snapshots_by_spot
            .get(spot_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct MockUploader {
    uploads: AtomicUsize,
}

#[async_trait]
impl AssetUploaderTrait for MockUploader {
    async fn upload(&self, bytes: Vec<u8>, _owner_hint: &str) -> Result<UploadResult> {
        if bytes.is_empty() {
            return Err(SyncError::AssetUnreadable("empty upload".into()).into());
        }
        let seq = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(UploadResult {
            id: format!("asset-{}", seq),
            url: format!("http://cdn.example.com/asset-{}.jpg", seq),
            secure_url: format!("https://cdn.example.com/asset-{}.jpg", seq),
            width: 4000,
            height: 3000,
            format: "jpg".into(),
            thumbnail_url: format!("https://cdn.example.com/t/asset-{}.jpg", seq),
            optimized_url: format!("https://cdn.example.com/o/asset-{}.jpg", seq),
        })
    }
}

#[derive(Default)]
struct MockLedger {
    state: Mutex<HashMap<&'static str, LedgerEntry>>,
}

#[derive(Default, Clone, Copy)]
struct LedgerEntry {
    last_attempt: Option<DateTime<Utc>>,
    watermark: Option<DateTime<Utc>>,
}

impl MockLedger {
    fn watermark(&self, resource: SyncResource) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .unwrap()
            .get(resource.as_str())
            .and_then(|e| e.watermark)
    }
}

#[async_trait]
impl SyncLedgerTrait for MockLedger {
    fn should_allow_sync(&self, resource: SyncResource, min_interval: Duration) -> Result<bool> {
        let state = self.state.lock().unwrap();
        match state.get(resource.as_str()).and_then(|e| e.last_attempt) {
            Some(last) => Ok(Utc::now() - last >= min_interval),
            None => Ok(true),
        }
    }

    async fn record_attempt(&self, resource: SyncResource, at: DateTime<Utc>) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .entry(resource.as_str())
            .or_default()
            .last_attempt = Some(at);
        Ok(())
    }

    fn last_watermark(&self, resource: SyncResource) -> Result<Option<DateTime<Utc>>> {
        Ok(self.watermark(resource))
    }

    async fn record_watermark(&self, resource: SyncResource, at: DateTime<Utc>) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .entry(resource.as_str())
            .or_default()
            .watermark = Some(at);
        Ok(())
    }
}

#[derive(Default)]
struct MockCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockCache {
    fn put(&self, key: &str, bytes: &[u8]) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
    }
}

impl ImageCacheTrait for MockCache {
    fn read(&self, cache_key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().unwrap().get(cache_key).cloned())
    }
}

struct MockAuth {
    user_id: Option<String>,
}

impl MockAuth {
    fn signed_in() -> Self {
        Self {
            user_id: Some("user-1".to_string()),
        }
    }

    fn signed_out() -> Self {
        Self { user_id: None }
    }
}

impl AuthProviderTrait for MockAuth {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────

struct Harness {
    repository: Arc<InMemorySpotRepository>,
    gateway: Arc<MockGateway>,
    uploader: Arc<MockUploader>,
    cache: Arc<MockCache>,
    ledger: Arc<MockLedger>,
    service: SyncService,
}

fn harness_with(gateway: MockGateway, auth: MockAuth, config: SyncConfig) -> Harness {
    let repository = Arc::new(InMemorySpotRepository::default());
    let gateway = Arc::new(gateway);
    let uploader = Arc::new(MockUploader::default());
    let cache = Arc::new(MockCache::default());
    let ledger = Arc::new(MockLedger::default());
    let service = SyncService::new(
        repository.clone(),
        gateway.clone(),
        uploader.clone(),
        cache.clone(),
        ledger.clone(),
        Arc::new(auth),
        config,
    );
    Harness {
        repository,
        gateway,
        uploader,
        cache,
        ledger,
        service,
    }
}

fn harness() -> Harness {
    harness_with(
        MockGateway::default(),
        MockAuth::signed_in(),
        SyncConfig {
            min_pull_interval: Duration::zero(),
            ..SyncConfig::default()
        },
    )
}

fn local_spot_with_media(title: &str, cache_keys: &[&str]) -> Spot {
    let mut spot = Spot::new_local(title, 37.8, -122.5);
    for key in cache_keys {
        spot.media.push(SpotMedia::new_local(spot.id.clone(), *key));
    }
    spot
}

fn remote_spot(id: &str, latitude: f64, longitude: f64) -> RemoteSpot {
    let now = Utc::now();
    RemoteSpot {
        id: id.to_string(),
        owner_id: "user-2".into(),
        client_token: None,
        title: format!("Remote {}", id),
        geo: Some(GeoPoint::new(latitude, longitude)),
        latitude,
        longitude,
        heading: None,
        elevation: None,
        tags: vec!["remote".into()],
        difficulty: 2,
        privacy: crate::spots::SpotPrivacy::Public,
        license: crate::spots::SpotLicense::AllRights,
        status: crate::spots::SpotStatus::Active,
        votes: 3,
        created_at: now,
        updated_at: now,
    }
}

fn remote_media(id: &str, spot_id: &str) -> RemoteSpotMedia {
    let now = Utc::now();
    RemoteSpotMedia {
        id: id.to_string(),
        spot_id: spot_id.to_string(),
        url: format!("https://cdn.example.com/{}.jpg", id),
        thumbnail_url: Some(format!("https://cdn.example.com/t/{}.jpg", id)),
        asset_id: None,
        captured_at: now,
        created_at: now,
        updated_at: now,
    }
}

fn remote_snapshot(id: &str, spot_id: &str) -> RemoteSunSnapshot {
    let now = Utc::now();
    RemoteSunSnapshot {
        id: id.to_string(),
        spot_id: spot_id.to_string(),
        date: NaiveDate::from_ymd_opt(2026, 8, 27).unwrap(),
        sunrise_at: now,
        sunset_at: now,
        golden_hour_start: now,
        golden_hour_end: now,
        created_at: now,
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Push
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn push_round_trip_creates_spot_and_media() {
    let h = harness();
    h.cache.put("abc123", b"jpeg-bytes-1");
    h.cache.put("def456", b"jpeg-bytes-2");
    h.repository
        .seed_spot(local_spot_with_media("Sunset Point", &["abc123", "def456"]));

    let report = h.service.push_local_changes().await;

    assert_eq!(report.succeeded, 1);
    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
    assert_eq!(h.gateway.created_spot_count(), 1);
    assert_eq!(h.gateway.created_media_count(), 2);

    let spots = h.repository.spots();
    let spot = &spots[0];
    assert!(spot.remote_id.is_some());
    assert!(spot.published);
    assert!(!spot.is_local_only);
    for media in &spot.media {
        let url = media.state.url().expect("media should be uploaded");
        assert!(url.starts_with("https://cdn.example.com/"));
        assert!(media.remote_id.is_some());
    }
}

#[tokio::test]
async fn push_isolates_missing_cache_entry_to_one_item() {
    let h = harness();
    h.cache.put("k1", b"bytes-1");
    h.cache.put("k3", b"bytes-3");
    h.repository
        .seed_spot(local_spot_with_media("D", &["k1", "k2", "k3"]));

    let report = h.service.push_local_changes().await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("Image not found in cache"));
    assert_eq!(h.uploader.uploads.load(Ordering::SeqCst), 2);
    assert_eq!(h.gateway.created_media_count(), 2);

    let spots = h.repository.spots();
    let spot = &spots[0];
    assert!(spot.remote_id.is_some());
    assert!(spot.published);
    let uploaded = spot
        .media
        .iter()
        .filter(|m| !m.state.is_local_pending())
        .count();
    assert_eq!(uploaded, 2);
}

#[tokio::test]
async fn push_retries_pending_media_for_mixed_state_spots() {
    let h = harness();
    h.cache.put("late", b"bytes");
    let mut spot = local_spot_with_media("Mixed", &["late"]);
    spot.remote_id = Some("remote-spot-99".into());
    spot.media.push(SpotMedia {
        state: MediaState::Uploaded {
            url: "https://cdn.example.com/old.jpg".into(),
        },
        remote_id: Some("remote-media-old".into()),
        ..SpotMedia::new_local(spot.id.clone(), "unused")
    });
    h.repository.seed_spot(spot);

    let report = h.service.push_local_changes().await;

    assert_eq!(report.succeeded, 1);
    assert!(report.errors.is_empty());
    // The spot already has a remote identity: no second create.
    assert_eq!(h.gateway.created_spot_count(), 0);
    assert_eq!(h.gateway.created_media_count(), 1);
    let spots = h.repository.spots();
    assert_eq!(spots[0].remote_id.as_deref(), Some("remote-spot-99"));
}

#[tokio::test]
async fn push_resolves_duplicate_client_token_by_fetch() {
    let gateway = MockGateway::with_conflict_on_create();
    let spot = local_spot_with_media("Dup", &[]);
    let mut existing = remote_spot("remote-dup-1", 37.8, -122.5);
    existing.client_token = Some(spot.client_token.clone());
    gateway.seed_spot(existing);

    let h = harness_with(
        gateway,
        MockAuth::signed_in(),
        SyncConfig {
            min_pull_interval: Duration::zero(),
            ..SyncConfig::default()
        },
    );
    let mut spot = spot;
    spot.media
        .push(SpotMedia::new_local(spot.id.clone(), "missing-key"));
    h.repository.seed_spot(spot);

    let report = h.service.push_local_changes().await;

    assert_eq!(report.succeeded, 1);
    let spots = h.repository.spots();
    assert_eq!(spots[0].remote_id.as_deref(), Some("remote-dup-1"));
    assert_eq!(h.gateway.created_spot_count(), 0);
}

#[tokio::test]
async fn push_without_identity_degrades_to_error_report() {
    let h = harness_with(
        MockGateway::default(),
        MockAuth::signed_out(),
        SyncConfig::default(),
    );
    h.repository
        .seed_spot(local_spot_with_media("Nope", &["k"]));

    let report = h.service.push_local_changes().await;

    assert_eq!(report.succeeded, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(report.summary.contains("Push failed"));
    assert_eq!(h.gateway.created_spot_count(), 0);
}

// ─────────────────────────────────────────────────────────────────────────
// Pull
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn pull_is_idempotent_by_remote_identifier() {
    let h = harness();
    h.gateway.seed_spot(remote_spot("r-1", 37.8, -122.5));
    h.gateway.seed_media("r-1", remote_media("rm-1", "r-1"));
    h.gateway.seed_snapshot("r-1", remote_snapshot("rs-1", "r-1"));

    let first = h.service.pull_remote_changes().await;

    // A fresh remote write after the first pass keeps the spot inside the
    // next incremental window, so the second pass re-stages the same records.
    {
        let mut state = h.gateway.state.lock().unwrap();
        let spot = state.spots.iter_mut().find(|s| s.id == "r-1").unwrap();
        spot.updated_at = Utc::now();
    }
    let second = h.service.pull_remote_changes().await;

    assert_eq!(first.succeeded, 1);
    assert_eq!(second.succeeded, 1);
    let spots = h.repository.spots();
    assert_eq!(spots.len(), 1, "no duplicate local spot");
    assert_eq!(spots[0].media.len(), 1, "no duplicate local media");
    assert_eq!(h.repository.snapshots().len(), 1, "snapshot stays immutable");
}

#[tokio::test]
async fn pull_within_min_interval_is_a_noop() {
    let h = harness_with(
        MockGateway::default(),
        MockAuth::signed_in(),
        SyncConfig::default(), // 5 minute interval
    );
    h.gateway.seed_spot(remote_spot("r-1", 37.8, -122.5));

    let first = h.service.pull_remote_changes().await;
    let second = h.service.pull_remote_changes().await;

    assert_eq!(first.succeeded, 1);
    assert_eq!(second.summary, "Pull throttled");
    assert_eq!(second.succeeded, 0);
    assert_eq!(h.gateway.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pull_repairs_invalid_remote_coordinates() {
    let h = harness();
    h.gateway.seed_spot(remote_spot("r-bad", f64::NAN, -122.5));

    let report = h.service.pull_remote_changes().await;

    assert_eq!(report.succeeded, 1);
    assert!(report.errors.is_empty());
    let spots = h.repository.spots();
    assert_eq!(spots[0].latitude, FALLBACK_LATITUDE);
    assert_eq!(spots[0].longitude, FALLBACK_LONGITUDE);
}

#[tokio::test]
async fn pull_records_watermark_at_pass_start() {
    let h = harness();
    h.gateway.seed_spot(remote_spot("r-1", 37.8, -122.5));
    h.gateway.seed_media("r-1", remote_media("rm-1", "r-1"));

    let before = Utc::now();
    let report = h.service.pull_remote_changes().await;
    let after = Utc::now();

    assert_eq!(report.succeeded, 1);
    let watermark = h
        .ledger
        .watermark(SyncResource::Spots)
        .expect("watermark recorded");
    assert!(watermark >= before);
    // The gateway sleeps during the media fetch, so the finish time trails
    // the recorded start by at least that much.
    let fetch_at = h.gateway.last_fetch_at().unwrap();
    assert!(watermark <= fetch_at);
    assert!(after - watermark >= Duration::milliseconds(20));
}

#[tokio::test]
async fn empty_pull_still_records_watermark() {
    let h = harness();

    let report = h.service.pull_remote_changes().await;

    assert_eq!(report.summary, "No remote changes");
    assert!(h.ledger.watermark(SyncResource::Spots).is_some());
}

#[tokio::test]
async fn pull_propagates_remote_metadata_to_existing_media() {
    let h = harness();
    h.gateway.seed_spot(remote_spot("r-1", 37.8, -122.5));
    h.gateway.seed_media("r-1", remote_media("rm-1", "r-1"));

    h.service.pull_remote_changes().await;

    // Remote side enriches the thumbnail; the next incremental pull must
    // propagate it onto the existing local row.
    {
        let mut state = h.gateway.state.lock().unwrap();
        let media = state.media_by_spot.get_mut("r-1").unwrap();
        media[0].thumbnail_url = Some("https://cdn.example.com/t/enriched.jpg".into());
        let spot = state.spots.iter_mut().find(|s| s.id == "r-1").unwrap();
        spot.updated_at = Utc::now();
    }

    h.service.pull_remote_changes().await;

    let spots = h.repository.spots();
    assert_eq!(spots[0].media.len(), 1);
    assert_eq!(
        spots[0].media[0].thumbnail_url.as_deref(),
        Some("https://cdn.example.com/t/enriched.jpg")
    );
}

// ─────────────────────────────────────────────────────────────────────────
// Service surface
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_pull_is_rejected_by_single_flight_guard() {
    let h = harness();
    h.gateway.seed_spot(remote_spot("r-1", 37.8, -122.5));

    let (first, second) = tokio::join!(
        h.service.pull_remote_changes(),
        h.service.pull_remote_changes()
    );

    let summaries = [first.summary.as_str(), second.summary.as_str()];
    assert!(summaries.contains(&"Pull already in progress"));
    assert_eq!(h.gateway.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sync_status_reflects_pending_media() {
    let h = harness();
    assert_eq!(h.service.check_sync_status(), SyncStatus::Synced);

    h.repository
        .seed_spot(local_spot_with_media("Pending", &["a", "b"]));
    assert_eq!(h.service.check_sync_status(), SyncStatus::Pending(2));
}

#[tokio::test]
async fn successful_pull_emits_refresh_event() {
    let h = harness();
    h.gateway.seed_spot(remote_spot("r-1", 37.8, -122.5));
    let mut events = h.service.subscribe();

    h.service.pull_remote_changes().await;

    let event = events.try_recv().expect("pull event emitted");
    assert_eq!(event, crate::sync::SyncEvent::PullCompleted { pulled: 1 });
}
