//! Push reconciler: walks unsynced local spots, creates their remote
//! counterparts, uploads attached assets, and back-fills remote identities.

use chrono::Utc;
use log::{debug, info, warn};
use std::sync::Arc;

use crate::errors::{Error, Result, SyncError};
use crate::spots::{Spot, SpotMedia, SpotRepositoryTrait};
use crate::sync::model::{AuthProviderTrait, ImageCacheTrait, SyncReport};
use crate::sync::remote_model::{
    AssetUploaderTrait, GeoPoint, RemoteGatewayTrait, RemoteNewSpot, RemoteNewSpotMedia,
};

/// Pushes locally created spots and their pending media to the remote store.
///
/// Candidates are processed strictly sequentially; item-level failures are
/// accumulated into the report and never interrupt sibling items. Only a
/// missing identity or a failure to read the candidate list aborts the pass.
pub struct PushReconciler {
    spot_repository: Arc<dyn SpotRepositoryTrait>,
    gateway: Arc<dyn RemoteGatewayTrait>,
    uploader: Arc<dyn AssetUploaderTrait>,
    image_cache: Arc<dyn ImageCacheTrait>,
    auth: Arc<dyn AuthProviderTrait>,
}

impl PushReconciler {
    pub fn new(
        spot_repository: Arc<dyn SpotRepositoryTrait>,
        gateway: Arc<dyn RemoteGatewayTrait>,
        uploader: Arc<dyn AssetUploaderTrait>,
        image_cache: Arc<dyn ImageCacheTrait>,
        auth: Arc<dyn AuthProviderTrait>,
    ) -> Self {
        Self {
            spot_repository,
            gateway,
            uploader,
            image_cache,
            auth,
        }
    }

    /// Run one push pass over all unsynced spots.
    pub async fn run(&self) -> Result<SyncReport> {
        let user_id = self
            .auth
            .current_user_id()
            .ok_or(SyncError::NotAuthenticated)?;

        let candidates = self.spot_repository.fetch_unsynced_spots()?;
        if candidates.is_empty() {
            return Ok(SyncReport::noop("No local changes to push"));
        }
        debug!("Pushing {} unsynced spot(s)", candidates.len());

        let mut succeeded = 0usize;
        let mut errors: Vec<String> = Vec::new();

        for spot in candidates {
            match self.push_spot(spot, &user_id, &mut errors).await {
                Ok(()) => succeeded += 1,
                Err(err) => errors.push(err.to_string()),
            }
        }

        let summary = format!("Pushed {} spot(s), {} error(s)", succeeded, errors.len());
        info!("{}", summary);
        Ok(SyncReport::new(succeeded, errors, summary))
    }

    /// Push one spot: ensure its remote identity, then sync each pending
    /// media item. Runs the final back-fill regardless of individual media
    /// failures so a partially uploaded spot still ends up published.
    async fn push_spot(
        &self,
        mut spot: Spot,
        user_id: &str,
        errors: &mut Vec<String>,
    ) -> Result<()> {
        // A spot that already holds a remote identity is never created again;
        // only its still-pending media are retried.
        let remote_spot_id = match spot.remote_id.clone() {
            Some(id) => id,
            None => self.create_remote_spot(&spot, user_id).await?,
        };

        let pending: Vec<SpotMedia> = spot.pending_media().cloned().collect();
        for media in pending {
            if let Err(err) = self.sync_media_item(&media, &remote_spot_id, user_id).await {
                // A failed media item never aborts the whole spot's sync.
                warn!("Media {} for spot '{}': {}", media.id, spot.title, err);
                errors.push(format!("Media {} ({}): {}", media.id, spot.title, err));
            }
        }

        let now = Utc::now();
        spot.remote_id = Some(remote_spot_id);
        spot.published = true;
        spot.is_local_only = false;
        spot.touch_synced(now);
        self.spot_repository.save_spot(spot).await?;
        Ok(())
    }

    /// Create the remote counterpart of a local spot. A duplicate client
    /// token comes back as a conflict and is resolved by fetch-then-link
    /// rather than a second blind insert.
    async fn create_remote_spot(&self, spot: &Spot, user_id: &str) -> Result<String> {
        match self.gateway.create_spot(to_remote_new_spot(spot, user_id)).await {
            Ok(created) => Ok(created.id),
            Err(err) if matches!(err.as_sync(), Some(SyncError::RemoteConflict(_))) => {
                match self
                    .gateway
                    .find_spot_by_client_token(&spot.client_token)
                    .await?
                {
                    Some(existing) => {
                        info!(
                            "Spot '{}' already exists remotely (token {}); linking",
                            spot.title, spot.client_token
                        );
                        Ok(existing.id)
                    }
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Upload one pending media item and link it to the spot's remote row.
    async fn sync_media_item(
        &self,
        media: &SpotMedia,
        remote_spot_id: &str,
        user_id: &str,
    ) -> Result<()> {
        let cache_key = media
            .state
            .cache_key()
            .ok_or_else(|| Error::Unexpected("pending media without cache key".to_string()))?;

        let bytes = self
            .image_cache
            .read(cache_key)?
            .ok_or_else(|| SyncError::ImageNotFoundInCache(cache_key.to_string()))?;

        let uploaded = self.uploader.upload(bytes, user_id).await?;

        let remote_media = self
            .gateway
            .create_media(RemoteNewSpotMedia {
                spot_id: remote_spot_id.to_string(),
                url: uploaded.secure_url.clone(),
                thumbnail_url: Some(uploaded.thumbnail_url.clone()),
                asset_id: Some(uploaded.id.clone()),
                captured_at: media.captured_at,
            })
            .await
            .map_err(|err| {
                // The asset is uploaded but unlinked; the item stays pending
                // locally and is retried on a later pass.
                warn!(
                    "Uploaded asset {} but failed to link media {}: {}",
                    uploaded.id, media.id, err
                );
                err
            })?;

        self.spot_repository
            .update_media_uploaded(
                &media.id,
                &remote_media.id,
                &uploaded.secure_url,
                Some(uploaded.thumbnail_url),
                Utc::now(),
            )
            .await
    }
}

/// Map a local spot to the remote create payload. The coordinate is passed
/// both as a structured geo point and as raw scalars.
fn to_remote_new_spot(spot: &Spot, owner_id: &str) -> RemoteNewSpot {
    RemoteNewSpot {
        owner_id: owner_id.to_string(),
        client_token: spot.client_token.clone(),
        title: spot.title.clone(),
        geo: GeoPoint::new(spot.latitude, spot.longitude),
        latitude: spot.latitude,
        longitude: spot.longitude,
        heading: spot.heading,
        elevation: spot.elevation,
        tags: spot.tags.clone(),
        difficulty: spot.difficulty,
        privacy: spot.privacy,
        license: spot.license,
        status: spot.status,
        votes: spot.votes,
    }
}
