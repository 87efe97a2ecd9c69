//! Remote service configuration, constructed once at process start and
//! passed by reference to the gateway and uploader.

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default ceiling for a single asset upload (10 MiB).
pub const DEFAULT_MAX_ASSET_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the remote REST API (e.g. "https://api.skyspot.app").
    pub api_base_url: String,
    /// API key sent with every request.
    pub api_key: String,
    /// Endpoint of the binary asset storage service.
    pub asset_upload_url: String,
    /// Unsigned upload preset for the asset service.
    pub asset_upload_preset: String,
    /// Per-asset size ceiling in bytes.
    pub max_asset_bytes: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl RemoteConfig {
    pub fn new(
        api_base_url: impl Into<String>,
        api_key: impl Into<String>,
        asset_upload_url: impl Into<String>,
        asset_upload_preset: impl Into<String>,
    ) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            api_key: api_key.into(),
            asset_upload_url: asset_upload_url.into(),
            asset_upload_preset: asset_upload_preset.into(),
            max_asset_bytes: DEFAULT_MAX_ASSET_BYTES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}
