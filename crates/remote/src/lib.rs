//! Remote service clients: the typed entity-table gateway and the binary
//! asset uploader.

pub mod config;
pub mod error;
pub mod gateway;
pub mod uploader;

pub use config::RemoteConfig;
pub use error::{RemoteError, Result};
pub use gateway::RemoteGateway;
pub use uploader::AssetUploader;
