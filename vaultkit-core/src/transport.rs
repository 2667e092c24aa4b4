//! Opaque blob transport seam.
//!
//! Backup bundles leave the device through this "bytes in / bytes out"
//! contract. The core knows nothing about the remote side (cloud drive,
//! object store, sync folder); it only requires that failures surface as
//! [`TransportError`] and never block local vault operations. Retry policy
//! belongs to the transport implementation, not to this crate.

use crate::backup::BackupBundle;
use crate::error::{TransportError, VaultResult};

/// Metadata for a remotely stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBlobInfo {
    /// Transport-assigned blob identifier.
    pub id: String,
    /// Name the blob was uploaded under.
    pub name: String,
    /// Blob size in bytes.
    pub size: u64,
    /// When the blob was created remotely (unix seconds).
    pub created_at: u64,
}

/// Opaque remote blob storage.
///
/// Implementations are expected to be asynchronous-friendly but the contract
/// here is synchronous; callers run uploads on their own task executors and
/// apply their own cancellation.
pub trait BlobTransport: Send + Sync {
    /// Uploads bytes under a name, returning the transport-assigned ID.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the transport is unavailable or the
    /// upload fails.
    fn upload(&self, bytes: &[u8], name: &str) -> VaultResult<String>;

    /// Downloads a blob by ID.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the blob is missing or the download
    /// fails.
    fn download(&self, id: &str) -> VaultResult<Vec<u8>>;

    /// Lists remotely stored blobs.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the transport is unavailable.
    fn list(&self) -> VaultResult<Vec<RemoteBlobInfo>>;

    /// Deletes a remote blob.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the transport is unavailable or the
    /// deletion fails.
    fn delete(&self, id: &str) -> VaultResult<()>;
}

/// Serializes and uploads a backup bundle, returning the remote blob ID.
///
/// # Errors
///
/// Returns a [`TransportError`] if the upload fails, or the bundle's own
/// serialization error if it cannot be encoded.
pub fn upload_bundle(
    transport: &dyn BlobTransport,
    bundle: &BackupBundle,
    name: &str,
) -> VaultResult<String> {
    let bytes = bundle.to_json()?;
    let id = transport.upload(&bytes, name)?;
    tracing::debug!(phase = %crate::backup::BackupPhase::Uploaded, %id, name, "backup uploaded");
    Ok(id)
}

/// Downloads and parses a backup bundle by remote blob ID.
///
/// # Errors
///
/// Returns a [`TransportError`] if the download fails, or a
/// [`crate::error::RestoreError::MalformedBundle`] if the downloaded bytes do
/// not parse.
pub fn download_bundle(transport: &dyn BlobTransport, id: &str) -> VaultResult<BackupBundle> {
    tracing::debug!(phase = %crate::backup::RestorePhase::Downloading, %id, "fetching backup");
    let bytes = transport.download(id)?;
    BackupBundle::from_json(&bytes)
}
