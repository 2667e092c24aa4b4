//! Local persisted store seam.
//!
//! The vault core never touches disk directly; all persistence flows through
//! the [`VaultStore`] trait so platforms can back it with whatever row or
//! key/value storage they have. An in-memory implementation for tests lives
//! in [`crate::memory`].

use crate::error::VaultResult;
use crate::types::{Category, EncryptedEntry, EntryId, MasterPasswordRecord, VaultSettings};

/// Local persisted storage for vault records.
///
/// # Requirements
///
/// - `put_master_record` MUST be atomic: after a crash either the full
///   `{hash, salt}` record is present or none of it is. The master-password
///   setup path depends on this.
/// - `flush` MUST durably persist any buffered writes before returning;
///   restore reports success only after a settings flush completes.
/// - Implementations MUST NOT log or otherwise copy record contents; entry
///   payloads are ciphertext but the master record's salt/hash pair is
///   sensitive metadata.
pub trait VaultStore: Send + Sync {
    /// Returns the active master-password record, if one exists.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if the backend fails.
    fn master_record(&self) -> VaultResult<Option<MasterPasswordRecord>>;

    /// Atomically writes the master-password record, replacing any existing
    /// one.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if persistence cannot
    /// complete; on failure the previous record must remain intact.
    fn put_master_record(&self, record: &MasterPasswordRecord) -> VaultResult<()>;

    /// Deletes the master-password record. Succeeds if none exists.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if the backend fails.
    fn delete_master_record(&self) -> VaultResult<()>;

    /// Returns whether biometric escrow is enabled.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if the backend fails.
    fn biometric_enabled(&self) -> VaultResult<bool>;

    /// Sets the biometric escrow flag.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if the backend fails.
    fn set_biometric_enabled(&self, enabled: bool) -> VaultResult<()>;

    /// Lists all encrypted entries.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if the backend fails.
    fn entries(&self) -> VaultResult<Vec<EncryptedEntry>>;

    /// Returns a single entry by ID.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if the backend fails.
    fn entry(&self, id: EntryId) -> VaultResult<Option<EncryptedEntry>>;

    /// Inserts or replaces an entry.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if the backend fails.
    fn upsert_entry(&self, entry: &EncryptedEntry) -> VaultResult<()>;

    /// Deletes an entry, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if the backend fails.
    fn delete_entry(&self, id: EntryId) -> VaultResult<bool>;

    /// Deletes every entry. Used by `Replace`-strategy restores.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if the backend fails.
    fn clear_entries(&self) -> VaultResult<()>;

    /// Lists all categories.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if the backend fails.
    fn categories(&self) -> VaultResult<Vec<Category>>;

    /// Replaces the category list.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if the backend fails.
    fn put_categories(&self, categories: &[Category]) -> VaultResult<()>;

    /// Returns the persisted settings blob, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if the backend fails.
    fn settings(&self) -> VaultResult<Option<VaultSettings>>;

    /// Writes the settings blob.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if the backend fails.
    fn put_settings(&self, settings: &VaultSettings) -> VaultResult<()>;

    /// Durably flushes buffered writes.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if the flush fails; callers
    /// treat an unflushed write as not yet committed.
    fn flush(&self) -> VaultResult<()>;
}
