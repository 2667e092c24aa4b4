//! JSON-file-backed vault store.
//!
//! The whole vault lives in a single JSON document. Every mutation rewrites
//! the file through a temp-file-plus-rename, so a crash mid-write leaves
//! either the old document or the new one, never a torn file. Entry payloads
//! inside the document are ciphertext; only structural metadata is readable.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use vaultkit_core::error::{StorageError, VaultResult};
use vaultkit_core::store::VaultStore;
use vaultkit_core::types::{
    Category, EncryptedEntry, EntryId, MasterPasswordRecord, VaultSettings,
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct VaultFile {
    master: Option<MasterPasswordRecord>,
    #[serde(default)]
    biometric_enabled: bool,
    #[serde(default)]
    entries: Vec<EncryptedEntry>,
    #[serde(default)]
    categories: Vec<Category>,
    settings: Option<VaultSettings>,
}

/// A [`VaultStore`] persisted as a single JSON file.
pub struct FileVaultStore {
    path: PathBuf,
    state: Mutex<VaultFile>,
}

fn backend_err(context: &str, reason: impl std::fmt::Display) -> StorageError {
    StorageError::Backend {
        context: context.to_string(),
        reason: reason.to_string(),
    }
}

impl FileVaultStore {
    /// Opens the vault file at `path`, creating an empty vault if the file
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the file exists but cannot be read or
    /// parsed.
    pub fn open(path: impl Into<PathBuf>) -> VaultResult<Self> {
        let path = path.into();
        let state = if path.exists() {
            let bytes =
                fs::read(&path).map_err(|e| backend_err("reading vault file", e))?;
            serde_json::from_slice(&bytes)
                .map_err(|e| backend_err("parsing vault file", e))?
        } else {
            VaultFile::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Returns the path this store persists to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, VaultFile> {
        self.state.lock().expect("vault file state poisoned")
    }

    /// Writes the document atomically: serialize to a sibling temp file,
    /// then rename over the target.
    fn persist(&self, state: &VaultFile) -> VaultResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| backend_err("creating vault directory", e))?;
            }
        }
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| backend_err("serializing vault file", e))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| backend_err("writing vault file", e))?;
        fs::rename(&tmp, &self.path).map_err(|e| backend_err("replacing vault file", e))?;
        Ok(())
    }

    fn mutate<R>(&self, apply: impl FnOnce(&mut VaultFile) -> R) -> VaultResult<R> {
        let mut state = self.locked();
        let result = apply(&mut state);
        self.persist(&state)?;
        Ok(result)
    }
}

impl VaultStore for FileVaultStore {
    fn master_record(&self) -> VaultResult<Option<MasterPasswordRecord>> {
        Ok(self.locked().master.clone())
    }

    fn put_master_record(&self, record: &MasterPasswordRecord) -> VaultResult<()> {
        self.mutate(|state| state.master = Some(record.clone()))
    }

    fn delete_master_record(&self) -> VaultResult<()> {
        self.mutate(|state| state.master = None)
    }

    fn biometric_enabled(&self) -> VaultResult<bool> {
        Ok(self.locked().biometric_enabled)
    }

    fn set_biometric_enabled(&self, enabled: bool) -> VaultResult<()> {
        self.mutate(|state| state.biometric_enabled = enabled)
    }

    fn entries(&self) -> VaultResult<Vec<EncryptedEntry>> {
        Ok(self.locked().entries.clone())
    }

    fn entry(&self, id: EntryId) -> VaultResult<Option<EncryptedEntry>> {
        Ok(self.locked().entries.iter().find(|e| e.id == id).cloned())
    }

    fn upsert_entry(&self, entry: &EncryptedEntry) -> VaultResult<()> {
        self.mutate(|state| {
            if let Some(existing) = state.entries.iter_mut().find(|e| e.id == entry.id) {
                *existing = entry.clone();
            } else {
                state.entries.push(entry.clone());
            }
        })
    }

    fn delete_entry(&self, id: EntryId) -> VaultResult<bool> {
        self.mutate(|state| {
            let before = state.entries.len();
            state.entries.retain(|e| e.id != id);
            state.entries.len() != before
        })
    }

    fn clear_entries(&self) -> VaultResult<()> {
        self.mutate(|state| state.entries.clear())
    }

    fn categories(&self) -> VaultResult<Vec<Category>> {
        Ok(self.locked().categories.clone())
    }

    fn put_categories(&self, categories: &[Category]) -> VaultResult<()> {
        self.mutate(|state| state.categories = categories.to_vec())
    }

    fn settings(&self) -> VaultResult<Option<VaultSettings>> {
        Ok(self.locked().settings.clone())
    }

    fn put_settings(&self, settings: &VaultSettings) -> VaultResult<()> {
        self.mutate(|state| state.settings = Some(settings.clone()))
    }

    fn flush(&self) -> VaultResult<()> {
        // Every mutation already rewrote the file.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultkit_core::crypto::{self, VaultKey};
    use vaultkit_core::types::PlaintextEntry;

    #[test]
    fn vault_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");

        let key = VaultKey::generate();
        let entry = PlaintextEntry::new("Example", "alice", "hunter2!X");
        {
            let store = FileVaultStore::open(&path).unwrap();
            store
                .upsert_entry(&crypto::encrypt_entry(&key, &entry).unwrap())
                .unwrap();
            store.set_biometric_enabled(true).unwrap();
        }

        let reopened = FileVaultStore::open(&path).unwrap();
        assert!(reopened.biometric_enabled().unwrap());
        let stored = reopened.entries().unwrap();
        assert_eq!(stored.len(), 1);
        let decrypted = crypto::decrypt_entry(&key, &stored[0]).unwrap();
        assert_eq!(decrypted, entry);
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileVaultStore::open(dir.path().join("fresh.json")).unwrap();
        assert!(store.master_record().unwrap().is_none());
        assert!(store.entries().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        fs::write(&path, b"{ not json").unwrap();
        assert!(FileVaultStore::open(&path).is_err());
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        let store = FileVaultStore::open(&path).unwrap();
        store.set_biometric_enabled(false).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
