//! Key derivation and master-password management.
//!
//! # Derivation scheme
//!
//! ```text
//! stretched = Argon2id(password, salt)            // slow, memory-hard
//! verifier  = HKDF-Expand(stretched, "vaultkit:verifier")   // persisted
//! vault key = HKDF-Expand(stretched, "vaultkit:vault-key")  // in-memory only
//! ```
//!
//! Storing a labeled verifier rather than the derived key means the key never
//! persists, and the stored verifier cannot double as an encryption key.
//! Verification recomputes the chain and compares verifiers in constant time.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::biometric::{
    AvailabilityCache, BiometricAvailability, BiometricPrompt, CredentialStore, PromptResponse,
    ESCROW_CREDENTIAL_KEY,
};
use crate::crypto::{self, VaultKey, KEY_SIZE, SALT_SIZE, VERIFIER_SIZE};
use crate::error::{AuthError, VaultResult};
use crate::store::VaultStore;
use crate::types::{now, MasterPasswordRecord};

/// Bounded wait for the platform biometric prompt.
pub const BIOMETRIC_PROMPT_TIMEOUT: Duration = Duration::from_secs(15);

/// HKDF label for the persisted verifier.
const LABEL_VERIFIER: &[u8] = b"vaultkit:verifier";

/// HKDF label for the in-memory vault key.
const LABEL_VAULT_KEY: &[u8] = b"vaultkit:vault-key";

/// Manages the master-password lifecycle: setup, verification, change,
/// biometric escrow, and teardown.
pub struct MasterPasswordManager {
    store: Arc<dyn VaultStore>,
    keychain: Arc<dyn CredentialStore>,
    prompt: Arc<dyn BiometricPrompt>,
    availability_cache: AvailabilityCache,
    prompt_timeout: Duration,
}

impl MasterPasswordManager {
    /// Creates a manager over the given platform collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn VaultStore>,
        keychain: Arc<dyn CredentialStore>,
        prompt: Arc<dyn BiometricPrompt>,
    ) -> Self {
        Self {
            store,
            keychain,
            prompt,
            availability_cache: AvailabilityCache::default(),
            prompt_timeout: BIOMETRIC_PROMPT_TIMEOUT,
        }
    }

    /// Overrides the biometric prompt timeout. Intended for tests.
    #[must_use]
    pub const fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    /// Resets the biometric availability cache so the next unlock probes the
    /// platform again.
    pub fn reset_availability_cache(&self) {
        self.availability_cache.invalidate();
    }

    /// Returns whether a master password has been set up.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if the store cannot be read.
    pub fn is_configured(&self) -> VaultResult<bool> {
        Ok(self.store.master_record()?.is_some())
    }

    /// Runs the full derivation chain for a password and salt.
    fn derive(
        password: &str,
        salt: &[u8; SALT_SIZE],
    ) -> VaultResult<(Zeroizing<[u8; VERIFIER_SIZE]>, VaultKey)> {
        let stretched = crypto::stretch_password(password, salt)?;
        let verifier = crypto::expand_labeled(&stretched, LABEL_VERIFIER);
        let key_bytes = crypto::expand_labeled(&stretched, LABEL_VAULT_KEY);
        let mut raw = [0u8; KEY_SIZE];
        raw.copy_from_slice(key_bytes.as_ref());
        Ok((verifier, VaultKey::from_bytes(raw)))
    }

    /// Sets up the master password on a fresh installation.
    ///
    /// Generates a random salt, persists `{hash, salt}` atomically, and, when
    /// `enable_biometric` is set, escrows the plaintext password in the
    /// platform keychain. On a partial escrow failure the flag is never left
    /// set without a corresponding keychain entry.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AlreadyConfigured`] if a record exists, or a
    /// [`crate::error::StorageError`] if persistence cannot complete.
    pub fn setup(&self, password: &str, enable_biometric: bool) -> VaultResult<()> {
        if self.store.master_record()?.is_some() {
            return Err(AuthError::AlreadyConfigured.into());
        }

        let salt = crypto::random_salt();
        let (verifier, _key) = Self::derive(password, &salt)?;
        let ts = now();
        let record = MasterPasswordRecord {
            hash: *verifier,
            salt,
            created_at: ts,
            last_verified_at: ts,
        };
        self.store.put_master_record(&record)?;

        if enable_biometric {
            self.enroll_escrow(password)?;
        }
        Ok(())
    }

    /// Verifies the master password and derives the session key.
    ///
    /// Comparison against the stored verifier is constant-time. On success
    /// `last_verified_at` is refreshed (best effort) and the derived
    /// [`VaultKey`] is returned.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotConfigured`] if no record exists or
    /// [`AuthError::WrongPassword`] on mismatch.
    pub fn verify(&self, password: &str) -> VaultResult<VaultKey> {
        let mut record = self
            .store
            .master_record()?
            .ok_or(AuthError::NotConfigured)?;

        let (verifier, key) = Self::derive(password, &record.salt)?;
        if !bool::from(verifier.ct_eq(&record.hash)) {
            return Err(AuthError::WrongPassword.into());
        }

        // Timestamp refresh must not block a successful unlock.
        record.last_verified_at = now();
        if let Err(err) = self.store.put_master_record(&record) {
            tracing::warn!(%err, "failed to refresh last_verified_at");
        }
        Ok(key)
    }

    /// Changes the master password, replacing the record wholesale and
    /// re-encrypting every stored entry under the new key.
    ///
    /// Entries are re-encrypted in memory before the new record is written;
    /// a crash between the record write and the final entry write leaves a
    /// window where some entries still carry old-key ciphertext, which the
    /// following `flush` narrows as far as the store allows.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::WrongPassword`] if `current` does not verify, or
    /// storage/crypto errors from the re-encryption sweep.
    pub fn change(&self, current: &str, new: &str) -> VaultResult<VaultKey> {
        let old_key = self.verify(current)?;

        let salt = crypto::random_salt();
        let (verifier, new_key) = Self::derive(new, &salt)?;

        // Decrypt everything under the old key first so a bad entry aborts
        // before any state changes.
        let mut reencrypted = Vec::new();
        for entry in self.store.entries()? {
            let plaintext = crypto::decrypt_entry(&old_key, &entry)?;
            reencrypted.push(crypto::encrypt_entry(&new_key, &plaintext)?);
        }

        let ts = now();
        self.store.put_master_record(&MasterPasswordRecord {
            hash: *verifier,
            salt,
            created_at: ts,
            last_verified_at: ts,
        })?;
        for entry in &reencrypted {
            self.store.upsert_entry(entry)?;
        }
        self.store.flush()?;

        if self.store.biometric_enabled()? {
            // Refresh the escrowed plaintext; a stale escrow would make
            // biometric unlock fail against the new verifier.
            if let Err(err) = self
                .keychain
                .set(ESCROW_CREDENTIAL_KEY, SecretString::from(new.to_owned()))
            {
                tracing::warn!(%err, "escrow refresh failed; disabling biometric unlock");
                self.disable_biometric()?;
            }
        }
        Ok(new_key)
    }

    /// Opts in to biometric unlock, escrowing the verified master password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::WrongPassword`] if `password` does not verify,
    /// or a [`crate::error::StorageError`] if escrow cannot be recorded.
    pub fn enable_biometric(&self, password: &str) -> VaultResult<()> {
        let _key = self.verify(password)?;
        self.enroll_escrow(password)
    }

    /// Opts out of biometric unlock.
    ///
    /// The flag is cleared first so the flag-set-without-entry state can
    /// never be observed; a failing keychain deletion leaves an orphaned
    /// entry, which is logged and harmless.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if the flag cannot be
    /// cleared.
    pub fn disable_biometric(&self) -> VaultResult<()> {
        self.store.set_biometric_enabled(false)?;
        if let Err(err) = self.keychain.delete(ESCROW_CREDENTIAL_KEY) {
            tracing::warn!(%err, "failed to remove escrowed master password");
        }
        Ok(())
    }

    /// Stores the escrowed password, then sets the flag. Ordering preserves
    /// the invariant that the flag is never set without an entry.
    fn enroll_escrow(&self, password: &str) -> VaultResult<()> {
        self.keychain
            .set(ESCROW_CREDENTIAL_KEY, SecretString::from(password.to_owned()))?;
        if let Err(err) = self.store.set_biometric_enabled(true) {
            // Roll the keychain entry back so opt-in is all-or-nothing.
            if let Err(cleanup) = self.keychain.delete(ESCROW_CREDENTIAL_KEY) {
                tracing::warn!(%cleanup, "escrow rollback failed");
            }
            return Err(err);
        }
        Ok(())
    }

    /// Unlocks the vault via the platform biometric prompt.
    ///
    /// Checks the escrow flag, probes capability (cached, see
    /// [`AvailabilityCache`]), bounds the prompt wait by the configured
    /// timeout, retrieves the escrowed password, and forwards to
    /// [`Self::verify`].
    ///
    /// # Errors
    ///
    /// Distinct outcomes so callers can tell "fall back to manual entry"
    /// from hard failure: [`AuthError::NotEnabled`],
    /// [`AuthError::NotAvailable`], [`AuthError::UserCancelled`],
    /// [`AuthError::Timeout`].
    pub async fn unlock_via_biometric(&self, reason: &str) -> VaultResult<VaultKey> {
        if !self.store.biometric_enabled()? {
            return Err(AuthError::NotEnabled.into());
        }

        let availability = self
            .availability_cache
            .get_or_probe(|| self.prompt.availability());
        if availability != BiometricAvailability::Available {
            return Err(AuthError::NotAvailable {
                reason: availability.to_string(),
            }
            .into());
        }

        let response = tokio::time::timeout(self.prompt_timeout, self.prompt.authenticate(reason))
            .await
            .map_err(|_| AuthError::Timeout {
                waited_secs: self.prompt_timeout.as_secs(),
            })??;
        if response == PromptResponse::Cancelled {
            return Err(AuthError::UserCancelled.into());
        }

        let Some(password) = self.keychain.get(ESCROW_CREDENTIAL_KEY)? else {
            // Escrow invariant violated (flag set, entry gone). Repair the
            // flag and report as not enabled so the caller falls back.
            tracing::warn!("escrow flag set without keychain entry; disabling");
            if let Err(err) = self.store.set_biometric_enabled(false) {
                tracing::warn!(%err, "failed to clear stale escrow flag");
            }
            return Err(AuthError::NotEnabled.into());
        };

        self.verify(password.expose_secret())
    }

    /// Erases the master-password record and the escrowed keychain entry.
    ///
    /// The hash/salt removal is the security-critical half and its failure is
    /// surfaced; keychain cleanup failures are logged, not surfaced, so a
    /// flaky keychain cannot block a reset.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] only if the master record
    /// itself cannot be deleted.
    pub fn clear_all(&self) -> VaultResult<()> {
        self.store.delete_master_record()?;
        if let Err(err) = self.store.set_biometric_enabled(false) {
            tracing::warn!(%err, "failed to clear escrow flag during reset");
        }
        if let Err(err) = self.keychain.delete(ESCROW_CREDENTIAL_KEY) {
            tracing::warn!(%err, "failed to delete escrowed master password during reset");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;
    use crate::memory::{MemoryCredentialStore, MemoryVaultStore, StubPrompt};
    use crate::types::PlaintextEntry;

    fn manager_with_prompt(prompt: StubPrompt) -> MasterPasswordManager {
        MasterPasswordManager::new(
            Arc::new(MemoryVaultStore::new()),
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(prompt),
        )
    }

    fn manager() -> MasterPasswordManager {
        manager_with_prompt(StubPrompt::confirming())
    }

    #[test]
    fn setup_then_verify_succeeds() {
        let mgr = manager();
        mgr.setup("Correct1!", false).unwrap();
        mgr.verify("Correct1!").unwrap();
    }

    #[test]
    fn verify_wrong_password_fails() {
        let mgr = manager();
        mgr.setup("Correct1!", false).unwrap();
        let result = mgr.verify("wrong");
        assert!(matches!(
            result,
            Err(VaultError::Auth(AuthError::WrongPassword))
        ));
    }

    #[test]
    fn verify_unconfigured_fails() {
        let result = manager().verify("anything");
        assert!(matches!(
            result,
            Err(VaultError::Auth(AuthError::NotConfigured))
        ));
    }

    #[test]
    fn setup_twice_is_rejected() {
        let mgr = manager();
        mgr.setup("Correct1!", false).unwrap();
        assert!(matches!(
            mgr.setup("Other2@", false),
            Err(VaultError::Auth(AuthError::AlreadyConfigured))
        ));
    }

    #[test]
    fn clear_all_then_verify_is_not_configured() {
        let mgr = manager();
        mgr.setup("Correct1!", true).unwrap();
        mgr.clear_all().unwrap();
        assert!(matches!(
            mgr.verify("Correct1!"),
            Err(VaultError::Auth(AuthError::NotConfigured))
        ));
    }

    #[test]
    fn derived_key_is_stable_for_same_password() {
        let mgr = manager();
        mgr.setup("Correct1!", false).unwrap();
        let a = mgr.verify("Correct1!").unwrap();
        let b = mgr.verify("Correct1!").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn change_reencrypts_entries() {
        let store = Arc::new(MemoryVaultStore::new());
        let mgr = MasterPasswordManager::new(
            Arc::clone(&store) as Arc<dyn VaultStore>,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(StubPrompt::confirming()),
        );
        mgr.setup("OldPass1!", false).unwrap();
        let old_key = mgr.verify("OldPass1!").unwrap();

        let entry = PlaintextEntry::new("example.com", "alice", "hunter2!X");
        store
            .upsert_entry(&crypto::encrypt_entry(&old_key, &entry).unwrap())
            .unwrap();

        let new_key = mgr.change("OldPass1!", "NewPass2@").unwrap();
        assert!(matches!(
            mgr.verify("OldPass1!"),
            Err(VaultError::Auth(AuthError::WrongPassword))
        ));

        let stored = store.entries().unwrap();
        assert_eq!(stored.len(), 1);
        let decrypted = crypto::decrypt_entry(&new_key, &stored[0]).unwrap();
        assert_eq!(decrypted, entry);
        // The old key no longer opens the re-encrypted entry.
        assert!(crypto::decrypt_entry(&old_key, &stored[0]).is_err());
    }

    #[tokio::test]
    async fn biometric_unlock_roundtrip() {
        let mgr = manager();
        mgr.setup("Correct1!", true).unwrap();
        let key = mgr.unlock_via_biometric("unlock your vault").await.unwrap();
        let direct = mgr.verify("Correct1!").unwrap();
        assert_eq!(key.as_bytes(), direct.as_bytes());
    }

    #[tokio::test]
    async fn biometric_unlock_without_escrow_is_not_enabled() {
        let mgr = manager();
        mgr.setup("Correct1!", false).unwrap();
        assert!(matches!(
            mgr.unlock_via_biometric("unlock").await,
            Err(VaultError::Auth(AuthError::NotEnabled))
        ));
    }

    #[tokio::test]
    async fn biometric_unlock_cancelled() {
        let mgr = manager_with_prompt(StubPrompt::cancelling());
        mgr.setup("Correct1!", true).unwrap();
        assert!(matches!(
            mgr.unlock_via_biometric("unlock").await,
            Err(VaultError::Auth(AuthError::UserCancelled))
        ));
    }

    #[tokio::test]
    async fn biometric_unlock_unavailable() {
        let mgr =
            manager_with_prompt(StubPrompt::with_availability(BiometricAvailability::NotEnrolled));
        mgr.setup("Correct1!", true).unwrap();
        assert!(matches!(
            mgr.unlock_via_biometric("unlock").await,
            Err(VaultError::Auth(AuthError::NotAvailable { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn biometric_unlock_times_out() {
        let prompt = StubPrompt::confirming().with_delay(Duration::from_secs(60));
        let mgr = manager_with_prompt(prompt).with_prompt_timeout(Duration::from_secs(15));
        mgr.setup("Correct1!", true).unwrap();
        assert!(matches!(
            mgr.unlock_via_biometric("unlock").await,
            Err(VaultError::Auth(AuthError::Timeout { waited_secs: 15 }))
        ));
    }

    #[test]
    fn disable_biometric_clears_flag_and_entry() {
        let store = Arc::new(MemoryVaultStore::new());
        let keychain = Arc::new(MemoryCredentialStore::new());
        let mgr = MasterPasswordManager::new(
            Arc::clone(&store) as Arc<dyn VaultStore>,
            Arc::clone(&keychain) as Arc<dyn CredentialStore>,
            Arc::new(StubPrompt::confirming()),
        );
        mgr.setup("Correct1!", true).unwrap();
        assert!(store.biometric_enabled().unwrap());

        mgr.disable_biometric().unwrap();
        assert!(!store.biometric_enabled().unwrap());
        assert!(keychain.get(ESCROW_CREDENTIAL_KEY).unwrap().is_none());
    }
}
