//! In-memory implementations of the platform seams.
//!
//! Used by the test suites and by host applications that want a vault without
//! platform integration (ephemeral vaults, previews). Nothing here persists
//! beyond the process.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::advisory::{DeviceSecurityAdvisory, SecurityAssessment, SecurityVerdict};
use crate::biometric::{BiometricAvailability, BiometricPrompt, CredentialStore, PromptResponse};
use crate::error::{StorageError, TransportError, VaultResult};
use crate::store::VaultStore;
use crate::transport::{BlobTransport, RemoteBlobInfo};
use crate::types::{now, Category, EncryptedEntry, EntryId, MasterPasswordRecord, VaultSettings};

#[derive(Default)]
struct VaultState {
    master: Option<MasterPasswordRecord>,
    biometric_enabled: bool,
    entries: HashMap<EntryId, EncryptedEntry>,
    categories: Vec<Category>,
    settings: Option<VaultSettings>,
    /// Remaining successful upserts before injected failure, when set.
    upserts_before_failure: Option<usize>,
}

/// In-memory [`VaultStore`].
#[derive(Default)]
pub struct MemoryVaultStore {
    state: Mutex<VaultState>,
}

impl MemoryVaultStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `upsert_entry` fail after `n` more successful writes. Lets
    /// tests exercise partial-write reporting.
    ///
    /// # Panics
    ///
    /// Panics if the store mutex was poisoned by a panicking thread.
    pub fn fail_after_upserts(&self, n: usize) {
        self.state.lock().expect("store poisoned").upserts_before_failure = Some(n);
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, VaultState> {
        self.state.lock().expect("store poisoned")
    }
}

impl VaultStore for MemoryVaultStore {
    fn master_record(&self) -> VaultResult<Option<MasterPasswordRecord>> {
        Ok(self.locked().master.clone())
    }

    fn put_master_record(&self, record: &MasterPasswordRecord) -> VaultResult<()> {
        self.locked().master = Some(record.clone());
        Ok(())
    }

    fn delete_master_record(&self) -> VaultResult<()> {
        self.locked().master = None;
        Ok(())
    }

    fn biometric_enabled(&self) -> VaultResult<bool> {
        Ok(self.locked().biometric_enabled)
    }

    fn set_biometric_enabled(&self, enabled: bool) -> VaultResult<()> {
        self.locked().biometric_enabled = enabled;
        Ok(())
    }

    fn entries(&self) -> VaultResult<Vec<EncryptedEntry>> {
        Ok(self.locked().entries.values().cloned().collect())
    }

    fn entry(&self, id: EntryId) -> VaultResult<Option<EncryptedEntry>> {
        Ok(self.locked().entries.get(&id).cloned())
    }

    fn upsert_entry(&self, entry: &EncryptedEntry) -> VaultResult<()> {
        let mut state = self.locked();
        if let Some(remaining) = state.upserts_before_failure {
            if remaining == 0 {
                return Err(StorageError::Backend {
                    context: "upsert_entry".to_string(),
                    reason: "injected failure".to_string(),
                }
                .into());
            }
            state.upserts_before_failure = Some(remaining - 1);
        }
        state.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    fn delete_entry(&self, id: EntryId) -> VaultResult<bool> {
        Ok(self.locked().entries.remove(&id).is_some())
    }

    fn clear_entries(&self) -> VaultResult<()> {
        self.locked().entries.clear();
        Ok(())
    }

    fn categories(&self) -> VaultResult<Vec<Category>> {
        Ok(self.locked().categories.clone())
    }

    fn put_categories(&self, categories: &[Category]) -> VaultResult<()> {
        self.locked().categories = categories.to_vec();
        Ok(())
    }

    fn settings(&self) -> VaultResult<Option<VaultSettings>> {
        Ok(self.locked().settings.clone())
    }

    fn put_settings(&self, settings: &VaultSettings) -> VaultResult<()> {
        self.locked().settings = Some(settings.clone());
        Ok(())
    }

    fn flush(&self) -> VaultResult<()> {
        Ok(())
    }
}

/// In-memory [`CredentialStore`] with no access control. Test use only; a
/// real keychain gates reads behind the platform biometric check.
#[derive(Default)]
pub struct MemoryCredentialStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    /// Creates an empty credential store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn set(&self, key: &str, value: SecretString) -> VaultResult<()> {
        self.secrets
            .lock()
            .expect("credential store poisoned")
            .insert(key.to_string(), value.expose_secret().to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> VaultResult<Option<SecretString>> {
        Ok(self
            .secrets
            .lock()
            .expect("credential store poisoned")
            .get(key)
            .map(|s| SecretString::from(s.clone())))
    }

    fn delete(&self, key: &str) -> VaultResult<()> {
        self.secrets
            .lock()
            .expect("credential store poisoned")
            .remove(key);
        Ok(())
    }
}

/// Scriptable [`BiometricPrompt`].
pub struct StubPrompt {
    availability: BiometricAvailability,
    response: PromptResponse,
    delay: Option<Duration>,
}

impl StubPrompt {
    /// A prompt that the user always passes.
    #[must_use]
    pub const fn confirming() -> Self {
        Self {
            availability: BiometricAvailability::Available,
            response: PromptResponse::Confirmed,
            delay: None,
        }
    }

    /// A prompt that the user always dismisses.
    #[must_use]
    pub const fn cancelling() -> Self {
        Self {
            availability: BiometricAvailability::Available,
            response: PromptResponse::Cancelled,
            delay: None,
        }
    }

    /// A prompt reporting the given availability; authentication confirms if
    /// it is ever reached.
    #[must_use]
    pub const fn with_availability(availability: BiometricAvailability) -> Self {
        Self {
            availability,
            response: PromptResponse::Confirmed,
            delay: None,
        }
    }

    /// Delays authentication, for exercising the prompt timeout.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl BiometricPrompt for StubPrompt {
    fn availability(&self) -> BiometricAvailability {
        self.availability
    }

    async fn authenticate(&self, _reason: &str) -> VaultResult<PromptResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.response)
    }
}

/// In-memory [`BlobTransport`].
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<TransportState>,
}

#[derive(Default)]
struct TransportState {
    blobs: HashMap<String, (RemoteBlobInfo, Vec<u8>)>,
    next_id: u64,
    offline: bool,
}

impl MemoryTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the transport going unreachable.
    ///
    /// # Panics
    ///
    /// Panics if the transport mutex was poisoned by a panicking thread.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().expect("transport poisoned").offline = offline;
    }

    fn check_online(state: &TransportState) -> VaultResult<()> {
        if state.offline {
            return Err(TransportError::Unavailable {
                reason: "transport offline".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl BlobTransport for MemoryTransport {
    fn upload(&self, bytes: &[u8], name: &str) -> VaultResult<String> {
        let mut state = self.state.lock().expect("transport poisoned");
        Self::check_online(&state)?;
        state.next_id += 1;
        let id = format!("blob-{}", state.next_id);
        let info = RemoteBlobInfo {
            id: id.clone(),
            name: name.to_string(),
            size: bytes.len() as u64,
            created_at: now(),
        };
        state.blobs.insert(id.clone(), (info, bytes.to_vec()));
        Ok(id)
    }

    fn download(&self, id: &str) -> VaultResult<Vec<u8>> {
        let state = self.state.lock().expect("transport poisoned");
        Self::check_online(&state)?;
        state
            .blobs
            .get(id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| TransportError::NotFound { id: id.to_string() }.into())
    }

    fn list(&self) -> VaultResult<Vec<RemoteBlobInfo>> {
        let state = self.state.lock().expect("transport poisoned");
        Self::check_online(&state)?;
        Ok(state.blobs.values().map(|(info, _)| info.clone()).collect())
    }

    fn delete(&self, id: &str) -> VaultResult<()> {
        let mut state = self.state.lock().expect("transport poisoned");
        Self::check_online(&state)?;
        state
            .blobs
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| TransportError::NotFound { id: id.to_string() }.into())
    }
}

enum AdvisoryScript {
    Failing,
    Threats(Vec<String>),
}

/// Scriptable [`DeviceSecurityAdvisory`].
pub struct StaticAdvisory {
    script: Mutex<AdvisoryScript>,
}

impl StaticAdvisory {
    /// An advisory that reports no threats.
    #[must_use]
    pub fn secure() -> Self {
        Self {
            script: Mutex::new(AdvisoryScript::Threats(Vec::new())),
        }
    }

    /// An advisory that reports the given threats.
    #[must_use]
    pub fn insecure(threats: Vec<String>) -> Self {
        Self {
            script: Mutex::new(AdvisoryScript::Threats(threats)),
        }
    }

    /// An advisory whose probe errors out.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            script: Mutex::new(AdvisoryScript::Failing),
        }
    }

    /// Rescripts the advisory to report the given threats from now on.
    ///
    /// # Panics
    ///
    /// Panics if the advisory mutex was poisoned by a panicking thread.
    pub fn set_threats(&self, threats: Vec<String>) {
        *self.script.lock().expect("advisory poisoned") = AdvisoryScript::Threats(threats);
    }
}

impl DeviceSecurityAdvisory for StaticAdvisory {
    fn assess(&self) -> VaultResult<SecurityAssessment> {
        match &*self.script.lock().expect("advisory poisoned") {
            AdvisoryScript::Failing => Err(StorageError::Backend {
                context: "security probe".to_string(),
                reason: "probe unavailable".to_string(),
            }
            .into()),
            AdvisoryScript::Threats(threats) if threats.is_empty() => {
                Ok(SecurityAssessment::secure())
            }
            AdvisoryScript::Threats(threats) => Ok(SecurityAssessment {
                verdict: SecurityVerdict::Insecure,
                threats: threats.clone(),
                checked_at: now(),
            }),
        }
    }
}
