//! Platform seams for biometric escrow.
//!
//! Biometric unlock stores the real master password behind hardware-backed
//! access control. That is an explicit risk reduction, not elimination: the
//! secret exists in the platform keychain, gated by the biometric prompt.
//! The vault core only ever sees it through the [`CredentialStore`] trait.
//!
//! Platform implementations should use hardware-backed storage where
//! available:
//! - iOS: Keychain Services with `kSecAttrAccessibleWhenUnlockedThisDeviceOnly`
//!   plus `biometryCurrentSet` access control
//! - Android: Keystore-wrapped entry with `setUserAuthenticationRequired`
//! - Desktop: OS credential manager, falling back to "not available"

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::VaultResult;

/// Fixed identifier the escrowed master password is stored under.
pub const ESCROW_CREDENTIAL_KEY: &str = "vaultkit.master-password";

/// How long a cached availability probe stays valid.
pub const AVAILABILITY_CACHE_TTL: Duration = Duration::from_secs(30);

/// Platform credential store (keychain) for the escrowed master password.
///
/// Used only for the biometric-escrowed master password string, keyed by
/// [`ESCROW_CREDENTIAL_KEY`]. Implementations MUST gate `get` behind the
/// platform's biometric/hardware access control.
pub trait CredentialStore: Send + Sync {
    /// Stores a secret under a key, replacing any existing value.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError::CredentialStore`] if the
    /// keychain rejects the write.
    fn set(&self, key: &str, value: SecretString) -> VaultResult<()>;

    /// Retrieves a secret, or `None` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError::CredentialStore`] if the
    /// keychain cannot be read.
    fn get(&self, key: &str) -> VaultResult<Option<SecretString>>;

    /// Deletes a secret. Succeeds if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError::CredentialStore`] if the
    /// keychain rejects the deletion.
    fn delete(&self, key: &str) -> VaultResult<()>;
}

/// Current biometric capability as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BiometricAvailability {
    /// Biometrics are enrolled and usable right now.
    Available,
    /// The device has no biometric hardware.
    NoHardware,
    /// Hardware exists but nothing is enrolled.
    NotEnrolled,
    /// Temporarily locked out (too many failed attempts, device policy).
    LockedOut,
}

/// Outcome of a biometric prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptResponse {
    /// The user passed the biometric check.
    Confirmed,
    /// The user dismissed the prompt.
    Cancelled,
}

/// Platform biometric prompt.
///
/// `authenticate` may block on a hardware prompt for an arbitrary time;
/// callers bound the wait (see
/// [`crate::master_password::BIOMETRIC_PROMPT_TIMEOUT`]) and treat expiry as
/// a distinct, recoverable outcome.
#[async_trait]
pub trait BiometricPrompt: Send + Sync {
    /// Probes current biometric capability without prompting.
    fn availability(&self) -> BiometricAvailability;

    /// Shows the biometric prompt and resolves with the user's response.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::StorageError`] if the platform prompt
    /// itself fails (as opposed to the user cancelling).
    async fn authenticate(&self, reason: &str) -> VaultResult<PromptResponse>;
}

/// A cached availability probe.
#[derive(Debug, Clone)]
struct CachedAvailability {
    result: BiometricAvailability,
    checked_at: Instant,
}

/// Explicit, resettable cache for biometric availability probes.
///
/// Availability checks can be slow on some platforms, so the result is
/// cached with a TTL. The cache is an owned object (not a module-level
/// flag) so tests can reset it deterministically via [`Self::invalidate`].
#[derive(Debug)]
pub struct AvailabilityCache {
    ttl: Duration,
    cached: Mutex<Option<CachedAvailability>>,
}

impl AvailabilityCache {
    /// Creates a cache with the given TTL.
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Returns the cached availability, probing via `probe` when the cache
    /// is empty or stale.
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex was poisoned by a panicking thread.
    pub fn get_or_probe(
        &self,
        probe: impl FnOnce() -> BiometricAvailability,
    ) -> BiometricAvailability {
        let mut guard = self.cached.lock().expect("availability cache poisoned");
        if let Some(cached) = guard.as_ref() {
            if cached.checked_at.elapsed() < self.ttl {
                return cached.result;
            }
        }
        let result = probe();
        *guard = Some(CachedAvailability {
            result,
            checked_at: Instant::now(),
        });
        result
    }

    /// Drops any cached probe so the next check hits the platform again.
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex was poisoned by a panicking thread.
    pub fn invalidate(&self) {
        *self.cached.lock().expect("availability cache poisoned") = None;
    }
}

impl Default for AvailabilityCache {
    fn default() -> Self {
        Self::new(AVAILABILITY_CACHE_TTL)
    }
}
