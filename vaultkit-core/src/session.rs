//! Unlocked session lifetime.
//!
//! The vault key exists only inside an [`UnlockedSession`]. Locking consumes
//! the session, which drops (and zeroizes) the key; there is no way to reach
//! the key of a locked session.

use std::time::{Duration, Instant};

use crate::crypto::VaultKey;

/// Why a session was locked. Logged for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LockReason {
    /// The user locked the vault explicitly.
    ManualLock,
    /// The idle timeout elapsed.
    IdleTimeout,
    /// The application moved to the background.
    AppBackgrounded,
}

/// A live unlocked session holding the derived vault key.
#[derive(Debug)]
pub struct UnlockedSession {
    key: VaultKey,
    unlocked_at: Instant,
}

impl UnlockedSession {
    /// Starts a session around a freshly derived key.
    #[must_use]
    pub fn new(key: VaultKey) -> Self {
        Self {
            key,
            unlocked_at: Instant::now(),
        }
    }

    /// Returns the session vault key.
    #[must_use]
    pub const fn key(&self) -> &VaultKey {
        &self.key
    }

    /// How long the session has been unlocked.
    #[must_use]
    pub fn unlocked_for(&self) -> Duration {
        self.unlocked_at.elapsed()
    }

    /// Whether the session has outlived the given idle timeout.
    #[must_use]
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.unlocked_at.elapsed() >= timeout
    }

    /// Locks the session, consuming it and zeroizing the key.
    pub fn lock(self, reason: LockReason) {
        tracing::info!(%reason, unlocked_for_secs = self.unlocked_for().as_secs(), "vault locked");
        drop(self);
    }
}
