//! Core data model for the vault.
//!
//! Records fall into two groups: what is persisted (the master-password
//! verifier, encrypted entries, categories, settings) and what exists only in
//! memory for the duration of a single operation ([`PlaintextEntry`]).

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{NONCE_SIZE, SALT_SIZE, TAG_SIZE, VERIFIER_SIZE};

/// Returns the current unix timestamp in seconds.
///
/// Clock-before-epoch is treated as zero rather than panicking.
#[must_use]
pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Unique identifier of a vault entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Generates a fresh random entry ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the raw 16 ID bytes, used as associated data during entry
    /// encryption.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The persisted master-password verifier.
///
/// Exactly one active record exists per installation. The plaintext master
/// password is never persisted; `hash` is the sole means of future
/// verification and cannot be used as an encryption key (see
/// [`crate::master_password`] for the derivation split).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterPasswordRecord {
    /// Domain-separated verifier derived from the password and `salt`.
    pub hash: [u8; VERIFIER_SIZE],
    /// Random per-installation KDF salt.
    pub salt: [u8; SALT_SIZE],
    /// When the record was created (unix seconds).
    pub created_at: u64,
    /// When the password was last successfully verified (unix seconds).
    pub last_verified_at: u64,
}

/// An encrypted vault entry as persisted in the local store.
///
/// Each entry carries its own salt and nonce; neither is ever reused across
/// two encryptions, even of identical plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEntry {
    /// Stable entry identifier, bound into the AEAD associated data.
    pub id: EntryId,
    /// XChaCha20-Poly1305 ciphertext of the serialized [`PlaintextEntry`].
    pub ciphertext: Vec<u8>,
    /// Per-entry HKDF salt for subkey derivation.
    pub salt: [u8; SALT_SIZE],
    /// Per-encryption AEAD nonce.
    pub iv: [u8; NONCE_SIZE],
    /// Poly1305 authentication tag, verified before any plaintext is
    /// released.
    pub auth_tag: [u8; TAG_SIZE],
    /// When the entry was first created (unix seconds).
    pub created_at: u64,
    /// When the entry was last modified (unix seconds).
    pub updated_at: u64,
}

/// A decrypted vault entry.
///
/// Owned exclusively by the caller for the duration of a single use; the core
/// retains no plaintext copies beyond the operation that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextEntry {
    /// Stable entry identifier, preserved across encryptions.
    pub id: EntryId,
    /// Display title (e.g. the service name).
    pub title: String,
    /// Account username or email.
    pub username: String,
    /// The stored secret.
    pub password: String,
    /// Associated website, if any.
    pub website: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Category name, if the entry is categorized.
    pub category: Option<String>,
    /// User-assigned tags.
    pub tags: Vec<String>,
    /// Additional user-defined fields.
    pub custom_fields: Vec<CustomField>,
    /// Audit metadata maintained by the application.
    pub audit: EntryAudit,
    /// Prior passwords, most recent first.
    pub history: Vec<PasswordHistoryItem>,
    /// When the entry was first created (unix seconds).
    pub created_at: u64,
    /// When the entry was last modified (unix seconds).
    pub updated_at: u64,
}

impl PlaintextEntry {
    /// Creates a new entry with fresh ID and timestamps; optional fields
    /// empty.
    #[must_use]
    pub fn new(title: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        let ts = now();
        Self {
            id: EntryId::generate(),
            title: title.into(),
            username: username.into(),
            password: password.into(),
            website: None,
            notes: None,
            category: None,
            tags: Vec::new(),
            custom_fields: Vec::new(),
            audit: EntryAudit::default(),
            history: Vec::new(),
            created_at: ts,
            updated_at: ts,
        }
    }

    /// Replaces the password, pushing the old one onto the history and
    /// refreshing `updated_at`.
    pub fn rotate_password(&mut self, new_password: impl Into<String>) {
        let ts = now();
        let old = std::mem::replace(&mut self.password, new_password.into());
        self.history.insert(
            0,
            PasswordHistoryItem {
                password: old,
                replaced_at: ts,
            },
        );
        self.updated_at = ts;
    }
}

/// A user-defined field attached to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    /// Field label shown to the user.
    pub label: String,
    /// Field value.
    pub value: String,
    /// Whether the value should be masked in UIs.
    pub hidden: bool,
}

/// A prior password retained for history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHistoryItem {
    /// The superseded password.
    pub password: String,
    /// When it was replaced (unix seconds).
    pub replaced_at: u64,
}

/// Audit metadata maintained per entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryAudit {
    /// Last computed strength score (0..=4).
    pub strength_score: u8,
    /// How many other entries share this password.
    pub duplicate_count: u32,
    /// Known-breach status of the password.
    pub breach_status: BreachStatus,
}

/// Known-breach status of a password.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum BreachStatus {
    /// Not yet checked against any breach corpus.
    #[default]
    Unknown,
    /// Checked and not found in a known breach.
    Clear,
    /// Found in a known breach.
    Breached,
}

/// An entry category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Unique category name.
    pub name: String,
    /// Optional icon identifier for UIs.
    pub icon: Option<String>,
}

/// Persisted application settings, snapshotted into backups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSettings {
    /// Idle seconds before the session re-locks.
    pub auto_lock_timeout_secs: u64,
    /// Seconds before a copied secret is cleared from the clipboard.
    pub clipboard_clear_secs: u64,
    /// Whether unlocking requires biometrics when escrow is enabled.
    pub require_biometric_unlock: bool,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            auto_lock_timeout_secs: 300,
            clipboard_clear_secs: 30,
            require_biometric_unlock: false,
        }
    }
}
