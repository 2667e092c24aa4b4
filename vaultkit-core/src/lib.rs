//! Offline-first encrypted credential vault.
//!
//! Everything a password manager needs on the device side: master-password
//! key derivation with biometric escrow, per-entry authenticated encryption,
//! backup bundles with duplicate-safe restore, a password generator, and a
//! strength analyzer. All operations work without network access; the only
//! outward surface is the opaque [`transport::BlobTransport`] seam for
//! shipping backup bundles.
//!
//! # Key handling
//!
//! The master password is stretched with Argon2id and split under HKDF
//! labels into a persisted verifier and an in-memory [`VaultKey`]. The key
//! lives inside an [`UnlockedSession`] and is zeroized when the session
//! locks. See [`master_password`] for the derivation scheme.
//!
//! # Platform seams
//!
//! Persistence ([`store::VaultStore`]), the keychain
//! ([`biometric::CredentialStore`]), the biometric prompt
//! ([`biometric::BiometricPrompt`]), device compromise probes
//! ([`advisory::DeviceSecurityAdvisory`]) and remote blob storage
//! ([`transport::BlobTransport`]) are traits. In-memory implementations for
//! tests and ephemeral vaults live in [`memory`].

pub mod advisory;
pub mod backup;
pub mod biometric;
pub mod crypto;
pub mod error;
pub mod generator;
pub mod master_password;
pub mod memory;
pub mod session;
pub mod store;
pub mod strength;
pub mod transport;
pub mod types;

pub use backup::{
    create_backup, restore_from_backup, BackupBundle, BackupOptions, MergeStrategy,
    RestoreOptions, RestoreSummary,
};
pub use crypto::{decrypt_entry, encrypt_entry, VaultKey};
pub use error::{
    AuthError, ConfigError, CryptoError, RestoreError, StorageError, TransportError, VaultError,
    VaultResult,
};
pub use generator::{generate, generate_from_pattern, generate_pronounceable, GeneratorOptions};
pub use master_password::MasterPasswordManager;
pub use session::{LockReason, UnlockedSession};
pub use strength::{analyze, CrackTime, StrengthLabel, StrengthReport};
pub use types::{Category, EncryptedEntry, EntryId, PlaintextEntry, VaultSettings};
