//! Error types for the vault core.
//!
//! Each concern carries its own error enum so callers can match on the exact
//! failure class (wrong password vs. biometric cancellation vs. tampered
//! ciphertext) instead of parsing strings. The top-level [`VaultError`] wraps
//! them transparently.

use thiserror::Error;

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Top-level error for all vault core operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Authentication and master-password failures.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Cryptographic failures, including integrity violations.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Invalid caller-supplied configuration (generator options, bundle
    /// options).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Local persistence failures.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Remote blob transport failures.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Backup restore failures.
    #[error(transparent)]
    Restore(#[from] RestoreError),
}

/// Authentication failures.
///
/// Callers must be able to distinguish "fall back to manual entry"
/// ([`AuthError::NotAvailable`], [`AuthError::UserCancelled`],
/// [`AuthError::Timeout`]) from hard failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The supplied master password does not match the stored verifier.
    #[error("wrong master password")]
    WrongPassword,

    /// No master password has been set up on this installation.
    #[error("master password is not configured")]
    NotConfigured,

    /// A master password record already exists; use `change` to replace it.
    #[error("master password is already configured")]
    AlreadyConfigured,

    /// Biometric unlock was requested but escrow is not enabled.
    #[error("biometric unlock is not enabled")]
    NotEnabled,

    /// Biometric hardware is absent, not enrolled, or temporarily locked out.
    #[error("biometric authentication is not available: {reason}")]
    NotAvailable {
        /// Why the platform reported biometrics as unavailable.
        reason: String,
    },

    /// The user dismissed the biometric prompt.
    #[error("biometric prompt was cancelled by the user")]
    UserCancelled,

    /// The biometric prompt did not resolve within the bounded wait.
    #[error("biometric prompt timed out after {waited_secs}s")]
    Timeout {
        /// Seconds waited before giving up.
        waited_secs: u64,
    },
}

/// Cryptographic failures.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Authentication tag verification failed: the ciphertext was tampered
    /// with or the wrong key was used. Never masked as empty plaintext.
    #[error("integrity check failed: {context}")]
    Integrity {
        /// What was being decrypted.
        context: String,
    },

    /// AEAD encryption failed.
    #[error("encryption failed: {context}")]
    Encryption {
        /// What was being encrypted.
        context: String,
    },

    /// Key derivation (Argon2id or HKDF) failed.
    #[error("key derivation failed: {context}")]
    KeyDerivation {
        /// What was being derived.
        context: String,
    },

    /// Serialization of a plaintext record failed before encryption.
    #[error("serialization failed: {context}")]
    Serialization {
        /// What was being serialized.
        context: String,
    },
}

/// Invalid generator or backup configuration. Always caller-correctable and
/// never retried automatically.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Every character class was disabled, leaving nothing to draw from.
    #[error("no characters available: enable at least one character class")]
    EmptyCharset,

    /// Requested password length is zero or otherwise unusable.
    #[error("invalid password length {length}")]
    InvalidLength {
        /// The rejected length.
        length: usize,
    },

    /// Minimum-count constraints exceed the requested length.
    #[error("minimum counts ({required}) exceed password length ({length})")]
    ImpossibleMinimums {
        /// Sum of the minimum-count constraints.
        required: usize,
        /// Requested password length.
        length: usize,
    },

    /// A minimum count was requested for a disabled character class.
    #[error("minimum count set for disabled class: {class}")]
    DisabledClassMinimum {
        /// The disabled class the minimum refers to.
        class: String,
    },

    /// An encrypted backup was requested without a bundle password.
    #[error("encrypted backup requested but no bundle password supplied")]
    MissingBundlePassword,
}

/// Local persistence failures. Surfaced with enough detail for the caller to
/// retry; the core never retries silently.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage backend rejected or failed the operation.
    #[error("storage backend error during {context}: {reason}")]
    Backend {
        /// The operation that failed.
        context: String,
        /// Backend-reported reason.
        reason: String,
    },

    /// The platform credential store (keychain) failed.
    #[error("credential store error: {reason}")]
    CredentialStore {
        /// Keychain-reported reason.
        reason: String,
    },

    /// A record that should exist is missing.
    #[error("record not found: {what}")]
    NotFound {
        /// Description of the missing record.
        what: String,
    },
}

/// Remote blob transport failures. The transport is an external collaborator;
/// these never block local vault operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport is unreachable or not configured.
    #[error("transport unavailable: {reason}")]
    Unavailable {
        /// Why the transport could not be used.
        reason: String,
    },

    /// Upload failed.
    #[error("upload of '{name}' failed: {reason}")]
    Upload {
        /// Name the blob was being uploaded under.
        name: String,
        /// Transport-reported reason.
        reason: String,
    },

    /// Download failed.
    #[error("download of '{id}' failed: {reason}")]
    Download {
        /// Identifier of the requested blob.
        id: String,
        /// Transport-reported reason.
        reason: String,
    },

    /// The requested blob does not exist remotely.
    #[error("remote blob not found: {id}")]
    NotFound {
        /// Identifier of the missing blob.
        id: String,
    },
}

/// Backup restore failures.
///
/// Partial restores are reported, never hidden: [`RestoreError::Aborted`]
/// carries the counts committed before the failure so the caller knows the
/// vault's exact state.
#[derive(Debug, Error)]
pub enum RestoreError {
    /// The bundle document could not be parsed or is internally inconsistent.
    #[error("malformed backup bundle: {reason}")]
    MalformedBundle {
        /// What was wrong with the bundle.
        reason: String,
    },

    /// The bundle was written by a newer format version.
    #[error("unsupported bundle version {found} (this build supports up to {supported})")]
    UnsupportedVersion {
        /// Highest version this build understands.
        supported: u32,
        /// Version found in the bundle.
        found: u32,
    },

    /// Bundle decryption failed before any entry was committed: wrong
    /// password or tampered bundle.
    #[error("bundle decryption failed: {reason}")]
    Decryption {
        /// Why decryption failed.
        reason: String,
    },

    /// The restore stopped partway through. The counts reflect entries
    /// already committed to the live vault.
    #[error(
        "restore aborted after {saved} saved, {overwritten} overwritten, {skipped} skipped: {reason}"
    )]
    Aborted {
        /// Entries inserted before the failure.
        saved: usize,
        /// Live entries overwritten before the failure.
        overwritten: usize,
        /// Incoming entries skipped before the failure.
        skipped: usize,
        /// Why the restore stopped.
        reason: String,
    },
}
