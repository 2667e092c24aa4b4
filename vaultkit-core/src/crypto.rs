//! Entry encryption engine.
//!
//! Every vault entry is envelope-encrypted: a fresh random salt is drawn per
//! encryption, a per-entry subkey is derived from the session [`VaultKey`]
//! and that salt via HKDF-SHA256, and the serialized entry is sealed with
//! XChaCha20-Poly1305. The entry ID is bound as associated data so a
//! ciphertext cannot be silently re-attached to a different record.
//!
//! Decryption fails closed: the authentication tag is verified before any
//! plaintext is released, and a mismatch surfaces as
//! [`CryptoError::Integrity`], never as empty or garbled plaintext.

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CryptoError, VaultResult};
use crate::types::{EncryptedEntry, PlaintextEntry};

/// Size of per-entry and per-installation KDF salts in bytes.
pub const SALT_SIZE: usize = 16;

/// XChaCha20-Poly1305 nonce size in bytes.
pub const NONCE_SIZE: usize = 24;

/// Poly1305 authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Symmetric key size in bytes (256-bit).
pub const KEY_SIZE: usize = 32;

/// Master-password verifier size in bytes.
pub const VERIFIER_SIZE: usize = 32;

/// Domain separation label for per-entry subkeys.
const LABEL_ENTRY_KEY: &[u8] = b"vaultkit:entry-key";

/// Domain separation label for bundle-password subkeys.
const LABEL_BACKUP_KEY: &[u8] = b"vaultkit:backup-key";

/// Argon2id memory cost: 64 MiB.
const ARGON2_MEMORY_KIB: u32 = 64 * 1024;
/// Argon2id iteration count.
const ARGON2_ITERATIONS: u32 = 3;
/// Argon2id lanes.
const ARGON2_PARALLELISM: u32 = 1;

/// The in-memory vault encryption key (256-bit).
///
/// Derived from the master password on every unlock; exists only for the
/// lifetime of an unlocked session and is never persisted in any form.
///
/// # Security
///
/// - Zeroized on drop.
/// - Never logged or serialized; `Debug` is redacted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey([u8; KEY_SIZE]);

impl VaultKey {
    /// Creates a vault key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generates a random vault key. Used by tests and by callers that
    /// need a throwaway key; session keys come from the master password.
    ///
    /// # Panics
    ///
    /// Panics if the system's random number generator fails.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        getrandom::getrandom(&mut bytes).expect("getrandom failed");
        Self(bytes)
    }

    /// Returns a reference to the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Generates a fresh random salt.
///
/// # Panics
///
/// Panics if the system's random number generator fails.
#[must_use]
pub fn random_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    getrandom::getrandom(&mut salt).expect("getrandom failed");
    salt
}

/// Generates a fresh random AEAD nonce.
///
/// # Panics
///
/// Panics if the system's random number generator fails.
#[must_use]
pub fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    getrandom::getrandom(&mut nonce).expect("getrandom failed");
    nonce
}

/// Stretches a password into a 256-bit secret with Argon2id.
///
/// Deliberately slow and memory-hard (64 MiB, 3 iterations) to resist offline
/// brute force. The output is raw key material, not a PHC string; callers
/// expand it further under domain labels before storing or using it.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivation`] if the Argon2 parameters are
/// rejected or hashing fails.
pub fn stretch_password(
    password: &str,
    salt: &[u8; SALT_SIZE],
) -> VaultResult<Zeroizing<[u8; KEY_SIZE]>> {
    let params = Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::KeyDerivation {
        context: format!("argon2 parameters: {e}"),
    })?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut stretched = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(password.as_bytes(), salt, stretched.as_mut())
        .map_err(|e| CryptoError::KeyDerivation {
            context: format!("argon2 hashing: {e}"),
        })?;
    Ok(stretched)
}

/// Expands a 256-bit secret into a labeled 256-bit subkey via HKDF-SHA256.
///
/// Labels provide domain separation: the same input secret yields unrelated
/// outputs for the verifier, the vault key, per-entry keys, and so on.
///
/// # Panics
///
/// Does not panic in practice; a 32-byte PRK and 32-byte output are always
/// valid for HKDF-SHA256.
#[must_use]
pub fn expand_labeled(secret: &[u8; KEY_SIZE], label: &[u8]) -> Zeroizing<[u8; KEY_SIZE]> {
    let hk = Hkdf::<Sha256>::from_prk(secret).expect("32-byte PRK is always valid for SHA-256");
    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    hk.expand(label, okm.as_mut())
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    okm
}

/// Derives the per-entry subkey from the vault key and a per-entry salt.
fn derive_entry_key(key: &VaultKey, salt: &[u8; SALT_SIZE]) -> Zeroizing<[u8; KEY_SIZE]> {
    let hk = Hkdf::<Sha256>::new(Some(salt), key.as_bytes());
    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    hk.expand(LABEL_ENTRY_KEY, okm.as_mut())
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    okm
}

/// Derives a bundle-password subkey for backup password-field encryption.
///
/// The expensive Argon2id stretch runs once per bundle; the per-field salt
/// then feeds a cheap HKDF expansion.
#[must_use]
pub fn derive_backup_field_key(
    stretched_bundle_secret: &[u8; KEY_SIZE],
    field_salt: &[u8; SALT_SIZE],
) -> Zeroizing<[u8; KEY_SIZE]> {
    let hk = Hkdf::<Sha256>::new(Some(field_salt), stretched_bundle_secret);
    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    hk.expand(LABEL_BACKUP_KEY, okm.as_mut())
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    okm
}

/// Seals plaintext with XChaCha20-Poly1305, returning the ciphertext with
/// the tag split off.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the AEAD rejects the input.
///
/// # Panics
///
/// Does not panic in practice; the key length is 32 by construction.
pub fn seal_bytes(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
    plaintext: &[u8],
) -> VaultResult<(Vec<u8>, [u8; TAG_SIZE])> {
    let cipher = XChaCha20Poly1305::new_from_slice(key).expect("key length is always 32");
    let mut sealed = cipher
        .encrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::Encryption {
            context: "XChaCha20-Poly1305 seal failed".to_string(),
        })?;

    let tag_offset = sealed.len() - TAG_SIZE;
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&sealed[tag_offset..]);
    sealed.truncate(tag_offset);
    Ok((sealed, tag))
}

/// Opens ciphertext sealed by [`seal_bytes`], verifying the tag first.
///
/// # Errors
///
/// Returns [`CryptoError::Integrity`] if tag verification fails: wrong key,
/// wrong associated data, or tampered ciphertext.
///
/// # Panics
///
/// Does not panic in practice; the key length is 32 by construction.
pub fn open_bytes(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8; TAG_SIZE],
    context: &str,
) -> VaultResult<Zeroizing<Vec<u8>>> {
    let cipher = XChaCha20Poly1305::new_from_slice(key).expect("key length is always 32");

    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    let plaintext = cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: &sealed,
                aad,
            },
        )
        .map_err(|_| CryptoError::Integrity {
            context: context.to_string(),
        })?;
    Ok(Zeroizing::new(plaintext))
}

/// Builds the associated data binding a ciphertext to its entry.
fn entry_aad(entry_id_bytes: &[u8; 16]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(16 + LABEL_ENTRY_KEY.len());
    aad.extend_from_slice(entry_id_bytes);
    aad.extend_from_slice(LABEL_ENTRY_KEY);
    aad
}

/// Encrypts a plaintext entry under the session vault key.
///
/// Generates a fresh salt and nonce per call; encrypting the same entry twice
/// yields different salt, nonce, and ciphertext.
///
/// # Errors
///
/// Returns [`CryptoError::Serialization`] if the entry cannot be serialized,
/// or [`CryptoError::Encryption`] if sealing fails.
pub fn encrypt_entry(key: &VaultKey, entry: &PlaintextEntry) -> VaultResult<EncryptedEntry> {
    let mut body = Zeroizing::new(Vec::new());
    ciborium::ser::into_writer(entry, &mut *body).map_err(|e| CryptoError::Serialization {
        context: format!("entry body: {e}"),
    })?;

    let salt = random_salt();
    let nonce = random_nonce();
    let subkey = derive_entry_key(key, &salt);
    let (ciphertext, auth_tag) = seal_bytes(&subkey, &nonce, &entry_aad(entry.id.as_bytes()), &body)?;

    Ok(EncryptedEntry {
        id: entry.id,
        ciphertext,
        salt,
        iv: nonce,
        auth_tag,
        created_at: entry.created_at,
        updated_at: entry.updated_at,
    })
}

/// Decrypts an encrypted entry under the session vault key.
///
/// # Errors
///
/// Returns [`CryptoError::Integrity`] if the authentication tag does not
/// verify (tampering or wrong key), or [`CryptoError::Serialization`] if the
/// decrypted body is not a valid entry.
pub fn decrypt_entry(key: &VaultKey, entry: &EncryptedEntry) -> VaultResult<PlaintextEntry> {
    let subkey = derive_entry_key(key, &entry.salt);
    let body = open_bytes(
        &subkey,
        &entry.iv,
        &entry_aad(entry.id.as_bytes()),
        &entry.ciphertext,
        &entry.auth_tag,
        "vault entry",
    )?;

    ciborium::de::from_reader(body.as_slice()).map_err(|e| {
        CryptoError::Serialization {
            context: format!("decrypted entry body: {e}"),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;

    fn sample_entry() -> PlaintextEntry {
        let mut entry = PlaintextEntry::new("example.com", "alice", "hunter2!X");
        entry.website = Some("https://example.com".into());
        entry.tags = vec!["work".into()];
        entry
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = VaultKey::generate();
        let entry = sample_entry();

        let encrypted = encrypt_entry(&key, &entry).unwrap();
        assert_eq!(encrypted.id, entry.id);
        let decrypted = decrypt_entry(&key, &encrypted).unwrap();
        assert_eq!(decrypted, entry);
    }

    #[test]
    fn wrong_key_fails_closed() {
        let key = VaultKey::generate();
        let other = VaultKey::generate();
        let encrypted = encrypt_entry(&key, &sample_entry()).unwrap();

        let result = decrypt_entry(&other, &encrypted);
        assert!(matches!(
            result,
            Err(VaultError::Crypto(CryptoError::Integrity { .. }))
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_closed() {
        let key = VaultKey::generate();
        let mut encrypted = encrypt_entry(&key, &sample_entry()).unwrap();
        encrypted.ciphertext[0] ^= 0xFF;

        let result = decrypt_entry(&key, &encrypted);
        assert!(matches!(
            result,
            Err(VaultError::Crypto(CryptoError::Integrity { .. }))
        ));
    }

    #[test]
    fn tampered_tag_fails_closed() {
        let key = VaultKey::generate();
        let mut encrypted = encrypt_entry(&key, &sample_entry()).unwrap();
        encrypted.auth_tag[0] ^= 0x01;

        assert!(decrypt_entry(&key, &encrypted).is_err());
    }

    #[test]
    fn same_plaintext_twice_differs() {
        let key = VaultKey::generate();
        let entry = sample_entry();

        let first = encrypt_entry(&key, &entry).unwrap();
        let second = encrypt_entry(&key, &entry).unwrap();

        assert_ne!(first.salt, second.salt);
        assert_ne!(first.iv, second.iv);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn stretch_is_deterministic_per_salt() {
        let salt = [0x42u8; SALT_SIZE];
        let a = stretch_password("correct horse", &salt).unwrap();
        let b = stretch_password("correct horse", &salt).unwrap();
        assert_eq!(*a, *b);

        let other_salt = [0x43u8; SALT_SIZE];
        let c = stretch_password("correct horse", &other_salt).unwrap();
        assert_ne!(*a, *c);
    }

    #[test]
    fn labels_separate_domains() {
        let secret = [0xAAu8; KEY_SIZE];
        let verifier = expand_labeled(&secret, b"vaultkit:verifier");
        let key = expand_labeled(&secret, b"vaultkit:vault-key");
        assert_ne!(*verifier, *key);
    }

    #[test]
    fn vault_key_debug_is_redacted() {
        let key = VaultKey::generate();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("0x"));
    }
}
