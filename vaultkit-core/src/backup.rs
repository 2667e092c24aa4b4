//! Backup bundle creation and restore.
//!
//! A bundle is a self-contained JSON document: metadata, an optional settings
//! snapshot, categories, and the entries. Entry passwords are encrypted under
//! a bundle password that is independent of the master password, so a bundle
//! can be restored on a fresh installation. The expensive Argon2id stretch of
//! the bundle password runs once per bundle; each password field then gets
//! its own HKDF subkey from a fresh per-field salt.
//!
//! Restore is duplicate-safe: entries are matched case-insensitively on
//! (title, username) and the returned [`RestoreSummary`] accounts for every
//! entry in the bundle. Password history is local working state and is not
//! exported.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{
    self, VaultKey, KEY_SIZE, NONCE_SIZE, SALT_SIZE, TAG_SIZE,
};
use crate::error::{ConfigError, CryptoError, RestoreError, VaultResult};
use crate::store::VaultStore;
use crate::types::{
    now, Category, CustomField, EntryId, PlaintextEntry, VaultSettings,
};

/// Current bundle format version.
pub const BUNDLE_VERSION: u32 = 1;

/// Backup progression, logged at `debug` for progress reporting.
///
/// `Idle -> Collecting -> Encrypting -> Written -> (Uploaded | LocalOnly)`.
/// The tail states belong to the caller: this module reports through
/// `Encrypting`, the persistence or transport layer reports the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BackupPhase {
    /// No backup in flight.
    Idle,
    /// Gathering live entries into the bundle.
    Collecting,
    /// Re-encrypting password fields under the bundle password.
    Encrypting,
    /// Bundle serialized to local storage.
    Written,
    /// Bundle delivered to the remote transport.
    Uploaded,
    /// Bundle kept local by choice or because no transport is configured.
    LocalOnly,
}

/// Restore progression, logged at `debug` for progress reporting.
///
/// `Idle -> Downloading? -> Decrypting -> Merging -> Committing ->
/// (Done | Failed)`. `Downloading` is reported by the transport layer and
/// skipped for local bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RestorePhase {
    /// No restore in flight.
    Idle,
    /// Fetching the bundle from the remote transport.
    Downloading,
    /// Validating the bundle and decrypting entry password fields.
    Decrypting,
    /// Merging entries into the live vault.
    Merging,
    /// Applying settings and flushing the store.
    Committing,
    /// Restore complete.
    Done,
    /// Restore aborted.
    Failed,
}

/// How incoming entries combine with the live vault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MergeStrategy {
    /// Keep existing entries and merge the bundle in.
    #[default]
    Merge,
    /// Discard all existing entries first.
    Replace,
}

/// Bundle creation options.
#[derive(Debug, Clone)]
pub struct BackupOptions {
    /// Encrypt entry passwords under a bundle password. When `false` the
    /// bundle carries passwords in the clear; callers own that decision.
    pub encrypt: bool,
    /// Bundle password, required when `encrypt` is set.
    pub password: Option<SecretString>,
    /// Snapshot the current settings into the bundle.
    pub include_settings: bool,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            encrypt: true,
            password: None,
            include_settings: true,
        }
    }
}

/// Restore options.
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Bundle password for encrypted bundles.
    pub decryption_password: Option<SecretString>,
    /// How incoming entries combine with existing ones.
    pub merge_strategy: MergeStrategy,
    /// Under `Merge`, whether a duplicate overwrites the live entry
    /// (otherwise it is skipped).
    pub overwrite_duplicates: bool,
    /// Apply the bundle's settings snapshot, if present.
    pub restore_settings: bool,
}

/// Accounting for a completed restore.
///
/// `saved + overwritten + skipped` always equals the bundle's entry count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Entries inserted as new.
    pub saved: usize,
    /// Live entries replaced by incoming duplicates.
    pub overwritten: usize,
    /// Incoming entries skipped as duplicates.
    pub skipped: usize,
}

/// Bundle header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMetadata {
    /// Bundle format version.
    pub version: u32,
    /// When the bundle was created (unix seconds).
    pub created_at: u64,
    /// Number of entries in the bundle.
    pub entry_count: usize,
    /// Hex-encoded Argon2id salt for the bundle password. Absent for
    /// unencrypted bundles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kdf_salt: Option<String>,
}

/// One exported entry.
///
/// When `is_password_encrypted` is set, `password` holds hex ciphertext and
/// the `salt`/`iv`/`auth_tag` triple holds the hex AEAD parameters for that
/// field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    /// Stable entry identifier.
    pub id: EntryId,
    /// Display title.
    pub title: String,
    /// Account username or email.
    pub username: String,
    /// Password field: hex ciphertext when encrypted, plaintext otherwise.
    pub password: String,
    /// Whether `password` is ciphertext.
    pub is_password_encrypted: bool,
    /// Hex per-field HKDF salt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    /// Hex AEAD nonce.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    /// Hex authentication tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_tag: Option<String>,
    /// Associated website, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Free-form notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Category name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// User-assigned tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Additional user-defined fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<CustomField>,
    /// When the entry was first created (unix seconds).
    pub created_at: u64,
    /// When the entry was last modified (unix seconds).
    pub updated_at: u64,
}

/// A complete backup bundle document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupBundle {
    /// Bundle header.
    pub metadata: BundleMetadata,
    /// Settings snapshot, when exported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<VaultSettings>,
    /// Exported categories.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Category>,
    /// Exported entries.
    pub entries: Vec<BundleEntry>,
}

impl BackupBundle {
    /// Serializes the bundle to pretty JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> VaultResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| {
            CryptoError::Serialization {
                context: format!("backup bundle: {e}"),
            }
            .into()
        })
    }

    /// Parses a bundle from JSON bytes and validates its version.
    ///
    /// # Errors
    ///
    /// Returns [`RestoreError::MalformedBundle`] if the bytes do not parse,
    /// or [`RestoreError::UnsupportedVersion`] if the bundle was written by a
    /// newer format.
    pub fn from_json(bytes: &[u8]) -> VaultResult<Self> {
        let bundle: Self = serde_json::from_slice(bytes).map_err(|e| {
            RestoreError::MalformedBundle {
                reason: e.to_string(),
            }
        })?;
        if bundle.metadata.version > BUNDLE_VERSION {
            return Err(RestoreError::UnsupportedVersion {
                supported: BUNDLE_VERSION,
                found: bundle.metadata.version,
            }
            .into());
        }
        Ok(bundle)
    }
}

/// The key two entries are considered duplicates under: case-insensitive
/// (title, username). Website and notes do not participate, so the same
/// account reachable via two URLs still deduplicates.
fn duplicate_key(title: &str, username: &str) -> (String, String) {
    (title.to_lowercase(), username.to_lowercase())
}

/// Associated data binding an encrypted password field to its entry.
fn field_aad(id: EntryId) -> Vec<u8> {
    let mut aad = Vec::with_capacity(16 + 6);
    aad.extend_from_slice(id.as_bytes());
    aad.extend_from_slice(b"bundle");
    aad
}

fn decode_hex<const N: usize>(value: &str, what: &str) -> Result<[u8; N], RestoreError> {
    let bytes = hex::decode(value).map_err(|e| RestoreError::MalformedBundle {
        reason: format!("{what}: {e}"),
    })?;
    bytes
        .try_into()
        .map_err(|_| RestoreError::MalformedBundle {
            reason: format!("{what}: wrong length"),
        })
}

/// Creates a backup bundle from decrypted entries.
///
/// The caller decrypts entries under the session vault key first; this
/// function re-protects the password fields under the bundle password when
/// `options.encrypt` is set. Password history never leaves the device.
///
/// # Errors
///
/// Returns [`ConfigError::MissingBundlePassword`] if encryption was requested
/// without a password, or a [`CryptoError`] if key derivation or sealing
/// fails.
pub fn create_backup(
    entries: &[PlaintextEntry],
    categories: &[Category],
    settings: &VaultSettings,
    options: &BackupOptions,
) -> VaultResult<BackupBundle> {
    tracing::debug!(phase = %BackupPhase::Collecting, entries = entries.len(), "creating backup");
    let stretched: Option<(Zeroizing<[u8; KEY_SIZE]>, [u8; SALT_SIZE])> = if options.encrypt {
        let password = options
            .password
            .as_ref()
            .ok_or(ConfigError::MissingBundlePassword)?;
        let kdf_salt = crypto::random_salt();
        let secret = crypto::stretch_password(password.expose_secret(), &kdf_salt)?;
        Some((secret, kdf_salt))
    } else {
        None
    };

    tracing::debug!(phase = %BackupPhase::Encrypting, "creating backup");
    let mut bundle_entries = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut exported = BundleEntry {
            id: entry.id,
            title: entry.title.clone(),
            username: entry.username.clone(),
            password: entry.password.clone(),
            is_password_encrypted: false,
            salt: None,
            iv: None,
            auth_tag: None,
            website: entry.website.clone(),
            notes: entry.notes.clone(),
            category: entry.category.clone(),
            tags: entry.tags.clone(),
            custom_fields: entry.custom_fields.clone(),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        };

        if let Some((secret, _)) = &stretched {
            let field_salt = crypto::random_salt();
            let nonce = crypto::random_nonce();
            let field_key = crypto::derive_backup_field_key(secret, &field_salt);
            let (ciphertext, tag) = crypto::seal_bytes(
                &field_key,
                &nonce,
                &field_aad(entry.id),
                entry.password.as_bytes(),
            )?;
            exported.password = hex::encode(ciphertext);
            exported.is_password_encrypted = true;
            exported.salt = Some(hex::encode(field_salt));
            exported.iv = Some(hex::encode(nonce));
            exported.auth_tag = Some(hex::encode(tag));
        }
        bundle_entries.push(exported);
    }

    let bundle = BackupBundle {
        metadata: BundleMetadata {
            version: BUNDLE_VERSION,
            created_at: now(),
            entry_count: bundle_entries.len(),
            kdf_salt: stretched.as_ref().map(|(_, salt)| hex::encode(salt)),
        },
        settings: options.include_settings.then(|| settings.clone()),
        categories: categories.to_vec(),
        entries: bundle_entries,
    };
    Ok(bundle)
}

/// Decrypts one bundle entry's password field into a [`PlaintextEntry`].
fn decode_entry(
    entry: &BundleEntry,
    bundle_secret: Option<&Zeroizing<[u8; KEY_SIZE]>>,
) -> Result<PlaintextEntry, RestoreError> {
    let password = if entry.is_password_encrypted {
        let secret = bundle_secret.ok_or_else(|| RestoreError::Decryption {
            reason: "bundle has encrypted entries but no password was supplied".to_string(),
        })?;
        let salt: [u8; SALT_SIZE] = decode_hex(
            entry.salt.as_deref().ok_or_else(|| RestoreError::MalformedBundle {
                reason: "encrypted entry missing salt".to_string(),
            })?,
            "entry salt",
        )?;
        let nonce: [u8; NONCE_SIZE] = decode_hex(
            entry.iv.as_deref().ok_or_else(|| RestoreError::MalformedBundle {
                reason: "encrypted entry missing iv".to_string(),
            })?,
            "entry iv",
        )?;
        let tag: [u8; TAG_SIZE] = decode_hex(
            entry
                .auth_tag
                .as_deref()
                .ok_or_else(|| RestoreError::MalformedBundle {
                    reason: "encrypted entry missing auth tag".to_string(),
                })?,
            "entry auth tag",
        )?;
        let ciphertext = hex::decode(&entry.password).map_err(|e| {
            RestoreError::MalformedBundle {
                reason: format!("entry ciphertext: {e}"),
            }
        })?;

        let field_key = crypto::derive_backup_field_key(secret, &salt);
        let plaintext = crypto::open_bytes(
            &field_key,
            &nonce,
            &field_aad(entry.id),
            &ciphertext,
            &tag,
            "bundle entry password",
        )
        .map_err(|_| RestoreError::Decryption {
            reason: format!("entry '{}' failed authentication", entry.title),
        })?;
        String::from_utf8(plaintext.to_vec()).map_err(|_| RestoreError::Decryption {
            reason: format!("entry '{}' decrypted to invalid UTF-8", entry.title),
        })?
    } else {
        entry.password.clone()
    };

    let mut plaintext = PlaintextEntry::new(&entry.title, &entry.username, password);
    plaintext.id = entry.id;
    plaintext.website = entry.website.clone();
    plaintext.notes = entry.notes.clone();
    plaintext.category = entry.category.clone();
    plaintext.tags = entry.tags.clone();
    plaintext.custom_fields = entry.custom_fields.clone();
    plaintext.created_at = entry.created_at;
    plaintext.updated_at = entry.updated_at;
    Ok(plaintext)
}

/// Validates encryption metadata and stretches the bundle password, when the
/// bundle carries encrypted password fields.
fn bundle_secret_for(
    bundle: &BackupBundle,
    options: &RestoreOptions,
) -> VaultResult<Option<Zeroizing<[u8; KEY_SIZE]>>> {
    if !bundle.entries.iter().any(|e| e.is_password_encrypted) {
        return Ok(None);
    }
    let password = options
        .decryption_password
        .as_ref()
        .ok_or_else(|| RestoreError::Decryption {
            reason: "bundle is encrypted but no password was supplied".to_string(),
        })?;
    let kdf_salt: [u8; SALT_SIZE] = decode_hex(
        bundle
            .metadata
            .kdf_salt
            .as_deref()
            .ok_or_else(|| RestoreError::MalformedBundle {
                reason: "encrypted bundle missing kdf salt".to_string(),
            })?,
        "bundle kdf salt",
    )?;
    Ok(Some(crypto::stretch_password(
        password.expose_secret(),
        &kdf_salt,
    )?))
}

/// Writes incoming entries into the store per the merge strategy, updating
/// `summary` as each entry commits.
fn apply_entries(
    store: &dyn VaultStore,
    key: &VaultKey,
    incoming: &[PlaintextEntry],
    options: &RestoreOptions,
    summary: &mut RestoreSummary,
) -> VaultResult<()> {
    match options.merge_strategy {
        MergeStrategy::Replace => {
            store.clear_entries()?;
            for entry in incoming {
                store.upsert_entry(&crypto::encrypt_entry(key, entry)?)?;
                summary.saved += 1;
            }
        }
        MergeStrategy::Merge => {
            // Index live entries by duplicate key; requires decrypting them.
            let mut live = std::collections::HashMap::new();
            for encrypted in store.entries()? {
                let plaintext = crypto::decrypt_entry(key, &encrypted)?;
                live.insert(
                    duplicate_key(&plaintext.title, &plaintext.username),
                    plaintext.id,
                );
            }

            for entry in incoming {
                match live.get(&duplicate_key(&entry.title, &entry.username)) {
                    Some(existing_id) if options.overwrite_duplicates => {
                        // The live entry is deleted and the incoming one
                        // inserted under its own identity.
                        let existing_id = *existing_id;
                        store.delete_entry(existing_id)?;
                        store.upsert_entry(&crypto::encrypt_entry(key, entry)?)?;
                        live.insert(duplicate_key(&entry.title, &entry.username), entry.id);
                        summary.overwritten += 1;
                    }
                    Some(_) => {
                        summary.skipped += 1;
                    }
                    None => {
                        store.upsert_entry(&crypto::encrypt_entry(key, entry)?)?;
                        live.insert(duplicate_key(&entry.title, &entry.username), entry.id);
                        summary.saved += 1;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Applies categories and the settings snapshot, then flushes durably.
fn commit_metadata(
    store: &dyn VaultStore,
    bundle: &BackupBundle,
    options: &RestoreOptions,
) -> VaultResult<()> {
    if !bundle.categories.is_empty() {
        store.put_categories(&bundle.categories)?;
    }
    if options.restore_settings {
        if let Some(settings) = &bundle.settings {
            store.put_settings(settings)?;
        }
    }
    store.flush()
}

/// Restores a bundle into the live vault.
///
/// Entries are re-encrypted under the caller's session vault key. Under
/// [`MergeStrategy::Replace`] the vault is cleared first and every incoming
/// entry counts as saved. Under [`MergeStrategy::Merge`] an incoming entry
/// matching a live entry on case-insensitive (title, username) is skipped,
/// or, with `options.overwrite_duplicates`, the live entry is deleted and
/// the incoming one inserted.
///
/// The returned summary always accounts for every bundle entry:
/// `saved + overwritten + skipped == metadata.entry_count`.
///
/// # Errors
///
/// - [`RestoreError::Decryption`] before anything is committed, if the
///   bundle password is wrong or missing.
/// - [`RestoreError::MalformedBundle`] if metadata or entry fields are
///   inconsistent.
/// - [`RestoreError::Aborted`] if a storage write fails partway; it carries
///   the counts already committed.
pub fn restore_from_backup(
    store: &dyn VaultStore,
    key: &VaultKey,
    bundle: &BackupBundle,
    options: &RestoreOptions,
) -> VaultResult<RestoreSummary> {
    tracing::debug!(
        phase = %RestorePhase::Decrypting,
        entries = bundle.entries.len(),
        "restoring backup"
    );
    if bundle.metadata.entry_count != bundle.entries.len() {
        return Err(RestoreError::MalformedBundle {
            reason: format!(
                "metadata claims {} entries but bundle contains {}",
                bundle.metadata.entry_count,
                bundle.entries.len()
            ),
        }
        .into());
    }

    let bundle_secret = bundle_secret_for(bundle, options)?;

    // Decrypt every incoming entry before touching the store, so a wrong
    // bundle password can never leave a half-restored vault.
    let mut incoming = Vec::with_capacity(bundle.entries.len());
    for entry in &bundle.entries {
        incoming.push(decode_entry(entry, bundle_secret.as_ref())?);
    }

    tracing::debug!(
        phase = %RestorePhase::Merging,
        strategy = %options.merge_strategy,
        "restoring backup"
    );
    let mut summary = RestoreSummary::default();
    let abort = |summary: RestoreSummary, reason: String| -> crate::error::VaultError {
        tracing::debug!(phase = %RestorePhase::Failed, %reason, "restore aborted");
        RestoreError::Aborted {
            saved: summary.saved,
            overwritten: summary.overwritten,
            skipped: summary.skipped,
            reason,
        }
        .into()
    };

    if let Err(e) = apply_entries(store, key, &incoming, options, &mut summary) {
        return Err(abort(summary, e.to_string()));
    }

    tracing::debug!(phase = %RestorePhase::Committing, "restoring backup");
    if let Err(e) = commit_metadata(store, bundle, options) {
        return Err(abort(summary, e.to_string()));
    }

    tracing::debug!(
        phase = %RestorePhase::Done,
        saved = summary.saved,
        overwritten = summary.overwritten,
        skipped = summary.skipped,
        "restore complete"
    );
    Ok(summary)
}
