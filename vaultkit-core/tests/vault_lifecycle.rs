//! End-to-end vault lifecycle: set up a master password, store generated
//! entries, back up to a remote blob, and restore onto a fresh installation.

use std::sync::Arc;

use secrecy::SecretString;
use vaultkit_core::backup::{BackupOptions, RestoreOptions};
use vaultkit_core::crypto;
use vaultkit_core::generator::{self, GeneratorOptions};
use vaultkit_core::memory::{MemoryCredentialStore, MemoryTransport, MemoryVaultStore, StubPrompt};
use vaultkit_core::store::VaultStore;
use vaultkit_core::strength;
use vaultkit_core::transport::{download_bundle, upload_bundle, BlobTransport};
use vaultkit_core::types::VaultSettings;
use vaultkit_core::{
    create_backup, restore_from_backup, MasterPasswordManager, PlaintextEntry, RestoreSummary,
};

fn manager(store: Arc<MemoryVaultStore>) -> MasterPasswordManager {
    MasterPasswordManager::new(
        store,
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(StubPrompt::confirming()),
    )
}

#[tokio::test]
async fn full_vault_lifecycle() {
    // Device A: set up, unlock via biometrics, store entries.
    let store_a = Arc::new(MemoryVaultStore::new());
    let mgr_a = manager(Arc::clone(&store_a));
    mgr_a.setup("Master-Pass-1!", true).unwrap();
    let key_a = mgr_a.unlock_via_biometric("open your vault").await.unwrap();

    let generated = generator::generate(&GeneratorOptions::default()).unwrap();
    assert!(
        strength::analyze(&generated).score >= 3,
        "generated passwords should analyze as strong"
    );

    let mut mail = PlaintextEntry::new("Mail", "alice@example.com", generated.clone());
    mail.website = Some("https://mail.example.com".into());
    let bank = PlaintextEntry::new("Bank", "alice", "Tr0ub4dor&3XyZ!99");

    for entry in [&mail, &bank] {
        store_a
            .upsert_entry(&crypto::encrypt_entry(&key_a, entry).unwrap())
            .unwrap();
    }

    // Export an encrypted bundle and push it through the transport.
    let mut plaintexts = Vec::new();
    for encrypted in store_a.entries().unwrap() {
        plaintexts.push(crypto::decrypt_entry(&key_a, &encrypted).unwrap());
    }
    let bundle = create_backup(
        &plaintexts,
        &store_a.categories().unwrap(),
        &VaultSettings::default(),
        &BackupOptions {
            encrypt: true,
            password: Some(SecretString::from("Bundle-Pass-2@".to_string())),
            include_settings: true,
        },
    )
    .unwrap();

    let transport = MemoryTransport::new();
    let blob_id = upload_bundle(&transport, &bundle, "vault-backup.json").unwrap();

    // The uploaded blob never contains a plaintext password.
    let raw = transport.download(&blob_id).unwrap();
    let raw_text = String::from_utf8(raw).unwrap();
    assert!(!raw_text.contains(&generated));
    assert!(!raw_text.contains("Tr0ub4dor"));

    // Device B: fresh installation, different master password.
    let store_b = Arc::new(MemoryVaultStore::new());
    let mgr_b = manager(Arc::clone(&store_b));
    mgr_b.setup("Other-Master-3#", false).unwrap();
    let key_b = mgr_b.verify("Other-Master-3#").unwrap();

    let fetched = download_bundle(&transport, &blob_id).unwrap();
    let summary = restore_from_backup(
        &*store_b,
        &key_b,
        &fetched,
        &RestoreOptions {
            decryption_password: Some(SecretString::from("Bundle-Pass-2@".to_string())),
            restore_settings: true,
            ..RestoreOptions::default()
        },
    )
    .unwrap();
    assert_eq!(
        summary,
        RestoreSummary {
            saved: 2,
            overwritten: 0,
            skipped: 0
        }
    );

    // Restored entries decrypt under device B's key with the original
    // secrets intact.
    let mut restored_passwords = Vec::new();
    for encrypted in store_b.entries().unwrap() {
        restored_passwords.push(crypto::decrypt_entry(&key_b, &encrypted).unwrap().password);
    }
    restored_passwords.sort();
    let mut expected = vec![generated, "Tr0ub4dor&3XyZ!99".to_string()];
    expected.sort();
    assert_eq!(restored_passwords, expected);

    assert_eq!(
        store_b.settings().unwrap(),
        Some(VaultSettings::default()),
        "settings snapshot should be applied"
    );
}

#[test]
fn master_password_change_survives_backup_cycle() {
    let store = Arc::new(MemoryVaultStore::new());
    let mgr = manager(Arc::clone(&store));
    mgr.setup("First-Pass-1!", false).unwrap();
    let key = mgr.verify("First-Pass-1!").unwrap();

    let entry = PlaintextEntry::new("Example", "alice", "hunter2!X");
    store
        .upsert_entry(&crypto::encrypt_entry(&key, &entry).unwrap())
        .unwrap();

    let new_key = mgr.change("First-Pass-1!", "Second-Pass-2@").unwrap();

    // Entries re-encrypted under the new key still export and restore.
    let plaintexts: Vec<PlaintextEntry> = store
        .entries()
        .unwrap()
        .iter()
        .map(|e| crypto::decrypt_entry(&new_key, e).unwrap())
        .collect();
    let bundle = create_backup(
        &plaintexts,
        &[],
        &VaultSettings::default(),
        &BackupOptions {
            encrypt: true,
            password: Some(SecretString::from("Bundle-Pass".to_string())),
            include_settings: false,
        },
    )
    .unwrap();

    let fresh = MemoryVaultStore::new();
    let summary = restore_from_backup(
        &fresh,
        &new_key,
        &bundle,
        &RestoreOptions {
            decryption_password: Some(SecretString::from("Bundle-Pass".to_string())),
            ..RestoreOptions::default()
        },
    )
    .unwrap();
    assert_eq!(summary.saved, 1);

    let restored = crypto::decrypt_entry(&new_key, &fresh.entries().unwrap()[0]).unwrap();
    assert_eq!(restored.password, "hunter2!X");
}
