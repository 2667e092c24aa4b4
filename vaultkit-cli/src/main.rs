//! VaultKit developer CLI.
//!
//! Drives a local vault backed by a single JSON file: master-password setup,
//! entry management, password generation and analysis, and backup bundles.
//! The master password comes from `VAULTKIT_MASTER_PASSWORD` or the
//! `--master-password` flag; prefer the environment variable so the secret
//! stays out of shell history.

mod file_store;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use eyre::{bail, eyre, Result};
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

use file_store::FileVaultStore;
use vaultkit_core::backup::{BackupOptions, BackupPhase, MergeStrategy, RestoreOptions};
use vaultkit_core::biometric::BiometricAvailability;
use vaultkit_core::crypto::{self, VaultKey};
use vaultkit_core::generator::{self, GeneratorOptions};
use vaultkit_core::memory::{MemoryCredentialStore, StubPrompt};
use vaultkit_core::store::VaultStore;
use vaultkit_core::strength;
use vaultkit_core::types::{PlaintextEntry, VaultSettings};
use vaultkit_core::{create_backup, restore_from_backup, BackupBundle, MasterPasswordManager};

#[derive(Parser, Debug)]
#[command(author, version, about = "VaultKit command line interface")]
struct Cli {
    /// Path to the vault file. Defaults to the platform data directory.
    #[arg(long, value_name = "PATH", global = true)]
    vault: Option<PathBuf>,

    /// Master password. Prefer the environment variable over the flag.
    #[arg(
        long,
        env = "VAULTKIT_MASTER_PASSWORD",
        hide_env_values = true,
        global = true
    )]
    master_password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one or more passwords.
    Generate(GenerateArgs),
    /// Analyze the strength of a password.
    Analyze {
        /// The password to analyze.
        password: String,
    },
    /// Initialize a new vault with a master password.
    Init,
    /// Verify the master password against the vault.
    Unlock,
    /// Add an entry to the vault.
    Add(AddArgs),
    /// List entries.
    List,
    /// Show a single entry by ID or title.
    Show {
        /// Entry ID or title.
        entry: String,
        /// Print the password instead of masking it.
        #[arg(long)]
        reveal: bool,
    },
    /// Remove an entry by ID or title.
    Remove {
        /// Entry ID or title.
        entry: String,
    },
    /// Change the master password, re-encrypting every entry.
    ChangePassword {
        /// The new master password.
        #[arg(long, env = "VAULTKIT_NEW_MASTER_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
    /// Write an encrypted backup bundle.
    Backup(BackupArgs),
    /// Restore entries from a backup bundle.
    Restore(RestoreArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Password length.
    #[arg(short, long, default_value_t = 16)]
    length: usize,

    /// How many passwords to generate.
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,

    /// Exclude uppercase letters.
    #[arg(long)]
    no_uppercase: bool,

    /// Exclude lowercase letters.
    #[arg(long)]
    no_lowercase: bool,

    /// Exclude digits.
    #[arg(long)]
    no_numbers: bool,

    /// Exclude symbols.
    #[arg(long)]
    no_symbols: bool,

    /// Drop visually ambiguous glyphs (0/O, 1/l/I).
    #[arg(long)]
    exclude_similar: bool,

    /// Drop punctuation that tends to break copy/paste or shell quoting.
    #[arg(long)]
    exclude_ambiguous: bool,

    /// Extra characters added to the active charset.
    #[arg(long, value_name = "CHARS")]
    custom_characters: Option<String>,

    /// Minimum digit count.
    #[arg(long, default_value_t = 0)]
    min_numbers: usize,

    /// Minimum symbol count.
    #[arg(long, default_value_t = 0)]
    min_symbols: usize,

    /// Generate from a pattern instead (A=upper, a=lower, 9=digit,
    /// #=symbol, other characters verbatim).
    #[arg(long, conflicts_with = "pronounceable")]
    pattern: Option<String>,

    /// Generate a pronounceable password.
    #[arg(long)]
    pronounceable: bool,
}

#[derive(Args, Debug)]
struct AddArgs {
    /// Entry title.
    #[arg(long)]
    title: String,

    /// Account username or email.
    #[arg(long)]
    username: String,

    /// Password; generated when omitted.
    #[arg(long)]
    password: Option<String>,

    /// Associated website.
    #[arg(long)]
    website: Option<String>,

    /// Free-form notes.
    #[arg(long)]
    notes: Option<String>,

    /// Category name.
    #[arg(long)]
    category: Option<String>,

    /// Tags, repeatable.
    #[arg(long = "tag")]
    tags: Vec<String>,
}

#[derive(Args, Debug)]
struct BackupArgs {
    /// Where to write the bundle.
    #[arg(long, value_name = "PATH")]
    output: PathBuf,

    /// Bundle password protecting exported entry passwords.
    #[arg(long, env = "VAULTKIT_BUNDLE_PASSWORD", hide_env_values = true)]
    bundle_password: String,
}

#[derive(Args, Debug)]
struct RestoreArgs {
    /// Bundle file to restore from.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,

    /// Bundle password, required for encrypted bundles.
    #[arg(long, env = "VAULTKIT_BUNDLE_PASSWORD", hide_env_values = true)]
    bundle_password: Option<String>,

    /// Discard all existing entries before restoring.
    #[arg(long)]
    replace: bool,

    /// Overwrite duplicate entries instead of skipping them.
    #[arg(long, conflicts_with = "replace")]
    overwrite: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Generate(ref args) => cmd_generate(args),
        Command::Analyze { ref password } => {
            cmd_analyze(password);
            Ok(())
        }
        Command::Init => cmd_init(&cli),
        Command::Unlock => cmd_unlock(&cli),
        Command::Add(ref args) => cmd_add(&cli, args),
        Command::List => cmd_list(&cli),
        Command::Show { ref entry, reveal } => cmd_show(&cli, entry, reveal),
        Command::Remove { ref entry } => cmd_remove(&cli, entry),
        Command::ChangePassword { ref new_password } => cmd_change_password(&cli, new_password),
        Command::Backup(ref args) => cmd_backup(&cli, args),
        Command::Restore(ref args) => cmd_restore(&cli, args),
    }
}

fn vault_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(path) = &cli.vault {
        return Ok(path.clone());
    }
    let base = dirs::data_dir().ok_or_else(|| eyre!("could not determine a data directory; pass --vault"))?;
    Ok(base.join("vaultkit").join("vault.json"))
}

fn open_store(cli: &Cli) -> Result<Arc<FileVaultStore>> {
    Ok(Arc::new(FileVaultStore::open(vault_path(cli)?)?))
}

/// The CLI has no platform keychain or biometric hardware; the manager gets
/// inert stand-ins and biometric escrow stays unavailable.
fn manager(store: Arc<FileVaultStore>) -> MasterPasswordManager {
    MasterPasswordManager::new(
        store,
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(StubPrompt::with_availability(BiometricAvailability::NoHardware)),
    )
}

fn master_password(cli: &Cli) -> Result<&str> {
    cli.master_password
        .as_deref()
        .ok_or_else(|| eyre!("set VAULTKIT_MASTER_PASSWORD or pass --master-password"))
}

fn unlock(cli: &Cli) -> Result<(Arc<FileVaultStore>, VaultKey)> {
    let store = open_store(cli)?;
    let key = manager(Arc::clone(&store)).verify(master_password(cli)?)?;
    Ok((store, key))
}

fn generator_options(args: &GenerateArgs) -> GeneratorOptions {
    GeneratorOptions {
        length: args.length,
        include_uppercase: !args.no_uppercase,
        include_lowercase: !args.no_lowercase,
        include_numbers: !args.no_numbers,
        include_symbols: !args.no_symbols,
        exclude_similar: args.exclude_similar,
        exclude_ambiguous: args.exclude_ambiguous,
        min_numbers: args.min_numbers,
        min_symbols: args.min_symbols,
        custom_characters: args.custom_characters.clone(),
    }
}

fn cmd_generate(args: &GenerateArgs) -> Result<()> {
    let options = generator_options(args);

    for _ in 0..args.count.max(1) {
        let password = if let Some(pattern) = &args.pattern {
            generator::generate_from_pattern(pattern, &options)?
        } else if args.pronounceable {
            generator::generate_pronounceable(args.length, &options)?
        } else {
            generator::generate(&options)?
        };
        println!("{password}");
    }
    Ok(())
}

fn cmd_analyze(password: &str) {
    let report = strength::analyze(password);
    println!("score:      {}/4 ({})", report.score, report.label);
    println!("crack time: {}", report.crack_time);
    for suggestion in &report.feedback {
        println!("hint:       {suggestion}");
    }
}

fn cmd_init(cli: &Cli) -> Result<()> {
    let store = open_store(cli)?;
    manager(Arc::clone(&store)).setup(master_password(cli)?, false)?;
    println!("vault initialized at {}", store.path().display());
    Ok(())
}

fn cmd_unlock(cli: &Cli) -> Result<()> {
    let (store, _key) = unlock(cli)?;
    println!("vault unlocked ({} entries)", store.entries()?.len());
    Ok(())
}

fn cmd_add(cli: &Cli, args: &AddArgs) -> Result<()> {
    let (store, key) = unlock(cli)?;

    let password = match &args.password {
        Some(p) => p.clone(),
        None => generator::generate(&GeneratorOptions::default())?,
    };
    let mut entry = PlaintextEntry::new(&args.title, &args.username, password);
    entry.website = args.website.clone();
    entry.notes = args.notes.clone();
    entry.category = args.category.clone();
    entry.tags = args.tags.clone();
    entry.audit.strength_score = strength::analyze(&entry.password).score;

    store.upsert_entry(&crypto::encrypt_entry(&key, &entry)?)?;
    println!("added {} ({})", entry.title, entry.id);
    Ok(())
}

fn decrypt_all(store: &FileVaultStore, key: &VaultKey) -> Result<Vec<PlaintextEntry>> {
    let mut entries = Vec::new();
    for encrypted in store.entries()? {
        entries.push(crypto::decrypt_entry(key, &encrypted)?);
    }
    entries.sort_by(|a, b| a.title.cmp(&b.title));
    Ok(entries)
}

fn find_entry(entries: Vec<PlaintextEntry>, selector: &str) -> Result<PlaintextEntry> {
    let mut matches: Vec<PlaintextEntry> = entries
        .into_iter()
        .filter(|e| e.id.to_string() == selector || e.title.eq_ignore_ascii_case(selector))
        .collect();
    match matches.len() {
        0 => bail!("no entry matches '{selector}'"),
        1 => Ok(matches.remove(0)),
        n => bail!("'{selector}' is ambiguous ({n} matches); use the entry ID"),
    }
}

fn cmd_list(cli: &Cli) -> Result<()> {
    let (store, key) = unlock(cli)?;
    let entries = decrypt_all(&store, &key)?;
    if entries.is_empty() {
        println!("vault is empty");
        return Ok(());
    }
    for entry in entries {
        println!("{}  {}  {}", entry.id, entry.title, entry.username);
    }
    Ok(())
}

fn cmd_show(cli: &Cli, selector: &str, reveal: bool) -> Result<()> {
    let (store, key) = unlock(cli)?;
    let entry = find_entry(decrypt_all(&store, &key)?, selector)?;

    println!("id:       {}", entry.id);
    println!("title:    {}", entry.title);
    println!("username: {}", entry.username);
    if reveal {
        println!("password: {}", entry.password);
    } else {
        println!("password: ******** (use --reveal)");
    }
    if let Some(website) = &entry.website {
        println!("website:  {website}");
    }
    if let Some(category) = &entry.category {
        println!("category: {category}");
    }
    if !entry.tags.is_empty() {
        println!("tags:     {}", entry.tags.join(", "));
    }
    if let Some(notes) = &entry.notes {
        println!("notes:    {notes}");
    }
    Ok(())
}

fn cmd_remove(cli: &Cli, selector: &str) -> Result<()> {
    let (store, key) = unlock(cli)?;
    let entry = find_entry(decrypt_all(&store, &key)?, selector)?;
    store.delete_entry(entry.id)?;
    println!("removed {} ({})", entry.title, entry.id);
    Ok(())
}

fn cmd_change_password(cli: &Cli, new_password: &str) -> Result<()> {
    let store = open_store(cli)?;
    manager(store).change(master_password(cli)?, new_password)?;
    println!("master password changed; all entries re-encrypted");
    Ok(())
}

fn cmd_backup(cli: &Cli, args: &BackupArgs) -> Result<()> {
    let (store, key) = unlock(cli)?;
    let entries = decrypt_all(&store, &key)?;
    let settings = store.settings()?.unwrap_or_default();

    // Bundles written by this tool are always encrypted.
    let bundle = create_backup(
        &entries,
        &store.categories()?,
        &settings,
        &BackupOptions {
            encrypt: true,
            password: Some(SecretString::from(args.bundle_password.clone())),
            include_settings: true,
        },
    )?;
    std::fs::write(&args.output, bundle.to_json()?)?;
    tracing::debug!(phase = %BackupPhase::Written, path = %args.output.display(), "bundle written");
    tracing::debug!(phase = %BackupPhase::LocalOnly, "no transport configured");
    println!(
        "wrote {} entries to {}",
        bundle.metadata.entry_count,
        args.output.display()
    );
    Ok(())
}

fn cmd_restore(cli: &Cli, args: &RestoreArgs) -> Result<()> {
    let (store, key) = unlock(cli)?;
    let bytes = std::fs::read(&args.input)?;
    let bundle = BackupBundle::from_json(&bytes)?;

    let options = RestoreOptions {
        decryption_password: args
            .bundle_password
            .clone()
            .map(SecretString::from),
        merge_strategy: if args.replace {
            MergeStrategy::Replace
        } else {
            MergeStrategy::Merge
        },
        overwrite_duplicates: args.overwrite,
        restore_settings: true,
    };
    let summary = restore_from_backup(store.as_ref(), &key, &bundle, &options)?;
    println!(
        "restored: {} saved, {} overwritten, {} skipped",
        summary.saved, summary.overwritten, summary.skipped
    );
    Ok(())
}
