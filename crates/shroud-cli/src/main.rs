//! shroud: envelope-encrypted file sharing CLI
//!
//! Commands:
//!   keygen [--keychain]                      - generate a master key
//!   user add <name>                          - register a user
//!   put <path> --as <user>                   - encrypt and store a file
//!   get <file-id> --as <user> [-o <out>]     - decrypt a file you may read
//!   share <file-id> <recipient> --as <user>  - grant read access to your file
//!   ls --as <user> [--json]                  - your files and files shared with you
//!   status                                   - key source and storage health
//!   config show                              - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::ExposeSecret;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use shroud_core::config::ShroudConfig;
use shroud_core::{EncryptedFileRecord, FileId, ShroudError, User};
use shroud_vault::{SharedFile, Vault};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "shroud",
    version,
    about = "Envelope-encrypted file vault",
    long_about = "shroud: store files encrypted under per-file keys and share them by access grant"
)]
struct Cli {
    /// Path to shroud.toml configuration file
    #[arg(long, short = 'c', env = "SHROUD_CONFIG", default_value = "shroud.toml")]
    config: PathBuf,

    /// Log level filter (overrides [log].level; RUST_LOG wins over both)
    #[arg(long, env = "SHROUD_LOG")]
    log: Option<String>,

    /// Log output format (overrides [log].format)
    #[arg(long, env = "SHROUD_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a new random master key (base64)
    Keygen {
        /// Store the key in the platform keychain instead of printing it
        #[arg(long)]
        keychain: bool,
    },

    /// User management
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Encrypt a local file and store it in the vault
    Put {
        /// Local file to upload
        path: PathBuf,
        /// Acting user
        #[arg(long = "as", value_name = "USER")]
        user: String,
        /// Name to record instead of the local file name
        #[arg(long)]
        name: Option<String>,
    },

    /// Decrypt a file you own or that was shared with you
    Get {
        /// File id as printed by `put` or `ls`
        file_id: FileId,
        /// Acting user
        #[arg(long = "as", value_name = "USER")]
        user: String,
        /// Output path; `-` writes to stdout (default: the recorded name)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
    },

    /// Grant another user read access to one of your files
    Share {
        file_id: FileId,
        /// Recipient username
        recipient: String,
        /// Acting user (must own the file)
        #[arg(long = "as", value_name = "USER")]
        user: String,
    },

    /// List your files and files shared with you
    Ls {
        /// Acting user
        #[arg(long = "as", value_name = "USER")]
        user: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show master key source and storage health
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum UserAction {
    /// Register a new user
    Add { username: String },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ShroudConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    match cli.command {
        Commands::Keygen { keychain } => cmd_keygen(keychain),
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
        Commands::User { action: UserAction::Add { username } } => {
            let vault = open_vault(&config)?;
            let user = vault.register_user(&username)?;
            println!("{}  {}", user.id, user.username);
            Ok(())
        }
        Commands::Put { path, user, name } => {
            let vault = open_vault(&config)?;
            cmd_put(&vault, &path, &user, name.as_deref()).await
        }
        Commands::Get { file_id, user, output, force } => {
            let vault = open_vault(&config)?;
            cmd_get(&vault, file_id, &user, output.as_deref(), force).await
        }
        Commands::Share { file_id, recipient, user } => {
            let vault = open_vault(&config)?;
            let acting = resolve_user(&vault, &user)?;
            let grant = vault.share(file_id, acting.id, &recipient)?;
            println!("shared {} with {} (grant {})", file_id, recipient.trim(), grant.id);
            Ok(())
        }
        Commands::Ls { user, json } => {
            let vault = open_vault(&config)?;
            cmd_ls(&vault, &user, json)
        }
        Commands::Status => cmd_status(&config).await,
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so `get -o -` output stays clean.
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn open_vault(config: &ShroudConfig) -> Result<Vault> {
    let vault = Vault::from_config(config).context("opening vault")?;
    tracing::debug!(key_source = %vault.key_source(), "vault opened");
    Ok(vault)
}

/// Denials (no grant, key unwrap, decryption) all print "access denied".
/// The cause only reaches the debug log.
fn user_facing(err: ShroudError) -> anyhow::Error {
    if err.is_denial() {
        tracing::debug!(cause = %err, "read refused");
        anyhow::anyhow!("access denied")
    } else {
        err.into()
    }
}

fn resolve_user(vault: &Vault, username: &str) -> Result<User> {
    vault
        .user_by_name(username)?
        .with_context(|| format!("unknown user '{username}'. Run: shroud user add {username}"))
}

// ── `shroud keygen` ───────────────────────────────────────────────────────────

fn cmd_keygen(keychain: bool) -> Result<()> {
    let key = shroud_secrets::generate_master_key();
    let encoded = shroud_secrets::encode_master_key(&key);

    if keychain {
        shroud_secrets::keychain::store_secret(shroud_secrets::keychain::keys::MASTER_KEY, &encoded)
            .context("storing master key in keychain")?;
        eprintln!("master key stored in platform keychain; set [secrets].keychain = true");
    } else {
        println!("{}", encoded.expose_secret());
        eprintln!("export SHROUD_MASTER_KEY=<the line above>  (keep it secret; losing it loses every file)");
    }
    Ok(())
}

// ── `shroud put` / `shroud get` ───────────────────────────────────────────────

async fn cmd_put(vault: &Vault, path: &Path, username: &str, name: Option<&str>) -> Result<()> {
    let owner = resolve_user(vault, username)?;
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let original_name = match name {
        Some(n) => n.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("no file name in {}", path.display()))?,
    };

    let record = vault.store_protected(owner.id, &original_name, &raw).await?;
    println!(
        "{}  {}  {}",
        record.id,
        record.original_name,
        fmt_bytes(record.size)
    );
    Ok(())
}

async fn cmd_get(
    vault: &Vault,
    file_id: FileId,
    username: &str,
    output: Option<&Path>,
    force: bool,
) -> Result<()> {
    let requester = resolve_user(vault, username)?;
    let revealed = vault
        .retrieve_protected(file_id, requester.id)
        .await
        .map_err(user_facing)?;

    let target = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&revealed.original_name));

    if target == Path::new("-") {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&revealed.bytes).context("writing to stdout")?;
        stdout.flush().context("flushing stdout")?;
        return Ok(());
    }

    write_output(&target, &revealed.bytes, force).await?;
    eprintln!("wrote {} ({})", target.display(), fmt_bytes(revealed.bytes.len() as u64));
    Ok(())
}

/// Write decrypted bytes to `target`. Without `force` the file must not exist;
/// the check and the create are one `open` call.
async fn write_output(target: &Path, bytes: &[u8], force: bool) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = match options.open(target).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            anyhow::bail!("{} already exists (use --force to overwrite)", target.display());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("creating {}", target.display()));
        }
    };
    file.write_all(bytes)
        .await
        .with_context(|| format!("writing {}", target.display()))?;
    file.flush()
        .await
        .with_context(|| format!("flushing {}", target.display()))?;
    tracing::debug!(path = %target.display(), bytes = bytes.len(), force, "output written");
    Ok(())
}

// ── `shroud ls` ───────────────────────────────────────────────────────────────

/// One row of `ls` output. Storage internals (wrapped key, blob location,
/// content hash) stay out of it.
#[derive(Debug, Serialize)]
struct FileEntry {
    id: FileId,
    name: String,
    size: u64,
    created_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sender: Option<String>,
}

impl From<EncryptedFileRecord> for FileEntry {
    fn from(record: EncryptedFileRecord) -> Self {
        Self {
            id: record.id,
            name: record.original_name,
            size: record.size,
            created_at: record.created_at,
            sender: None,
        }
    }
}

impl From<SharedFile> for FileEntry {
    fn from(shared: SharedFile) -> Self {
        Self {
            sender: Some(shared.sender.username),
            ..Self::from(shared.record)
        }
    }
}

#[derive(Debug, Serialize)]
struct Listing {
    owned: Vec<FileEntry>,
    shared: Vec<FileEntry>,
}

impl Listing {
    fn new(owned: Vec<EncryptedFileRecord>, shared: Vec<SharedFile>) -> Self {
        Self {
            owned: owned.into_iter().map(FileEntry::from).collect(),
            shared: shared.into_iter().map(FileEntry::from).collect(),
        }
    }
}

fn cmd_ls(vault: &Vault, username: &str, json: bool) -> Result<()> {
    let user = resolve_user(vault, username)?;
    let listing = Listing::new(vault.owned_files(user.id)?, vault.shared_with(user.id)?);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&listing).context("serializing listing")?
        );
        return Ok(());
    }

    println!("My files:");
    if listing.owned.is_empty() {
        println!("  (none)");
    }
    for f in &listing.owned {
        println!("  {}  {:>10}  {}", f.id, fmt_bytes(f.size), f.name);
    }

    println!();
    println!("Shared with me:");
    if listing.shared.is_empty() {
        println!("  (none)");
    }
    for f in &listing.shared {
        println!(
            "  {}  {:>10}  {}  (from {})",
            f.id,
            fmt_bytes(f.size),
            f.name,
            f.sender.as_deref().unwrap_or("?")
        );
    }
    Ok(())
}

// ── `shroud status` ───────────────────────────────────────────────────────────

async fn cmd_status(config: &ShroudConfig) -> Result<()> {
    println!("storage backend: {:?}", config.storage.backend);
    println!("ledger:          {}", config.ledger.path.display());

    let vault = open_vault(config)?;
    println!("master key:      {}", vault.key_source());
    tracing::info!(source = %vault.key_source(), backend = ?config.storage.backend, "status check");

    match vault.health().await {
        Ok(()) => println!("storage:         ok"),
        Err(e) => {
            println!("storage:         UNREACHABLE ({e})");
            std::process::exit(1);
        }
    }
    Ok(())
}

// ── `shroud config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &ShroudConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
