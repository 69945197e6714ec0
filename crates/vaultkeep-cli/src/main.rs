//! vaultkeep - session memory lifecycle for AI-assisted vaults
//!
//! ## Commands
//!
//! - `status`: Storage usage and session lifecycle counts
//! - `cleanup`: Delete (or account for archiving) expired sessions and rotate backups
//! - `restore`: Preview archived memories by month, search query, or all
//! - `top`: Show the highest-ranked archived memories

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use vaultkeep_core::memory::{load_top_memories, DEFAULT_TOP_LIMIT};
use vaultkeep_core::retention::classify;
use vaultkeep_core::storage::list_sessions;
use vaultkeep_core::{
    calculate_node_storage, ArchiveStore, CleanupExecutor, CleanupOptions, ConfigLoader, LogFormat,
    RankingConfig, RestoreRequest, RestoreService, RetentionConfig, RetentionOverrides, VaultPaths,
};

#[derive(Parser)]
#[command(name = "vaultkeep")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Session memory lifecycle for AI-assisted vaults", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Print command results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file with a [cleanup] table
    #[arg(long, global = true, env = "VAULTKEEP_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    vault: VaultArgs,

    /// Storage limit in MB (overrides file and environment)
    #[arg(long, global = true)]
    max_storage_mb: Option<u64>,

    /// Warning threshold as a percentage of the storage limit
    #[arg(long, global = true)]
    warn_at_percent: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct VaultArgs {
    /// Vault identifier
    #[arg(long, global = true, default_value = "default")]
    vault_id: String,

    /// Vault root directory
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Show storage usage and lifecycle counts
    Status,

    /// Remove expired sessions and rotate backups
    Cleanup {
        /// Age threshold in days (default: configured retentionDays)
        #[arg(long)]
        older_than: Option<u32>,

        /// Count eligible sessions as archived instead of deleting them
        #[arg(long)]
        archive_only: bool,

        /// Report what would happen without deleting anything
        #[arg(long)]
        dry_run: bool,

        /// Minimum sessions to keep (default: configured keepMinSessions)
        #[arg(long)]
        keep_min: Option<usize>,

        /// Only run if storage pressure calls for automatic cleanup
        #[arg(long)]
        auto: bool,
    },

    /// Preview archived memories that would be restored
    Restore {
        /// Month or date: YYYY-MM, YYYY-MM-DD, or a calendar date
        #[arg(long)]
        date: Option<String>,

        /// Case-insensitive text to find in summaries, content and tags
        #[arg(long)]
        search: Option<String>,

        /// Every archived memory
        #[arg(long)]
        all: bool,
    },

    /// Show the highest-ranked archived memories
    Top {
        #[arg(short, long, default_value_t = DEFAULT_TOP_LIMIT)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    vaultkeep_core::init_tracing(format, level);

    let overrides = RetentionOverrides {
        max_storage_mb: cli.max_storage_mb,
        warn_at_percent: cli.warn_at_percent,
        ..Default::default()
    };
    let config = load_config(cli.config.as_deref(), overrides)?;
    let vault = VaultPaths::new(&cli.vault.vault_id, &cli.vault.root)
        .context("Invalid vault arguments")?;

    match cli.command {
        Commands::Status => cmd_status(&vault, &config, cli.json),
        Commands::Cleanup {
            older_than,
            archive_only,
            dry_run,
            keep_min,
            auto,
        } => {
            let mut options = CleanupOptions::from_config(&config)
                .dry_run(dry_run)
                .archive_only(archive_only);
            if let Some(days) = older_than {
                options.older_than_days = days;
            }
            if let Some(keep) = keep_min {
                options.keep_min_sessions = keep;
            }
            cmd_cleanup(&vault, &config, &options, auto, cli.json)
        }
        Commands::Restore { date, search, all } => {
            cmd_restore(&vault, RestoreRequest { date, search, all }, cli.json)
        }
        Commands::Top { limit } => cmd_top(&vault, limit, cli.json),
    }
}

fn load_config(path: Option<&Path>, overrides: RetentionOverrides) -> Result<RetentionConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = path {
        loader = loader
            .with_file(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?;
    }
    let config = loader
        .with_process_env()
        .context("Invalid VAULTKEEP_CLEANUP_* environment value")?
        .with_overrides(overrides)
        .load();
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    vault_id: String,
    usage: vaultkeep_core::StorageUsage,
    warning: bool,
    auto_cleanup_due: bool,
    sessions_by_state: BTreeMap<String, usize>,
}

/// Storage usage plus lifecycle counts
fn cmd_status(vault: &VaultPaths, config: &RetentionConfig, json: bool) -> Result<()> {
    let usage = calculate_node_storage(vault, config.sessions.max_storage_mb);
    let sessions = list_sessions(vault);
    let mut sessions_by_state = BTreeMap::new();
    for (_, state) in classify(&sessions, &config.sessions) {
        *sessions_by_state.entry(state.to_string()).or_insert(0) += 1;
    }
    let report = StatusReport {
        vault_id: vault.id().to_string(),
        warning: usage.is_warning(config),
        auto_cleanup_due: CleanupExecutor::new(config).should_auto_cleanup(vault),
        usage,
        sessions_by_state,
    };

    if json {
        return print_json(&report);
    }

    let u = &report.usage;
    println!("Vault: {}", report.vault_id);
    println!(
        "Storage: {:.2} MB of {} MB ({}%)",
        u.total_size_mb, u.max_storage_mb, u.percent_used
    );
    println!(
        "  sessions {:.2} MB, backups {:.2} MB",
        u.sessions_size_mb, u.backups_size_mb
    );
    println!(
        "  active: {} ({:.2} MB), archived: {} (~{:.2} MB estimated)",
        u.active_sessions.count,
        u.active_sessions.size_mb,
        u.archived_sessions.count,
        u.archived_sessions.size_mb
    );
    for (state, count) in &report.sessions_by_state {
        println!("  {state}: {count}");
    }
    if report.warning {
        println!(
            "Warning: storage above {}% of the configured limit",
            config.warn_at_percent
        );
    }
    if report.auto_cleanup_due {
        println!("Automatic cleanup is due");
    }
    Ok(())
}

/// Reconcile sessions and backups against policy
fn cmd_cleanup(
    vault: &VaultPaths,
    config: &RetentionConfig,
    options: &CleanupOptions,
    auto: bool,
    json: bool,
) -> Result<()> {
    let executor = CleanupExecutor::new(config);
    if auto && !executor.should_auto_cleanup(vault) {
        info!(vault_id = %vault.id(), "automatic cleanup not due");
        if !json {
            println!("Automatic cleanup not due for {}", vault.id());
        }
        return Ok(());
    }

    let result = executor.cleanup_node(vault, options);
    if json {
        return print_json(&result);
    }

    let prefix = if result.dry_run { "[dry run] " } else { "" };
    println!(
        "{prefix}sessions deleted: {}, archived: {}, backups deleted: {}",
        result.sessions_deleted, result.sessions_archived, result.backups_deleted
    );
    println!(
        "{prefix}space freed: {:.2} MB in {} ms",
        result.space_freed_mb, result.duration_ms
    );
    for failure in &result.failures {
        println!("  failed: {} ({})", failure.path.display(), failure.message);
    }
    Ok(())
}

/// Preview a restore without touching the archives
fn cmd_restore(vault: &VaultPaths, request: RestoreRequest, json: bool) -> Result<()> {
    let filter = request.into_filter()?;
    let service = RestoreService::new(vault, RankingConfig::default());
    let preview = service.preview(&filter)?;

    if json {
        return print_json(&preview);
    }

    if let Some(month) = preview.no_archive_for {
        println!("No archive for {month}");
        return Ok(());
    }
    println!(
        "{} memories ({} bytes) across {} month(s)",
        preview.total_entries,
        preview.estimated_bytes,
        preview.months.len()
    );
    for scanned in &preview.entries {
        println!(
            "  [{}] {} - {}",
            scanned.month, scanned.entry.session_id, scanned.entry.summary
        );
    }
    for skipped in &preview.skipped {
        println!("  skipped unreadable {}", skipped.path.display());
    }
    for dup in &preview.duplicates {
        let months: Vec<String> = dup.months.iter().map(|m| m.to_string()).collect();
        println!(
            "  duplicate session {} in {}",
            dup.session_id,
            months.join(", ")
        );
    }
    Ok(())
}

/// Highest-ranked archived memories
fn cmd_top(vault: &VaultPaths, limit: usize, json: bool) -> Result<()> {
    let scan = ArchiveStore::for_vault(vault)
        .scan()
        .context("Failed to read archives")?;
    let records = scan
        .entries
        .iter()
        .map(|e| e.entry.to_memory_record())
        .collect();
    let top = load_top_memories(records, limit, &RankingConfig::default());

    if json {
        return print_json(&top);
    }
    for record in &top {
        println!("{} - {}", record.id, record.summary);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cleanup_flags_parse() {
        let cli = Cli::try_parse_from([
            "vaultkeep",
            "--vault-id",
            "lab",
            "cleanup",
            "--dry-run",
            "--older-than",
            "30",
            "--keep-min",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.vault.vault_id, "lab");
        match cli.command {
            Commands::Cleanup {
                older_than,
                dry_run,
                keep_min,
                archive_only,
                auto,
            } => {
                assert_eq!(older_than, Some(30));
                assert_eq!(keep_min, Some(5));
                assert!(dry_run);
                assert!(!archive_only);
                assert!(!auto);
            }
            _ => panic!("expected cleanup"),
        }
    }

    #[test]
    fn test_overrides_beat_defaults() {
        let overrides = RetentionOverrides {
            max_storage_mb: Some(64),
            ..Default::default()
        };
        let config = load_config(None, overrides).unwrap();
        assert_eq!(config.sessions.max_storage_mb, 64);
    }

    #[test]
    fn test_cleanup_and_restore_on_temp_vault() {
        let dir = tempfile::tempdir().unwrap();
        let vault = VaultPaths::new("lab", dir.path()).unwrap();
        let config = RetentionConfig::default();
        let options = CleanupOptions::from_config(&config).dry_run(true);

        cmd_status(&vault, &config, true).unwrap();
        cmd_cleanup(&vault, &config, &options, false, true).unwrap();
        cmd_restore(
            &vault,
            RestoreRequest {
                all: true,
                ..Default::default()
            },
            true,
        )
        .unwrap();
        cmd_top(&vault, 3, true).unwrap();
    }

    #[test]
    fn test_restore_without_filter_fails() {
        let dir = tempfile::tempdir().unwrap();
        let vault = VaultPaths::new("lab", dir.path()).unwrap();
        assert!(cmd_restore(&vault, RestoreRequest::default(), true).is_err());
    }
}
