//! Chapterlog CLI
//!
//! Command-line front end for tracking reading progress.

use anyhow::{Context, Result};
use chapterlog_core::{
    codec, now_millis, Entry, EntryPatch, FieldUpdate, FileBackend, NewEntry, StoreRepository,
    TrackerConfig, CONFIG_FILE_NAME,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chapterlog")]
#[command(about = "Chapterlog - keep track of where you are in every series")]
#[command(version)]
struct Cli {
    /// Config file (default: <data dir>/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List entries, most recently updated first
    List,

    /// Add a new entry
    Add {
        title: String,

        /// Current chapter
        #[arg(short, long, default_value_t = 0.0)]
        chapter: f64,

        /// Link to the series
        #[arg(short, long)]
        url: Option<String>,

        /// Free-text notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Edit fields of an entry
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        chapter: Option<f64>,

        #[arg(long, conflicts_with = "clear_url")]
        url: Option<String>,

        /// Remove the link
        #[arg(long)]
        clear_url: bool,

        #[arg(long, conflicts_with = "clear_notes")]
        notes: Option<String>,

        /// Remove the notes
        #[arg(long)]
        clear_notes: bool,
    },

    /// Set the current chapter
    Set { id: String, chapter: f64 },

    /// Advance one chapter
    Inc { id: String },

    /// Go back one chapter
    Dec { id: String },

    /// Delete an entry
    Delete { id: String },

    /// Delete every entry
    Clear {
        /// Skip the safety check
        #[arg(long)]
        yes: bool,
    },

    /// Write all entries to a backup file
    Export {
        /// Output file (default: <export dir>/chapterlog-<timestamp>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge a backup file into the current entries
    Import { file: PathBuf },

    /// Open an entry's link in the browser
    Open { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, skipped) = resolve_config(cli.config.as_deref(), cli.data_dir.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Some((path, e)) = skipped {
        tracing::warn!(path = ?path, "Failed to load config file, using defaults: {}", e);
    }

    config
        .ensure_dirs()
        .context("Failed to create data directories")?;

    let repo = StoreRepository::with_key(
        FileBackend::new(config.store_dir()),
        config.store_key.clone(),
    );

    tracing::debug!(
        store_dir = %repo.backend().dir().display(),
        store_key = %repo.key(),
        "Using store"
    );

    match cli.command {
        Commands::List => cmd_list(&repo).await,
        Commands::Add {
            title,
            chapter,
            url,
            notes,
        } => cmd_add(&repo, title, chapter, url, notes).await,
        Commands::Edit {
            id,
            title,
            chapter,
            url,
            clear_url,
            notes,
            clear_notes,
        } => {
            let patch = EntryPatch {
                title,
                chapter,
                url: field_update(url, clear_url),
                notes: field_update(notes, clear_notes),
            };
            cmd_edit(&repo, &id, patch).await
        }
        Commands::Set { id, chapter } => {
            let entry = repo.set_chapter(&id, chapter).await?;
            report_updated(&id, entry)
        }
        Commands::Inc { id } => {
            let entry = repo.increment(&id).await?;
            report_updated(&id, entry)
        }
        Commands::Dec { id } => {
            let entry = repo.decrement(&id).await?;
            report_updated(&id, entry)
        }
        Commands::Delete { id } => cmd_delete(&repo, &id).await,
        Commands::Clear { yes } => cmd_clear(&repo, yes).await,
        Commands::Export { output } => cmd_export(&repo, &config, output).await,
        Commands::Import { file } => cmd_import(&repo, &file).await,
        Commands::Open { id } => cmd_open(&repo, &id).await,
    }
}

type Repo = StoreRepository<FileBackend>;

/// Pick the config to run with.
///
/// An explicit `--config` must load. Otherwise `config.yaml` is read from the
/// `--data-dir` (or the default data directory); a file that exists but
/// cannot be read falls back to defaults and is handed back so it can be
/// logged once logging is up.
fn resolve_config(
    config_path: Option<&Path>,
    data_dir: Option<&Path>,
) -> Result<(TrackerConfig, Option<(PathBuf, std::io::Error)>)> {
    let mut skipped = None;

    let mut config = match config_path {
        Some(path) => TrackerConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            let dir = match data_dir {
                Some(dir) => dir.to_path_buf(),
                None => TrackerConfig::default().data_dir,
            };
            match TrackerConfig::load_in(&dir) {
                Ok(Some(config)) => config,
                Ok(None) => TrackerConfig::default(),
                Err(e) => {
                    skipped = Some((dir.join(CONFIG_FILE_NAME), e));
                    TrackerConfig::default()
                }
            }
        }
    };

    if let Some(dir) = data_dir {
        config.data_dir = dir.to_path_buf();
    }

    Ok((config, skipped))
}

async fn cmd_list(repo: &Repo) -> Result<()> {
    let entries = repo.list_by_recency().await?;

    if entries.is_empty() {
        println!("No entries yet.");
        println!("\nAdd one with: chapterlog add <title> --chapter <n>");
        return Ok(());
    }

    for entry in &entries {
        print_entry(entry);
    }
    println!();
    println!("{} entries", entries.len());

    Ok(())
}

async fn cmd_add(
    repo: &Repo,
    title: String,
    chapter: f64,
    url: Option<String>,
    notes: Option<String>,
) -> Result<()> {
    let entry = repo
        .add(NewEntry {
            title,
            chapter,
            url,
            notes,
        })
        .await?;

    println!("✓ Added {} ({})", entry.title, entry.id);
    Ok(())
}

async fn cmd_edit(repo: &Repo, id: &str, patch: EntryPatch) -> Result<()> {
    let entry = repo.edit(id, patch).await?;
    report_updated(id, entry)
}

async fn cmd_delete(repo: &Repo, id: &str) -> Result<()> {
    if repo.delete(id).await? {
        println!("✓ Deleted {}", id);
    } else {
        println!("✗ No entry with id {}", id);
    }
    Ok(())
}

async fn cmd_clear(repo: &Repo, yes: bool) -> Result<()> {
    if !yes {
        println!("This deletes every entry. Re-run with --yes to confirm.");
        return Ok(());
    }

    repo.clear().await?;
    println!("✓ All entries cleared.");
    Ok(())
}

async fn cmd_export(repo: &Repo, config: &TrackerConfig, output: Option<PathBuf>) -> Result<()> {
    let bytes = repo.export_bytes().await?;
    let path =
        output.unwrap_or_else(|| config.export_dir.join(codec::export_file_name(now_millis())));

    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✓ Exported to {}", path.display());
    Ok(())
}

async fn cmd_import(repo: &Repo, file: &PathBuf) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let report = repo
        .import_bytes(&bytes)
        .await
        .context("Import failed")?;

    println!("✓ Imported {}", file.display());
    println!("  Added:     {}", report.added);
    println!("  Updated:   {}", report.replaced);
    println!("  Unchanged: {}", report.kept);
    Ok(())
}

async fn cmd_open(repo: &Repo, id: &str) -> Result<()> {
    let collection = repo.load().await?;
    let Some(entry) = collection.get(id) else {
        println!("✗ No entry with id {}", id);
        return Ok(());
    };
    let Some(url) = entry.url.as_deref().filter(|u| !u.is_empty()) else {
        println!("✗ {} has no link", entry.title);
        return Ok(());
    };

    #[cfg(target_os = "macos")]
    let mut command = std::process::Command::new("open");
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut command = std::process::Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = std::process::Command::new("xdg-open");

    command
        .arg(url)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context("Failed to launch browser")?;

    println!("✓ Opening {}", url);
    Ok(())
}

fn report_updated(id: &str, entry: Option<Entry>) -> Result<()> {
    match entry {
        Some(entry) => {
            println!(
                "✓ {} is at chapter {}",
                entry.title,
                format_chapter(entry.chapter)
            );
        }
        None => {
            println!("✗ No entry with id {}", id);
        }
    }
    Ok(())
}

fn field_update(value: Option<String>, clear: bool) -> FieldUpdate {
    match (value, clear) {
        (_, true) => FieldUpdate::Clear,
        (Some(value), false) => FieldUpdate::Set(value),
        (None, false) => FieldUpdate::Keep,
    }
}

fn print_entry(entry: &Entry) {
    let title = if entry.title.is_empty() {
        "(untitled)"
    } else {
        entry.title.as_str()
    };

    println!("{}  {}", entry.id, title);
    println!(
        "    Chapter {}  ·  updated {}",
        format_chapter(entry.chapter),
        format_timestamp(entry.updated_at)
    );
    if let Some(url) = entry.url.as_deref().filter(|u| !u.is_empty()) {
        println!("    {}", url);
    }
    if let Some(notes) = entry.notes.as_deref().filter(|n| !n.is_empty()) {
        println!("    {}", notes);
    }
}

fn format_chapter(chapter: f64) -> String {
    if chapter.fract() == 0.0 {
        format!("{}", chapter as i64)
    } else {
        format!("{}", chapter)
    }
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}
