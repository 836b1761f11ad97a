use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use paperwatch_core::{AppConfig, RecordStatus, RunMode, StateStore};
use paperwatch_science::{Pipeline, RunSummary};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "paperwatch",
    about = "Turns arXiv links in Markdown notes into formatted citations",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory of notes to watch.
    #[arg(short, long, default_value = "./papers", global = true)]
    watch: PathBuf,

    /// Where PDFs are saved (default: <watch>/pdfs).
    #[arg(short, long)]
    pdf_dir: Option<PathBuf>,

    /// Process every note once and exit instead of watching.
    #[arg(short, long)]
    once: bool,

    /// HTTP(S) proxy for all outbound requests, e.g. http://127.0.0.1:7897.
    #[arg(long, conflicts_with = "no_proxy")]
    proxy: Option<String>,

    /// Ignore any proxy from the config file or environment.
    #[arg(long)]
    no_proxy: bool,

    /// Log filter, e.g. `debug` or `paperwatch_science=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output in JSON format. Also enabled by setting PAPERWATCH_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show per-status counts and papers that still need work.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    let json_output = cli.json || std::env::var("PAPERWATCH_JSON").as_deref() == Ok("1");

    // Only an unreadable watch root stops the program.
    let root = cli
        .watch
        .canonicalize()
        .with_context(|| format!("watch root is not readable: {}", cli.watch.display()))?;

    let mut config = AppConfig::for_root(&root)?;
    apply_flags(&mut config, &cli)?;

    match cli.command {
        Some(Commands::Status) => cmd_status(&config, json_output),
        None => run(config, json_output).await,
    }
}

fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    Ok(())
}

fn apply_flags(config: &mut AppConfig, cli: &Cli) -> Result<()> {
    if let Some(dir) = &cli.pdf_dir {
        let dir = if dir.is_absolute() {
            dir.clone()
        } else {
            std::env::current_dir()?.join(dir)
        };
        config.watch.pdf_dir = Some(dir);
    }
    if cli.once {
        config.watch.mode = RunMode::OneShot;
    }
    if cli.no_proxy {
        config.network.proxy = None;
    } else if let Some(proxy) = &cli.proxy {
        config.network.proxy = Some(proxy.clone());
    }
    config.validate()?;
    Ok(())
}

async fn run(config: AppConfig, json_output: bool) -> Result<()> {
    let pdf_dir = config.pdf_dir();
    std::fs::create_dir_all(&pdf_dir)
        .with_context(|| format!("cannot create PDF directory {}", pdf_dir.display()))?;

    info!(
        root = %config.root.display(),
        pdf_dir = %pdf_dir.display(),
        proxy = config.network.proxy.as_deref().unwrap_or("none"),
        mode = ?config.watch.mode,
        "paperwatch starting"
    );

    let mode = config.watch.mode;
    let pipeline = Arc::new(Pipeline::from_config(config)?);

    match mode {
        RunMode::OneShot => {
            let summary = pipeline.run_once().await?;
            print_summary(&summary, json_output)?;
        }
        RunMode::Continuous => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "cannot listen for Ctrl-C");
                    return;
                }
                let _ = shutdown_tx.send(true);
            });

            eprintln!("Watching {} (Ctrl-C to stop)", pipeline.config().root.display());
            pipeline.run_continuous(shutdown_rx).await?;
            eprintln!("Stopped.");
        }
    }
    Ok(())
}

fn cmd_status(config: &AppConfig, json_output: bool) -> Result<()> {
    let store = StateStore::load(config.state_path());
    let summary = store.summary();

    let incomplete: Vec<_> = store
        .records()
        .filter(|(_, r)| {
            r.status != RecordStatus::Completed || r.needs_citations() || r.pdf_path.is_none()
        })
        .collect();

    if json_output {
        let items: Vec<_> = incomplete
            .iter()
            .map(|(id, r)| {
                serde_json::json!({
                    "id": id,
                    "status": r.status.label(),
                    "title": r.metadata.as_ref().map(|m| m.title.as_str()),
                    "citation_count": r.citation_count,
                    "has_pdf": r.pdf_path.is_some(),
                    "retry_count": r.retry_count,
                    "failure": failure_reason(&r.status),
                })
            })
            .collect();
        return print_json(&serde_json::json!({
            "status": "ok",
            "data": {
                "state_file": store.path(),
                "total": summary.total(),
                "pending": summary.pending,
                "metadata_ready": summary.metadata_ready,
                "asset_ready": summary.asset_ready,
                "completed": summary.completed,
                "failed": summary.failed,
                "unknown_citations": summary.unknown_citations,
                "incomplete": items,
            }
        }));
    }

    println!("State: {}", display_path(store.path()));
    println!("  Papers:            {}", summary.total());
    println!("  Pending:           {}", summary.pending);
    println!("  Metadata ready:    {}", summary.metadata_ready);
    println!("  PDF ready:         {}", summary.asset_ready);
    println!("  Completed:         {}", summary.completed);
    println!("  Failed:            {}", summary.failed);
    println!("  Unknown citations: {}", summary.unknown_citations);

    if !incomplete.is_empty() {
        println!();
        println!("Needs work:");
        for (id, record) in incomplete {
            let title = record
                .metadata
                .as_ref()
                .map(|m| m.title.as_str())
                .unwrap_or("(no metadata)");
            let mut missing = Vec::new();
            if record.needs_citations() {
                missing.push("citations");
            }
            if record.needs_asset() {
                missing.push("pdf");
            }
            let detail = match failure_reason(&record.status) {
                Some(reason) => format!("failed: {reason}"),
                None if missing.is_empty() => record.status.label().to_string(),
                None => format!("{}, missing {}", record.status.label(), missing.join(", ")),
            };
            println!("  {id:<18} {title} [{detail}] (retries: {})", record.retry_count);
        }
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, json_output: bool) -> Result<()> {
    if json_output {
        let errors: Vec<_> = summary
            .file_errors
            .iter()
            .map(|(path, err)| serde_json::json!({"path": path, "error": err}))
            .collect();
        let status = if summary.has_errors() { "partial" } else { "ok" };
        return print_json(&serde_json::json!({
            "status": status,
            "data": {
                "files_scanned": summary.files_scanned,
                "files_rewritten": summary.files_rewritten,
                "links": summary.links,
                "resolved": summary.resolved,
                "deferred": summary.deferred,
                "failed": summary.failed,
                "downloaded": summary.downloaded,
                "errors": errors,
            }
        }));
    }

    println!(
        "Scanned {} note(s), rewrote {}, {} link(s): {} resolved, {} deferred, {} failed, {} PDF(s) downloaded.",
        summary.files_scanned,
        summary.files_rewritten,
        summary.links,
        summary.resolved,
        summary.deferred,
        summary.failed,
        summary.downloaded,
    );
    for (path, err) in &summary.file_errors {
        eprintln!("  skipped {}: {err}", display_path(path));
    }
    Ok(())
}

fn failure_reason(status: &RecordStatus) -> Option<&str> {
    match status {
        RecordStatus::Failed(reason) => Some(reason.as_str()),
        _ => None,
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}
