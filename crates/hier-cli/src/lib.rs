//! `hiermig` command implementation
//!
//! The binary is a thin wrapper: it parses [`command`], installs tracing and
//! hands the matches to [`run`]. Stateful commands load a JSON
//! [`StoreSnapshot`], drive a [`MigrationService`] over it and write the
//! snapshot back, including after a failed migration so its FAILED job and
//! committed moves are kept.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use hier_migrate::{
    JobMode, JobStore, MemoryStore, MigrationService, MigratorConfig, StoreSnapshot,
};
use hier_model::{ActorId, JobId, Preset, TenantId, WorkItem};
use hier_scan::{CompatibilityScanner, Confidence, ScanResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build the command line
#[must_use]
pub fn command() -> Command {
    let state = Arg::new("state")
        .long("state")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("JSON state file (items, tenants, jobs, moves, reports)");
    let tenant = Arg::new("tenant")
        .long("tenant")
        .required(true)
        .help("Tenant id");
    let actor = Arg::new("actor")
        .long("actor")
        .required(true)
        .help("Acting tenant administrator");

    Command::new("hiermig")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Scan, migrate and roll back work-item hierarchies")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML engine configuration"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("scan")
                .about("Scan a snapshot against a preset without touching anything")
                .arg(
                    Arg::new("items")
                        .long("items")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON array of work items"),
                )
                .arg(preset_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the full scan result as JSON"),
                ),
        )
        .subcommand(
            Command::new("migrate")
                .about("Migrate a tenant to a preset (dry run unless --apply)")
                .arg(state.clone())
                .arg(tenant.clone())
                .arg(
                    Arg::new("to")
                        .long("to")
                        .required(true)
                        .help("Key of the target preset"),
                )
                .arg(preset_arg())
                .arg(actor.clone())
                .arg(
                    Arg::new("apply")
                        .long("apply")
                        .action(ArgAction::SetTrue)
                        .help("Apply HIGH-confidence moves"),
                ),
        )
        .subcommand(
            Command::new("rollback")
                .about("Roll back a completed migration job")
                .arg(state.clone())
                .arg(tenant.clone())
                .arg(
                    Arg::new("job")
                        .long("job")
                        .required(true)
                        .value_parser(value_parser!(String))
                        .help("Job id"),
                )
                .arg(actor),
        )
        .subcommand(
            Command::new("jobs")
                .about("List a tenant's migration jobs, newest first")
                .arg(state)
                .arg(tenant),
        )
}

fn preset_arg() -> Arg {
    Arg::new("preset")
        .long("preset")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("JSON preset payload")
}

/// Install the global subscriber; `RUST_LOG` overrides the `info` default
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init_tracing(json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

/// Execute parsed arguments, writing results to `out`
///
/// # Errors
/// Any I/O, parse, validation or migration failure, with context.
pub async fn run(matches: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => MigratorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MigratorConfig::default(),
    };

    match matches.subcommand() {
        Some(("scan", args)) => scan(args, &config, out),
        Some(("migrate", args)) => migrate(args, config, out).await,
        Some(("rollback", args)) => rollback(args, config, out).await,
        Some(("jobs", args)) => jobs(args, out).await,
        _ => anyhow::bail!("no subcommand given"),
    }
}

fn scan(args: &ArgMatches, config: &MigratorConfig, out: &mut dyn Write) -> Result<()> {
    let items_path = path(args, "items")?;
    let items: Vec<WorkItem> = serde_json::from_value(read_json(items_path)?)
        .with_context(|| format!("{} is not a list of work items", items_path.display()))?;
    let preset = load_preset(path(args, "preset")?)?;

    let result = CompatibilityScanner::new()
        .with_anchor(config.anchor_type)
        .scan(&items, &preset);

    if args.get_flag("json") {
        serde_json::to_writer_pretty(&mut *out, &result)?;
        writeln!(out)?;
    } else {
        write_scan_summary(out, items.len(), &result)?;
    }
    Ok(())
}

fn write_scan_summary(out: &mut dyn Write, scanned: usize, result: &ScanResult) -> Result<()> {
    writeln!(
        out,
        "{scanned} items scanned: {} errors, {} warnings, {} moves, {} for review",
        result.error_count(),
        result.issues.len() - result.error_count(),
        result.recommended_moves.len(),
        result.review_queue.len()
    )?;
    for issue in &result.issues {
        writeln!(out, "  {:<5} {}: {}", issue.severity, issue.item_id, issue.message)?;
    }
    for mv in &result.recommended_moves {
        let tag = match mv.confidence {
            Confidence::High => "HIGH",
            Confidence::Low => "LOW ",
        };
        writeln!(out, "  {tag} move {} -> {}", mv.item_id, mv.to_parent_id)?;
    }
    for entry in &result.review_queue {
        writeln!(
            out,
            "  REVIEW {}: {} ({} candidates)",
            entry.item_id,
            entry.reason.describe(),
            entry.candidate_count
        )?;
    }
    Ok(())
}

async fn migrate(args: &ArgMatches, config: MigratorConfig, out: &mut dyn Write) -> Result<()> {
    let state_path = path(args, "state")?;
    let store = Arc::new(load_state(state_path)?);
    let payload = read_json(path(args, "preset")?)?;
    let mode = if args.get_flag("apply") {
        JobMode::Apply
    } else {
        JobMode::DryRun
    };

    let service = MigrationService::in_memory(store.clone(), config);
    let result = service
        .migrate(
            &TenantId::new(text(args, "tenant")?),
            text(args, "to")?,
            mode,
            &payload,
            &ActorId::new(text(args, "actor")?),
        )
        .await;

    save_state(state_path, &store)?;
    let outcome = result.context("migration failed")?;
    serde_json::to_writer_pretty(&mut *out, &outcome)?;
    writeln!(out)?;
    Ok(())
}

async fn rollback(args: &ArgMatches, config: MigratorConfig, out: &mut dyn Write) -> Result<()> {
    let state_path = path(args, "state")?;
    let raw_job = text(args, "job")?;
    let job_id: JobId = raw_job
        .parse()
        .with_context(|| format!("'{raw_job}' is not a job id"))?;
    let store = Arc::new(load_state(state_path)?);

    let service = MigrationService::in_memory(store.clone(), config);
    let result = service
        .rollback(
            &TenantId::new(text(args, "tenant")?),
            job_id,
            &ActorId::new(text(args, "actor")?),
        )
        .await;

    save_state(state_path, &store)?;
    let outcome = result.context("rollback failed")?;
    serde_json::to_writer_pretty(&mut *out, &outcome)?;
    writeln!(out)?;
    Ok(())
}

async fn jobs(args: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let store = load_state(path(args, "state")?)?;
    let jobs = store.list_jobs(&TenantId::new(text(args, "tenant")?)).await?;
    for job in &jobs {
        writeln!(
            out,
            "{}  {:<11} {:<7} {} -> {}  moved={} review={} invalid={}",
            job.id,
            job.status,
            job.mode,
            job.from_preset_key.as_deref().unwrap_or("-"),
            job.to_preset_key,
            job.summary.moved_items,
            job.summary.flagged_for_review,
            job.summary.invalid_items
        )?;
    }
    Ok(())
}

fn path<'a>(args: &'a ArgMatches, id: &str) -> Result<&'a PathBuf> {
    args.get_one::<PathBuf>(id)
        .with_context(|| format!("--{id} is required"))
}

fn text<'a>(args: &'a ArgMatches, id: &str) -> Result<&'a str> {
    args.get_one::<String>(id)
        .map(String::as_str)
        .with_context(|| format!("--{id} is required"))
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn load_preset(path: &Path) -> Result<Preset> {
    Preset::from_json(&read_json(path)?)
        .with_context(|| format!("invalid preset in {}", path.display()))
}

/// Read a state file; a missing file is an empty store
///
/// # Errors
/// Unreadable or malformed state file.
pub fn load_state(path: &Path) -> Result<MemoryStore> {
    if !path.exists() {
        return Ok(MemoryStore::new());
    }
    let snapshot: StoreSnapshot = serde_json::from_value(read_json(path)?)
        .with_context(|| format!("{} is not a state file", path.display()))?;
    Ok(MemoryStore::from_snapshot(snapshot))
}

/// Write a store back to its state file
///
/// # Errors
/// Serialization or I/O failure.
pub fn save_state(path: &Path, store: &MemoryStore) -> Result<()> {
    let raw = serde_json::to_string_pretty(&store.snapshot())?;
    std::fs::write(path, raw).with_context(|| format!("writing {}", path.display()))
}
