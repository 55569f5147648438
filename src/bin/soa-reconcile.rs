//! soa-reconcile CLI: merge fragments or reconcile text/vision extractions.
//!
//! Usage:
//!   soa-reconcile merge <FRAGMENT>... [--vision <FRAGMENT>]...
//!   soa-reconcile reconcile --text <FILE> --vision <FILE> [--proposal <FILE>]
//!   soa-reconcile runs list|show <ID>|delete <ID> [--db path]

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use soa_reconcile::{
    Fragment, OpenStore, ReconcileConfig, ReconcileOutput, Reconciler, RunStore, SourceTag,
    SqliteStore, StoredRun,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "soa-reconcile",
    version,
    about = "Reconcile partial Schedule of Activities extractions"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge chunked extraction fragments into one record
    Merge {
        /// Text-pass fragment files (a file may hold one fragment or an array)
        #[arg(required = true)]
        fragments: Vec<PathBuf>,
        /// Vision-pass fragment files
        #[arg(long)]
        vision: Vec<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Reconcile a text and a vision extraction of the same document
    Reconcile {
        /// Text-pass record
        #[arg(long)]
        text: PathBuf,
        /// Vision-pass record
        #[arg(long)]
        vision: PathBuf,
        /// Externally proposed merge, filtered against both sources
        #[arg(long)]
        proposal: Option<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Inspect stored runs
    Runs {
        #[command(subcommand)]
        action: RunsAction,
        /// Path to SQLite database file
        #[arg(long, global = true)]
        db: Option<PathBuf>,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Write the reconciled record here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
    /// Write the provenance record here
    #[arg(long)]
    provenance: Option<PathBuf>,
    /// Write the run report here
    #[arg(long)]
    report: Option<PathBuf>,
    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Path to SQLite database file
    #[arg(long)]
    db: Option<PathBuf>,
    /// Do not record the run in the database
    #[arg(long)]
    no_store: bool,
}

#[derive(Subcommand)]
enum RunsAction {
    /// List stored runs, newest first
    List,
    /// Print a stored run as JSON
    Show {
        /// Run id
        id: String,
    },
    /// Delete a stored run
    Delete {
        /// Run id
        id: String,
    },
}

/// Get the default database path (~/.local/share/soa-reconcile/runs.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("soa-reconcile").join("runs.db")
}

fn open_store(db: Option<PathBuf>) -> Result<SqliteStore, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))
}

fn read_json(path: &Path) -> Result<Value, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid JSON in '{}': {}", path.display(), e))
}

/// Fragments in a file: a top-level array holds several, anything else is one
fn read_fragments(path: &Path, tag: SourceTag, into: &mut Vec<Fragment>) -> Result<(), String> {
    match read_json(path)? {
        Value::Array(items) => {
            for (i, raw) in items.into_iter().enumerate() {
                let label = format!("{}#{}", path.display(), i);
                into.push(Fragment::new(label, raw).with_tag(tag));
            }
        }
        raw => into.push(Fragment::new(path.display().to_string(), raw).with_tag(tag)),
    }
    Ok(())
}

fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    match path {
        Some(path) => std::fs::write(path, json + "\n")
            .map_err(|e| format!("cannot write '{}': {}", path.display(), e)),
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}

fn load_config(output: &OutputArgs) -> Result<ReconcileConfig, String> {
    ReconcileConfig::load(output.config.as_deref()).map_err(|e| e.to_string())
}

/// Write the outputs, store the run, and print a summary on stderr
fn finish(result: ReconcileOutput, output: OutputArgs) -> i32 {
    let written = write_json(&result.record, output.out.as_deref())
        .and_then(|_| match output.provenance.as_deref() {
            Some(path) => write_json(&result.provenance, Some(path)),
            None => Ok(()),
        })
        .and_then(|_| match output.report.as_deref() {
            Some(path) => write_json(&result.report, Some(path)),
            None => Ok(()),
        });
    if let Err(e) = written {
        eprintln!("Error: {}", e);
        return 1;
    }

    for warning in &result.report.warnings {
        eprintln!("Warning: {}", warning);
    }
    let timeline = &result.record.timeline;
    eprintln!(
        "{} activities, {} timepoints, {} ticks",
        timeline.activities.len(),
        timeline.planned_timepoints.len(),
        timeline.ticks().len()
    );
    if let Some(enforcement) = &result.report.enforcement {
        for (reason, count) in &enforcement.ticks_dropped {
            eprintln!("  dropped {:>4}  {}", count, reason);
        }
    }

    if output.no_store {
        return 0;
    }
    match store_run(&result, output.db) {
        Ok(id) => {
            eprintln!("Stored run {}", id);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn store_run(result: &ReconcileOutput, db: Option<PathBuf>) -> Result<String, String> {
    let to_value = |v: Result<Value, serde_json::Error>| v.map_err(|e| e.to_string());
    let run = StoredRun::new(
        result.mode,
        to_value(serde_json::to_value(&result.record))?,
        to_value(serde_json::to_value(&result.provenance))?,
        to_value(serde_json::to_value(&result.report))?,
    );
    let store = open_store(db)?;
    store.save_run(&run).map_err(|e| e.to_string())?;
    Ok(run.id)
}

fn cmd_merge(fragments: &[PathBuf], vision: &[PathBuf], output: OutputArgs) -> i32 {
    let config = match load_config(&output) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let mut inputs = Vec::new();
    let read = fragments
        .iter()
        .try_for_each(|p| read_fragments(p, SourceTag::TextOnly, &mut inputs))
        .and_then(|_| {
            vision
                .iter()
                .try_for_each(|p| read_fragments(p, SourceTag::VisionOnly, &mut inputs))
        });
    if let Err(e) = read {
        eprintln!("Error: {}", e);
        return 1;
    }

    match Reconciler::new(config).merge_fragments(&inputs) {
        Ok(result) => finish(result, output),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_reconcile(text: &Path, vision: &Path, proposal: Option<&Path>, output: OutputArgs) -> i32 {
    let inputs = load_config(&output).and_then(|config| {
        let text = read_json(text)?;
        let vision = read_json(vision)?;
        let proposal = proposal.map(read_json).transpose()?;
        Ok((config, text, vision, proposal))
    });
    let (config, text, vision, proposal) = match inputs {
        Ok(inputs) => inputs,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    match Reconciler::new(config).reconcile_sources(&text, &vision, proposal.as_ref()) {
        Ok(result) => finish(result, output),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_runs_list(store: &SqliteStore) -> i32 {
    let runs = match store.list_runs() {
        Ok(runs) => runs,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if runs.is_empty() {
        println!("No runs stored.");
        return 0;
    }
    println!("{:<36}  {:<25}  {:<9}", "ID", "CREATED", "MODE");
    println!("{}", "-".repeat(74));
    for run in runs {
        println!(
            "{:<36}  {:<25}  {:<9}",
            run.id,
            run.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            run.mode.as_str()
        );
    }
    0
}

fn cmd_runs_show(store: &SqliteStore, id: &str) -> i32 {
    match store.load_run(id) {
        Ok(Some(run)) => match write_json(&run, None) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Ok(None) => {
            eprintln!("Error: run '{}' not found", id);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_runs_delete(store: &SqliteStore, id: &str) -> i32 {
    match store.delete_run(id) {
        Ok(true) => {
            println!("Deleted run {}", id);
            0
        }
        Ok(false) => {
            eprintln!("Error: run '{}' not found", id);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// `RUST_LOG` directives when set and valid, `info` otherwise
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn main() {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Merge {
            fragments,
            vision,
            output,
        } => cmd_merge(&fragments, &vision, output),
        Commands::Reconcile {
            text,
            vision,
            proposal,
            output,
        } => cmd_reconcile(&text, &vision, proposal.as_deref(), output),
        Commands::Runs { action, db } => {
            let store = match open_store(db) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            match action {
                RunsAction::List => cmd_runs_list(&store),
                RunsAction::Show { id } => cmd_runs_show(&store, &id),
                RunsAction::Delete { id } => cmd_runs_delete(&store, &id),
            }
        }
    };
    std::process::exit(code);
}
