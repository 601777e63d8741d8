use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use canvas::config::EngineConfig;
use canvas::engine::ElementDocument;
use canvas::geometry::{Rect, visual_bounding_box};
use canvas::group::union_bounds;
use canvas::{ImportError, Snapshot};
use clap::{Parser, Subcommand};


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("{0} already exists; pass --force to overwrite")]
    AlreadyExists(PathBuf),
    #[error("failed to load file: {0}")]
    Import(#[from] ImportError),
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("no element with id `{0}`")]
    UnknownElement(String),
}

#[derive(Parser, Debug)]
#[command(name = "sketchboard", about = "Create, inspect and normalize whiteboard snapshot files")]
struct Cli {
    /// Log at debug level.
    #[arg(short, long, global = true, env = "SKETCH_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write an empty snapshot file.
    New {
        path: PathBuf,
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Validate a snapshot and summarize its contents.
    Inspect { path: PathBuf },
    /// Print the visual bounds of one element, or of the whole document.
    Bounds {
        path: PathBuf,
        #[arg(long)]
        id: Option<String>,
    },
    /// Re-export a snapshot with dense paint order as pretty JSON.
    Normalize {
        path: PathBuf,
        #[arg(short, long, help = "Output path; defaults to rewriting the input")]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::New { path, force } => run_new(&path, force),
        Command::Inspect { path } => run_inspect(&path),
        Command::Bounds { path, id } => run_bounds(&path, id.as_deref()),
        Command::Normalize { path, output } => run_normalize(&path, output.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).with_writer(io::stderr).init();
}

fn open(path: &Path) -> Result<ElementDocument, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read { path: path.to_owned(), source })?;
    let mut doc = ElementDocument::with_config(EngineConfig::from_env());
    doc.load_json(&text)?;
    tracing::debug!(path = %path.display(), elements = doc.len(), "snapshot loaded");
    Ok(doc)
}

fn write(path: &Path, text: &str) -> Result<(), CliError> {
    fs::write(path, text).map_err(|source| CliError::Write { path: path.to_owned(), source })?;
    tracing::info!(path = %path.display(), "snapshot written");
    Ok(())
}

fn run_new(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::AlreadyExists(path.to_owned()));
    }
    write(path, &Snapshot::empty().to_json_pretty()?)
}

fn run_inspect(path: &Path) -> Result<(), CliError> {
    let doc = open(path)?;
    let snapshot = doc.export_snapshot();

    let mut kinds: BTreeMap<&str, usize> = BTreeMap::new();
    for el in doc.elements() {
        *kinds.entry(el.kind.name()).or_default() += 1;
    }
    let top_level = doc.elements().iter().filter(|e| e.group_id.is_none()).count();

    println!("version   {}", snapshot.version);
    println!("next id   {}", snapshot.next_id);
    println!("elements  {} ({top_level} top-level)", doc.len());
    for (kind, count) in &kinds {
        println!("  {kind:<8}{count}");
    }
    match union_bounds(doc.elements()) {
        Some(r) => println!("bounds    {}", format_rect(&r)),
        None => println!("bounds    (empty)"),
    }
    Ok(())
}

fn run_bounds(path: &Path, id: Option<&str>) -> Result<(), CliError> {
    let doc = open(path)?;
    match id {
        Some(id) => {
            let el = doc.element(id).ok_or_else(|| CliError::UnknownElement(id.to_owned()))?;
            println!("{}", format_rect(&visual_bounding_box(el)));
        }
        None => match union_bounds(doc.elements().iter().filter(|e| e.group_id.is_none())) {
            Some(r) => println!("{}", format_rect(&r)),
            None => println!("(empty)"),
        },
    }
    Ok(())
}

fn run_normalize(path: &Path, output: Option<&Path>) -> Result<(), CliError> {
    let doc = open(path)?;
    write(output.unwrap_or(path), &doc.save_json()?)
}

fn format_rect(r: &Rect) -> String {
    format!("x={} y={} width={} height={}", r.x, r.y, r.width, r.height)
}
