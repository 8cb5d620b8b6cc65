use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use noteflow_context::{ContextDiscoveryService, FileSelector, FileTreeCache};
use noteflow_synth::{NotesStore, Pipeline, PipelineError, SynthesisSession};
use std::path::PathBuf;
use std::sync::Arc;

mod capabilities;

use capabilities::{CommandCapability, NoSelector};

#[derive(Parser)]
#[command(name = "noteflow")]
#[command(about = "Turn free-form notes into structured tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one synthesis cycle over the note buffer
    Format(FormatArgs),

    /// Print the pending delta without formatting anything
    Diff(BufferArgs),

    /// List the persisted task collection
    Tasks(ProjectArgs),

    /// Print the (cached) project file tree sent to the selector
    Tree(ProjectArgs),
}

#[derive(Args)]
struct ProjectArgs {
    /// Project root directory
    #[arg(long, default_value = ".")]
    project: PathBuf,
}

#[derive(Args)]
struct BufferArgs {
    #[command(flatten)]
    project: ProjectArgs,

    /// File holding the current note buffer
    #[arg(long)]
    buffer: PathBuf,
}

#[derive(Args)]
struct FormatArgs {
    #[command(flatten)]
    buffer: BufferArgs,

    /// Command for the structuring capability (JSON request on stdin,
    /// reply on stdout)
    #[arg(long)]
    structuring_cmd: String,

    /// Command for the file-selection capability; discovery degrades to
    /// empty context when omitted
    #[arg(long)]
    selector_cmd: Option<String>,

    /// Ask the structuring capability to be lenient about transcription
    /// artifacts
    #[arg(long)]
    voice: bool,
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Format(args) => run_format(args).await,
        Commands::Diff(args) => run_diff(args),
        Commands::Tasks(args) => run_tasks(args),
        Commands::Tree(args) => run_tree(args).await,
    }
}

fn read_buffer(args: &BufferArgs) -> Result<String> {
    std::fs::read_to_string(&args.buffer)
        .with_context(|| format!("read note buffer {}", args.buffer.display()))
}

async fn run_format(args: FormatArgs) -> Result<()> {
    let raw_text = read_buffer(&args.buffer)?;
    let project = &args.buffer.project.project;

    let structuring = Arc::new(CommandCapability::new(args.structuring_cmd));
    let selector: Arc<dyn FileSelector> = match args.selector_cmd {
        Some(cmd) => Arc::new(CommandCapability::new(cmd)),
        None => Arc::new(NoSelector),
    };

    let store = NotesStore::new(project);
    let discovery = ContextDiscoveryService::new(selector, Some(store.cache_dir()));
    let pipeline = Pipeline::new(structuring, discovery, store);
    let session = SynthesisSession::new(project);

    match pipeline.run_cycle(&session, &raw_text, args.voice).await {
        Ok(report) => {
            for warning in &report.warnings {
                log::warn!("Structuring warning: {warning}");
            }
            println!(
                "Added {} tasks ({} total). Context: {} files, {} cache hits, {} misses.",
                report.appended,
                report.total_tasks,
                report.context_files.len(),
                report.cache_hits,
                report.cache_misses
            );
            Ok(())
        }
        Err(PipelineError::NoChanges) => {
            println!("Nothing new to format.");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn run_diff(args: BufferArgs) -> Result<()> {
    let raw_text = read_buffer(&args)?;
    let notes = NotesStore::new(&args.project.project).load_or_init()?;
    match noteflow_synth::diff(&raw_text, &notes.last_formatted_raw) {
        Ok(delta) => println!("{delta}"),
        Err(PipelineError::NoChanges) => println!("Nothing new to format."),
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

fn run_tasks(args: ProjectArgs) -> Result<()> {
    let notes = NotesStore::new(&args.project).load_or_init()?;
    if notes.tasks.is_empty() {
        println!("No tasks yet.");
        return Ok(());
    }
    for task in &notes.tasks {
        print_task(task, 0);
    }
    Ok(())
}

fn print_task(task: &noteflow_protocol::TaskNode, depth: usize) {
    let check = if task.checked { "x" } else { " " };
    println!(
        "{}[{check}] {} ({:?}) {}",
        "  ".repeat(depth),
        task.text,
        task.metadata.priority,
        task.id
    );
    for sub in &task.metadata.subtasks {
        print_task(sub, depth + 1);
    }
}

async fn run_tree(args: ProjectArgs) -> Result<()> {
    let tree = FileTreeCache::new().generate(&args.project).await?;
    print!("{tree}");
    Ok(())
}
