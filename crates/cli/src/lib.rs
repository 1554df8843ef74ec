mod hierarchy;
mod index;
mod refs;

use clap::{Parser, Subcommand};
use smaliscope_core::config::IndexConfig;
use smaliscope_core::index::ProjectIndex;
use smaliscope_core::project::FsProject;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "smaliscope",
    version,
    about = "Symbol index and navigation for smali projects",
    long_about = "Smaliscope parses disassembled Dalvik classes (smali) and builds a cross-referenced \
                  symbol index over a whole project: class hierarchies, member references and \
                  rename propagation. It runs as a language server or answers one-off queries."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index a project and report statistics and broken files
    Index {
        /// Path to the project root directory
        #[arg(value_name = "PROJECT_PATH")]
        path: PathBuf,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the ancestors and subclasses of a class
    Hierarchy {
        /// Path to the project root directory
        #[arg(value_name = "PROJECT_PATH")]
        path: PathBuf,
        /// Class name, dotted (`com.example.Foo`) or as a descriptor (`Lcom/example/Foo;`)
        #[arg(value_name = "CLASS")]
        class: String,
    },
    /// Find every textual occurrence of descriptors or member references
    #[command(
        long_about = "Searches project text for each symbol, e.g. `Lcom/example/Foo;` or \
                      `Lcom/example/Foo;->bar()V`. Matches inside longer symbols are skipped."
    )]
    Refs {
        /// Path to the project root directory
        #[arg(value_name = "PROJECT_PATH")]
        path: PathBuf,
        #[arg(value_name = "SYMBOL", required = true)]
        symbols: Vec<String>,
    },
    /// Start the Language Server Protocol (LSP) server
    Lsp,
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let component = match &cli.command {
        Commands::Lsp => "lsp",
        _ => "cli",
    };
    let to_stderr = !matches!(cli.command, Commands::Lsp);
    let _guard = smaliscope_core::logging::init_logging(component, to_stderr);

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Index { path, json } => rt.block_on(index::run(path, json)),
        Commands::Hierarchy { path, class } => rt.block_on(hierarchy::run(path, class)),
        Commands::Refs { path, symbols } => rt.block_on(refs::run(path, symbols)),
        Commands::Lsp => rt.block_on(smaliscope_lsp::run_server()),
    }
}

/// Loads the project at `path` the way the language server does.
pub(crate) async fn load_index(
    path: &Path,
) -> Result<Arc<ProjectIndex>, Box<dyn std::error::Error>> {
    let config = IndexConfig::load(path)?;
    let project = FsProject::new(path, &config)?;
    let index = Arc::new(ProjectIndex::new(Arc::new(project), config));
    tracing::info!("Indexing project at: {}...", path.display());
    index.load_project(&CancellationToken::new()).await?;
    Ok(index)
}
