//! Weft CLI — unified command-line interface for the Weft template
//! compiler.

mod commands;
mod manifest;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use manifest::WeftManifest;

#[derive(Parser)]
#[command(name = "weft", version, about = "The Weft template compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new Weft project
    Init {
        /// Project name
        name: String,
    },
    /// Compile analyzed templates into a .wpk archive
    Compile {
        /// Input analyzed-template JSON file (default: manifest inputs)
        #[arg(long)]
        input: Option<String>,
        /// Archive path to write (default: manifest output)
        #[arg(long)]
        output: Option<String>,
        /// Print per-unit statistics
        #[arg(long)]
        stats: bool,
    },
    /// List the contents of a .wpk archive
    Inspect {
        /// Archive path
        file: PathBuf,
    },
    /// Render one archived unit to stdout
    Render {
        /// Archive path
        file: PathBuf,
        /// Unit name to render
        unit: String,
        /// JSON file holding parameter values
        #[arg(long)]
        data: Option<PathBuf>,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

/// `RUST_LOG` overrides the default `warn` filter.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(false).init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Init { name } => commands::init::run(&name),

        Commands::Compile {
            input,
            output,
            stats,
        } => {
            let (manifest, project_dir) = match WeftManifest::find_and_load(&cwd)? {
                Some((manifest, dir)) => (Some(manifest), dir),
                None => (None, cwd),
            };
            commands::compile::run(
                &project_dir,
                manifest.as_ref(),
                input.as_deref(),
                output.as_deref(),
                stats,
            )
        }

        Commands::Inspect { file } => commands::inspect::run(&file),

        Commands::Render { file, unit, data } => {
            commands::render::run(&file, &unit, data.as_deref())
        }
    }
}
