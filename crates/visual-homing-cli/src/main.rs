//! Visual homing CLI — entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;

use visual_homing::HomingConfig;
use visual_homing_cli::commands;

#[derive(Parser)]
#[command(
    name = "visual-homing",
    about = "Train snapshot memories from panoramic views and recover headings from new ones",
    version
)]
struct Cli {
    /// Path to a JSON configuration file.
    /// Also reads VISUAL_HOMING_CONFIG, then ./visual-homing.json.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a perfect memory from a directory of views.
    Train {
        /// Directory of training views, used in file-name order.
        #[arg(long)]
        views: PathBuf,

        /// Output .pmem file.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Find the best-matching snapshot and heading for one view.
    Test {
        /// Trained .pmem file.
        #[arg(short, long)]
        memory: PathBuf,

        /// View to query.
        #[arg(long)]
        view: PathBuf,

        /// Write snapshots, RIDF matrices, and decisions to this directory.
        #[arg(long)]
        dump_dir: Option<PathBuf>,
    },

    /// Locate a position relative to a recorded route.
    Route {
        /// Recorded route file.
        #[arg(short, long)]
        route: PathBuf,

        /// X position in metres.
        #[arg(short, long, allow_negative_numbers = true)]
        x: f32,

        /// Y position in metres.
        #[arg(short, long, allow_negative_numbers = true)]
        y: f32,
    },

    /// Print the size and snapshot dimensions of a .pmem file.
    Info {
        /// Trained .pmem file.
        #[arg(short, long)]
        memory: PathBuf,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   visual-homing completions bash > ~/.local/share/bash-completion/completions/visual-homing
    ///   visual-homing completions zsh > ~/.zfunc/_visual-homing
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "visual-homing", &mut std::io::stdout());
        return Ok(());
    }

    let config = HomingConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Train { views, out } => {
            print_json(&commands::train(&config, &views, &out)?)?;
        }

        Commands::Test {
            memory,
            view,
            dump_dir,
        } => {
            print_json(&commands::test(&config, &memory, &view, dump_dir.as_deref())?)?;
        }

        Commands::Route { route, x, y } => {
            print_json(&commands::route(&config, &route, x, y)?)?;
        }

        Commands::Info { memory } => {
            print_json(&commands::info(&config, &memory)?)?;
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}
