//! Ad Studio CLI: create, inspect, preview, and export ad projects.
//!
//! Usage:
//!   adstudio init <TITLE>        Create a starter project
//!   adstudio validate <PATH>     Validate a project
//!   adstudio info <PATH>         Show project information
//!   adstudio preview <PATH>      Play the timeline in the terminal
//!   adstudio export <PATH>       Export the final mix to a video file
//!   adstudio check               Check encoder and font availability

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "adstudio",
    about = "Scene sequencer and composited export for short video ads",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new project with a three-scene template
    Init {
        /// Project title
        title: String,

        /// Output directory (defaults to the sanitized title)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Aspect ratio: 16:9 or 9:16
        #[arg(long, default_value = "16:9")]
        aspect: String,
    },

    /// Validate a project
    Validate {
        /// Path to the project directory or project.json
        path: PathBuf,
    },

    /// Show project information
    Info {
        /// Path to the project directory or project.json
        path: PathBuf,

        /// Print the resolved project as JSON
        #[arg(long)]
        json: bool,
    },

    /// Play the timeline, logging scene switches as they happen
    Preview {
        /// Path to the project directory or project.json
        path: PathBuf,

        /// Playback speed multiplier
        #[arg(long, default_value = "1.0")]
        speed: f64,

        /// Start position in seconds
        #[arg(long, default_value = "0.0")]
        start: f64,
    },

    /// Export the composited final mix
    Export {
        /// Path to the project directory or project.json
        path: PathBuf,

        /// Output directory (defaults to the configured exports directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Container preference, repeatable (mp4-h264, webm-vp9, webm-vp8, mp4-mpeg4)
        #[arg(long = "format")]
        formats: Vec<String>,

        /// Output frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Render as fast as possible instead of in real time
        #[arg(long)]
        offline: bool,

        /// Run the full pipeline into an in-memory sink without encoding
        #[arg(long)]
        dry_run: bool,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = adstudio_common::config::AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    adstudio_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Init {
            title,
            output,
            aspect,
        } => commands::init::run(title, output, aspect),
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Info { path, json } => commands::info::run(path, json),
        Commands::Preview { path, speed, start } => {
            commands::preview::run(&config, path, speed, start).await
        }
        Commands::Export {
            path,
            output,
            formats,
            fps,
            offline,
            dry_run,
        } => {
            commands::export::run(
                &config,
                commands::export::ExportArgs {
                    path,
                    output,
                    formats,
                    fps,
                    offline,
                    dry_run,
                },
            )
            .await
        }
        Commands::Check => commands::check::run(&config),
    }
}
