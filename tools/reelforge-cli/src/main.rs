//! Reelforge CLI — Command-line interface for timeline building and rendering.
//!
//! Usage:
//!   reelforge build <PROJECT_DIR>    Build a timeline from project media
//!   reelforge render <TIMELINE>      Render a timeline to video
//!   reelforge captions <TIMELINE>    Generate SRT/ASS captions
//!   reelforge info <TIMELINE>        Show timeline information
//!   reelforge check                  Check encoder availability

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "reelforge",
    about = "Documentary video assembly: timelines, captions, and ffmpeg renders",
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
    /// Build a timeline document from a project directory
    Build {
        /// Path to the project directory
        path: PathBuf,

        /// Output timeline path (default: <PROJECT>/timeline.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Video title
        #[arg(short, long)]
        title: Option<String>,

        /// Aspect ratio: 16:9 or 9:16
        #[arg(long, default_value = "9:16")]
        aspect_ratio: String,

        /// Output frame rate
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Narration pace in words per minute
        #[arg(long, default_value = "160")]
        wpm: f64,

        /// Minimum scene duration (seconds)
        #[arg(long, default_value = "1.5")]
        min_scene_secs: f64,

        /// Maximum scene duration (seconds)
        #[arg(long, default_value = "12.0")]
        max_scene_secs: f64,

        /// Voiceover audio file (default: <PROJECT>/assets/audio/voiceover.mp3)
        #[arg(long)]
        voiceover: Option<PathBuf>,

        /// Background music file
        #[arg(long)]
        music: Option<PathBuf>,

        /// Narration excerpts file, one line per scene
        #[arg(long)]
        excerpts: Option<PathBuf>,

        /// Caption text file, one line per scene
        #[arg(long)]
        captions: Option<PathBuf>,

        /// Disable voiceover-driven timing
        #[arg(long)]
        no_voiceover: bool,

        /// Disable Ken-Burns motion
        #[arg(long)]
        no_motion: bool,

        /// Enable crossfade transitions between scenes
        #[arg(long)]
        crossfade: bool,

        /// Do not burn captions into the video
        #[arg(long)]
        no_burn_captions: bool,
    },

    /// Render a timeline document to a video file
    Render {
        /// Path to the timeline document
        path: PathBuf,

        /// Output video path (default: final_video.mp4 next to the timeline)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum output width in pixels
        #[arg(long)]
        max_width: Option<u32>,

        /// Per-command timeout in seconds (0 disables)
        #[arg(long)]
        timeout_secs: Option<f64>,

        /// Allow the crossfade graph instead of always concatenating
        #[arg(long)]
        unsafe_transitions: bool,

        /// Render log path
        #[arg(long)]
        log: Option<PathBuf>,

        /// Diagnostic report path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Generate a caption file from a timeline document
    Captions {
        /// Path to the timeline document
        path: PathBuf,

        /// Caption format: srt or ass
        #[arg(long, default_value = "srt")]
        format: String,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show timeline information
    Info {
        /// Path to the timeline document
        path: PathBuf,
    },

    /// Check encoder availability and configuration
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    reelforge_common::logging::init_logging(&reelforge_common::config::LoggingConfig {
        level: log_level.to_string(),
        json: false,
        file: None,
    });

    match cli.command {
        Commands::Build {
            path,
            output,
            title,
            aspect_ratio,
            fps,
            wpm,
            min_scene_secs,
            max_scene_secs,
            voiceover,
            music,
            excerpts,
            captions,
            no_voiceover,
            no_motion,
            crossfade,
            no_burn_captions,
        } => commands::build::run(commands::build::BuildArgs {
            path,
            output,
            title,
            aspect_ratio,
            fps,
            wpm,
            min_scene_secs,
            max_scene_secs,
            voiceover,
            music,
            excerpts,
            captions,
            no_voiceover,
            no_motion,
            crossfade,
            no_burn_captions,
        }),
        Commands::Render {
            path,
            output,
            max_width,
            timeout_secs,
            unsafe_transitions,
            log,
            report,
        } => {
            commands::render::run(
                path,
                output,
                max_width,
                timeout_secs,
                unsafe_transitions,
                log,
                report,
            )
            .await
        }
        Commands::Captions {
            path,
            format,
            output,
        } => commands::captions::run(path, format, output),
        Commands::Info { path } => commands::info::run(path),
        Commands::Check => commands::check::run(),
    }
}
