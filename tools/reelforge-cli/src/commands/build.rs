//! Build a timeline document from a project directory.
//!
//! Expects the asset layout the studio produces:
//!   <project>/assets/images/   s01.png, s02.png, ... (or video clips)
//!   <project>/assets/audio/    voiceover.mp3
//!   <project>/assets/music/    bed.mp3

use std::path::{Path, PathBuf};

use reelforge_render_engine::builder::{build_timeline, write_timeline, BuildInputs, BuildOptions};
use reelforge_render_engine::probe::MediaProbe;
use reelforge_timeline_model::AspectRatio;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mov", "webm", "mkv"];
const AUDIO_EXTENSIONS: [&str; 2] = ["mp3", "wav"];

pub struct BuildArgs {
    pub path: PathBuf,
    pub output: Option<PathBuf>,
    pub title: Option<String>,
    pub aspect_ratio: String,
    pub fps: u32,
    pub wpm: f64,
    pub min_scene_secs: f64,
    pub max_scene_secs: f64,
    pub voiceover: Option<PathBuf>,
    pub music: Option<PathBuf>,
    pub excerpts: Option<PathBuf>,
    pub captions: Option<PathBuf>,
    pub no_voiceover: bool,
    pub no_motion: bool,
    pub crossfade: bool,
    pub no_burn_captions: bool,
}

pub fn run(args: BuildArgs) -> anyhow::Result<()> {
    let project_dir = &args.path;
    if !project_dir.is_dir() {
        anyhow::bail!("Project directory not found: {}", project_dir.display());
    }
    let project_id = project_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("project")
        .to_string();

    let aspect_ratio: AspectRatio = args
        .aspect_ratio
        .parse()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let mut inputs = BuildInputs::new(
        &project_id,
        args.title.unwrap_or_else(|| project_id.replace('_', " ")),
    );
    inputs.media = scan_media(project_dir);
    inputs.voiceover = args
        .voiceover
        .or_else(|| first_audio(&project_dir.join("assets/audio")));
    inputs.music = args
        .music
        .or_else(|| first_audio(&project_dir.join("assets/music")));
    if let Some(path) = &args.excerpts {
        inputs.excerpts = read_lines(path)?;
    }
    if let Some(path) = &args.captions {
        inputs.captions = read_lines(path)?;
    }

    let include_music = inputs.music.is_some();
    let options = BuildOptions {
        aspect_ratio,
        fps: args.fps,
        burn_captions: !args.no_burn_captions,
        include_voiceover: !args.no_voiceover,
        include_music,
        enable_motion: !args.no_motion,
        crossfade: args.crossfade,
        narration_wpm: args.wpm,
        narration_min_sec: args.min_scene_secs,
        narration_max_sec: args.max_scene_secs,
        ..Default::default()
    };

    let timeline = build_timeline(&inputs, &options, &MediaProbe)?;
    let output = args
        .output
        .unwrap_or_else(|| project_dir.join("timeline.json"));
    write_timeline(&timeline, &output)?;

    println!("Timeline written: {}", output.display());
    println!("  Scenes: {}", timeline.scenes.len());
    println!("  Total duration: {:.1}s", timeline.total_duration());
    println!("  Resolution: {}", timeline.meta.resolution);
    Ok(())
}

/// Collect scene media from the project's image and video directories,
/// ordered by the scene number embedded in the filename (`s01`, `s02`,
/// ...); unnumbered files sort after numbered ones, by name.
fn scan_media(project_dir: &Path) -> Vec<PathBuf> {
    let mut media: Vec<PathBuf> = Vec::new();
    media.extend(files_with_extensions(
        &project_dir.join("assets/images"),
        &IMAGE_EXTENSIONS,
    ));
    media.extend(files_with_extensions(
        &project_dir.join("assets/videos"),
        &VIDEO_EXTENSIONS,
    ));
    media.sort_by_key(|path| media_sort_key(path));
    media
}

fn media_sort_key(path: &Path) -> (u8, u64, String) {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_lowercase();
    match scene_number_from_name(&name) {
        Some(number) => (0, number, name),
        None => (1, u64::MAX, name),
    }
}

/// First number following an `s` in the filename, e.g. `s07_castle.png`.
fn scene_number_from_name(name: &str) -> Option<u64> {
    let bytes = name.as_bytes();
    for (idx, b) in bytes.iter().enumerate() {
        if *b == b's' {
            let digits: String = name[idx + 1..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if !digits.is_empty() {
                return digits.parse().ok();
            }
        }
    }
    None
}

fn files_with_extensions(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| extensions.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

fn first_audio(dir: &Path) -> Option<PathBuf> {
    files_with_extensions(dir, &AUDIO_EXTENSIONS).into_iter().next()
}

fn read_lines(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
    Ok(content.lines().map(|l| l.trim().to_string()).collect())
}
