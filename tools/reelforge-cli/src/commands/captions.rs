//! Generate a caption file from a timeline document.

use std::path::PathBuf;

use reelforge_render_engine::captions::{build_ass, build_srt};
use reelforge_timeline_model::Timeline;

pub fn run(path: PathBuf, format: String, output: Option<PathBuf>) -> anyhow::Result<()> {
    let timeline = Timeline::load(&path)?;

    let content = match format.to_lowercase().as_str() {
        "srt" => build_srt(&timeline),
        "ass" => build_ass(&timeline),
        other => anyhow::bail!("Unknown caption format '{other}' (expected srt or ass)"),
    };

    match output {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&out, content)?;
            println!("Captions written: {}", out.display());
        }
        None => print!("{content}"),
    }
    Ok(())
}
