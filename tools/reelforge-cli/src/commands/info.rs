//! Show timeline information.

use std::path::{Path, PathBuf};

use reelforge_timeline_model::Timeline;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let timeline = Timeline::load(&path)?;
    let meta = &timeline.meta;

    println!("Timeline: {}", meta.title);
    println!("  Project: {}", meta.project_id);
    println!(
        "  Format: {} ({}) @ {}fps",
        meta.resolution,
        meta.aspect_ratio.as_str(),
        meta.fps
    );
    println!("  Total duration: {:.1}s", timeline.total_duration());
    println!();

    println!("Scenes: {}", timeline.scenes.len());
    for scene in &timeline.scenes {
        let exists = if Path::new(&scene.image_path).exists() {
            ""
        } else {
            " [missing]"
        };
        println!(
            "  {}  {:>6.2}s - {:>6.2}s  {}{}{}",
            scene.id,
            scene.start,
            scene.end(),
            scene.image_path,
            if scene.motion.is_some() { "  (motion)" } else { "" },
            exists
        );
        if let Some(caption) = &scene.caption {
            println!("        \"{}\"", caption.replace('\n', " / "));
        }
    }
    println!();

    println!("Audio:");
    match &meta.voiceover {
        Some(vo) if meta.include_voiceover => {
            println!(
                "  Voiceover: {} (loudnorm: {})",
                vo.path,
                if vo.loudnorm { "on" } else { "off" }
            );
        }
        _ => println!("  Voiceover: disabled"),
    }
    match &meta.music {
        Some(music) if meta.include_music => {
            let ducking = music
                .ducking
                .as_ref()
                .map(|d| d.enabled)
                .unwrap_or(false);
            println!(
                "  Music: {} ({}dB, ducking: {})",
                music.path,
                music.volume_db,
                if ducking { "on" } else { "off" }
            );
        }
        _ => println!("  Music: disabled"),
    }
    println!();

    println!("Captions:");
    println!(
        "  Burn-in: {}  Style: {} {}px, {} margin, {:?}",
        if meta.burn_captions { "on" } else { "off" },
        meta.caption_style.font,
        meta.caption_style.font_size,
        meta.caption_style.bottom_margin,
        meta.caption_style.position
    );
    println!(
        "  Transitions: crossfade {} ({}s)",
        if meta.crossfade { "on" } else { "off" },
        meta.crossfade_duration
    );

    Ok(())
}
