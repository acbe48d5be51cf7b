//! Check encoder availability and configuration.

use reelforge_common::config::AppConfig;
use reelforge_render_engine::probe::{ffmpeg_version, resolve_ffmpeg, resolve_ffprobe};

pub fn run() -> anyhow::Result<()> {
    println!("Reelforge System Check");
    println!("{}", "=".repeat(50));

    match resolve_ffmpeg() {
        Ok(path) => {
            println!("[OK] ffmpeg: {}", path.display());
            println!("     {}", ffmpeg_version());
        }
        Err(e) => println!("[FAIL] ffmpeg: {e}"),
    }

    match resolve_ffprobe() {
        Ok(path) => println!("[OK] ffprobe: {}", path.display()),
        Err(e) => println!("[FAIL] ffprobe: {e}"),
    }

    let config = AppConfig::load();
    println!();
    println!("Configuration:");
    println!("  Projects dir: {}", config.projects_dir.display());
    println!("  Default fps: {}", config.render.fps);
    println!("  Max width: {}", config.render.max_width);
    println!(
        "  Command timeout: {}",
        config
            .render
            .command_timeout_secs
            .map(|s| format!("{s}s"))
            .unwrap_or_else(|| "none".to_string())
    );
    println!("  Safe mode: {}", config.render.safe_mode);

    let encoder_ok = resolve_ffmpeg().is_ok() && resolve_ffprobe().is_ok();
    println!();
    if encoder_ok {
        println!("All required binaries are available. Reelforge is ready.");
    } else {
        println!("Required binaries are missing. See above for fixes.");
    }

    Ok(())
}
