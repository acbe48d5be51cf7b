//! Render a timeline document to video.

use std::path::PathBuf;
use std::time::Duration;

use reelforge_common::config::AppConfig;
use reelforge_render_engine::{render_timeline, RenderJob, RenderProgress, RenderStage};

#[allow(clippy::too_many_arguments)]
pub async fn run(
    path: PathBuf,
    output: Option<PathBuf>,
    max_width: Option<u32>,
    timeout_secs: Option<f64>,
    unsafe_transitions: bool,
    log: Option<PathBuf>,
    report: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = AppConfig::load();

    let output = output.unwrap_or_else(|| {
        path.parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join("final_video.mp4")
    });

    let timeout = match timeout_secs.or(config.render.command_timeout_secs) {
        Some(secs) if secs > 0.0 => Some(Duration::from_secs_f64(secs)),
        _ => None,
    };

    let mut job = RenderJob::new(&path, &output);
    job.max_width = max_width.unwrap_or(config.render.max_width);
    job.command_timeout = timeout;
    job.safe_mode = if unsafe_transitions {
        false
    } else {
        config.render.safe_mode
    };
    job.log_path = log;
    job.report_path = report;

    let progress = |update: &RenderProgress| match update.stage {
        RenderStage::RenderingScenes => {
            if let Some(idx) = update.scene_index {
                println!("[{}/{}] rendering scene", idx + 1, update.scene_count);
            }
        }
        RenderStage::Done | RenderStage::Failed => {}
        stage => println!("-> {}", stage.as_str()),
    };

    let outcome = render_timeline(&job, None, Some(&progress)).await?;

    println!("Render complete: {}", outcome.output_path.display());
    println!("  Scene cache hits: {}", outcome.cache_hits);
    println!("  Encoder invocations: {}", outcome.commands_run);
    println!("  Report: {}", outcome.report_path.display());
    Ok(())
}
