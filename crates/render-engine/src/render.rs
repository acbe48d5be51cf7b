//! Render orchestration: timeline document in, mp4 out.
//!
//! Four stages run in order: validate, render per-scene clips, stitch,
//! then mux audio and captions. Intermediate clips live in a scoped
//! temp directory; a diagnostic report is written next to the output on
//! success and on failure.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reelforge_common::error::{ReelforgeError, ReelforgeResult};
use reelforge_timeline_model::{Scene, Timeline};

use crate::assets::AssetStore;
use crate::audio::build_audio_mix_plan;
use crate::captions::{write_ass_file, write_srt_file};
use crate::probe::{ensure_encoder, DurationProbe, MediaProbe};
use crate::report::{timeline_content_hash, RenderReport, SceneCacheStats};
use crate::runner::{run_checked, run_logged};

const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mov", "webm", "mkv"];

const ALLOWED_XFADE_TRANSITIONS: [&str; 12] = [
    "fade",
    "fadeblack",
    "fadewhite",
    "wipeleft",
    "wiperight",
    "slideleft",
    "slideright",
    "smoothleft",
    "smoothright",
    "circleopen",
    "circleclose",
    "distance",
];

/// One render request. Paths not given are derived from `output_path`.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub timeline_path: PathBuf,
    pub output_path: PathBuf,
    pub log_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub command_timeout: Option<Duration>,

    /// Output is downscaled to this width when the timeline resolution
    /// exceeds it, preserving aspect and even dimensions.
    pub max_width: u32,

    /// Safe mode skips the crossfade graph and always concatenates.
    pub safe_mode: bool,
}

impl RenderJob {
    pub fn new(timeline_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            timeline_path: timeline_path.into(),
            output_path: output_path.into(),
            log_path: None,
            report_path: None,
            command_timeout: Some(Duration::from_secs(600)),
            max_width: 1280,
            safe_mode: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Validating,
    RenderingScenes,
    Concatenating,
    MuxingAudioAndCaptions,
    Done,
    Failed,
}

impl RenderStage {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderStage::Validating => "validating",
            RenderStage::RenderingScenes => "rendering_scenes",
            RenderStage::Concatenating => "concatenating",
            RenderStage::MuxingAudioAndCaptions => "muxing_audio_and_captions",
            RenderStage::Done => "done",
            RenderStage::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderProgress {
    pub stage: RenderStage,
    /// Index of the scene being rendered, when in the scene stage.
    pub scene_index: Option<usize>,
    pub scene_count: usize,
}

pub type ProgressFn = dyn Fn(&RenderProgress) + Send + Sync;

#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub output_path: PathBuf,
    pub report_path: PathBuf,
    pub cache_hits: usize,
    pub commands_run: usize,
}

/// Mutable state threaded through the stages so the diagnostic report
/// can be assembled even when a stage fails.
struct RenderContext {
    commands: Vec<Vec<String>>,
    cache_hits: usize,
    log_file: PathBuf,
    render_dir: PathBuf,
    timeout: Option<Duration>,
}

impl RenderContext {
    fn note(&mut self, cmd: &[String]) {
        self.commands.push(cmd.to_vec());
    }

    fn log_line(&self, message: &str) {
        if let Ok(mut content) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
        {
            use std::io::Write;
            let _ = writeln!(content, "{message}");
        }
    }
}

/// Render a timeline document to its final mp4.
///
/// The encoder check runs before any directory or log file is created,
/// so a missing ffmpeg leaves no half-built artifacts behind.
pub async fn render_timeline(
    job: &RenderJob,
    assets: Option<&dyn AssetStore>,
    progress: Option<&ProgressFn>,
) -> ReelforgeResult<RenderOutcome> {
    ensure_encoder()?;

    let content = std::fs::read_to_string(&job.timeline_path).map_err(|e| {
        ReelforgeError::render(format!(
            "cannot read timeline {}: {e}",
            job.timeline_path.display()
        ))
    })?;
    let timeline_hash = timeline_content_hash(&content);
    let mut timeline = Timeline::from_json_str(&content)?;

    if !timeline.meta.enable_motion {
        for scene in &mut timeline.scenes {
            scene.motion = None;
        }
    }
    if timeline.scenes.is_empty() {
        return Err(ReelforgeError::render("Timeline has no scenes to render."));
    }

    let output_path = job.output_path.clone();
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let stem = output_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string();
    let render_dir = output_path.with_file_name(format!("{stem}_render_logs"));
    std::fs::create_dir_all(&render_dir)?;
    let log_file = job
        .log_path
        .clone()
        .unwrap_or_else(|| render_dir.join("render.log"));
    let report_file = job
        .report_path
        .clone()
        .unwrap_or_else(|| output_path.with_file_name("render_report.json"));
    let cache_dir = output_path.with_file_name("scene_cache");
    let extension = output_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    let tmp_output = output_path.with_file_name(format!("{stem}_tmp.{extension}"));
    if tmp_output.exists() {
        std::fs::remove_file(&tmp_output)?;
    }

    let mut ctx = RenderContext {
        commands: Vec::new(),
        cache_hits: 0,
        log_file: log_file.clone(),
        render_dir,
        timeout: job.command_timeout,
    };

    let result = run_stages(job, &mut timeline, &cache_dir, &tmp_output, assets, progress, &mut ctx).await;

    let report = RenderReport::assemble(
        &timeline,
        &timeline_hash,
        result.as_ref().err().map(|e| e.to_string()).as_deref(),
        job.command_timeout.map(|t| t.as_secs_f64()),
        SceneCacheStats {
            directory: cache_dir.display().to_string(),
            hits: ctx.cache_hits,
            total_scenes: timeline.scenes.len(),
        },
        &ctx.commands,
        &tmp_output,
        &log_file,
        &ctx.render_dir,
        &report_file,
    );
    report.write_best_effort(&report_file);

    match result {
        Ok(()) => {
            notify(progress, RenderStage::Done, None, timeline.scenes.len());
            Ok(RenderOutcome {
                output_path,
                report_path: report_file,
                cache_hits: ctx.cache_hits,
                commands_run: ctx.commands.len(),
            })
        }
        Err(e) => {
            notify(progress, RenderStage::Failed, None, timeline.scenes.len());
            Err(e)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_stages(
    job: &RenderJob,
    timeline: &mut Timeline,
    cache_dir: &Path,
    tmp_output: &Path,
    assets: Option<&dyn AssetStore>,
    progress: Option<&ProgressFn>,
    ctx: &mut RenderContext,
) -> ReelforgeResult<()> {
    let scene_count = timeline.scenes.len();

    notify(progress, RenderStage::Validating, None, scene_count);
    validate_media(timeline, &job.timeline_path, assets)?;

    let tmp_dir = tempfile::Builder::new()
        .prefix("reelforge_render_")
        .tempdir()?;
    let scenes_dir = tmp_dir.path().join("scenes");
    std::fs::create_dir_all(&scenes_dir)?;

    let (res_w, res_h) = timeline.meta.parse_resolution()?;
    let (width, height) = apply_max_width(res_w, res_h, job.max_width);
    let fps = timeline.meta.fps;

    notify(progress, RenderStage::RenderingScenes, Some(0), scene_count);
    let mut scene_paths: Vec<PathBuf> = Vec::with_capacity(scene_count);
    let mut durations: Vec<f64> = Vec::with_capacity(scene_count);
    for (idx, scene) in timeline.scenes.iter().enumerate() {
        notify(progress, RenderStage::RenderingScenes, Some(idx), scene_count);
        let normalized = normalize_scene_duration(scene.duration, fps, &scene.id)?;
        let clip = scenes_dir.join(format!("{}.mp4", scene.id));
        if resolve_scene_clip(scene, normalized, &clip, fps, width, height, cache_dir, ctx).await? {
            ctx.cache_hits += 1;
        }
        scene_paths.push(clip);
        durations.push(normalized);
    }

    notify(progress, RenderStage::Concatenating, None, scene_count);
    let stitched = tmp_dir.path().join("stitched.mp4");
    stitch_scenes(timeline, job, &scene_paths, &durations, fps, &stitched, ctx).await?;

    notify(progress, RenderStage::MuxingAudioAndCaptions, None, scene_count);
    mux_output(timeline, job, &stitched, tmp_dir.path(), tmp_output, ctx).await?;

    if !tmp_output.exists() {
        return Err(ReelforgeError::render(format!(
            "Expected render output was not created: {}",
            tmp_output.display()
        )));
    }
    std::fs::rename(tmp_output, &job.output_path)?;

    // Catch a silently truncated mux: the video must cover the narration.
    if timeline.meta.include_voiceover {
        if let Some(vo) = &timeline.meta.voiceover {
            let probe = MediaProbe;
            let expected = probe.duration_secs(Path::new(&vo.path))?;
            let rendered = probe.duration_secs(&job.output_path)?;
            if rendered + 0.05 < expected {
                return Err(ReelforgeError::render(format!(
                    "Rendered video is shorter than the voiceover ({rendered:.3}s < {expected:.3}s)."
                )));
            }
        }
    }

    Ok(())
}

/// Confirm every referenced media file exists, pulling from the asset
/// store at most once when files are missing.
fn validate_media(
    timeline: &mut Timeline,
    timeline_path: &Path,
    assets: Option<&dyn AssetStore>,
) -> ReelforgeResult<()> {
    let missing: Vec<String> = timeline
        .scenes
        .iter()
        .filter(|s| !Path::new(&s.image_path).exists())
        .map(|s| s.image_path.clone())
        .collect();

    if !missing.is_empty() {
        if let Some(store) = assets {
            let project_dir = timeline_path.parent().unwrap_or(Path::new("."));
            tracing::info!(
                project_id = %timeline.meta.project_id,
                missing = missing.len(),
                "Scene media missing locally; pulling project assets"
            );
            let pulled = store.pull_assets(&timeline.meta.project_id, project_dir)?;
            tracing::info!(
                images = pulled.images,
                audio = pulled.audio,
                video = pulled.video,
                "Asset pull complete"
            );
        }
    }

    for scene in &mut timeline.scenes {
        let path = Path::new(&scene.image_path);
        if !path.exists() {
            return Err(ReelforgeError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        if let Ok(resolved) = std::fs::canonicalize(path) {
            scene.image_path = resolved.display().to_string();
        }
    }

    if timeline.meta.include_voiceover {
        let vo = timeline
            .meta
            .voiceover
            .as_ref()
            .filter(|v| !v.path.is_empty())
            .ok_or_else(|| {
                ReelforgeError::render("Voiceover is enabled but no voiceover path was provided.")
            })?;
        let path = Path::new(&vo.path);
        if !path.exists() {
            return Err(ReelforgeError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }
    if timeline.meta.include_music {
        if let Some(music) = timeline.meta.music.as_ref().filter(|m| !m.path.is_empty()) {
            let path = Path::new(&music.path);
            if !path.exists() {
                return Err(ReelforgeError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
        }
    }
    Ok(())
}

/// Produce the clip for one scene, consulting the content-keyed cache
/// first. Returns true on a cache hit.
#[allow(clippy::too_many_arguments)]
async fn resolve_scene_clip(
    scene: &Scene,
    duration: f64,
    clip_out: &Path,
    fps: u32,
    width: u32,
    height: u32,
    cache_dir: &Path,
    ctx: &mut RenderContext,
) -> ReelforgeResult<bool> {
    std::fs::create_dir_all(cache_dir)?;
    let cached = cache_dir.join(format!(
        "{}.mp4",
        scene_cache_key(scene, duration, fps, width, height)
    ));
    if cached.exists() {
        std::fs::copy(&cached, clip_out)?;
        ctx.log_line(&format!(
            "Using cached scene clip for {}: {}",
            scene.id,
            cached.display()
        ));
        tracing::debug!(scene = %scene.id, "Scene cache hit");
        return Ok(true);
    }

    render_scene(scene, duration, clip_out, fps, width, height, ctx).await?;
    let produced = std::fs::metadata(clip_out).map(|m| m.len()).unwrap_or(0);
    if produced == 0 {
        return Err(ReelforgeError::render(format!(
            "Scene render produced no output for scene '{}': {}",
            scene.id,
            clip_out.display()
        )));
    }
    std::fs::copy(clip_out, &cached)?;
    Ok(false)
}

async fn render_scene(
    scene: &Scene,
    duration: f64,
    clip_out: &Path,
    fps: u32,
    width: u32,
    height: u32,
    ctx: &mut RenderContext,
) -> ReelforgeResult<()> {
    let ffmpeg = crate::probe::resolve_ffmpeg()?;
    let ffmpeg = ffmpeg.display().to_string();

    if is_video_source(&scene.image_path) {
        let probe = MediaProbe;
        let source_duration = probe
            .duration_secs(Path::new(&scene.image_path))
            .unwrap_or(0.0)
            .max(0.0);
        let pad_seconds = (duration - source_duration).max(0.0);

        let mut vf_parts = vec![
            format!("scale={width}:{height}:force_original_aspect_ratio=decrease"),
            format!("pad={width}:{height}:(ow-iw)/2:(oh-ih)/2:color=black"),
            format!("fps={fps}"),
            "setpts=PTS-STARTPTS".to_string(),
        ];
        if pad_seconds > 0.01 {
            vf_parts.push(format!("tpad=stop_mode=clone:stop_duration={pad_seconds:.3}"));
        }
        vf_parts.push("format=yuv420p".to_string());
        let filter_chain = vf_parts.join(",");

        let cmd = strings([
            &ffmpeg, "-y", "-fflags", "+genpts",
            "-i", &scene.image_path,
            "-t", &format!("{duration:.6}"),
            "-vf", &filter_chain,
            "-an",
            "-c:v", "libx264", "-preset", "veryfast", "-crf", "24",
            "-pix_fmt", "yuv420p",
            &clip_out.display().to_string(),
        ]);
        ctx.note(&cmd);
        let outcome = run_logged(&cmd, Some(&ctx.log_file), ctx.timeout).await?;
        if outcome.ok {
            return Ok(());
        }

        // Retry tolerating stream damage; some generated clips carry
        // broken timestamps or partial moov atoms.
        let fallback = strings([
            &ffmpeg, "-y", "-fflags", "+genpts", "-err_detect", "ignore_err",
            "-i", &scene.image_path,
            "-an",
            "-vf", &filter_chain,
            "-t", &format!("{duration:.6}"),
            "-vsync", "cfr",
            "-c:v", "libx264", "-preset", "veryfast", "-crf", "24",
            "-pix_fmt", "yuv420p",
            &clip_out.display().to_string(),
        ]);
        ctx.note(&fallback);
        run_checked(&fallback, Some(&ctx.log_file), ctx.timeout).await?;
        return Ok(());
    }

    let filter_chain = zoompan_filter(scene, duration, fps, width, height);
    let cmd = strings([
        &ffmpeg, "-y", "-loop", "1",
        "-i", &scene.image_path,
        "-t", &format!("{duration:.6}"),
        "-vf", &filter_chain,
        "-r", &fps.to_string(),
        "-c:v", "libx264", "-preset", "veryfast", "-crf", "24",
        "-pix_fmt", "yuv420p",
        &clip_out.display().to_string(),
    ]);
    ctx.note(&cmd);
    let outcome = run_logged(&cmd, Some(&ctx.log_file), ctx.timeout).await?;
    if outcome.ok {
        return Ok(());
    }

    // Unusual image formats or sizes can break zoompan; a plain
    // scale/crop still yields a usable static clip.
    tracing::warn!(scene = %scene.id, "Zoompan render failed; retrying with static scale/crop");
    let simple_filter = format!(
        "scale={width}:{height}:force_original_aspect_ratio=increase,crop={width}:{height},format=yuv420p"
    );
    let fallback = strings([
        &ffmpeg, "-y", "-loop", "1",
        "-i", &scene.image_path,
        "-t", &format!("{duration:.6}"),
        "-vf", &simple_filter,
        "-r", &fps.to_string(),
        "-c:v", "libx264", "-preset", "veryfast", "-crf", "24",
        "-pix_fmt", "yuv420p",
        &clip_out.display().to_string(),
    ]);
    ctx.note(&fallback);
    run_checked(&fallback, Some(&ctx.log_file), ctx.timeout).await?;
    Ok(())
}

/// Stitch the per-scene clips into one video stream, crossfading when
/// enabled and safe, otherwise concatenating losslessly.
#[allow(clippy::too_many_arguments)]
async fn stitch_scenes(
    timeline: &Timeline,
    job: &RenderJob,
    scene_paths: &[PathBuf],
    durations: &[f64],
    fps: u32,
    stitched: &Path,
    ctx: &mut RenderContext,
) -> ReelforgeResult<()> {
    let wants_crossfade = timeline.meta.crossfade && scene_paths.len() > 1;

    if job.safe_mode && wants_crossfade {
        ctx.log_line("Safe mode enabled: skipping crossfade and using concat.");
    }

    if !job.safe_mode && wants_crossfade {
        let effective =
            safe_crossfade_duration(durations, timeline.meta.crossfade_duration, fps);
        if effective > 0.0 {
            match crossfade_scenes(
                scene_paths,
                durations,
                fps,
                effective,
                &timeline.meta.transition_types,
                stitched,
                ctx,
            )
            .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    ctx.log_line("Crossfade graph failed; falling back to concat.");
                    tracing::warn!(error = %e, "Crossfade failed; concatenating instead");
                }
            }
        } else {
            ctx.log_line(
                "Crossfade disabled because crossfade_duration is too large for one or more scene durations.",
            );
        }
    }

    concat_scenes(scene_paths, stitched, ctx).await
}

async fn concat_scenes(
    scene_paths: &[PathBuf],
    stitched: &Path,
    ctx: &mut RenderContext,
) -> ReelforgeResult<()> {
    let ffmpeg = crate::probe::resolve_ffmpeg()?.display().to_string();
    let concat_list = stitched.with_extension("txt");
    let lines: Vec<String> = scene_paths
        .iter()
        .map(|p| format!("file '{}'", p.display()))
        .collect();
    std::fs::write(&concat_list, lines.join("\n") + "\n")?;

    let cmd = strings([
        &ffmpeg, "-y", "-f", "concat", "-safe", "0",
        "-i", &concat_list.display().to_string(),
        "-c", "copy",
        &stitched.display().to_string(),
    ]);
    ctx.note(&cmd);
    let outcome = run_logged(&cmd, Some(&ctx.log_file), ctx.timeout).await?;
    if outcome.ok {
        return Ok(());
    }

    // Stream-copy concat fails when clip parameters differ; re-encode.
    ctx.log_line("Stream-copy concat failed; re-encoding.");
    let fallback = strings([
        &ffmpeg, "-y", "-f", "concat", "-safe", "0",
        "-i", &concat_list.display().to_string(),
        "-c:v", "libx264", "-preset", "veryfast", "-crf", "24",
        "-pix_fmt", "yuv420p",
        &stitched.display().to_string(),
    ]);
    ctx.note(&fallback);
    run_checked(&fallback, Some(&ctx.log_file), ctx.timeout).await?;
    Ok(())
}

async fn crossfade_scenes(
    scene_paths: &[PathBuf],
    durations: &[f64],
    fps: u32,
    crossfade_duration: f64,
    transition_types: &[String],
    stitched: &Path,
    ctx: &mut RenderContext,
) -> ReelforgeResult<()> {
    let ffmpeg = crate::probe::resolve_ffmpeg()?.display().to_string();

    let mut cmd: Vec<String> = vec![ffmpeg, "-y".to_string()];
    for path in scene_paths {
        cmd.push("-i".to_string());
        cmd.push(path.display().to_string());
    }

    let mut filters: Vec<String> = Vec::new();
    let mut current_label = "[0:v]".to_string();
    let mut offset = (durations[0] - crossfade_duration).max(0.0);
    for idx in 1..scene_paths.len() {
        let output_label = format!("[v{idx}]");
        let transition =
            normalize_xfade_transition(transition_types.get(idx - 1).map(String::as_str));
        filters.push(format!(
            "{current_label}[{idx}:v]xfade=transition={transition}:duration={crossfade_duration}:offset={offset}{output_label}"
        ));
        current_label = output_label;
        offset += (durations[idx] - crossfade_duration).max(0.0);
    }

    cmd.push("-filter_complex".to_string());
    cmd.push(filters.join(";"));
    cmd.push("-map".to_string());
    cmd.push(current_label);
    cmd.push("-r".to_string());
    cmd.push(fps.to_string());
    cmd.extend(strings([
        "-c:v", "libx264", "-preset", "veryfast", "-crf", "24", "-pix_fmt", "yuv420p",
    ]));
    cmd.push(stitched.display().to_string());

    ctx.note(&cmd);
    run_checked(&cmd, Some(&ctx.log_file), ctx.timeout).await?;
    Ok(())
}

/// Final stage: mix audio, burn captions, and mux into the container
/// with fast-start metadata.
async fn mux_output(
    timeline: &Timeline,
    job: &RenderJob,
    stitched: &Path,
    tmp_dir: &Path,
    tmp_output: &Path,
    ctx: &mut RenderContext,
) -> ReelforgeResult<()> {
    let ffmpeg = crate::probe::resolve_ffmpeg()?.display().to_string();
    let meta = &timeline.meta;

    let srt_path = job.output_path.with_file_name("captions.srt");
    let ass_path = job.output_path.with_file_name("captions.ass");
    write_srt_file(&srt_path, timeline)?;
    write_ass_file(&ass_path, timeline)?;

    let probe = MediaProbe;
    let voiceover_duration = match (&meta.voiceover, meta.include_voiceover) {
        (Some(vo), true) if !vo.path.is_empty() => {
            Some(probe.duration_secs(Path::new(&vo.path))?)
        }
        _ => None,
    };
    let audio_target = voiceover_duration.unwrap_or_else(|| timeline.total_duration());

    let include_audio = meta.include_voiceover || (meta.include_music && meta.music.is_some());
    if !include_audio {
        let mut cmd = strings([&ffmpeg, "-y", "-i", &stitched.display().to_string()]);
        if meta.burn_captions && ass_path.exists() {
            cmd.push("-vf".to_string());
            cmd.push(subtitle_filter(&ass_path));
        }
        cmd.extend(strings([
            "-c:v", "libx264", "-preset", "veryfast", "-crf", "24",
            "-movflags", "+faststart",
            &tmp_output.display().to_string(),
        ]));
        ctx.note(&cmd);
        run_checked(&cmd, Some(&ctx.log_file), ctx.timeout).await?;
        return Ok(());
    }

    let mixed_audio = tmp_dir.join("mixed.m4a");
    let build_mix_cmd = |simplify: bool| -> ReelforgeResult<Vec<String>> {
        let plan = build_audio_mix_plan(meta, audio_target, simplify)?;
        let mut cmd = vec![ffmpeg.clone(), "-y".to_string()];
        cmd.extend(plan.input_args);
        cmd.push("-filter_complex".to_string());
        cmd.push(plan.filter_complex);
        cmd.extend(plan.map_args);
        cmd.extend(strings([
            "-c:a", "aac", "-b:a", "192k", "-shortest",
            &mixed_audio.display().to_string(),
        ]));
        Ok(cmd)
    };

    let mix_cmd = build_mix_cmd(false)?;
    ctx.note(&mix_cmd);
    let mix_outcome = run_logged(&mix_cmd, Some(&ctx.log_file), ctx.timeout).await?;
    if !mix_outcome.ok {
        // Some ffmpeg builds lack loudnorm or sidechaincompress.
        tracing::warn!("Audio mix failed; retrying with a simplified graph");
        let retry_cmd = build_mix_cmd(true)?;
        ctx.note(&retry_cmd);
        run_checked(&retry_cmd, Some(&ctx.log_file), ctx.timeout).await?;
    }

    let mut cmd = strings([
        &ffmpeg, "-y",
        "-i", &stitched.display().to_string(),
        "-i", &mixed_audio.display().to_string(),
    ]);

    let stitched_duration = probe.duration_secs(stitched)?;
    let mut vf_filters: Vec<String> = Vec::new();
    if let Some(vo_duration) = voiceover_duration {
        // Clone-pad the last frame when narration runs past the video.
        if stitched_duration > 0.0 && vo_duration > stitched_duration {
            let pad = (vo_duration - stitched_duration).max(0.0);
            vf_filters.push(format!("tpad=stop_mode=clone:stop_duration={pad:.3}"));
        }
    }
    if meta.burn_captions && ass_path.exists() {
        vf_filters.push(subtitle_filter(&ass_path));
    }
    if !vf_filters.is_empty() {
        cmd.push("-vf".to_string());
        cmd.push(vf_filters.join(","));
    }
    cmd.extend(strings([
        "-map", "0:v:0", "-map", "1:a:0",
        "-c:v", "libx264", "-preset", "veryfast", "-crf", "24",
        "-c:a", "aac",
        "-movflags", "+faststart",
    ]));
    match voiceover_duration {
        Some(vo_duration) => {
            cmd.push("-t".to_string());
            cmd.push(format!("{vo_duration:.3}"));
        }
        None => cmd.push("-shortest".to_string()),
    }
    cmd.push(tmp_output.display().to_string());

    ctx.note(&cmd);
    run_checked(&cmd, Some(&ctx.log_file), ctx.timeout).await?;
    Ok(())
}

fn notify(
    progress: Option<&ProgressFn>,
    stage: RenderStage,
    scene_index: Option<usize>,
    scene_count: usize,
) {
    if let Some(callback) = progress {
        callback(&RenderProgress {
            stage,
            scene_index,
            scene_count,
        });
    }
}

/// Floor a scene duration at one frame period; reject non-finite and
/// non-positive values outright.
pub fn normalize_scene_duration(duration: f64, fps: u32, scene_id: &str) -> ReelforgeResult<f64> {
    if !duration.is_finite() {
        return Err(ReelforgeError::render(format!(
            "Scene '{scene_id}' has non-finite duration {duration}."
        )));
    }
    if duration <= 0.0 {
        return Err(ReelforgeError::render(format!(
            "Scene '{scene_id}' has invalid duration {duration}s (must be > 0)."
        )));
    }
    let min_duration = 1.0 / fps.max(1) as f64;
    Ok(duration.max(min_duration))
}

/// Largest usable crossfade: the requested duration clamped so even the
/// shortest scene keeps at least one un-faded frame. Degenerate inputs
/// (single scene, non-finite or non-positive request) yield 0.0.
pub fn safe_crossfade_duration(durations: &[f64], requested: f64, fps: u32) -> f64 {
    if durations.len() < 2 {
        return 0.0;
    }
    if !requested.is_finite() || requested <= 0.0 {
        return 0.0;
    }
    let min_frame = 1.0 / fps.max(1) as f64;
    let shortest = durations.iter().copied().fold(f64::INFINITY, f64::min);
    let max_crossfade = (shortest - min_frame).max(0.0);
    requested.min(max_crossfade)
}

/// Fall back to `fade` for transition names xfade does not support.
pub fn normalize_xfade_transition(name: Option<&str>) -> String {
    let allowed: HashSet<&str> = ALLOWED_XFADE_TRANSITIONS.into_iter().collect();
    let transition = name.unwrap_or("fade").trim().to_lowercase();
    if allowed.contains(transition.as_str()) {
        transition
    } else {
        "fade".to_string()
    }
}

/// Ken-Burns filter chain for a still image: cover-scale, then zoompan
/// with zoom and pan anchors interpolated linearly over the scene's
/// frame count.
pub fn zoompan_filter(scene: &Scene, duration: f64, fps: u32, width: u32, height: u32) -> String {
    let Some(motion) = &scene.motion else {
        return format!(
            "scale={width}:{height}:force_original_aspect_ratio=increase,crop={width}:{height},format=yuv420p"
        );
    };

    let frames = ((duration * fps as f64).ceil() as u64).max(1);
    let zoom_expr = format!(
        "{} + ({} - {})*on/{frames}",
        motion.zoom_start, motion.zoom_end, motion.zoom_start
    );
    let x_expr = format!(
        "({} + ({} - {})*on/{frames})*(iw - iw/zoom)",
        motion.x_start, motion.x_end, motion.x_start
    );
    let y_expr = format!(
        "({} + ({} - {})*on/{frames})*(ih - ih/zoom)",
        motion.y_start, motion.y_end, motion.y_start
    );

    format!(
        "scale={width}:{height}:force_original_aspect_ratio=increase,\
         zoompan=z='{zoom_expr}':x='{x_expr}':y='{y_expr}':d={frames}:s={width}x{height}:fps={fps},\
         format=yuv420p"
    )
}

/// Escape a subtitle path for use inside a filtergraph argument.
pub fn subtitle_filter(subtitle_path: &Path) -> String {
    let path_str = subtitle_path.display().to_string();
    let escaped = path_str.replace('\\', "\\\\").replace(':', "\\:");
    format!("subtitles={escaped}:charenc=UTF-8")
}

/// Downscale to `max_width` preserving aspect, keeping height even.
pub fn apply_max_width(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width {
        return (width, height);
    }
    let scale = max_width as f64 / width as f64;
    let mut scaled_height = (height as f64 * scale) as u32;
    if scaled_height % 2 == 1 {
        scaled_height += 1;
    }
    (max_width, scaled_height.max(2))
}

fn is_video_source(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Content key for the scene cache: hex SHA-256 over source identity
/// (path, size, mtime) plus every render parameter that changes the
/// clip's pixels. Keys must stay stable across engine builds so the
/// on-disk cache survives upgrades.
fn scene_cache_key(scene: &Scene, duration: f64, fps: u32, width: u32, height: u32) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    let source = Path::new(&scene.image_path);
    let resolved = std::fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf());
    hasher.update(resolved.display().to_string().as_bytes());
    if let Ok(meta) = std::fs::metadata(&resolved) {
        hasher.update(meta.len().to_le_bytes());
        if let Ok(mtime) = meta.modified() {
            if let Ok(since_epoch) = mtime.duration_since(std::time::UNIX_EPOCH) {
                hasher.update(since_epoch.as_nanos().to_le_bytes());
            }
        }
    }
    hasher.update(duration.to_bits().to_le_bytes());
    hasher.update(fps.to_le_bytes());
    hasher.update(width.to_le_bytes());
    hasher.update(height.to_le_bytes());
    if let Some(motion) = &scene.motion {
        hasher.update(serde_json::to_string(motion).unwrap_or_default().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

fn strings<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
