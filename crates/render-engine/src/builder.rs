//! Timeline construction: narration-proportional duration allocation.
//!
//! Building is a full rebuild from an immutable input snapshot, never an
//! incremental patch, so repeated syncs with identical inputs yield
//! identical timelines.

use std::path::{Path, PathBuf};

use reelforge_common::error::{ReelforgeError, ReelforgeResult};
use reelforge_timeline_model::{
    AspectRatio, CaptionStyle, Ducking, Meta, Motion, Music, Scene, Timeline, Voiceover,
};

use crate::probe::DurationProbe;

/// Flat per-scene duration used when no voiceover drives the timing.
const DEFAULT_FLAT_SCENE_SECS: f64 = 3.0;

/// Configuration bundle mirroring `Meta`'s tunables. Strongly typed so
/// a misspelled override is a compile error rather than a silently
/// ignored map entry.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub aspect_ratio: AspectRatio,
    pub fps: u32,
    pub burn_captions: bool,
    pub caption_style: CaptionStyle,
    pub include_voiceover: bool,
    pub include_music: bool,
    pub enable_motion: bool,
    pub crossfade: bool,
    pub crossfade_duration: f64,
    pub transition_types: Vec<String>,
    pub music_volume_db: f64,
    pub narration_wpm: f64,
    pub narration_min_sec: f64,
    pub narration_max_sec: f64,

    /// Per-scene duration when voiceover timing is disabled.
    pub flat_scene_secs: f64,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::Portrait,
            fps: 30,
            burn_captions: true,
            caption_style: CaptionStyle::default(),
            include_voiceover: true,
            include_music: true,
            enable_motion: true,
            crossfade: false,
            crossfade_duration: 0.3,
            transition_types: Vec::new(),
            music_volume_db: -18.0,
            narration_wpm: 160.0,
            narration_min_sec: 1.5,
            narration_max_sec: 12.0,
            flat_scene_secs: DEFAULT_FLAT_SCENE_SECS,
        }
    }
}

/// Immutable snapshot of the caller's media set for one build. The core
/// never reaches back into caller-owned mutable state.
#[derive(Debug, Clone)]
pub struct BuildInputs {
    pub project_id: String,
    pub title: String,

    /// Ordered scene media (still images or short clips). Presentation
    /// order is list order.
    pub media: Vec<PathBuf>,

    /// Narration audio file, required when voiceover is enabled.
    pub voiceover: Option<PathBuf>,

    /// Background music file.
    pub music: Option<PathBuf>,

    /// Per-scene narration excerpts used for duration estimation. May be
    /// shorter than `media`; missing entries count as empty.
    pub excerpts: Vec<String>,

    /// Per-scene caption strings, already wrapped. Empty means no cue.
    pub captions: Vec<String>,

    /// Explicit per-scene duration targets (user-edited estimates). When
    /// present they override the computed allocation entirely.
    pub duration_overrides: Option<Vec<f64>>,
}

impl BuildInputs {
    pub fn new(project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            title: title.into(),
            media: Vec::new(),
            voiceover: None,
            music: None,
            excerpts: Vec::new(),
            captions: Vec::new(),
            duration_overrides: None,
        }
    }
}

/// Estimate raw per-scene durations from narration excerpt word counts.
/// `words / (wpm/60)`, clamped to `[min_sec, max_sec]`; an excerpt with
/// zero words gets `min_sec`.
pub fn compute_scene_durations(
    excerpts: &[String],
    wpm: f64,
    min_sec: f64,
    max_sec: f64,
) -> Vec<f64> {
    let words_per_sec = wpm.max(1.0) / 60.0;
    excerpts
        .iter()
        .map(|excerpt| {
            let words = excerpt.split_whitespace().count();
            if words == 0 {
                min_sec
            } else {
                (words as f64 / words_per_sec).clamp(min_sec, max_sec)
            }
        })
        .collect()
}

/// Rescale estimated durations so their sum matches the measured
/// voiceover length. Two passes: a floored proportional scale, then one
/// corrective rescale to counteract the drift the `min_sec` floor
/// introduces. The correction is an approximation, not an exact solver;
/// when many scenes sit on the clamp the sum may still deviate slightly.
pub fn fit_durations_to_voiceover(
    durations: &[f64],
    voiceover_duration: f64,
    min_sec: f64,
) -> Vec<f64> {
    let sum: f64 = durations.iter().sum();
    if voiceover_duration <= 0.0 || sum <= 0.0 {
        return durations.to_vec();
    }

    let scale = voiceover_duration / sum;
    let mut fitted: Vec<f64> = durations.iter().map(|d| (d * scale).max(min_sec)).collect();

    let fitted_sum: f64 = fitted.iter().sum();
    if fitted_sum > 0.0 {
        let correction = voiceover_duration / fitted_sum;
        for d in &mut fitted {
            *d *= correction;
        }
    }
    fitted
}

/// Build a complete, internally consistent timeline from the input
/// snapshot. See the module docs for the allocation algorithm.
pub fn build_timeline(
    inputs: &BuildInputs,
    options: &BuildOptions,
    probe: &dyn DurationProbe,
) -> ReelforgeResult<Timeline> {
    if inputs.media.is_empty() {
        return Err(ReelforgeError::build(
            "No scene media available to build a timeline.",
        ));
    }
    if options.include_voiceover && inputs.voiceover.is_none() {
        return Err(ReelforgeError::build(
            "Voiceover is enabled but no voiceover file was provided.",
        ));
    }

    // Vertical renders cap the scene count; truncate before timing so the
    // allocation sums stay consistent with what actually renders.
    let mut media: Vec<&PathBuf> = inputs.media.iter().collect();
    if let Some(cap) = options.aspect_ratio.max_scenes() {
        if media.len() > cap {
            tracing::info!(
                aspect_ratio = options.aspect_ratio.as_str(),
                total = media.len(),
                cap,
                "Truncating scene media to the per-format cap"
            );
            media.truncate(cap);
        }
    }
    let scene_count = media.len();

    let voiceover_duration = match (&inputs.voiceover, options.include_voiceover) {
        (Some(path), true) => match probe.duration_secs(path) {
            Ok(duration) => duration,
            Err(e) => {
                tracing::warn!(error = %e, "Voiceover probe failed; falling back to flat timing");
                0.0
            }
        },
        _ => 0.0,
    };

    let durations = allocate_durations(inputs, options, scene_count, voiceover_duration);

    let mut scenes = Vec::with_capacity(scene_count);
    let mut current_start = 0.0f64;
    for (idx, path) in media.iter().enumerate() {
        let caption = inputs
            .captions
            .get(idx)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        scenes.push(Scene {
            id: format!("s{:02}", idx + 1),
            image_path: path.display().to_string(),
            start: round3(current_start),
            duration: round3(durations[idx]),
            motion: options.enable_motion.then(|| scene_motion(idx)),
            caption,
        });
        current_start += durations[idx];
    }

    let mean_duration = durations.iter().sum::<f64>() / scene_count as f64;

    let mut meta = Meta::new(&inputs.project_id, &inputs.title, options.aspect_ratio);
    meta.fps = options.fps;
    meta.scene_duration = Some(round3(mean_duration));
    meta.burn_captions = options.burn_captions;
    meta.include_voiceover = options.include_voiceover;
    meta.include_music = options.include_music && inputs.music.is_some();
    meta.enable_motion = options.enable_motion;
    meta.crossfade = options.crossfade;
    meta.crossfade_duration = options.crossfade_duration;
    meta.transition_types = options.transition_types.clone();
    meta.narration_wpm = options.narration_wpm;
    meta.narration_min_sec = options.narration_min_sec;
    meta.narration_max_sec = options.narration_max_sec;
    meta.caption_style = options.caption_style.clone();
    meta.music = inputs.music.as_ref().map(|path| Music {
        path: path.display().to_string(),
        volume_db: options.music_volume_db,
        ducking: Some(Ducking::default()),
    });
    meta.voiceover = inputs
        .voiceover
        .as_ref()
        .map(|path| Voiceover::new(path.display().to_string()));

    Ok(Timeline { meta, scenes })
}

/// Write the timeline to its project-scoped document path.
pub fn write_timeline(timeline: &Timeline, path: &Path) -> ReelforgeResult<()> {
    timeline.save(path)?;
    tracing::info!(path = %path.display(), scenes = timeline.scenes.len(), "Timeline written");
    Ok(())
}

fn allocate_durations(
    inputs: &BuildInputs,
    options: &BuildOptions,
    scene_count: usize,
    voiceover_duration: f64,
) -> Vec<f64> {
    // Manual overrides win outright; voiceover sync still forces the sum
    // to the measured length while preserving relative weighting.
    if let Some(overrides) = &inputs.duration_overrides {
        let mut durations: Vec<f64> = (0..scene_count)
            .map(|i| overrides.get(i).copied().unwrap_or(options.flat_scene_secs))
            .collect();
        if voiceover_duration > 0.0 {
            let sum: f64 = durations.iter().sum();
            if sum > 0.0 {
                let scale = voiceover_duration / sum;
                for d in &mut durations {
                    *d *= scale;
                }
            }
        }
        return durations;
    }

    if !options.include_voiceover || voiceover_duration <= 0.0 {
        let flat = if options.flat_scene_secs > 0.0 {
            options.flat_scene_secs
        } else {
            DEFAULT_FLAT_SCENE_SECS
        };
        return vec![flat; scene_count];
    }

    let mut excerpts: Vec<String> = inputs.excerpts.iter().take(scene_count).cloned().collect();
    excerpts.resize(scene_count, String::new());

    let raw = compute_scene_durations(
        &excerpts,
        options.narration_wpm,
        options.narration_min_sec,
        options.narration_max_sec,
    );
    fit_durations_to_voiceover(&raw, voiceover_duration, options.narration_min_sec)
}

/// Alternating Ken-Burns presets indexed by scene parity. Zoom deltas are
/// kept in the 1-3% band; anything larger reads as jitter on stills.
fn scene_motion(index: usize) -> Motion {
    if index % 2 == 0 {
        Motion::zoom_in()
    } else {
        Motion::zoom_out()
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(f64);

    impl DurationProbe for FixedProbe {
        fn duration_secs(&self, _path: &Path) -> ReelforgeResult<f64> {
            Ok(self.0)
        }
    }

    struct FailingProbe;

    impl DurationProbe for FailingProbe {
        fn duration_secs(&self, _path: &Path) -> ReelforgeResult<f64> {
            Err(ReelforgeError::probe("boom"))
        }
    }

    fn media(count: usize) -> Vec<PathBuf> {
        (1..=count)
            .map(|i| PathBuf::from(format!("assets/images/s{i:02}.png")))
            .collect()
    }

    fn excerpt(words: usize) -> String {
        vec!["word"; words].join(" ")
    }

    #[test]
    fn empty_media_is_a_precondition_error() {
        let inputs = BuildInputs::new("p", "t");
        let err = build_timeline(&inputs, &BuildOptions::default(), &FixedProbe(0.0)).unwrap_err();
        assert!(matches!(err, ReelforgeError::Build { .. }));
    }

    #[test]
    fn voiceover_enabled_without_file_is_a_precondition_error() {
        let mut inputs = BuildInputs::new("p", "t");
        inputs.media = media(2);
        let err = build_timeline(&inputs, &BuildOptions::default(), &FixedProbe(0.0)).unwrap_err();
        assert!(matches!(err, ReelforgeError::Build { .. }));
    }

    #[test]
    fn flat_allocation_without_voiceover() {
        let mut inputs = BuildInputs::new("p", "t");
        inputs.media = media(3);
        let options = BuildOptions {
            include_voiceover: false,
            ..Default::default()
        };
        let timeline = build_timeline(&inputs, &options, &FixedProbe(0.0)).unwrap();
        for scene in &timeline.scenes {
            assert_eq!(scene.duration, 3.0);
        }
        assert_eq!(timeline.total_duration(), 9.0);
    }

    #[test]
    fn worked_example_rescales_to_measured_voiceover() {
        // Raw estimates 2/4/6s at 150wpm; 9s voiceover scales by 0.75.
        let mut inputs = BuildInputs::new("p", "t");
        inputs.media = media(3);
        inputs.voiceover = Some(PathBuf::from("vo.mp3"));
        inputs.excerpts = vec![excerpt(5), excerpt(10), excerpt(15)];
        let options = BuildOptions {
            narration_wpm: 150.0,
            narration_min_sec: 1.5,
            narration_max_sec: 12.0,
            ..Default::default()
        };

        let timeline = build_timeline(&inputs, &options, &FixedProbe(9.0)).unwrap();
        let durations: Vec<f64> = timeline.scenes.iter().map(|s| s.duration).collect();
        assert_eq!(durations, vec![1.5, 3.0, 4.5]);
        assert!((timeline.total_duration() - 9.0).abs() < 1e-6);
    }

    #[test]
    fn duration_sum_matches_voiceover_despite_word_skew() {
        let mut inputs = BuildInputs::new("p", "t");
        inputs.media = media(4);
        inputs.voiceover = Some(PathBuf::from("vo.mp3"));
        inputs.excerpts = vec![excerpt(1), excerpt(120), excerpt(7), String::new()];
        let options = BuildOptions::default();

        let timeline = build_timeline(&inputs, &options, &FixedProbe(33.5)).unwrap();
        let sum: f64 = timeline.scenes.iter().map(|s| s.duration).sum();
        // round3 on persisted values allows a few ms of drift.
        assert!((sum - 33.5).abs() < 0.01, "sum was {sum}");
    }

    #[test]
    fn scenes_are_contiguous() {
        let mut inputs = BuildInputs::new("p", "t");
        inputs.media = media(5);
        inputs.voiceover = Some(PathBuf::from("vo.mp3"));
        inputs.excerpts = (1..=5).map(|i| excerpt(i * 4)).collect();

        let timeline =
            build_timeline(&inputs, &BuildOptions::default(), &FixedProbe(21.0)).unwrap();
        for pair in timeline.scenes.windows(2) {
            assert!((pair[1].start - pair[0].end()).abs() < 0.002);
        }
        assert_eq!(timeline.scenes[0].start, 0.0);
    }

    #[test]
    fn building_twice_is_idempotent() {
        let mut inputs = BuildInputs::new("p", "t");
        inputs.media = media(4);
        inputs.voiceover = Some(PathBuf::from("vo.mp3"));
        inputs.excerpts = vec![excerpt(10), excerpt(3), excerpt(40), excerpt(8)];

        let a = build_timeline(&inputs, &BuildOptions::default(), &FixedProbe(17.0)).unwrap();
        let b = build_timeline(&inputs, &BuildOptions::default(), &FixedProbe(17.0)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn portrait_media_is_truncated_to_cap() {
        let mut inputs = BuildInputs::new("p", "t");
        inputs.media = media(25);
        let options = BuildOptions {
            include_voiceover: false,
            ..Default::default()
        };
        let timeline = build_timeline(&inputs, &options, &FixedProbe(0.0)).unwrap();
        assert_eq!(timeline.scenes.len(), 18);
    }

    #[test]
    fn landscape_media_is_not_truncated() {
        let mut inputs = BuildInputs::new("p", "t");
        inputs.media = media(25);
        let options = BuildOptions {
            aspect_ratio: AspectRatio::Landscape,
            include_voiceover: false,
            ..Default::default()
        };
        let timeline = build_timeline(&inputs, &options, &FixedProbe(0.0)).unwrap();
        assert_eq!(timeline.scenes.len(), 25);
    }

    #[test]
    fn motion_alternates_by_parity() {
        let mut inputs = BuildInputs::new("p", "t");
        inputs.media = media(3);
        let options = BuildOptions {
            include_voiceover: false,
            ..Default::default()
        };
        let timeline = build_timeline(&inputs, &options, &FixedProbe(0.0)).unwrap();
        let zooms: Vec<f64> = timeline
            .scenes
            .iter()
            .map(|s| s.motion.as_ref().unwrap().zoom_start)
            .collect();
        assert_eq!(zooms, vec![1.03, 1.10, 1.03]);
    }

    #[test]
    fn motion_disabled_leaves_scenes_static() {
        let mut inputs = BuildInputs::new("p", "t");
        inputs.media = media(2);
        let options = BuildOptions {
            include_voiceover: false,
            enable_motion: false,
            ..Default::default()
        };
        let timeline = build_timeline(&inputs, &options, &FixedProbe(0.0)).unwrap();
        assert!(timeline.scenes.iter().all(|s| s.motion.is_none()));
    }

    #[test]
    fn empty_captions_become_none() {
        let mut inputs = BuildInputs::new("p", "t");
        inputs.media = media(3);
        inputs.captions = vec!["First".to_string(), "  ".to_string(), String::new()];
        let options = BuildOptions {
            include_voiceover: false,
            ..Default::default()
        };
        let timeline = build_timeline(&inputs, &options, &FixedProbe(0.0)).unwrap();
        assert_eq!(timeline.scenes[0].caption.as_deref(), Some("First"));
        assert!(timeline.scenes[1].caption.is_none());
        assert!(timeline.scenes[2].caption.is_none());
    }

    #[test]
    fn manual_overrides_rescale_to_voiceover() {
        let mut inputs = BuildInputs::new("p", "t");
        inputs.media = media(2);
        inputs.voiceover = Some(PathBuf::from("vo.mp3"));
        inputs.duration_overrides = Some(vec![4.0, 2.0]);

        let timeline =
            build_timeline(&inputs, &BuildOptions::default(), &FixedProbe(12.0)).unwrap();
        let durations: Vec<f64> = timeline.scenes.iter().map(|s| s.duration).collect();
        assert_eq!(durations, vec![8.0, 4.0]);
    }

    #[test]
    fn probe_failure_degrades_to_flat_timing() {
        let mut inputs = BuildInputs::new("p", "t");
        inputs.media = media(2);
        inputs.voiceover = Some(PathBuf::from("vo.mp3"));
        let timeline = build_timeline(&inputs, &BuildOptions::default(), &FailingProbe).unwrap();
        assert!(timeline.scenes.iter().all(|s| s.duration == 3.0));
    }

    #[test]
    fn clamping_floors_and_ceils_raw_estimates() {
        let raw = compute_scene_durations(
            &[excerpt(1), excerpt(1000), String::new()],
            160.0,
            1.5,
            12.0,
        );
        assert_eq!(raw[0], 1.5);
        assert_eq!(raw[1], 12.0);
        assert_eq!(raw[2], 1.5);
    }

    #[test]
    fn mean_scene_duration_is_recorded() {
        let mut inputs = BuildInputs::new("p", "t");
        inputs.media = media(2);
        let options = BuildOptions {
            include_voiceover: false,
            ..Default::default()
        };
        let timeline = build_timeline(&inputs, &options, &FixedProbe(0.0)).unwrap();
        assert_eq!(timeline.meta.scene_duration, Some(3.0));
    }
}
