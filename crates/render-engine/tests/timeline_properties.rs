use std::path::{Path, PathBuf};

use proptest::prelude::*;

use reelforge_common::error::ReelforgeResult;
use reelforge_render_engine::builder::{
    build_timeline, compute_scene_durations, fit_durations_to_voiceover, BuildInputs, BuildOptions,
};
use reelforge_render_engine::captions::build_srt;
use reelforge_render_engine::probe::DurationProbe;
use reelforge_render_engine::render::{normalize_scene_duration, safe_crossfade_duration};

struct FixedProbe(f64);

impl DurationProbe for FixedProbe {
    fn duration_secs(&self, _path: &Path) -> ReelforgeResult<f64> {
        Ok(self.0)
    }
}

fn inputs_with_excerpts(word_counts: &[usize]) -> BuildInputs {
    let mut inputs = BuildInputs::new("prop", "Property");
    inputs.media = (1..=word_counts.len())
        .map(|i| PathBuf::from(format!("s{i:02}.png")))
        .collect();
    inputs.voiceover = Some(PathBuf::from("vo.mp3"));
    inputs.excerpts = word_counts
        .iter()
        .map(|n| vec!["word"; *n].join(" "))
        .collect();
    inputs
}

proptest! {
    // The fitted allocation must always sum to the measured narration
    // length, regardless of how skewed the word counts are: the floor
    // pass may drift, but the correction pass restores the total.
    #[test]
    fn fitted_durations_sum_to_voiceover(
        word_counts in prop::collection::vec(0usize..400, 1..18),
        voiceover in 2.0f64..600.0,
    ) {
        let excerpts: Vec<String> = word_counts
            .iter()
            .map(|n| vec!["word"; *n].join(" "))
            .collect();
        let raw = compute_scene_durations(&excerpts, 160.0, 1.5, 12.0);
        let fitted = fit_durations_to_voiceover(&raw, voiceover, 1.5);
        let sum: f64 = fitted.iter().sum();
        prop_assert!((sum - voiceover).abs() < 1e-6, "sum {sum} != {voiceover}");
    }

    #[test]
    fn raw_estimates_stay_within_clamp(
        word_counts in prop::collection::vec(0usize..2000, 1..18),
    ) {
        let excerpts: Vec<String> = word_counts
            .iter()
            .map(|n| vec!["word"; *n].join(" "))
            .collect();
        for duration in compute_scene_durations(&excerpts, 160.0, 1.5, 12.0) {
            prop_assert!((1.5..=12.0).contains(&duration));
        }
    }

    #[test]
    fn built_scenes_are_contiguous_and_ordered(
        word_counts in prop::collection::vec(1usize..120, 2..12),
        voiceover in 5.0f64..300.0,
    ) {
        let timeline = build_timeline(
            &inputs_with_excerpts(&word_counts),
            &BuildOptions::default(),
            &FixedProbe(voiceover),
        ).unwrap();

        prop_assert_eq!(timeline.scenes[0].start, 0.0);
        for pair in timeline.scenes.windows(2) {
            // Persisted values are rounded to the millisecond.
            prop_assert!((pair[1].start - pair[0].end()).abs() < 0.002);
            prop_assert!(pair[1].duration > 0.0);
        }
    }

    #[test]
    fn crossfade_never_exceeds_shortest_scene(
        durations in prop::collection::vec(0.1f64..20.0, 2..10),
        requested in 0.0f64..5.0,
        fps in 24u32..61,
    ) {
        let effective = safe_crossfade_duration(&durations, requested, fps);
        let shortest = durations.iter().copied().fold(f64::INFINITY, f64::min);
        prop_assert!(effective >= 0.0);
        prop_assert!(effective <= requested);
        prop_assert!(effective <= (shortest - 1.0 / fps as f64).max(0.0) + 1e-12);
    }

    #[test]
    fn normalized_durations_are_at_least_one_frame(
        duration in 0.0001f64..100.0,
        fps in 1u32..121,
    ) {
        let normalized = normalize_scene_duration(duration, fps, "s01").unwrap();
        prop_assert!(normalized >= 1.0 / fps as f64);
        prop_assert!(normalized >= duration || normalized == 1.0 / fps as f64);
    }
}

#[test]
fn caption_cues_map_one_to_one_onto_captioned_scenes() {
    let mut inputs = inputs_with_excerpts(&[10, 10, 10, 10]);
    inputs.captions = vec![
        "First cue".to_string(),
        String::new(),
        "Third cue".to_string(),
        "   ".to_string(),
    ];
    let timeline =
        build_timeline(&inputs, &BuildOptions::default(), &FixedProbe(20.0)).unwrap();

    let srt = build_srt(&timeline);
    let cue_count = srt
        .lines()
        .filter(|line| line.contains(" --> "))
        .count();
    assert_eq!(cue_count, 2);
    assert!(srt.contains("First cue"));
    assert!(srt.contains("Third cue"));
    // Cue timing matches the scene bounds exactly.
    let second_scene_end = timeline.scenes[2].end();
    let expected_end_ms = (second_scene_end * 1000.0).round() as u64;
    let expected = format!(
        "{:02}:{:02}:{:02},{:03}",
        expected_end_ms / 3_600_000,
        (expected_end_ms % 3_600_000) / 60_000,
        (expected_end_ms % 60_000) / 1000,
        expected_end_ms % 1000
    );
    assert!(srt.contains(&expected), "missing cue end {expected} in\n{srt}");
}

#[test]
fn rebuilding_from_identical_inputs_is_stable() {
    let inputs = inputs_with_excerpts(&[8, 22, 3, 50, 17]);
    let probe = FixedProbe(42.0);
    let options = BuildOptions::default();
    let first = build_timeline(&inputs, &options, &probe).unwrap();
    let second = build_timeline(&inputs, &options, &probe).unwrap();
    assert_eq!(
        first.to_json_pretty().unwrap(),
        second.to_json_pretty().unwrap()
    );
}
