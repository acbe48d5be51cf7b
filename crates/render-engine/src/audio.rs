//! Audio mix planning: loudness-normalized voiceover over looped,
//! ducked background music, expressed as ffmpeg input/filtergraph/map
//! argument fragments the mux stage splices into its command.

use reelforge_common::error::{ReelforgeError, ReelforgeResult};
use reelforge_timeline_model::Meta;

/// Argument fragments for one audio mix. Pure data so the plan can be
/// inspected and tested without spawning ffmpeg.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioMixPlan {
    /// `-i` (and `-stream_loop`) arguments, in input-index order.
    pub input_args: Vec<String>,
    /// The `-filter_complex` graph, `;`-joined.
    pub filter_complex: String,
    /// `-map` arguments selecting the `[aout]` output label.
    pub map_args: Vec<String>,
}

impl AudioMixPlan {
    /// Number of audio inputs the plan consumes.
    pub fn input_count(&self) -> usize {
        self.input_args.iter().filter(|a| *a == "-i").count()
    }
}

/// Build the audio mix plan for a timeline. Input indices are assigned
/// in declaration order: voiceover first when present, then music, so
/// the mux stage must splice `input_args` before any of its own inputs
/// shift the numbering.
///
/// `simplify` drops loudnorm and ducking while keeping the music volume
/// trim. It exists for the mux retry path, where an exotic ffmpeg build
/// may lack the sidechaincompress or loudnorm filters.
pub fn build_audio_mix_plan(
    meta: &Meta,
    total_duration: f64,
    simplify: bool,
) -> ReelforgeResult<AudioMixPlan> {
    let mut input_args: Vec<String> = Vec::new();
    let mut filters: Vec<String> = Vec::new();
    let mut next_index = 0usize;

    let voiceover = meta
        .voiceover
        .as_ref()
        .filter(|vo| meta.include_voiceover && !vo.path.is_empty());
    let music = meta
        .music
        .as_ref()
        .filter(|m| meta.include_music && !m.path.is_empty());

    let mut vo_label: Option<String> = None;
    if let Some(vo) = voiceover {
        input_args.extend(["-i".to_string(), vo.path.clone()]);
        let vo_input = format!("[{next_index}:a]");
        next_index += 1;
        if vo.loudnorm && !simplify {
            filters.push(format!(
                "{vo_input}loudnorm=I={}:TP={}:LRA={}[vo]",
                vo.target_i, vo.true_peak, vo.lra
            ));
        } else {
            filters.push(format!("{vo_input}anull[vo]"));
        }
        vo_label = Some("[vo]".to_string());
    }

    let mut music_label: Option<String> = None;
    if let Some(m) = music {
        // Loop the track so short beds cover the whole video; atrim cuts
        // the loop back to the exact output length.
        input_args.extend([
            "-stream_loop".to_string(),
            "-1".to_string(),
            "-i".to_string(),
            m.path.clone(),
        ]);
        let music_input = format!("[{next_index}:a]");
        filters.push(format!(
            "{music_input}atrim=0:{total_duration},asetpts=N/SR/TB,volume={}dB[music]",
            m.volume_db
        ));
        music_label = Some("[music]".to_string());
    }

    if let (Some(music_in), Some(vo)) = (&music_label, &vo_label) {
        let ducking = music.and_then(|m| m.ducking.as_ref());
        if let Some(d) = ducking.filter(|d| d.enabled && !simplify) {
            filters.push(format!(
                "{music_in}{vo}sidechaincompress=threshold={}dB:ratio={}:attack={}:release={}[ducked]",
                d.threshold_db, d.ratio, d.attack_ms, d.release_ms
            ));
            music_label = Some("[ducked]".to_string());
        }
    }

    match (&music_label, &vo_label) {
        (Some(music_in), Some(vo)) => {
            filters.push(format!("{music_in}{vo}amix=inputs=2:dropout_transition=2[aout]"));
        }
        (None, Some(vo)) => filters.push(format!("{vo}anull[aout]")),
        (Some(music_in), None) => filters.push(format!("{music_in}anull[aout]")),
        (None, None) => {
            return Err(ReelforgeError::audio("No audio sources provided for mixing."));
        }
    }

    Ok(AudioMixPlan {
        input_args,
        filter_complex: filters.join(";"),
        map_args: vec!["-map".to_string(), "[aout]".to_string()],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_timeline_model::{AspectRatio, Ducking, Meta, Music, Voiceover};

    fn meta_with(voiceover: bool, music: bool) -> Meta {
        let mut meta = Meta::new("p", "t", AspectRatio::Portrait);
        meta.include_voiceover = voiceover;
        meta.include_music = music;
        if voiceover {
            meta.voiceover = Some(Voiceover::new("vo.mp3"));
        }
        if music {
            meta.music = Some(Music {
                path: "bed.mp3".to_string(),
                volume_db: -18.0,
                ducking: Some(Ducking::default()),
            });
        }
        meta
    }

    #[test]
    fn full_mix_chains_loudnorm_ducking_and_amix() {
        let plan = build_audio_mix_plan(&meta_with(true, true), 30.0, false).unwrap();
        assert_eq!(plan.input_count(), 2);
        assert_eq!(
            plan.input_args,
            vec!["-i", "vo.mp3", "-stream_loop", "-1", "-i", "bed.mp3"]
        );
        assert_eq!(
            plan.filter_complex,
            "[0:a]loudnorm=I=-16:TP=-1.5:LRA=11[vo];\
             [1:a]atrim=0:30,asetpts=N/SR/TB,volume=-18dB[music];\
             [music][vo]sidechaincompress=threshold=-28dB:ratio=8:attack=15:release=250[ducked];\
             [ducked][vo]amix=inputs=2:dropout_transition=2[aout]"
        );
        assert_eq!(plan.map_args, vec!["-map", "[aout]"]);
    }

    #[test]
    fn voiceover_only_passes_through_anull() {
        let plan = build_audio_mix_plan(&meta_with(true, false), 12.0, false).unwrap();
        assert_eq!(plan.input_count(), 1);
        assert!(plan.filter_complex.ends_with("[vo]anull[aout]"));
        assert!(!plan.filter_complex.contains("amix"));
    }

    #[test]
    fn music_only_skips_ducking() {
        let plan = build_audio_mix_plan(&meta_with(false, true), 12.0, false).unwrap();
        assert_eq!(plan.input_count(), 1);
        assert!(plan.filter_complex.contains("volume=-18dB"));
        assert!(!plan.filter_complex.contains("sidechaincompress"));
        assert!(plan.filter_complex.ends_with("[music]anull[aout]"));
    }

    #[test]
    fn disabled_ducking_mixes_without_sidechain() {
        let mut meta = meta_with(true, true);
        meta.music.as_mut().unwrap().ducking.as_mut().unwrap().enabled = false;
        let plan = build_audio_mix_plan(&meta, 30.0, false).unwrap();
        assert!(!plan.filter_complex.contains("sidechaincompress"));
        assert!(plan
            .filter_complex
            .contains("[music][vo]amix=inputs=2:dropout_transition=2[aout]"));
    }

    #[test]
    fn no_sources_is_an_error() {
        let err = build_audio_mix_plan(&meta_with(false, false), 30.0, false).unwrap_err();
        assert!(matches!(err, ReelforgeError::Audio { .. }));
    }

    #[test]
    fn toggles_override_present_paths() {
        let mut meta = meta_with(true, true);
        meta.include_music = false;
        let plan = build_audio_mix_plan(&meta, 30.0, false).unwrap();
        assert_eq!(plan.input_count(), 1);
        assert!(!plan.filter_complex.contains("[music]"));
    }

    #[test]
    fn simplified_plan_drops_loudnorm_and_ducking() {
        let plan = build_audio_mix_plan(&meta_with(true, true), 30.0, true).unwrap();
        assert!(!plan.filter_complex.contains("loudnorm"));
        assert!(!plan.filter_complex.contains("sidechaincompress"));
        assert!(plan.filter_complex.contains("[0:a]anull[vo]"));
        assert!(plan.filter_complex.contains("volume=-18dB"));
        assert!(plan.filter_complex.contains("amix=inputs=2"));
    }
}
