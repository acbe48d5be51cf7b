//! Global render configuration attached to a timeline.

use serde::{Deserialize, Serialize};

use reelforge_common::error::{ReelforgeError, ReelforgeResult};

/// Output frame aspect ratio. Only the two production formats are
/// representable; anything else is rejected at deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 16:9 widescreen.
    #[serde(rename = "16:9")]
    Landscape,
    /// 9:16 vertical (social media).
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    /// Output resolution derived deterministically from the aspect ratio.
    pub fn resolution(self) -> (u32, u32) {
        match self {
            AspectRatio::Landscape => (1920, 1080),
            AspectRatio::Portrait => (1080, 1920),
        }
    }

    /// Resolution in the canonical `WIDTHxHEIGHT` document form.
    pub fn resolution_string(self) -> String {
        let (w, h) = self.resolution();
        format!("{w}x{h}")
    }

    /// Ceiling on scene count for this format, if any. Vertical renders
    /// are capped to keep per-scene screen time watchable.
    pub fn max_scenes(self) -> Option<usize> {
        match self {
            AspectRatio::Landscape => None,
            AspectRatio::Portrait => Some(18),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

impl std::str::FromStr for AspectRatio {
    type Err = ReelforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "16:9" => Ok(AspectRatio::Landscape),
            "9:16" => Ok(AspectRatio::Portrait),
            other => Err(ReelforgeError::timeline(format!(
                "aspect_ratio must be '16:9' or '9:16', got '{other}'"
            ))),
        }
    }
}

/// Vertical anchor for burned-in captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionPosition {
    Lower,
    Center,
    Top,
}

impl CaptionPosition {
    /// ASS `\an`-style numpad alignment code.
    pub fn ass_alignment(self) -> u8 {
        match self {
            CaptionPosition::Lower => 2,
            CaptionPosition::Center => 5,
            CaptionPosition::Top => 8,
        }
    }
}

/// Burn-in caption styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionStyle {
    /// Font family name as known to the subtitle renderer.
    pub font: String,

    /// Font size in output pixels. Legacy documents carry point-like
    /// values; see `reelforge_render_engine::captions` for normalization.
    pub font_size: u32,

    /// Extra spacing between wrapped lines, in pixels.
    pub line_spacing: u32,

    /// Margin from the bottom edge, in pixels.
    pub bottom_margin: u32,

    /// Vertical anchor.
    pub position: CaptionPosition,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font: "Arial".to_string(),
            font_size: 48,
            line_spacing: 6,
            bottom_margin: 140,
            position: CaptionPosition::Lower,
        }
    }
}

/// Sidechain ducking parameters for background music under narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ducking {
    pub enabled: bool,

    /// Compressor threshold in dB.
    pub threshold_db: f64,

    /// Compression ratio.
    pub ratio: f64,

    /// Attack time in milliseconds.
    pub attack_ms: u32,

    /// Release time in milliseconds.
    pub release_ms: u32,
}

impl Default for Ducking {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_db: -28.0,
            ratio: 8.0,
            attack_ms: 15,
            release_ms: 250,
        }
    }
}

/// Background music track reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Music {
    /// Path to the music file.
    pub path: String,

    /// Gain applied to the music bed, in dB.
    #[serde(default = "default_music_volume_db")]
    pub volume_db: f64,

    /// Optional sidechain ducking under the voiceover.
    #[serde(default)]
    pub ducking: Option<Ducking>,
}

fn default_music_volume_db() -> f64 {
    -18.0
}

/// Narration track reference with loudness-normalization targets
/// (EBU R128 loudnorm parameters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voiceover {
    /// Path to the narration audio file.
    pub path: String,

    /// Whether to loudness-normalize the narration.
    #[serde(default = "default_true")]
    pub loudnorm: bool,

    /// Integrated loudness target (LUFS).
    #[serde(default = "default_target_i")]
    pub target_i: f64,

    /// True peak ceiling (dBTP).
    #[serde(default = "default_true_peak")]
    pub true_peak: f64,

    /// Loudness range target (LU).
    #[serde(default = "default_lra")]
    pub lra: f64,
}

impl Voiceover {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            loudnorm: true,
            target_i: default_target_i(),
            true_peak: default_true_peak(),
            lra: default_lra(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_target_i() -> f64 {
    -16.0
}

fn default_true_peak() -> f64 {
    -1.5
}

fn default_lra() -> f64 {
    11.0
}

/// Global render configuration for one timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Owning project identifier.
    pub project_id: String,

    /// Human-readable title.
    pub title: String,

    /// Frame aspect ratio.
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: AspectRatio,

    /// Output resolution (`WIDTHxHEIGHT`), derived from the aspect ratio.
    #[serde(default = "default_resolution")]
    pub resolution: String,

    /// Output frame rate.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Mean per-scene duration, recorded by the builder for display only.
    /// Never authoritative; per-scene durations are.
    #[serde(default)]
    pub scene_duration: Option<f64>,

    /// Burn captions into the output pixels.
    #[serde(default = "default_true")]
    pub burn_captions: bool,

    /// Include the narration track in the final mix.
    #[serde(default = "default_true")]
    pub include_voiceover: bool,

    /// Include the music bed in the final mix.
    #[serde(default = "default_true")]
    pub include_music: bool,

    /// Apply Ken-Burns motion to still images.
    #[serde(default = "default_true")]
    pub enable_motion: bool,

    /// Blend adjacent scenes instead of hard cuts.
    #[serde(default)]
    pub crossfade: bool,

    /// Requested crossfade duration in seconds.
    #[serde(default = "default_crossfade_duration")]
    pub crossfade_duration: f64,

    /// Per-boundary transition overrides (boundary i is between scenes
    /// i and i+1). Unknown names fall back to a plain fade at render time.
    #[serde(default)]
    pub transition_types: Vec<String>,

    /// Narration pace used for per-scene duration estimation.
    #[serde(default = "default_narration_wpm")]
    pub narration_wpm: f64,

    /// Floor for estimated scene durations, in seconds.
    #[serde(default = "default_narration_min_sec")]
    pub narration_min_sec: f64,

    /// Ceiling for estimated scene durations, in seconds.
    #[serde(default = "default_narration_max_sec")]
    pub narration_max_sec: f64,

    /// Burn-in caption styling.
    #[serde(default)]
    pub caption_style: CaptionStyle,

    /// Background music track, if any.
    #[serde(default)]
    pub music: Option<Music>,

    /// Narration track, if any.
    #[serde(default)]
    pub voiceover: Option<Voiceover>,
}

fn default_aspect_ratio() -> AspectRatio {
    AspectRatio::Portrait
}

fn default_resolution() -> String {
    AspectRatio::Portrait.resolution_string()
}

fn default_fps() -> u32 {
    30
}

fn default_crossfade_duration() -> f64 {
    0.3
}

fn default_narration_wpm() -> f64 {
    160.0
}

fn default_narration_min_sec() -> f64 {
    1.5
}

fn default_narration_max_sec() -> f64 {
    12.0
}

impl Meta {
    /// Create a meta block with defaults for the given identity and format.
    pub fn new(
        project_id: impl Into<String>,
        title: impl Into<String>,
        aspect_ratio: AspectRatio,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            title: title.into(),
            aspect_ratio,
            resolution: aspect_ratio.resolution_string(),
            fps: default_fps(),
            scene_duration: None,
            burn_captions: true,
            include_voiceover: true,
            include_music: true,
            enable_motion: true,
            crossfade: false,
            crossfade_duration: default_crossfade_duration(),
            transition_types: Vec::new(),
            narration_wpm: default_narration_wpm(),
            narration_min_sec: default_narration_min_sec(),
            narration_max_sec: default_narration_max_sec(),
            caption_style: CaptionStyle::default(),
            music: None,
            voiceover: None,
        }
    }

    /// Parse the `WIDTHxHEIGHT` resolution string.
    pub fn parse_resolution(&self) -> ReelforgeResult<(u32, u32)> {
        parse_resolution(&self.resolution)
    }
}

/// Parse a `WIDTHxHEIGHT` resolution string.
pub fn parse_resolution(resolution: &str) -> ReelforgeResult<(u32, u32)> {
    let (w, h) = resolution
        .to_ascii_lowercase()
        .split_once('x')
        .map(|(w, h)| (w.to_string(), h.to_string()))
        .ok_or_else(|| {
            ReelforgeError::timeline(format!(
                "resolution must be formatted like 1080x1920, got '{resolution}'"
            ))
        })?;
    let width = w.trim().parse::<u32>().map_err(|_| {
        ReelforgeError::timeline(format!("invalid resolution width '{w}' in '{resolution}'"))
    })?;
    let height = h.trim().parse::<u32>().map_err(|_| {
        ReelforgeError::timeline(format!("invalid resolution height '{h}' in '{resolution}'"))
    })?;
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_rejects_unknown_values() {
        let err = serde_json::from_str::<AspectRatio>("\"4:3\"");
        assert!(err.is_err());
        assert_eq!(
            serde_json::from_str::<AspectRatio>("\"16:9\"").unwrap(),
            AspectRatio::Landscape
        );
    }

    #[test]
    fn caption_position_rejects_unknown_values() {
        assert!(serde_json::from_str::<CaptionPosition>("\"middle\"").is_err());
        assert_eq!(
            serde_json::from_str::<CaptionPosition>("\"center\"").unwrap(),
            CaptionPosition::Center
        );
    }

    #[test]
    fn resolution_follows_aspect_ratio() {
        assert_eq!(AspectRatio::Landscape.resolution(), (1920, 1080));
        assert_eq!(AspectRatio::Portrait.resolution_string(), "1080x1920");
    }

    #[test]
    fn portrait_caps_scene_count() {
        assert_eq!(AspectRatio::Portrait.max_scenes(), Some(18));
        assert_eq!(AspectRatio::Landscape.max_scenes(), None);
    }

    #[test]
    fn parse_resolution_accepts_canonical_form() {
        assert_eq!(parse_resolution("1080x1920").unwrap(), (1080, 1920));
        assert!(parse_resolution("1080*1920").is_err());
        assert!(parse_resolution("widextall").is_err());
    }

    #[test]
    fn meta_defaults_match_document_contract() {
        let meta = Meta::new("p1", "Title", AspectRatio::Portrait);
        assert_eq!(meta.resolution, "1080x1920");
        assert_eq!(meta.fps, 30);
        assert_eq!(meta.narration_wpm, 160.0);
        assert_eq!(meta.narration_min_sec, 1.5);
        assert_eq!(meta.narration_max_sec, 12.0);
        assert!(meta.burn_captions);
        assert!(!meta.crossfade);
    }

    #[test]
    fn ducking_defaults() {
        let d = Ducking::default();
        assert!(d.enabled);
        assert_eq!(d.threshold_db, -28.0);
        assert_eq!(d.ratio, 8.0);
    }
}
