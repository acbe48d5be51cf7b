//! Timeline and scene types: the persisted contract between the builder
//! and the render orchestrator.

use std::path::Path;

use serde::{Deserialize, Serialize};

use reelforge_common::error::{ReelforgeError, ReelforgeResult};

use crate::meta::Meta;

/// Ken-Burns pan/zoom specification. Zoom factors are absolute scale
/// multipliers; pan anchors are normalized `[0.0, 1.0]` image fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Motion {
    pub zoom_start: f64,
    pub zoom_end: f64,
    pub x_start: f64,
    pub x_end: f64,
    pub y_start: f64,
    pub y_end: f64,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            zoom_start: 1.03,
            zoom_end: 1.10,
            x_start: 0.5,
            x_end: 0.5,
            y_start: 0.5,
            y_end: 0.5,
        }
    }
}

impl Motion {
    /// Subtle zoom-in preset used for even-indexed scenes.
    pub fn zoom_in() -> Self {
        Self {
            zoom_start: 1.03,
            zoom_end: 1.10,
            x_start: 0.48,
            x_end: 0.52,
            y_start: 0.5,
            y_end: 0.5,
        }
    }

    /// Subtle zoom-out preset used for odd-indexed scenes.
    pub fn zoom_out() -> Self {
        Self {
            zoom_start: 1.10,
            zoom_end: 1.03,
            x_start: 0.52,
            x_end: 0.48,
            y_start: 0.5,
            y_end: 0.5,
        }
    }
}

/// One timed visual beat: a still image or short clip shown for a span
/// of the output video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Stable ordinal-derived identifier (`s01`, `s02`, ...). Used for
    /// intermediate clip naming during render.
    pub id: String,

    /// Path to the source still image or short video clip. The scene
    /// references but does not own the file.
    pub image_path: String,

    /// Start offset from the beginning of the video, in seconds.
    pub start: f64,

    /// Presentation duration in seconds.
    pub duration: f64,

    /// Optional Ken-Burns motion.
    #[serde(default)]
    pub motion: Option<Motion>,

    /// Caption text, already wrapped. `None` or empty means no cue.
    #[serde(default)]
    pub caption: Option<String>,
}

impl Scene {
    /// End offset in seconds. Computed, never stored.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// The root artifact for one render job: global configuration plus an
/// ordered scene sequence (index order = presentation order).
///
/// Builder-produced timelines are contiguous and non-overlapping
/// (`scenes[i+1].start == scenes[i].end`); the schema itself does not
/// enforce that, only the builder's construction does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub meta: Meta,
    pub scenes: Vec<Scene>,
}

impl Timeline {
    /// Total duration in seconds: the latest scene end, or 0.0 when empty.
    pub fn total_duration(&self) -> f64 {
        self.scenes
            .iter()
            .map(Scene::end)
            .fold(0.0, |acc, end| acc.max(end))
    }

    /// Parse a timeline from its canonical JSON document form.
    pub fn from_json_str(content: &str) -> ReelforgeResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| ReelforgeError::timeline(format!("invalid timeline document: {e}")))
    }

    /// Serialize to the canonical pretty-printed JSON document form.
    pub fn to_json_pretty(&self) -> ReelforgeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a timeline document from disk.
    pub fn load(path: &Path) -> ReelforgeResult<Self> {
        if !path.exists() {
            return Err(ReelforgeError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Write the timeline document to disk, creating parent directories.
    pub fn save(&self, path: &Path) -> ReelforgeResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::AspectRatio;

    fn scene(id: &str, start: f64, duration: f64) -> Scene {
        Scene {
            id: id.to_string(),
            image_path: format!("assets/images/{id}.png"),
            start,
            duration,
            motion: None,
            caption: None,
        }
    }

    #[test]
    fn scene_end_is_start_plus_duration() {
        assert_eq!(scene("s01", 1.5, 2.0).end(), 3.5);
    }

    #[test]
    fn total_duration_is_max_scene_end() {
        let timeline = Timeline {
            meta: Meta::new("p1", "T", AspectRatio::Landscape),
            scenes: vec![scene("s01", 0.0, 1.5), scene("s02", 1.5, 2.0)],
        };
        assert_eq!(timeline.total_duration(), 3.5);
    }

    #[test]
    fn total_duration_of_empty_timeline_is_zero() {
        let timeline = Timeline {
            meta: Meta::new("p1", "T", AspectRatio::Landscape),
            scenes: vec![],
        };
        assert_eq!(timeline.total_duration(), 0.0);
    }

    #[test]
    fn document_round_trips_losslessly() {
        let mut meta = Meta::new("doc-42", "Round Trip", AspectRatio::Portrait);
        meta.crossfade = true;
        meta.transition_types = vec!["wipeleft".to_string()];
        meta.voiceover = Some(crate::meta::Voiceover::new("assets/audio/vo.mp3"));
        let timeline = Timeline {
            meta,
            scenes: vec![
                Scene {
                    motion: Some(Motion::zoom_in()),
                    caption: Some("First".to_string()),
                    ..scene("s01", 0.0, 2.25)
                },
                scene("s02", 2.25, 3.0),
            ],
        };

        let json = timeline.to_json_pretty().unwrap();
        let parsed = Timeline::from_json_str(&json).unwrap();
        assert_eq!(parsed, timeline);
    }

    #[test]
    fn document_with_bad_position_is_rejected() {
        let json = r#"{
            "meta": {
                "project_id": "p",
                "title": "t",
                "caption_style": {"position": "sideways"}
            },
            "scenes": []
        }"#;
        assert!(Timeline::from_json_str(json).is_err());
    }

    #[test]
    fn minimal_document_fills_defaults() {
        let json = r#"{"meta": {"project_id": "p", "title": "t"}, "scenes": []}"#;
        let timeline = Timeline::from_json_str(json).unwrap();
        assert_eq!(timeline.meta.aspect_ratio, AspectRatio::Portrait);
        assert_eq!(timeline.meta.fps, 30);
        assert!(timeline.meta.music.is_none());
    }
}
