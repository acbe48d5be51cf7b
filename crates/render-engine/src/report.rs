//! Diagnostic render report.
//!
//! Every render writes `render_report.json` next to the output, on
//! success and on failure, so a bug report can be triaged from the
//! report alone without asking the user to re-run anything.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use reelforge_timeline_model::Timeline;

use crate::probe::ffmpeg_version;

const LOG_TAIL_LINES: usize = 50;

/// Existence and size info for one referenced file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStat {
    pub path: Option<String>,
    pub exists: bool,
    pub size_bytes: u64,
}

impl FileStat {
    pub fn for_path(path: Option<&str>) -> Self {
        let Some(path) = path.filter(|p| !p.is_empty()) else {
            return Self {
                path: None,
                exists: false,
                size_bytes: 0,
            };
        };
        match std::fs::metadata(path) {
            Ok(meta) => Self {
                path: Some(path.to_string()),
                exists: true,
                size_bytes: meta.len(),
            },
            Err(_) => Self {
                path: Some(path.to_string()),
                exists: false,
                size_bytes: 0,
            },
        }
    }
}

/// Per-scene input media metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneMediaInfo {
    pub scene_id: String,
    pub duration: f64,
    #[serde(flatten)]
    pub file: FileStat,
}

/// Host environment snapshot taken at report time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub ffmpeg_version: String,
    pub engine_version: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_free_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_total_gb: Option<f64>,
}

impl EnvironmentInfo {
    pub fn capture() -> Self {
        let (disk_free_gb, disk_total_gb) = disk_usage_gb("/");
        Self {
            ffmpeg_version: ffmpeg_version(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            disk_free_gb,
            disk_total_gb,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioStats {
    pub voiceover: FileStat,
    pub music: FileStat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneCacheStats {
    pub directory: String,
    pub hits: usize,
    pub total_scenes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderReport {
    pub timestamp: String,
    pub status: String,
    pub success: bool,
    pub error_excerpt: Option<String>,
    pub timeline_hash: String,
    pub command_timeout_sec: Option<f64>,
    pub environment: EnvironmentInfo,
    pub input_media: Vec<SceneMediaInfo>,
    pub audio: AudioStats,
    pub scene_cache: SceneCacheStats,
    pub ffmpeg_commands: Vec<String>,
    pub tmp_output_path: String,
    pub log_file: String,
    pub render_dir: String,
    pub report_file: String,
    pub log_tail: Vec<String>,
}

impl RenderReport {
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        timeline: &Timeline,
        timeline_hash: &str,
        error: Option<&str>,
        command_timeout_sec: Option<f64>,
        cache: SceneCacheStats,
        commands: &[Vec<String>],
        tmp_output_path: &Path,
        log_file: &Path,
        render_dir: &Path,
        report_file: &Path,
    ) -> Self {
        let meta = &timeline.meta;
        Self {
            timestamp: Utc::now().to_rfc3339(),
            status: if error.is_some() { "failure" } else { "success" }.to_string(),
            success: error.is_none(),
            error_excerpt: error.map(str::to_string),
            timeline_hash: timeline_hash.to_string(),
            command_timeout_sec,
            environment: EnvironmentInfo::capture(),
            input_media: timeline
                .scenes
                .iter()
                .map(|scene| SceneMediaInfo {
                    scene_id: scene.id.clone(),
                    duration: scene.duration,
                    file: FileStat::for_path(Some(&scene.image_path)),
                })
                .collect(),
            audio: AudioStats {
                voiceover: FileStat::for_path(meta.voiceover.as_ref().map(|v| v.path.as_str())),
                music: FileStat::for_path(meta.music.as_ref().map(|m| m.path.as_str())),
            },
            scene_cache: cache,
            ffmpeg_commands: commands.iter().map(|cmd| cmd.join(" ")).collect(),
            tmp_output_path: tmp_output_path.display().to_string(),
            log_file: log_file.display().to_string(),
            render_dir: render_dir.display().to_string(),
            report_file: report_file.display().to_string(),
            log_tail: tail_log_lines(log_file, LOG_TAIL_LINES),
        }
    }

    /// Write the report, never letting a write failure mask the render
    /// error it documents.
    pub fn write_best_effort(&self, path: &Path) {
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(self)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            std::fs::write(path, json)
        })();
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write render report");
        }
    }
}

/// Last `lines` lines of the render log, empty when the log is missing.
pub fn tail_log_lines(log_path: &Path, lines: usize) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(log_path) else {
        return Vec::new();
    };
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].iter().map(|l| l.to_string()).collect()
}

#[cfg(unix)]
fn disk_usage_gb(path: &str) -> (Option<f64>, Option<f64>) {
    use std::ffi::CString;
    let Ok(c_path) = CString::new(path) else {
        return (None, None);
    };
    let mut stats: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stats) };
    if rc != 0 {
        return (None, None);
    }
    let gb = 1024f64 * 1024.0 * 1024.0;
    let frsize = stats.f_frsize as f64;
    let free = (stats.f_bavail as f64 * frsize / gb * 100.0).round() / 100.0;
    let total = (stats.f_blocks as f64 * frsize / gb * 100.0).round() / 100.0;
    (Some(free), Some(total))
}

#[cfg(not(unix))]
fn disk_usage_gb(_path: &str) -> (Option<f64>, Option<f64>) {
    (None, None)
}

/// Hex SHA-256 of the timeline document, recorded in the report so
/// mismatched timeline/report pairs are detectable. Digests from
/// different engine builds must compare equal for equal documents.
pub fn timeline_content_hash(content: &str) -> String {
    use sha2::{Digest, Sha256};
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_timeline_model::{AspectRatio, Meta, Scene};

    fn minimal_timeline() -> Timeline {
        Timeline {
            meta: Meta::new("p", "t", AspectRatio::Portrait),
            scenes: vec![Scene {
                id: "s01".to_string(),
                image_path: "/nonexistent/s01.png".to_string(),
                start: 0.0,
                duration: 2.0,
                motion: None,
                caption: None,
            }],
        }
    }

    #[test]
    fn missing_file_stat_has_zero_size() {
        let stat = FileStat::for_path(Some("/nonexistent/file.png"));
        assert!(!stat.exists);
        assert_eq!(stat.size_bytes, 0);
        assert_eq!(stat.path.as_deref(), Some("/nonexistent/file.png"));
    }

    #[test]
    fn absent_path_stat_is_empty() {
        let stat = FileStat::for_path(None);
        assert!(stat.path.is_none());
        assert!(!stat.exists);
    }

    #[test]
    fn report_records_failure_status() {
        let timeline = minimal_timeline();
        let report = RenderReport::assemble(
            &timeline,
            "abc",
            Some("ffmpeg exploded"),
            Some(600.0),
            SceneCacheStats {
                directory: "cache".to_string(),
                hits: 0,
                total_scenes: 1,
            },
            &[vec!["ffmpeg".to_string(), "-y".to_string()]],
            Path::new("/tmp/out_tmp.mp4"),
            Path::new("/nonexistent/render.log"),
            Path::new("/tmp/render_logs"),
            Path::new("/tmp/render_report.json"),
        );
        assert_eq!(report.status, "failure");
        assert!(!report.success);
        assert_eq!(report.error_excerpt.as_deref(), Some("ffmpeg exploded"));
        assert_eq!(report.ffmpeg_commands, vec!["ffmpeg -y"]);
        assert_eq!(report.input_media.len(), 1);
        assert!(report.log_tail.is_empty());
    }

    #[test]
    fn report_serializes_to_json() {
        let timeline = minimal_timeline();
        let report = RenderReport::assemble(
            &timeline,
            "abc",
            None,
            None,
            SceneCacheStats {
                directory: "cache".to_string(),
                hits: 1,
                total_scenes: 1,
            },
            &[],
            Path::new("tmp.mp4"),
            Path::new("render.log"),
            Path::new("logs"),
            Path::new("report.json"),
        );
        let json = serde_json::to_string_pretty(&report).unwrap();
        assert!(json.contains("\"status\": \"success\""));
        assert!(json.contains("\"timeline_hash\": \"abc\""));
    }

    #[test]
    fn log_tail_keeps_last_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("render.log");
        let content: Vec<String> = (1..=60).map(|i| format!("line {i}")).collect();
        std::fs::write(&log, content.join("\n")).unwrap();
        let tail = tail_log_lines(&log, 50);
        assert_eq!(tail.len(), 50);
        assert_eq!(tail.first().map(String::as_str), Some("line 11"));
        assert_eq!(tail.last().map(String::as_str), Some("line 60"));
    }

    #[test]
    fn content_hash_is_stable_and_content_sensitive() {
        let a = timeline_content_hash("{\"meta\":{}}");
        let b = timeline_content_hash("{\"meta\":{}}");
        let c = timeline_content_hash("{\"meta\":{\"fps\":25}}");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn content_hash_matches_the_published_sha256_vector() {
        // SHA-256 of the empty string; pins the digest across builds.
        assert_eq!(
            timeline_content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
