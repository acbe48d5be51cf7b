//! External binary discovery and media inspection.
//!
//! The encoder (ffmpeg) and probe (ffprobe) are invoked as external
//! processes, never linked. Their absence is an environment error with
//! remediation instructions, surfaced before any render work begins.

use std::path::{Path, PathBuf};
use std::process::Command;

use reelforge_common::error::{ReelforgeError, ReelforgeResult};

/// Resolve the ffmpeg executable: `FFMPEG_PATH` override first, then PATH.
pub fn resolve_ffmpeg() -> ReelforgeResult<PathBuf> {
    resolve_binary("ffmpeg", "FFMPEG_PATH")
}

/// Resolve the ffprobe executable: `FFPROBE_PATH` override first, then PATH.
pub fn resolve_ffprobe() -> ReelforgeResult<PathBuf> {
    resolve_binary("ffprobe", "FFPROBE_PATH")
}

fn resolve_binary(name: &str, env_var: &str) -> ReelforgeResult<PathBuf> {
    if let Ok(overridden) = std::env::var(env_var) {
        let path = PathBuf::from(&overridden);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            env = env_var,
            path = %overridden,
            "Ignoring binary override that does not exist"
        );
    }

    which::which(name).map_err(|_| {
        ReelforgeError::environment(format!(
            "{name} executable not found. Install ffmpeg (e.g. `apt install ffmpeg` \
             or `brew install ffmpeg`) or set {env_var} to the binary."
        ))
    })
}

/// Confirm the encoder is present and executable. Fails fast with a
/// user-actionable message; all later stages would otherwise fail
/// confusingly.
pub fn ensure_encoder() -> ReelforgeResult<()> {
    let ffmpeg = resolve_ffmpeg()?;
    let status = Command::new(&ffmpeg)
        .arg("-version")
        .output()
        .map_err(|e| {
            ReelforgeError::environment(format!(
                "ffmpeg at {} could not be executed: {e}. \
                 Ensure the binary is installed and runnable.",
                ffmpeg.display()
            ))
        })?;
    if !status.status.success() {
        return Err(ReelforgeError::environment(format!(
            "ffmpeg at {} exited with an error when probed for its version. \
             Reinstall ffmpeg or fix the FFMPEG_PATH override.",
            ffmpeg.display()
        )));
    }
    Ok(())
}

/// First line of `ffmpeg -version`, or "unknown". Used for diagnostics only.
pub fn ffmpeg_version() -> String {
    let Ok(ffmpeg) = resolve_ffmpeg() else {
        return "unknown".to_string();
    };
    let Ok(output) = Command::new(&ffmpeg).arg("-version").output() else {
        return "unknown".to_string();
    };
    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).to_string()
    };
    text.lines()
        .next()
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Media duration source. Trait seam so the timeline builder can be
/// exercised without a real ffprobe on the system.
pub trait DurationProbe {
    /// Container duration of the file in seconds. A missing file reports
    /// 0.0 rather than an error; builder semantics treat it as "no audio".
    fn duration_secs(&self, path: &Path) -> ReelforgeResult<f64>;
}

/// ffprobe-backed duration probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaProbe;

impl DurationProbe for MediaProbe {
    fn duration_secs(&self, path: &Path) -> ReelforgeResult<f64> {
        if !path.exists() {
            return Ok(0.0);
        }
        let ffprobe = resolve_ffprobe()?;
        let output = Command::new(&ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .map_err(|e| ReelforgeError::probe(format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(ReelforgeError::probe(format!(
                "ffprobe failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        raw.trim().parse::<f64>().map_err(|_| {
            ReelforgeError::probe(format!(
                "ffprobe returned a non-numeric duration for {}: '{}'",
                path.display(),
                raw.trim()
            ))
        })
    }
}
