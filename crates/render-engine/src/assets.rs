//! Asset resolution seam.
//!
//! When a referenced media file is missing from local disk the render
//! validator can ask a configured store to pull the project's assets
//! down once before failing. The engine only knows this trait; cloud
//! backends live with the caller.

use std::path::Path;

use reelforge_common::error::ReelforgeResult;

/// Counts of files fetched by one pull, by media kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulledAssets {
    pub images: usize,
    pub audio: usize,
    pub video: usize,
}

impl PulledAssets {
    pub fn total(&self) -> usize {
        self.images + self.audio + self.video
    }
}

/// Collaborator that can materialize a project's media files locally.
pub trait AssetStore: Send + Sync {
    /// Pull all assets for `project_id` into `dest`, returning counts of
    /// newly fetched files. Pulling a project that is already fully
    /// local is a no-op returning zero counts.
    fn pull_assets(&self, project_id: &str, dest: &Path) -> ReelforgeResult<PulledAssets>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that writes placeholder files on pull and counts calls.
    pub struct ScriptedStore {
        pub files: Vec<String>,
        pub calls: AtomicUsize,
    }

    impl ScriptedStore {
        pub fn new(files: Vec<String>) -> Self {
            Self {
                files,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl AssetStore for ScriptedStore {
        fn pull_assets(&self, _project_id: &str, dest: &Path) -> ReelforgeResult<PulledAssets> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut pulled = PulledAssets::default();
            for name in &self.files {
                let path = dest.join(name);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, b"placeholder")?;
                match path.extension().and_then(|e| e.to_str()) {
                    Some("png" | "jpg" | "jpeg" | "webp") => pulled.images += 1,
                    Some("mp3" | "wav" | "m4a") => pulled.audio += 1,
                    Some("mp4" | "mov" | "webm" | "mkv") => pulled.video += 1,
                    _ => {}
                }
            }
            Ok(pulled)
        }
    }
}
