//! Reelforge Render Engine
//!
//! Turns a persisted timeline document into a rendered video file by
//! orchestrating an external encoder (ffmpeg) and media probe (ffprobe).
//!
//! # Pipeline Architecture
//!
//! ```text
//! scene media ──┐
//!               ├── Timeline Builder (narration-proportional timing)
//! voiceover ────┘         │
//!                         ▼
//!                   timeline.json
//!                         │
//!               ┌─────────┴──────────┐
//!               │ Render Orchestrator │
//!               └─────────┬──────────┘
//!      per-scene Ken-Burns clips (zoompan)
//!                         │
//!                  Concatenate / Crossfade
//!                         │
//!        Audio Mix (loudnorm, ducking) + Caption Burn
//!                         │
//!                         ▼
//!                     output.mp4
//! ```

pub mod assets;
pub mod audio;
pub mod builder;
pub mod captions;
pub mod probe;
pub mod render;
pub mod report;
pub mod runner;

pub use builder::{build_timeline, BuildInputs, BuildOptions};
pub use render::{
    render_timeline, ProgressFn, RenderJob, RenderOutcome, RenderProgress, RenderStage,
};
