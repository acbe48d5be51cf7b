//! Reelforge Timeline Model
//!
//! Defines the core data contract between the timeline builder and the
//! render orchestrator:
//! - **Meta:** Global render configuration (geometry, toggles, audio, captions)
//! - **Scene:** One timed visual beat (media path, start, duration, motion, caption)
//! - **Timeline:** Ordered scenes plus meta, persisted as `timeline.json`
//!
//! Pan/zoom coordinates are normalized to `[0.0, 1.0]` image fractions so
//! motion specs survive resolution changes between build and render.

pub mod meta;
pub mod timeline;

pub use meta::*;
pub use timeline::*;
