//! Ad Studio Render Engine
//!
//! Plays a project's scene timeline and records it into a single media
//! file: the active scene's picture with its caption, plus the mixed
//! narration and music soundtrack.
//!
//! # Pipeline Architecture
//!
//! ```text
//! TimelineClock ── tick ──▶ SceneActivator ── active scene ──┐
//!                                                            │
//! scene visuals ────────────────────────────▶ FrameCompositor (cover fit + caption)
//!                                                            │ RGBA frames
//! narration ──┐                                              ▼
//!             ├── MixerGraph (gains, clamp) ── PCM ──▶  Muxer (FrameSink + AudioSink)
//! music ──────┘                                              │
//!                                                            ▼
//!                                              <title>_final_mix.<ext>
//! ```

pub mod activator;
pub mod codec;
pub mod compositor;
pub mod export;
pub mod ffmpeg;
pub mod media;
pub mod mixer;
pub mod preview;
pub mod sink;
pub mod timeline;

pub use export::*;
pub use timeline::{Sequencer, TimelineState};
