//! Ad Studio Project Model
//!
//! Defines the data contracts for ad projects:
//! - **Scene:** One clip on the timeline with its caption overlay
//! - **Project:** Title, ordered scenes, narration/music tracks, framing
//!
//! Media references are opaque [`MediaLocator`] handles resolved against the
//! project directory.

pub mod project;
pub mod scene;

pub use project::*;
pub use scene::*;
