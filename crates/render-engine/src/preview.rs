//! Preview playback.
//!
//! Every scene target keeps decoding in lock-step with the timeline so
//! switching scenes never waits on a decoder; only the active one is shown.
//! Scene targets are always muted: the soundtrack comes from the narration
//! and music targets.

use crate::activator::ActivationChange;
use crate::timeline::{Sequencer, SequencerStep, TimelineState};

/// Something the preview can play, pause and show: a video element, an audio
/// player, a log line.
pub trait PlaybackTarget: Send {
    fn set_playing(&mut self, playing: bool);

    fn set_visible(&mut self, _visible: bool) {}

    fn set_muted(&mut self, _muted: bool) {}

    /// Jump to `secs` in the target's own timeline.
    fn seek(&mut self, _secs: f64) {}
}

pub struct PreviewPlayer {
    sequencer: Sequencer,
    scenes: Vec<Box<dyn PlaybackTarget>>,
    narration: Option<Box<dyn PlaybackTarget>>,
    music: Option<Box<dyn PlaybackTarget>>,
}

impl PreviewPlayer {
    /// Build a paused player showing the first scene.
    pub fn new(
        durations: Vec<f64>,
        scenes: Vec<Box<dyn PlaybackTarget>>,
        narration: Option<Box<dyn PlaybackTarget>>,
        music: Option<Box<dyn PlaybackTarget>>,
    ) -> Self {
        let mut player = Self {
            sequencer: Sequencer::new(durations),
            scenes,
            narration,
            music,
        };
        for target in &mut player.scenes {
            target.set_muted(true);
            target.set_visible(false);
        }
        let change = player.sequencer.rewind();
        player.apply_change(change);
        player
    }

    /// Start playback. Returns `false` when there is nothing to play.
    pub fn play(&mut self) -> bool {
        if !self.sequencer.start() {
            return false;
        }
        self.for_each_target(|t| t.set_playing(true));
        true
    }

    pub fn pause(&mut self) {
        self.sequencer.stop();
        self.for_each_target(|t| t.set_playing(false));
    }

    pub fn seek(&mut self, time_secs: f64) {
        let change = self.sequencer.seek(time_secs);
        self.apply_change(change);
        self.sync_positions();
    }

    /// Advance playback; at the natural end everything pauses and rewinds.
    pub fn tick(&mut self, delta_secs: f64) -> SequencerStep {
        let step = self.sequencer.tick(delta_secs);
        self.apply_change(step.change);
        if step.ended {
            tracing::debug!("Preview reached the end; rewinding");
            self.for_each_target(|t| {
                t.set_playing(false);
                t.seek(0.0);
            });
        }
        step
    }

    /// Replace scene durations (scene edits) and re-evaluate the active scene.
    pub fn set_scene_durations(&mut self, durations: Vec<f64>) {
        let change = self.sequencer.set_durations(durations);
        self.apply_change(change);
    }

    pub fn state(&self) -> TimelineState {
        self.sequencer.state()
    }

    fn apply_change(&mut self, change: Option<ActivationChange>) {
        let Some(change) = change else {
            return;
        };
        if let Some(target) = change.previous.and_then(|i| self.scenes.get_mut(i)) {
            target.set_visible(false);
        }
        if let Some(target) = change.current.and_then(|i| self.scenes.get_mut(i)) {
            target.set_visible(true);
        }
        tracing::debug!(previous = ?change.previous, current = ?change.current, "Preview scene switch");
    }

    fn sync_positions(&mut self) {
        let now = self.sequencer.current_time();
        if let Some(index) = self.sequencer.active_index() {
            let local = self.sequencer.local_time();
            if let Some(target) = self.scenes.get_mut(index) {
                target.seek(local);
            }
        }
        for target in [self.narration.as_mut(), self.music.as_mut()].into_iter().flatten() {
            target.seek(now);
        }
    }

    fn for_each_target(&mut self, mut f: impl FnMut(&mut dyn PlaybackTarget)) {
        for target in &mut self.scenes {
            f(&mut **target);
        }
        for target in [self.narration.as_mut(), self.music.as_mut()].into_iter().flatten() {
            f(&mut **target);
        }
    }
}
