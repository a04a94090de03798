//! Sequencer: the timeline clock paired with scene activation.
//!
//! Both preview and export drive playback through a [`Sequencer`]. Each tick
//! advances the clock first and then recomputes the active scene, so anything
//! reading the active scene afterwards sees the post-tick state.

use adstudio_common::clock::{ClockEvent, TimelineClock};
use serde::Serialize;

use crate::activator::{ActivationChange, SceneActivator};

/// Snapshot of playback state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimelineState {
    pub current_time: f64,
    pub total_duration: f64,
    pub is_playing: bool,
    pub active_scene_index: Option<usize>,
}

/// Result of one sequencer tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SequencerStep {
    /// The timeline reached its end during this tick.
    pub ended: bool,
    /// Active scene moved during this tick.
    pub change: Option<ActivationChange>,
}

#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    clock: TimelineClock,
    activator: SceneActivator,
}

impl Sequencer {
    pub fn new(durations: Vec<f64>) -> Self {
        let activator = SceneActivator::new(durations);
        let clock = TimelineClock::new(activator.total_secs());
        Self { clock, activator }
    }

    /// Replace the scene list; the total is recomputed and the active scene
    /// re-evaluated at the current position.
    pub fn set_durations(&mut self, durations: Vec<f64>) -> Option<ActivationChange> {
        let previous = self.activator.current();
        self.activator.set_durations(durations);
        self.clock.set_total(self.activator.total_secs());
        let current = self.activator.update(self.clock.current_secs()).and_then(|c| c.current);
        (previous != current).then_some(ActivationChange { previous, current })
    }

    /// Start playback. Returns `false` for an empty timeline.
    pub fn start(&mut self) -> bool {
        self.clock.start()
    }

    pub fn stop(&mut self) {
        self.clock.stop();
    }

    /// Rewind to zero and activate the first scene.
    pub fn rewind(&mut self) -> Option<ActivationChange> {
        self.clock.reset();
        self.activator.update(0.0)
    }

    pub fn seek(&mut self, time_secs: f64) -> Option<ActivationChange> {
        self.clock.seek(time_secs);
        self.activator.update(self.clock.current_secs())
    }

    /// Advance by `delta_secs`, then recompute the active scene.
    pub fn tick(&mut self, delta_secs: f64) -> SequencerStep {
        let ended = matches!(self.clock.tick(delta_secs), Some(ClockEvent::Ended));
        let change = self.activator.update(self.clock.current_secs());
        SequencerStep { ended, change }
    }

    pub fn current_time(&self) -> f64 {
        self.clock.current_secs()
    }

    pub fn total_duration(&self) -> f64 {
        self.clock.total_secs()
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.activator.current()
    }

    pub fn durations(&self) -> &[f64] {
        self.activator.durations()
    }

    /// Time since the active scene started.
    pub fn local_time(&self) -> f64 {
        self.activator
            .current()
            .map(|index| self.activator.local_time(index, self.clock.current_secs()))
            .unwrap_or(0.0)
    }

    pub fn state(&self) -> TimelineState {
        TimelineState {
            current_time: self.clock.current_secs(),
            total_duration: self.clock.total_secs(),
            is_playing: self.clock.is_playing(),
            active_scene_index: self.activator.current(),
        }
    }
}
