//! Audio mixing bus.
//!
//! Narration and music are summed with fixed per-role gains into one
//! interleaved stream. There is no ducking and no crossfading; each track
//! plays straight through from the start of the session.

use adstudio_common::config::ExportDefaults;
use adstudio_common::error::StudioError;

use crate::media::{AudioTrack, TrackRole};
use crate::sink::AudioSink;

/// Linear gain per track role.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixGains {
    pub narration: f32,
    pub music: f32,
}

impl Default for MixGains {
    fn default() -> Self {
        Self {
            narration: 1.0,
            music: 0.6,
        }
    }
}

impl MixGains {
    pub fn from_defaults(defaults: &ExportDefaults) -> Self {
        Self {
            narration: defaults.narration_gain,
            music: defaults.music_gain,
        }
    }

    pub fn gain_for(&self, role: TrackRole) -> f32 {
        match role {
            TrackRole::Narration => self.narration,
            TrackRole::Music => self.music,
        }
    }
}

/// A track that could not be connected to the bus.
#[derive(Debug)]
pub struct AttachFailure {
    pub role: TrackRole,
    pub error: StudioError,
}

struct MixNode {
    track: AudioTrack,
    gain: f32,
}

/// The session's mixing graph. Owns its tracks until [`MixerGraph::into_tracks`].
pub struct MixerGraph {
    channels: usize,
    sample_rate: u32,
    nodes: Vec<MixNode>,
    /// Tracks that failed to attach; kept so they can be handed back.
    silent: Vec<AudioTrack>,
    monitor: Option<Box<dyn AudioSink + Send>>,
    mix: Vec<f32>,
    scratch: Vec<f32>,
    connected: bool,
}

impl MixerGraph {
    /// Attach every track. Failures are reported per track and leave that
    /// track silent; the graph itself always builds.
    pub fn build(
        tracks: Vec<AudioTrack>,
        gains: MixGains,
        sample_rate: u32,
        channels: u16,
    ) -> (Self, Vec<AttachFailure>) {
        let mut nodes = Vec::new();
        let mut silent = Vec::new();
        let mut failures = Vec::new();

        for mut track in tracks {
            match track.source.attach() {
                Ok(()) => {
                    let gain = gains.gain_for(track.role);
                    tracing::debug!(
                        track = track.role.as_str(),
                        source = track.source.label(),
                        gain,
                        "Attached audio source"
                    );
                    nodes.push(MixNode { track, gain });
                }
                Err(error) => {
                    tracing::warn!(
                        track = track.role.as_str(),
                        error = %error,
                        "Audio source failed to attach; it will be silent"
                    );
                    failures.push(AttachFailure {
                        role: track.role,
                        error,
                    });
                    silent.push(track);
                }
            }
        }

        let graph = Self {
            channels: usize::from(channels.max(1)),
            sample_rate,
            nodes,
            silent,
            monitor: None,
            mix: Vec::new(),
            scratch: Vec::new(),
            connected: true,
        };
        (graph, failures)
    }

    /// Also route the mix to a monitor output.
    pub fn with_monitor(mut self, monitor: Box<dyn AudioSink + Send>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Roles currently feeding the bus.
    pub fn attached_roles(&self) -> Vec<TrackRole> {
        self.nodes.iter().map(|n| n.track.role).collect()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Mix the next `frames` frames. The result is clamped to `[-1, 1]`.
    pub fn render(&mut self, frames: usize) -> &[f32] {
        let len = frames * self.channels;
        self.mix.clear();
        self.mix.resize(len, 0.0);

        if self.connected {
            for node in &mut self.nodes {
                self.scratch.clear();
                self.scratch.resize(len, 0.0);
                let written = node.track.source.read(&mut self.scratch);
                for (out, sample) in self.mix.iter_mut().zip(&self.scratch[..written]) {
                    *out += sample * node.gain;
                }
            }
            for sample in &mut self.mix {
                *sample = sample.clamp(-1.0, 1.0);
            }
        }

        if let Some(monitor) = self.monitor.as_mut() {
            if let Err(e) = monitor.write_audio(&self.mix) {
                tracing::debug!(error = %e, "Monitor output failed; disconnecting it");
                self.monitor = None;
            }
        }

        &self.mix
    }

    /// Detach every source. Safe to call more than once.
    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        for node in &mut self.nodes {
            node.track.source.detach();
        }
        self.monitor = None;
        self.connected = false;
        tracing::debug!("Mixer disconnected");
    }

    /// Disconnect and hand the tracks back.
    pub fn into_tracks(mut self) -> Vec<AudioTrack> {
        self.disconnect();
        let nodes = std::mem::take(&mut self.nodes);
        let silent = std::mem::take(&mut self.silent);
        nodes.into_iter().map(|n| n.track).chain(silent).collect()
    }
}

impl Drop for MixerGraph {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{AudioSource, PcmSource};
    use adstudio_common::error::StudioResult;
    use std::sync::{Arc, Mutex};

    struct Capture(Arc<Mutex<Vec<f32>>>);

    impl AudioSink for Capture {
        fn write_audio(&mut self, samples: &[f32]) -> StudioResult<()> {
            self.0.lock().unwrap().extend_from_slice(samples);
            Ok(())
        }
    }

    fn tracks(narration: Vec<f32>, music: Vec<f32>) -> Vec<AudioTrack> {
        vec![
            AudioTrack::new(TrackRole::Narration, PcmSource::new("narration", narration)),
            AudioTrack::new(TrackRole::Music, PcmSource::new("music", music)),
        ]
    }

    #[test]
    fn test_mix_applies_role_gains() {
        let (mut graph, failures) =
            MixerGraph::build(tracks(vec![0.5, 0.5], vec![0.5, 0.5]), MixGains::default(), 48_000, 2);
        assert!(failures.is_empty());
        let out = graph.render(1);
        assert!((out[0] - 0.8).abs() < 1e-6);
        assert!((out[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_mix_is_clamped_and_pads_with_silence() {
        let (mut graph, _) =
            MixerGraph::build(tracks(vec![0.9, -0.9], vec![0.9, -0.9]), MixGains::default(), 48_000, 2);
        let out = graph.render(2).to_vec();
        assert_eq!(out, vec![1.0, -1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_attach_failure_leaves_track_silent() {
        let mut music = PcmSource::new("music", vec![0.5; 4]);
        music.attach().unwrap();
        let tracks = vec![
            AudioTrack::new(TrackRole::Narration, PcmSource::new("narration", vec![0.25; 4])),
            AudioTrack::new(TrackRole::Music, music),
        ];

        let (mut graph, failures) = MixerGraph::build(tracks, MixGains::default(), 48_000, 2);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].role, TrackRole::Music);
        assert!(matches!(failures[0].error, StudioError::MixerAttach { .. }));
        assert_eq!(graph.attached_roles(), vec![TrackRole::Narration]);

        let out = graph.render(1);
        assert!((out[0] - 0.25).abs() < 1e-6);
        assert_eq!(graph.into_tracks().len(), 2);
    }

    #[test]
    fn test_disconnect_is_idempotent_and_detaches() {
        let (mut graph, _) = MixerGraph::build(tracks(vec![0.5; 4], vec![]), MixGains::default(), 48_000, 2);
        graph.disconnect();
        graph.disconnect();
        assert!(!graph.is_connected());
        assert!(graph.render(2).iter().all(|s| *s == 0.0));

        let tracks = graph.into_tracks();
        assert!(tracks.iter().all(|t| !t.source.is_attached()));
    }

    #[test]
    fn test_monitor_receives_mix() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let (graph, _) = MixerGraph::build(tracks(vec![0.5, 0.5], vec![]), MixGains::default(), 48_000, 2);
        let mut graph = graph.with_monitor(Box::new(Capture(Arc::clone(&captured))));
        graph.render(1);
        assert_eq!(captured.lock().unwrap().as_slice(), &[0.5, 0.5]);
    }
}
