//! Export session management.
//!
//! An [`ExportController`] plays the project's timeline once into a capture
//! muxer. Frames are emitted as the clock passes their timestamps, the mix bus
//! is rendered up to the same position, and the container is flushed once the
//! timeline ends or a stop is requested.
//!
//! ```text
//!  Idle ──start_export──▶ Preparing ──ok──▶ Recording ──ended/stop──▶ Finalizing
//!   ▲  ▲                     │                                         │      │
//!   │  │                     └──────fail──────▶ Error ◀──────fail──────┘      │
//!   │  └──────────────acknowledge_error──────────┘                            │
//!   └─────────────────────────────────flush ok────────────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use adstudio_common::clock::RateController;
use adstudio_common::config::ExportDefaults;
use adstudio_common::error::{StudioError, StudioResult};
use adstudio_project_model::project::Project;
use adstudio_project_model::scene::Scene;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::activator::{active_index, scene_offsets};
use crate::codec::{negotiate_format, ContainerFormat, EncoderProbe, DEFAULT_PREFERENCE};
use crate::compositor::{CaptionRenderer, FrameCompositor, FrameOutcome};
use crate::media::{SessionMedia, VisualSource};
use crate::mixer::{MixGains, MixerGraph};
use crate::sink::{AudioSink, CaptureSpec, Muxer, MuxerFactory};
use crate::timeline::Sequencer;

/// Largest audio block handed to the muxer in one write, in frames.
const AUDIO_BLOCK_FRAMES: u64 = 4096;

/// Tolerance when mapping clock time onto frame indices.
const FRAME_EPSILON: f64 = 1e-6;

/// Lifecycle phase of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportPhase {
    Idle,
    Preparing,
    Recording,
    Finalizing,
    Error,
}

impl ExportPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine-side export parameters.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub fps: u32,
    pub sample_rate: u32,
    pub channels: u16,
    pub gains: MixGains,
    /// Container preference, most preferred first.
    pub formats: Vec<ContainerFormat>,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub caption_font: Option<PathBuf>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            fps: 30,
            sample_rate: 48_000,
            channels: 2,
            gains: MixGains::default(),
            formats: DEFAULT_PREFERENCE.to_vec(),
            video_bitrate_kbps: 8000,
            audio_bitrate_kbps: 192,
            caption_font: None,
        }
    }
}

impl ExportSettings {
    /// Convert configured defaults, rejecting unknown format names.
    pub fn from_defaults(defaults: &ExportDefaults) -> StudioResult<Self> {
        if defaults.fps == 0 {
            return Err(StudioError::config("export fps must be greater than zero"));
        }
        if defaults.audio_sample_rate == 0 || defaults.audio_channels == 0 {
            return Err(StudioError::config(
                "audio sample rate and channel count must be greater than zero",
            ));
        }
        for (name, gain) in [
            ("narration", defaults.narration_gain),
            ("music", defaults.music_gain),
        ] {
            if !gain.is_finite() || gain < 0.0 {
                return Err(StudioError::config(format!(
                    "{name} gain must be a finite, non-negative number (got {gain})"
                )));
            }
        }

        let formats = defaults
            .formats
            .iter()
            .map(|name| name.parse::<ContainerFormat>())
            .collect::<StudioResult<Vec<_>>>()?;
        if formats.is_empty() {
            return Err(StudioError::config("export format preference list is empty"));
        }

        Ok(Self {
            fps: defaults.fps,
            sample_rate: defaults.audio_sample_rate,
            channels: defaults.audio_channels,
            gains: MixGains::from_defaults(defaults),
            formats,
            video_bitrate_kbps: defaults.video_bitrate_kbps,
            audio_bitrate_kbps: defaults.audio_bitrate_kbps,
            caption_font: defaults.caption_font.clone(),
        })
    }
}

/// A finished export.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub file_name: String,
    pub format: ContainerFormat,
    pub bytes: Vec<u8>,
    pub duration_secs: f64,
    pub frames: u64,
    pub audio_frames: u64,
    pub finished_at: DateTime<Utc>,
}

impl ExportArtifact {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Write the artifact into `dir` under its file name.
    pub fn write_to(&self, dir: &Path) -> StudioResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        tracing::info!(
            path = %path.display(),
            bytes = self.bytes.len(),
            "Wrote export"
        );
        Ok(path)
    }
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Opens a fresh monitor output for each export session.
pub type MonitorFactory = Box<dyn Fn() -> Box<dyn AudioSink + Send> + Send>;

/// Export progress report.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames captured so far.
    pub frames_rendered: u64,

    /// Frames a full playthrough produces.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Recording,
    Finalizing,
    Complete,
    Failed,
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub phase: ExportPhase,
    pub time_secs: f64,
    pub frames_emitted: u64,
    pub total_frames: u64,
    pub active_scene: Option<usize>,
}

#[derive(Debug)]
enum SessionEvent {
    Ended,
    StopRequested,
    SinkFailed(String),
}

/// The muxer taken out of a finalizing session, ready to be flushed off the
/// tick loop.
pub struct PendingFlush {
    muxer: Box<dyn Muxer>,
    sink_error: Option<String>,
}

impl PendingFlush {
    /// Flush the container. A session that saw a write failure is aborted
    /// instead and reported as failed.
    pub fn run(self) -> StudioResult<Vec<Vec<u8>>> {
        if let Some(message) = self.sink_error {
            self.muxer.abort();
            return Err(StudioError::render(format!("capture failed: {message}")));
        }
        self.muxer.finish()
    }
}

struct ExportSession {
    sequencer: Sequencer,
    offsets: Vec<f64>,
    compositor: FrameCompositor,
    mixer: MixerGraph,
    visuals: Vec<Option<Box<dyn VisualSource>>>,
    /// Visual slots whose source failed to prepare.
    unusable: Vec<bool>,
    muxer: Option<Box<dyn Muxer>>,
    format: ContainerFormat,
    fps: u32,
    sample_rate: u32,
    frames_emitted: u64,
    audio_frames_emitted: u64,
    total_frames: u64,
    total_audio_frames: u64,
    /// Scene shown by the last emitted frame.
    frame_scene: Option<usize>,
    events: VecDeque<SessionEvent>,
    sink_error: Option<String>,
    started_at: Instant,
}

impl ExportSession {
    fn frame_target(&self, now: f64, ended: bool) -> u64 {
        if ended {
            return self.total_frames;
        }
        let passed = (now * self.fps as f64 + FRAME_EPSILON).floor().max(0.0) as u64 + 1;
        passed.min(self.total_frames)
    }

    fn audio_target(&self, now: f64, ended: bool) -> u64 {
        if ended {
            return self.total_audio_frames;
        }
        let passed = (now * self.sample_rate as f64).round().max(0.0) as u64;
        passed.min(self.total_audio_frames)
    }

    /// Emit every frame and audio sample up to the clock position.
    fn capture_until(&mut self, scenes: &[Scene], now: f64, ended: bool) {
        let frame_target = self.frame_target(now, ended);
        while self.frames_emitted < frame_target && self.sink_error.is_none() {
            let frame_time = self.frames_emitted as f64 / self.fps as f64;
            self.emit_frame(scenes, frame_time);
        }

        let audio_target = self.audio_target(now, ended);
        while self.audio_frames_emitted < audio_target && self.sink_error.is_none() {
            let block = (audio_target - self.audio_frames_emitted).min(AUDIO_BLOCK_FRAMES);
            self.emit_audio(block as usize);
        }
    }

    fn emit_frame(&mut self, scenes: &[Scene], frame_time: f64) {
        let index = active_index(frame_time, self.sequencer.durations());
        if index != self.frame_scene {
            self.switch_scene(index);
        }

        let outcome = match (index, index.and_then(|i| scenes.get(i))) {
            (Some(i), Some(scene)) => {
                let local = frame_time - self.offsets.get(i).copied().unwrap_or(0.0);
                let usable = !self.unusable.get(i).copied().unwrap_or(true);
                let source: Option<&mut dyn VisualSource> = match self.visuals.get_mut(i) {
                    Some(Some(source)) if usable => Some(&mut **source),
                    _ => None,
                };
                self.compositor.compose(i, scene, source, local)
            }
            _ => self.compositor.compose_idle(),
        };
        if outcome == FrameOutcome::Skipped {
            tracing::trace!(frame = self.frames_emitted, "Source not ready; repeating frame");
        }

        let Some(muxer) = self.muxer.as_mut() else {
            return;
        };
        match muxer.write_frame(self.compositor.canvas()) {
            Ok(()) => self.frames_emitted += 1,
            Err(e) => self.fail_sink(e),
        }
    }

    fn emit_audio(&mut self, frames: usize) {
        let block = self.mixer.render(frames);
        let Some(muxer) = self.muxer.as_mut() else {
            return;
        };
        match muxer.write_audio(block) {
            Ok(()) => self.audio_frames_emitted += frames as u64,
            Err(e) => self.fail_sink(e),
        }
    }

    fn fail_sink(&mut self, error: StudioError) {
        tracing::error!(error = %error, "Capture sink write failed; stopping export");
        let message = error.to_string();
        self.sink_error = Some(message.clone());
        self.events.push_back(SessionEvent::SinkFailed(message));
    }

    fn switch_scene(&mut self, index: Option<usize>) {
        if let Some(previous) = self.frame_scene {
            if let Some(Some(source)) = self.visuals.get_mut(previous) {
                source.deactivate();
            }
        }
        if let Some(current) = index {
            if let Some(Some(source)) = self.visuals.get_mut(current) {
                source.activate();
            }
        }
        tracing::debug!(previous = ?self.frame_scene, current = ?index, "Export scene switch");
        self.frame_scene = index;
    }

    /// Return sources to `media` and drop anything still open.
    fn shutdown(mut self, media: &mut SessionMedia) {
        self.sequencer.stop();
        media.audio = self.mixer.into_tracks();
        for source in self.visuals.iter_mut().flatten() {
            source.release();
        }
        media.visuals = std::mem::take(&mut self.visuals);
        if let Some(muxer) = self.muxer.take() {
            tracing::debug!("Discarding unflushed capture");
            muxer.abort();
        }
    }
}

/// Drives one export at a time for a project.
pub struct ExportController {
    project: Project,
    media: SessionMedia,
    settings: ExportSettings,
    probe: Box<dyn EncoderProbe + Send>,
    muxers: Box<dyn MuxerFactory>,
    monitor: Option<MonitorFactory>,
    phase: ExportPhase,
    session: Option<ExportSession>,
    last_error: Option<String>,
}

impl ExportController {
    /// `media.visuals` is indexed like `project.scenes`; both are put into
    /// timeline order here.
    pub fn new(
        mut project: Project,
        mut media: SessionMedia,
        settings: ExportSettings,
        probe: Box<dyn EncoderProbe + Send>,
        muxers: Box<dyn MuxerFactory>,
    ) -> Self {
        sort_scenes_with_media(&mut project, &mut media);
        Self {
            project,
            media,
            settings,
            probe,
            muxers,
            monitor: None,
            phase: ExportPhase::Idle,
            session: None,
            last_error: None,
        }
    }

    /// Route each session's mix to a monitor output as well as the capture.
    pub fn with_monitor(mut self, monitor: MonitorFactory) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn phase(&self) -> ExportPhase {
        self.phase
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Message of the error that moved the controller into `Error`.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Container negotiated for the running session.
    pub fn format(&self) -> Option<ContainerFormat> {
        self.session.as_ref().map(|s| s.format)
    }

    /// Begin capturing. On success the controller is `Recording`.
    pub fn start_export(&mut self) -> StudioResult<()> {
        if self.phase != ExportPhase::Idle {
            return Err(StudioError::ExportBusy {
                phase: self.phase.to_string(),
            });
        }
        if self.project.scenes.is_empty() {
            tracing::warn!("Export requested for an empty timeline");
            return Err(StudioError::EmptyTimeline);
        }
        if let Err(e) = self.project.validate() {
            tracing::warn!(error = %e, "Export requested for an invalid project");
            return Err(StudioError::project(e.to_string()));
        }
        let total = self.project.total_duration();
        if !total.is_finite() || total <= 0.0 {
            return Err(StudioError::EmptyTimeline);
        }

        self.phase = ExportPhase::Preparing;
        self.last_error = None;
        tracing::info!(
            title = %self.project.title,
            scenes = self.project.scenes.len(),
            duration_secs = total,
            "Preparing export"
        );

        match self.prepare_session() {
            Ok(mut session) => {
                session.sequencer.rewind();
                session.sequencer.start();
                tracing::info!(
                    format = %session.format,
                    frames = session.total_frames,
                    audio_frames = session.total_audio_frames,
                    "Recording started"
                );
                self.session = Some(session);
                self.phase = ExportPhase::Recording;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Export setup failed");
                self.last_error = Some(e.to_string());
                self.phase = ExportPhase::Error;
                Err(e)
            }
        }
    }

    fn prepare_session(&mut self) -> StudioResult<ExportSession> {
        let settings = &self.settings;
        let format = negotiate_format(&settings.formats, self.probe.as_ref())?;
        let (width, height) = self.project.output_size();
        let spec = CaptureSpec {
            format,
            width,
            height,
            fps: settings.fps.max(1),
            sample_rate: settings.sample_rate,
            channels: settings.channels,
            video_bitrate_kbps: settings.video_bitrate_kbps,
            audio_bitrate_kbps: settings.audio_bitrate_kbps,
        };
        let muxer = self.muxers.open(&spec)?;

        // Infallible from here on; media moves into the session.
        let (mixer, failures) = MixerGraph::build(
            std::mem::take(&mut self.media.audio),
            settings.gains,
            settings.sample_rate,
            settings.channels,
        );
        if !failures.is_empty() {
            tracing::warn!(failed = failures.len(), "Some audio tracks will be silent");
        }
        let mixer = match self.monitor.as_ref() {
            Some(open_monitor) => mixer.with_monitor(open_monitor()),
            None => mixer,
        };

        let captions = CaptionRenderer::load(settings.caption_font.as_deref());
        let compositor = FrameCompositor::new(width, height, captions);

        let scene_count = self.project.scenes.len();
        let mut visuals = std::mem::take(&mut self.media.visuals);
        if visuals.len() < scene_count {
            visuals.resize_with(scene_count, || None);
        }
        let mut unusable = vec![false; visuals.len()];
        for (index, slot) in visuals.iter_mut().enumerate() {
            let Some(source) = slot.as_mut() else {
                continue;
            };
            if let Err(e) = source.prepare() {
                let err = StudioError::source_unavailable(index, e.to_string());
                tracing::warn!(error = %err, "Scene will show a placeholder");
                unusable[index] = true;
            }
        }

        let durations = self.project.durations();
        let total = self.project.total_duration();
        let fps = spec.fps;
        Ok(ExportSession {
            offsets: scene_offsets(&durations),
            sequencer: Sequencer::new(durations),
            compositor,
            mixer,
            visuals,
            unusable,
            muxer: Some(muxer),
            format,
            fps,
            sample_rate: spec.sample_rate,
            frames_emitted: 0,
            audio_frames_emitted: 0,
            total_frames: (total * fps as f64 - 1e-9).ceil().max(0.0) as u64,
            total_audio_frames: (total * spec.sample_rate as f64).round().max(0.0) as u64,
            frame_scene: None,
            events: VecDeque::new(),
            sink_error: None,
            started_at: Instant::now(),
        })
    }

    /// Ask a recording session to stop. It finalizes on the next tick.
    pub fn request_stop(&mut self) {
        if self.phase != ExportPhase::Recording {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            tracing::info!(time_secs = session.sequencer.current_time(), "Export stop requested");
            session.events.push_back(SessionEvent::StopRequested);
        }
    }

    /// Advance the timeline by `delta_secs` and capture what it passed.
    pub fn tick(&mut self, delta_secs: f64) -> TickReport {
        if self.phase == ExportPhase::Recording {
            if let Some(session) = self.session.as_mut() {
                if session.events.is_empty() {
                    let step = session.sequencer.tick(delta_secs);
                    if let Some(change) = step.change {
                        tracing::trace!(?change, "Timeline scene change");
                    }
                    let now = session.sequencer.current_time();
                    session.capture_until(&self.project.scenes, now, step.ended);
                    if step.ended {
                        session.events.push_back(SessionEvent::Ended);
                    }
                }
            }
            self.drain_events();
        }
        self.report()
    }

    fn drain_events(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        while let Some(event) = session.events.pop_front() {
            if self.phase != ExportPhase::Recording {
                continue;
            }
            match event {
                SessionEvent::Ended => {
                    tracing::info!(frames = session.frames_emitted, "Timeline ended");
                }
                SessionEvent::StopRequested => {
                    tracing::info!(frames = session.frames_emitted, "Stopping export early");
                }
                SessionEvent::SinkFailed(message) => {
                    tracing::warn!(error = %message, "Finalizing after capture failure");
                }
            }
            session.sequencer.stop();
            self.phase = ExportPhase::Finalizing;
        }
    }

    fn report(&self) -> TickReport {
        match self.session.as_ref() {
            Some(session) => TickReport {
                phase: self.phase,
                time_secs: session.sequencer.current_time(),
                frames_emitted: session.frames_emitted,
                total_frames: session.total_frames,
                active_scene: session.frame_scene,
            },
            None => TickReport {
                phase: self.phase,
                time_secs: 0.0,
                frames_emitted: 0,
                total_frames: 0,
                active_scene: None,
            },
        }
    }

    /// Take the muxer of a finalizing session so it can be flushed.
    pub fn take_flush(&mut self) -> Option<PendingFlush> {
        if self.phase != ExportPhase::Finalizing {
            return None;
        }
        let session = self.session.as_mut()?;
        let muxer = session.muxer.take()?;
        Some(PendingFlush {
            muxer,
            sink_error: session.sink_error.clone(),
        })
    }

    /// Finish a session with the result of its flush.
    pub fn complete_finalize(
        &mut self,
        flushed: StudioResult<Vec<Vec<u8>>>,
    ) -> StudioResult<ExportArtifact> {
        let Some(session) = self.session.as_ref() else {
            return Err(StudioError::render("no export session to finalize"));
        };
        let format = session.format;
        let frames = session.frames_emitted;
        let audio_frames = session.audio_frames_emitted;
        let duration_secs = frames as f64 / session.fps as f64;
        let elapsed = session.started_at.elapsed();

        self.teardown();

        match flushed {
            Ok(chunks) => {
                let artifact = ExportArtifact {
                    file_name: self.project.export_file_name(format.extension()),
                    format,
                    bytes: chunks.concat(),
                    duration_secs,
                    frames,
                    audio_frames,
                    finished_at: Utc::now(),
                };
                tracing::info!(
                    file = %artifact.file_name,
                    bytes = artifact.bytes.len(),
                    frames,
                    duration_secs,
                    elapsed_secs = elapsed.as_secs_f64(),
                    "Export finished"
                );
                self.phase = ExportPhase::Idle;
                Ok(artifact)
            }
            Err(e) => {
                tracing::error!(error = %e, "Export flush failed");
                self.last_error = Some(e.to_string());
                self.phase = ExportPhase::Error;
                Err(e)
            }
        }
    }

    /// Flush on the calling thread.
    pub fn finalize(&mut self) -> StudioResult<ExportArtifact> {
        let flush = self
            .take_flush()
            .ok_or_else(|| StudioError::render("export is not finalizing"))?;
        let result = flush.run();
        self.complete_finalize(result)
    }

    /// Leave the `Error` phase.
    pub fn acknowledge_error(&mut self) {
        if self.phase != ExportPhase::Error {
            return;
        }
        self.teardown();
        self.last_error = None;
        self.phase = ExportPhase::Idle;
    }

    fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            session.shutdown(&mut self.media);
        }
    }
}

/// Stable sort of scenes by `order`, carrying each scene's visual slot along.
fn sort_scenes_with_media(project: &mut Project, media: &mut SessionMedia) {
    if project.scenes.windows(2).all(|w| w[0].order <= w[1].order) {
        return;
    }
    let scenes = std::mem::take(&mut project.scenes);
    let mut slots = std::mem::take(&mut media.visuals);
    if slots.len() < scenes.len() {
        slots.resize_with(scenes.len(), || None);
    }
    let extra = slots.split_off(scenes.len());

    let mut paired: Vec<_> = scenes.into_iter().zip(slots).collect();
    paired.sort_by_key(|(scene, _)| scene.order);
    let (scenes, mut slots): (Vec<Scene>, Vec<Option<Box<dyn VisualSource>>>) =
        paired.into_iter().unzip();
    slots.extend(extra);

    tracing::debug!(scenes = scenes.len(), "Reordered scenes into timeline order");
    project.scenes = scenes;
    media.visuals = slots;
}

impl Drop for ExportController {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// How the driver advances the timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    /// Wall-clock deltas from a fixed-rate interval.
    RealTime { tick_hz: u32 },
    /// One frame interval per tick, as fast as possible.
    Offline,
}

#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub pacing: Pacing,
    /// Maximum progress callback rate.
    pub progress_hz: u32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            pacing: Pacing::RealTime { tick_hz: 60 },
            progress_hz: 4,
        }
    }
}

fn emit_progress(
    progress: &Option<ProgressCallback>,
    stage: ExportStage,
    report: &TickReport,
    started: Instant,
) {
    let Some(cb) = progress else {
        return;
    };
    let fraction = if report.total_frames > 0 {
        (report.frames_emitted as f64 / report.total_frames as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let elapsed = started.elapsed().as_secs_f64();
    let eta_secs = if fraction > 0.0 {
        elapsed * (1.0 - fraction) / fraction
    } else {
        0.0
    };
    cb(ExportProgress {
        progress: if stage == ExportStage::Complete {
            1.0
        } else {
            fraction
        },
        frames_rendered: report.frames_emitted,
        total_frames: report.total_frames,
        eta_secs,
        stage,
    });
}

/// Ticks may block on decoder channels and encoder pipes. On a multi-thread
/// runtime the worker is handed over for the duration; a current-thread
/// runtime has no other worker to hand over to, so the tick runs inline.
fn tick_on_worker(controller: &mut ExportController, delta_secs: f64) -> TickReport {
    let flavor = tokio::runtime::Handle::try_current().map(|h| h.runtime_flavor());
    match flavor {
        Ok(tokio::runtime::RuntimeFlavor::MultiThread) => {
            tokio::task::block_in_place(|| controller.tick(delta_secs))
        }
        _ => controller.tick(delta_secs),
    }
}

/// Run a full export: start, tick until the timeline ends or `stop` is set,
/// then flush on a blocking thread.
pub async fn run_export(
    controller: &mut ExportController,
    options: ExportOptions,
    stop: Arc<AtomicBool>,
    progress: Option<ProgressCallback>,
) -> StudioResult<ExportArtifact> {
    let started = Instant::now();
    emit_progress(&progress, ExportStage::Preparing, &controller.report(), started);

    if let Err(e) = controller.start_export() {
        emit_progress(&progress, ExportStage::Failed, &controller.report(), started);
        return Err(e);
    }

    let mut throttle = RateController::new(options.progress_hz);
    let mut last_report = controller.report();
    match options.pacing {
        Pacing::RealTime { tick_hz } => {
            let period = Duration::from_secs_f64(1.0 / f64::from(tick_hz.max(1)));
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last = Instant::now();
            while controller.phase() == ExportPhase::Recording {
                interval.tick().await;
                if stop.load(Ordering::Relaxed) {
                    controller.request_stop();
                }
                let now = Instant::now();
                last_report = tick_on_worker(controller, now.duration_since(last).as_secs_f64());
                last = now;
                if throttle.should_tick(started.elapsed().as_nanos() as u64) {
                    emit_progress(&progress, ExportStage::Recording, &last_report, started);
                }
            }
        }
        Pacing::Offline => {
            let delta = 1.0 / f64::from(controller.settings().fps.max(1));
            while controller.phase() == ExportPhase::Recording {
                if stop.load(Ordering::Relaxed) {
                    controller.request_stop();
                }
                last_report = tick_on_worker(controller, delta);
                if throttle.should_tick(started.elapsed().as_nanos() as u64) {
                    emit_progress(&progress, ExportStage::Recording, &last_report, started);
                }
                tokio::task::yield_now().await;
            }
        }
    }

    emit_progress(&progress, ExportStage::Finalizing, &last_report, started);
    let Some(flush) = controller.take_flush() else {
        return Err(StudioError::render(format!(
            "export stopped in phase {} without a capture to flush",
            controller.phase()
        )));
    };

    let flushed = tokio::task::spawn_blocking(move || flush.run())
        .await
        .map_err(|e| StudioError::render(format!("flush task failed: {e}")))
        .and_then(|result| result);
    let result = controller.complete_finalize(flushed);

    let stage = if result.is_ok() {
        ExportStage::Complete
    } else {
        ExportStage::Failed
    };
    emit_progress(&progress, stage, &last_report, started);
    result
}
