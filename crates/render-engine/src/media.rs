//! Media sources feeding the compositor and the mixer.
//!
//! Visual sources deliver RGBA frames for scene-local time; audio sources
//! deliver interleaved f32 PCM at the session layout. Sources are owned by
//! the session that plays them and handed back on teardown so another
//! playthrough can reuse them.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::JoinHandle;

use adstudio_common::error::{StudioError, StudioResult};
use adstudio_project_model::project::LoadedProject;
use adstudio_project_model::scene::MediaLocator;
use image::{Rgba, RgbaImage};

use crate::ffmpeg::{decode_audio_f32, probe_video_dimensions};

/// Extensions decoded as still images instead of video.
const STILL_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Decoded frames buffered ahead of playback per video source.
const DECODE_QUEUE_FRAMES: usize = 8;

/// A scene's picture.
pub trait VisualSource: Send {
    fn label(&self) -> &str;

    /// Open decoders ahead of playback.
    fn prepare(&mut self) -> StudioResult<()> {
        Ok(())
    }

    /// The scene became active.
    fn activate(&mut self) {}

    /// The scene stopped being active.
    fn deactivate(&mut self) {}

    /// Free decoder resources. The source may be prepared again later.
    fn release(&mut self) {}

    /// Frame to show at `local_secs` into the scene, or `None` when no frame
    /// is ready yet.
    fn poll_frame(&mut self, local_secs: f64) -> Option<&RgbaImage>;
}

/// A still image (storyboard frame, poster) or a solid color.
pub struct StillSource {
    label: String,
    image: RgbaImage,
}

impl StillSource {
    pub fn new(label: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            label: label.into(),
            image,
        }
    }

    pub fn from_file(path: &Path) -> StudioResult<Self> {
        let image = image::open(path)
            .map_err(|e| StudioError::render(format!("failed to decode {}: {e}", path.display())))?
            .to_rgba8();
        Ok(Self::new(path.display().to_string(), image))
    }

    pub fn solid(label: impl Into<String>, width: u32, height: u32, color: [u8; 4]) -> Self {
        Self::new(label, RgbaImage::from_pixel(width, height, Rgba(color)))
    }
}

impl VisualSource for StillSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn poll_frame(&mut self, _local_secs: f64) -> Option<&RgbaImage> {
        Some(&self.image)
    }
}

/// How a video source behaves when the next frame has not been decoded yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPolicy {
    /// Block until the decoder delivers. Used when no wall clock is running.
    Wait,
    /// Return what is available and keep going.
    Skip,
}

struct Decoder {
    child: Child,
    frames: Receiver<Vec<u8>>,
    reader: Option<JoinHandle<()>>,
}

impl Decoder {
    fn shutdown(mut self) {
        drop(self.frames);
        self.child.kill().ok();
        self.child.wait().ok();
        if let Some(reader) = self.reader.take() {
            reader.join().ok();
        }
    }
}

/// A video clip decoded by an ffmpeg subprocess at the session frame rate.
pub struct FfmpegVideoSource {
    label: String,
    path: PathBuf,
    fps: u32,
    policy: ReadPolicy,
    decoder: Option<Decoder>,
    size: Option<(u32, u32)>,
    current: Option<RgbaImage>,
    /// Index of the frame in `current`.
    position: Option<u64>,
    exhausted: bool,
}

impl FfmpegVideoSource {
    pub fn new(path: impl Into<PathBuf>, fps: u32, policy: ReadPolicy) -> Self {
        let path = path.into();
        Self {
            label: path.display().to_string(),
            path,
            fps: fps.max(1),
            policy,
            decoder: None,
            size: None,
            current: None,
            position: None,
            exhausted: false,
        }
    }

    fn spawn_decoder(&self, width: u32, height: u32) -> StudioResult<Decoder> {
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(&self.path)
            .args([
                "-an",
                "-r",
                &self.fps.to_string(),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| StudioError::render(format!("failed to spawn ffmpeg decoder: {e}")))?;

        let Some(mut stdout) = child.stdout.take() else {
            child.kill().ok();
            child.wait().ok();
            return Err(StudioError::render("failed to capture ffmpeg decoder output"));
        };

        let frame_len = width as usize * height as usize * 4;
        let (tx, rx) = mpsc::sync_channel(DECODE_QUEUE_FRAMES);
        let reader = std::thread::spawn(move || {
            use std::io::Read;
            loop {
                let mut frame = vec![0u8; frame_len];
                if stdout.read_exact(&mut frame).is_err() {
                    break;
                }
                if tx.send(frame).is_err() {
                    break;
                }
            }
        });

        Ok(Decoder {
            child,
            frames: rx,
            reader: Some(reader),
        })
    }

    fn receive(&mut self) -> Option<Vec<u8>> {
        let decoder = self.decoder.as_ref()?;
        match self.policy {
            ReadPolicy::Wait => match decoder.frames.recv() {
                Ok(frame) => Some(frame),
                Err(_) => {
                    self.exhausted = true;
                    None
                }
            },
            ReadPolicy::Skip => match decoder.frames.try_recv() {
                Ok(frame) => Some(frame),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => {
                    self.exhausted = true;
                    None
                }
            },
        }
    }
}

impl VisualSource for FfmpegVideoSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn prepare(&mut self) -> StudioResult<()> {
        if self.decoder.is_some() {
            return Ok(());
        }

        let (width, height) = probe_video_dimensions(&self.path).ok_or_else(|| {
            StudioError::render(format!("could not probe video size of {}", self.path.display()))
        })?;
        self.decoder = Some(self.spawn_decoder(width, height)?);
        self.size = Some((width, height));
        self.current = None;
        self.position = None;
        self.exhausted = false;

        tracing::debug!(source = %self.label, width, height, "Video decoder ready");
        Ok(())
    }

    fn activate(&mut self) {
        if let Err(e) = self.prepare() {
            tracing::warn!(source = %self.label, error = %e, "Video source failed to start");
        }
    }

    fn release(&mut self) {
        if let Some(decoder) = self.decoder.take() {
            decoder.shutdown();
        }
        self.current = None;
        self.position = None;
    }

    fn poll_frame(&mut self, local_secs: f64) -> Option<&RgbaImage> {
        let (width, height) = self.size?;
        let target = (local_secs.max(0.0) * self.fps as f64 + 1e-6).floor() as u64;

        while !self.exhausted && self.position.map_or(true, |p| p < target) {
            let Some(bytes) = self.receive() else {
                break;
            };
            match RgbaImage::from_raw(width, height, bytes) {
                Some(frame) => {
                    self.current = Some(frame);
                    self.position = Some(self.position.map_or(0, |p| p + 1));
                }
                None => {
                    self.exhausted = true;
                }
            }
        }

        // Past the end of the clip the last frame is held.
        self.current.as_ref()
    }
}

impl Drop for FfmpegVideoSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// A narration or music stream.
pub trait AudioSource: Send {
    fn label(&self) -> &str;

    /// Connect to a mixing bus. Fails if the source is already connected.
    fn attach(&mut self) -> StudioResult<()>;

    fn detach(&mut self);

    fn is_attached(&self) -> bool;

    /// Fill `out` with interleaved samples; returns how many were written.
    /// Samples past the returned count are left untouched.
    fn read(&mut self, out: &mut [f32]) -> usize;
}

/// Fully decoded PCM already at the session layout.
pub struct PcmSource {
    label: String,
    samples: Vec<f32>,
    cursor: usize,
    attached: bool,
}

impl PcmSource {
    pub fn new(label: impl Into<String>, samples: Vec<f32>) -> Self {
        Self {
            label: label.into(),
            samples,
            cursor: 0,
            attached: false,
        }
    }

    /// Decode a file via ffmpeg to the given layout.
    pub fn from_file(path: &Path, sample_rate: u32, channels: u16) -> StudioResult<Self> {
        let samples = decode_audio_f32(path, sample_rate, channels)?;
        Ok(Self::new(path.display().to_string(), samples))
    }

    pub fn len_samples(&self) -> usize {
        self.samples.len()
    }
}

impl AudioSource for PcmSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn attach(&mut self) -> StudioResult<()> {
        if self.attached {
            return Err(StudioError::mixer_attach(
                self.label.clone(),
                "source is already connected to a mixing bus",
            ));
        }
        self.attached = true;
        self.cursor = 0;
        Ok(())
    }

    fn detach(&mut self) {
        self.attached = false;
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn read(&mut self, out: &mut [f32]) -> usize {
        let remaining = &self.samples[self.cursor.min(self.samples.len())..];
        let n = remaining.len().min(out.len());
        out[..n].copy_from_slice(&remaining[..n]);
        self.cursor += n;
        n
    }
}

/// Which bus input an audio track feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackRole {
    Narration,
    Music,
}

impl TrackRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Narration => "narration",
            Self::Music => "music",
        }
    }
}

pub struct AudioTrack {
    pub role: TrackRole,
    pub source: Box<dyn AudioSource>,
}

impl AudioTrack {
    pub fn new(role: TrackRole, source: impl AudioSource + 'static) -> Self {
        Self {
            role,
            source: Box::new(source),
        }
    }
}

/// All sources for one project, indexed like its scenes.
#[derive(Default)]
pub struct SessionMedia {
    /// One slot per scene; `None` renders a placeholder.
    pub visuals: Vec<Option<Box<dyn VisualSource>>>,
    pub audio: Vec<AudioTrack>,
}

impl SessionMedia {
    /// Media with no sources at all for `scenes` scenes.
    pub fn empty(scenes: usize) -> Self {
        Self {
            visuals: (0..scenes).map(|_| None).collect(),
            audio: vec![],
        }
    }

    pub fn with_visual(mut self, index: usize, source: impl VisualSource + 'static) -> Self {
        if index >= self.visuals.len() {
            self.visuals.resize_with(index + 1, || None);
        }
        self.visuals[index] = Some(Box::new(source));
        self
    }

    pub fn with_audio(mut self, track: AudioTrack) -> Self {
        self.audio.push(track);
        self
    }

    pub fn release_all(&mut self) {
        for source in self.visuals.iter_mut().flatten() {
            source.release();
        }
    }
}

/// Decoding parameters for [`load_project_media`].
#[derive(Debug, Clone, Copy)]
pub struct MediaOptions {
    pub fps: u32,
    pub sample_rate: u32,
    pub channels: u16,
    pub read_policy: ReadPolicy,
}

/// Resolve and open every source a project references.
///
/// Missing or undecodable media is logged and left empty: scenes fall back
/// to a placeholder and tracks stay silent.
pub fn load_project_media(loaded: &LoadedProject, options: &MediaOptions) -> SessionMedia {
    let mut media = SessionMedia::empty(loaded.project.scenes.len());

    for (index, scene) in loaded.project.scenes.iter().enumerate() {
        let Some(locator) = scene.visual.as_ref() else {
            tracing::warn!(scene = index, "Scene has no visual; a placeholder will be shown");
            continue;
        };
        match open_visual(loaded, locator, options) {
            Ok(source) => media.visuals[index] = Some(source),
            Err(e) => {
                let err = StudioError::source_unavailable(index, e.to_string());
                tracing::warn!(error = %err, "Scene source unavailable; a placeholder will be shown");
            }
        }
    }

    let tracks = [
        (TrackRole::Narration, loaded.project.narration.as_ref()),
        (TrackRole::Music, loaded.project.music.as_ref()),
    ];
    for (role, locator) in tracks {
        let Some(locator) = locator else {
            continue;
        };
        let path = loaded.resolve(locator);
        if !locator.is_url() && !path.exists() {
            tracing::warn!(track = role.as_str(), path = %path.display(), "Audio file missing; track will be silent");
            continue;
        }
        match PcmSource::from_file(&path, options.sample_rate, options.channels) {
            Ok(source) => {
                tracing::debug!(track = role.as_str(), samples = source.len_samples(), "Decoded audio track");
                media.audio.push(AudioTrack::new(role, source));
            }
            Err(e) => {
                tracing::warn!(track = role.as_str(), error = %e, "Audio decode failed; track will be silent");
            }
        }
    }

    media
}

fn open_visual(
    loaded: &LoadedProject,
    locator: &MediaLocator,
    options: &MediaOptions,
) -> StudioResult<Box<dyn VisualSource>> {
    let path = loaded.resolve(locator);
    if !locator.is_url() && !path.exists() {
        return Err(StudioError::FileNotFound { path });
    }

    let is_still = locator
        .extension()
        .is_some_and(|ext| STILL_IMAGE_EXTENSIONS.contains(&ext.as_str()));
    if is_still && !locator.is_url() {
        return Ok(Box::new(StillSource::from_file(&path)?));
    }

    Ok(Box::new(FfmpegVideoSource::new(
        path,
        options.fps,
        options.read_policy,
    )))
}
