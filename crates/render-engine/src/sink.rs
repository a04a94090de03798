//! Capture sinks: where composited frames and mixed audio go.
//!
//! A [`Muxer`] accepts both streams and produces the container bytes when
//! finished. The ffmpeg implementation lives in [`crate::ffmpeg`];
//! [`MemoryMuxer`] records what it was given and is used for dry runs.

use std::sync::{Arc, Mutex};

use adstudio_common::error::{StudioError, StudioResult};
use image::RgbaImage;
use serde::Serialize;

use crate::codec::ContainerFormat;

/// Accepts composited RGBA frames.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbaImage) -> StudioResult<()>;
}

/// Accepts interleaved f32 PCM at the session sample rate.
pub trait AudioSink {
    fn write_audio(&mut self, samples: &[f32]) -> StudioResult<()>;
}

/// Combines both streams into one container.
pub trait Muxer: FrameSink + AudioSink + Send {
    fn format(&self) -> ContainerFormat;

    /// Flush and return the encoded container as chunks.
    fn finish(self: Box<Self>) -> StudioResult<Vec<Vec<u8>>>;

    /// Discard everything written so far.
    fn abort(self: Box<Self>);
}

/// Opens a muxer for a negotiated capture.
pub trait MuxerFactory: Send {
    fn open(&self, spec: &CaptureSpec) -> StudioResult<Box<dyn Muxer>>;
}

/// Parameters of one capture session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureSpec {
    pub format: ContainerFormat,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub sample_rate: u32,
    pub channels: u16,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
}

/// What a [`MemoryMuxer`] has received.
#[derive(Debug, Clone, Default)]
pub struct CaptureStats {
    pub spec: Option<CaptureSpec>,
    pub frames: u64,
    pub audio_samples: u64,
    pub peak_amplitude: f32,
    pub last_frame: Option<RgbaImage>,
    pub finished: bool,
    pub aborted: bool,
}

impl CaptureStats {
    /// Audio frames (samples per channel) received.
    pub fn audio_frames(&self) -> u64 {
        let channels = self.spec.as_ref().map(|s| s.channels.max(1)).unwrap_or(1);
        self.audio_samples / u64::from(channels)
    }
}

#[derive(Debug, Serialize)]
struct CaptureSummary<'a> {
    spec: &'a CaptureSpec,
    frames: u64,
    audio_samples: u64,
    duration_secs: f64,
}

/// In-memory muxer; the "container" is a JSON summary of the capture.
pub struct MemoryMuxer {
    spec: CaptureSpec,
    stats: Arc<Mutex<CaptureStats>>,
    fail_after_frames: Option<u64>,
}

impl MemoryMuxer {
    fn update(&self, f: impl FnOnce(&mut CaptureStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }

    fn frames(&self) -> u64 {
        self.stats.lock().map(|s| s.frames).unwrap_or(0)
    }
}

impl FrameSink for MemoryMuxer {
    fn write_frame(&mut self, frame: &RgbaImage) -> StudioResult<()> {
        if frame.dimensions() != (self.spec.width, self.spec.height) {
            return Err(StudioError::render(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                self.spec.width,
                self.spec.height
            )));
        }
        if let Some(limit) = self.fail_after_frames {
            if self.frames() >= limit {
                return Err(StudioError::render("capture sink rejected frame"));
            }
        }
        self.update(|stats| {
            stats.frames += 1;
            stats.last_frame = Some(frame.clone());
        });
        Ok(())
    }
}

impl AudioSink for MemoryMuxer {
    fn write_audio(&mut self, samples: &[f32]) -> StudioResult<()> {
        let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        self.update(|stats| {
            stats.audio_samples += samples.len() as u64;
            stats.peak_amplitude = stats.peak_amplitude.max(peak);
        });
        Ok(())
    }
}

impl Muxer for MemoryMuxer {
    fn format(&self) -> ContainerFormat {
        self.spec.format
    }

    fn finish(self: Box<Self>) -> StudioResult<Vec<Vec<u8>>> {
        let stats = self
            .stats
            .lock()
            .map_err(|_| StudioError::render("capture stats lock poisoned"))?
            .clone();
        let summary = CaptureSummary {
            spec: &self.spec,
            frames: stats.frames,
            audio_samples: stats.audio_samples,
            duration_secs: stats.frames as f64 / self.spec.fps.max(1) as f64,
        };
        let bytes = serde_json::to_vec_pretty(&summary)?;
        self.update(|stats| stats.finished = true);
        Ok(vec![bytes])
    }

    fn abort(self: Box<Self>) {
        self.update(|stats| stats.aborted = true);
    }
}

/// Opens [`MemoryMuxer`]s that all report into one shared [`CaptureStats`].
#[derive(Clone, Default)]
pub struct MemoryMuxerFactory {
    stats: Arc<Mutex<CaptureStats>>,
    fail_after_frames: Option<u64>,
}

impl MemoryMuxerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every opened muxer reject frames after `frames` have been written.
    pub fn failing_after(frames: u64) -> Self {
        Self {
            fail_after_frames: Some(frames),
            ..Self::default()
        }
    }

    pub fn stats(&self) -> Arc<Mutex<CaptureStats>> {
        Arc::clone(&self.stats)
    }
}

impl MuxerFactory for MemoryMuxerFactory {
    fn open(&self, spec: &CaptureSpec) -> StudioResult<Box<dyn Muxer>> {
        if let Ok(mut stats) = self.stats.lock() {
            *stats = CaptureStats {
                spec: Some(spec.clone()),
                ..CaptureStats::default()
            };
        }
        Ok(Box::new(MemoryMuxer {
            spec: spec.clone(),
            stats: Arc::clone(&self.stats),
            fail_after_frames: self.fail_after_frames,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> CaptureSpec {
        CaptureSpec {
            format: ContainerFormat::Mp4H264,
            width: 4,
            height: 2,
            fps: 10,
            sample_rate: 100,
            channels: 2,
            video_bitrate_kbps: 8000,
            audio_bitrate_kbps: 192,
        }
    }

    #[test]
    fn test_memory_muxer_records_streams() {
        let factory = MemoryMuxerFactory::new();
        let mut muxer = factory.open(&spec()).unwrap();
        muxer.write_frame(&RgbaImage::new(4, 2)).unwrap();
        muxer.write_frame(&RgbaImage::new(4, 2)).unwrap();
        muxer.write_audio(&[0.5, -0.75, 0.1, 0.1]).unwrap();

        let chunks = muxer.finish().unwrap();
        let summary: serde_json::Value = serde_json::from_slice(&chunks[0]).unwrap();
        assert_eq!(summary["frames"], 2);

        let stats = factory.stats();
        let stats = stats.lock().unwrap();
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.audio_frames(), 2);
        assert!((stats.peak_amplitude - 0.75).abs() < f32::EPSILON);
        assert!(stats.finished);
    }

    #[test]
    fn test_memory_muxer_rejects_wrong_size_and_after_limit() {
        let factory = MemoryMuxerFactory::failing_after(1);
        let mut muxer = factory.open(&spec()).unwrap();
        assert!(muxer.write_frame(&RgbaImage::new(2, 2)).is_err());
        muxer.write_frame(&RgbaImage::new(4, 2)).unwrap();
        assert!(muxer.write_frame(&RgbaImage::new(4, 2)).is_err());
        muxer.abort();
        assert!(factory.stats().lock().unwrap().aborted);
    }
}
