//! ffmpeg subprocess backend: encoder probing, muxing and decoding.
//!
//! We drive the system `ffmpeg`/`ffprobe` binaries rather than linking
//! libav, so nothing beyond a working `ffmpeg` on `PATH` is required.
//!
//! Muxing happens in two passes. While recording, raw RGBA frames are piped
//! into an encoder process writing a video-only intermediate file, and mixed
//! PCM is appended to a raw f32 file. `finish` then muxes both into the
//! target container with the video stream copied.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use adstudio_common::error::{StudioError, StudioResult};
use image::RgbaImage;

use crate::codec::{ContainerFormat, EncoderProbe};
use crate::sink::{AudioSink, CaptureSpec, FrameSink, Muxer, MuxerFactory};

/// Size of the chunks the finished container is returned in.
const OUTPUT_CHUNK_BYTES: usize = 256 * 1024;

/// Check whether a binary is on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Width and height of the first video stream.
pub fn probe_video_dimensions(path: &Path) -> Option<(u32, u32)> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0:s=x",
        ])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let raw = String::from_utf8(output.stdout).ok()?;
    let line = raw.lines().next()?.trim();
    let (w, h) = line.split_once('x')?;
    let width = w.parse::<u32>().ok()?;
    let height = h.parse::<u32>().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}

/// Decode any audio file to interleaved f32 PCM at the given layout.
///
/// Files without an audio stream decode to silence (an empty buffer).
pub fn decode_audio_f32(path: &Path, sample_rate: u32, channels: u16) -> StudioResult<Vec<f32>> {
    let out = Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            &channels.to_string(),
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| StudioError::audio(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !out.status.success() {
        let msg = String::from_utf8_lossy(&out.stderr);
        if msg.contains("matches no streams")
            || msg.contains("Output file #0 does not contain any stream")
        {
            return Ok(Vec::new());
        }
        return Err(StudioError::audio(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            msg.trim()
        )));
    }

    if out.stdout.len() % 4 != 0 {
        return Err(StudioError::audio(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }

    Ok(out
        .stdout
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Encoder availability from `ffmpeg -encoders`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegProbe {
    encoders: HashSet<String>,
}

impl FfmpegProbe {
    /// Query the local ffmpeg build.
    pub fn detect() -> StudioResult<Self> {
        if !command_exists("ffmpeg") {
            return Err(StudioError::encoder_unsupported(
                "ffmpeg was not found in PATH",
            ));
        }

        let output = Command::new("ffmpeg")
            .args(["-hide_banner", "-encoders"])
            .output()
            .map_err(|e| StudioError::encoder_unsupported(format!("failed to run ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(StudioError::encoder_unsupported(format!(
                "ffmpeg -encoders failed (status {})",
                output.status
            )));
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        let probe = Self::from_listing(&listing);
        tracing::debug!(encoders = probe.encoders.len(), "Probed ffmpeg encoders");
        Ok(probe)
    }

    /// Parse the table printed by `ffmpeg -encoders`.
    pub fn from_listing(listing: &str) -> Self {
        let encoders = listing
            .lines()
            .skip_while(|line| !line.trim_start().starts_with("------"))
            .skip(1)
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let flags = fields.next()?;
                let name = fields.next()?;
                let kind = flags.chars().next()?;
                (flags.len() == 6 && matches!(kind, 'V' | 'A' | 'S')).then(|| name.to_string())
            })
            .collect();
        Self { encoders }
    }

    pub fn has_encoder(&self, name: &str) -> bool {
        self.encoders.contains(name)
    }
}

impl EncoderProbe for FfmpegProbe {
    fn supports(&self, format: ContainerFormat) -> bool {
        self.has_encoder(format.video_encoder()) && self.has_encoder(format.audio_encoder())
    }
}

/// Opens [`FfmpegMuxer`]s with their scratch files under `work_root`.
#[derive(Debug, Clone)]
pub struct FfmpegMuxerFactory {
    work_root: PathBuf,
}

impl FfmpegMuxerFactory {
    pub fn new(work_root: impl Into<PathBuf>) -> Self {
        Self {
            work_root: work_root.into(),
        }
    }
}

impl Default for FfmpegMuxerFactory {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl MuxerFactory for FfmpegMuxerFactory {
    fn open(&self, spec: &CaptureSpec) -> StudioResult<Box<dyn Muxer>> {
        Ok(Box::new(FfmpegMuxer::spawn(spec, &self.work_root)?))
    }
}

/// Two-pass ffmpeg muxer.
pub struct FfmpegMuxer {
    spec: CaptureSpec,
    work_dir: PathBuf,
    video_path: PathBuf,
    audio_path: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    audio: Option<BufWriter<File>>,
    frames: u64,
}

impl FfmpegMuxer {
    pub fn spawn(spec: &CaptureSpec, work_root: &Path) -> StudioResult<Self> {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f");
        let work_dir = work_root.join(format!("adstudio-export-{stamp}-{}", std::process::id()));
        std::fs::create_dir_all(&work_dir)?;

        let video_path = work_dir.join("video.mkv");
        let audio_path = work_dir.join("audio.f32le");
        let audio = BufWriter::new(File::create(&audio_path)?);

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", spec.width, spec.height),
            "-r",
            &spec.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
        ])
        .args(video_codec_args(spec))
        .arg(&video_path);

        tracing::debug!(
            format = %spec.format,
            width = spec.width,
            height = spec.height,
            fps = spec.fps,
            work_dir = %work_dir.display(),
            "Spawning ffmpeg video encoder"
        );

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                std::fs::remove_dir_all(&work_dir).ok();
                return Err(StudioError::render(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                )));
            }
        };

        let stdin = child.stdin.take();
        let stderr_task = child.stderr.take().map(drain_stderr);

        let mut muxer = Self {
            spec: spec.clone(),
            work_dir,
            video_path,
            audio_path,
            child: Some(child),
            stdin,
            stderr_task,
            audio: Some(audio),
            frames: 0,
        };

        if muxer.stdin.is_none() {
            muxer.kill();
            return Err(StudioError::render("failed to open ffmpeg stdin"));
        }
        Ok(muxer)
    }

    fn kill(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            child.kill().ok();
            child.wait().ok();
        }
        if let Some(task) = self.stderr_task.take() {
            task.join().ok();
        }
    }

    /// Close the encoder input and wait for the intermediate file.
    fn finish_video(&mut self) -> StudioResult<()> {
        drop(self.stdin.take());

        let Some(mut child) = self.child.take() else {
            return Err(StudioError::render("ffmpeg encoder is already finalized"));
        };
        let status = child
            .wait()
            .map_err(|e| StudioError::render(format!("failed to wait on ffmpeg: {e}")))?;
        let stderr = self
            .stderr_task
            .take()
            .and_then(|task| task.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(StudioError::render(format!(
                "ffmpeg video encode failed (status {status}): {}",
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn mux(&self, output_path: &Path) -> StudioResult<()> {
        let spec = &self.spec;
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-y", "-loglevel", "error", "-i"])
            .arg(&self.video_path)
            .args([
                "-f",
                "f32le",
                "-ar",
                &spec.sample_rate.to_string(),
                "-ac",
                &spec.channels.to_string(),
                "-i",
            ])
            .arg(&self.audio_path)
            .args([
                "-map",
                "0:v:0",
                "-map",
                "1:a:0",
                "-c:v",
                "copy",
                "-c:a",
                spec.format.audio_encoder(),
                "-b:a",
                &format!("{}k", spec.audio_bitrate_kbps.max(64)),
            ]);
        if spec.format.extension() == "mp4" {
            cmd.args(["-movflags", "+faststart"]);
        }
        cmd.arg(output_path);

        tracing::debug!(output = %output_path.display(), "Muxing export container");
        let output = cmd
            .output()
            .map_err(|e| StudioError::render(format!("failed to run ffmpeg mux: {e}")))?;
        if !output.status.success() {
            return Err(StudioError::render(format!(
                "ffmpeg mux failed (status {}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl FrameSink for FfmpegMuxer {
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

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(StudioError::render("ffmpeg encoder is already finalized"));
        };
        stdin.write_all(frame.as_raw()).map_err(|e| {
            StudioError::render(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.frames += 1;
        Ok(())
    }
}

impl AudioSink for FfmpegMuxer {
    fn write_audio(&mut self, samples: &[f32]) -> StudioResult<()> {
        let Some(audio) = self.audio.as_mut() else {
            return Err(StudioError::render("audio capture is already finalized"));
        };
        for sample in samples {
            audio.write_all(&sample.to_le_bytes())?;
        }
        Ok(())
    }
}

impl Muxer for FfmpegMuxer {
    fn format(&self) -> ContainerFormat {
        self.spec.format
    }

    fn finish(mut self: Box<Self>) -> StudioResult<Vec<Vec<u8>>> {
        if let Some(mut audio) = self.audio.take() {
            audio.flush()?;
        }
        self.finish_video()?;

        if self.frames == 0 {
            return Err(StudioError::render("no frames were captured"));
        }

        let output_path = self
            .work_dir
            .join(format!("output.{}", self.spec.format.extension()));
        self.mux(&output_path)?;

        let mut file = File::open(&output_path)?;
        let mut chunks = Vec::new();
        loop {
            let mut chunk = vec![0u8; OUTPUT_CHUNK_BYTES];
            let read = file.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            chunk.truncate(read);
            chunks.push(chunk);
        }

        tracing::info!(
            frames = self.frames,
            chunks = chunks.len(),
            format = %self.spec.format,
            "ffmpeg export finished"
        );
        Ok(chunks)
    }

    fn abort(mut self: Box<Self>) {
        tracing::debug!(work_dir = %self.work_dir.display(), "Aborting ffmpeg capture");
        self.kill();
    }
}

impl Drop for FfmpegMuxer {
    fn drop(&mut self) {
        self.kill();
        self.audio.take();
        if self.work_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.work_dir) {
                tracing::warn!(error = %e, dir = %self.work_dir.display(), "Failed to remove export scratch dir");
            }
        }
    }
}

fn video_codec_args(spec: &CaptureSpec) -> Vec<String> {
    let video_bitrate = format!("{}k", spec.video_bitrate_kbps.max(1000));
    let mut args = vec![
        "-c:v".to_string(),
        spec.format.video_encoder().to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-b:v".to_string(),
        video_bitrate,
    ];

    match spec.format {
        ContainerFormat::Mp4H264 => args.extend(
            ["-preset", "medium", "-profile:v", "high"]
                .into_iter()
                .map(String::from),
        ),
        ContainerFormat::WebmVp9 => args.extend(
            ["-deadline", "good", "-row-mt", "1"]
                .into_iter()
                .map(String::from),
        ),
        ContainerFormat::WebmVp8 => args.extend(["-deadline", "good"].into_iter().map(String::from)),
        ContainerFormat::Mp4Mpeg4 => {}
    }
    args
}

/// Drain stderr concurrently so ffmpeg never blocks on a full pipe.
fn drain_stderr(stderr: std::process::ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut output = String::new();
        match std::io::BufReader::new(stderr).read_to_string(&mut output) {
            Ok(_) => output,
            Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V....D mpeg4                MPEG-4 part 2
 V....D libvpx               libvpx VP8 (codec vp8)
 A....D aac                  AAC (Advanced Audio Coding)
 A....D libvorbis            libvorbis (codec vorbis)
";

    #[test]
    fn test_parse_encoder_listing() {
        let probe = FfmpegProbe::from_listing(LISTING);
        assert!(probe.has_encoder("libx264"));
        assert!(probe.has_encoder("aac"));
        // Legend lines above the separator are not encoders.
        assert!(!probe.has_encoder("="));
        assert!(!probe.has_encoder("libvpx-vp9"));
    }

    #[test]
    fn test_probe_requires_both_encoders() {
        let probe = FfmpegProbe::from_listing(LISTING);
        assert!(probe.supports(ContainerFormat::Mp4H264));
        assert!(probe.supports(ContainerFormat::WebmVp8));
        assert!(probe.supports(ContainerFormat::Mp4Mpeg4));
        assert!(!probe.supports(ContainerFormat::WebmVp9));
    }

    #[test]
    fn test_video_codec_args_per_format() {
        let mut spec = CaptureSpec {
            format: ContainerFormat::Mp4H264,
            width: 1280,
            height: 720,
            fps: 30,
            sample_rate: 48_000,
            channels: 2,
            video_bitrate_kbps: 200,
            audio_bitrate_kbps: 192,
        };
        let args = video_codec_args(&spec);
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-b:v", "1000k"]));

        spec.format = ContainerFormat::Mp4Mpeg4;
        let args = video_codec_args(&spec);
        assert!(args.windows(2).any(|w| w == ["-c:v", "mpeg4"]));
        assert!(!args.iter().any(|a| a == "-preset"));
    }
}
