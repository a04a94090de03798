//! Export a project to its final mix.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use adstudio_common::config::AppConfig;
use adstudio_project_model::LoadedProject;
use adstudio_render_engine::codec::{EncoderProbe, StaticProbe};
use adstudio_render_engine::ffmpeg::{FfmpegMuxerFactory, FfmpegProbe};
use adstudio_render_engine::media::{load_project_media, MediaOptions, ReadPolicy};
use adstudio_render_engine::sink::{MemoryMuxerFactory, MuxerFactory};
use adstudio_render_engine::{
    run_export, ExportController, ExportOptions, ExportProgress, ExportSettings, ExportStage,
    Pacing, ProgressCallback,
};

pub struct ExportArgs {
    pub path: PathBuf,
    pub output: Option<PathBuf>,
    pub formats: Vec<String>,
    pub fps: Option<u32>,
    pub offline: bool,
    pub dry_run: bool,
}

pub async fn run(config: &AppConfig, args: ExportArgs) -> anyhow::Result<()> {
    println!("Exporting project at: {}", args.path.display());

    let project = LoadedProject::load(&args.path)
        .map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
    project
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid project: {e}"))?;
    for issue in project.validate_sources() {
        println!("  [WARN] {issue}");
    }

    let mut defaults = config.export.clone();
    if !args.formats.is_empty() {
        defaults.formats = args.formats;
    }
    if let Some(fps) = args.fps {
        defaults.fps = fps;
    }
    let settings = ExportSettings::from_defaults(&defaults)?;

    let media = load_project_media(
        &project,
        &MediaOptions {
            fps: settings.fps,
            sample_rate: settings.sample_rate,
            channels: settings.channels,
            read_policy: if args.offline {
                ReadPolicy::Wait
            } else {
                ReadPolicy::Skip
            },
        },
    );

    let (probe, muxers): (Box<dyn EncoderProbe + Send>, Box<dyn MuxerFactory>) = if args.dry_run
    {
        (
            Box::new(StaticProbe::all()),
            Box::new(MemoryMuxerFactory::new()),
        )
    } else {
        (
            Box::new(FfmpegProbe::detect()?),
            Box::new(FfmpegMuxerFactory::default()),
        )
    };

    let (width, height) = project.project.output_size();
    println!("  Title: {}", project.project.title);
    println!("  Output: {width}x{height} @ {}fps", settings.fps);
    println!("  Duration: {:.2}s", project.project.total_duration());
    println!(
        "  Formats: {}",
        settings
            .formats
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "  Pacing: {}",
        if args.offline { "offline" } else { "real time" }
    );

    let pacing = if args.offline {
        Pacing::Offline
    } else {
        Pacing::RealTime {
            tick_hz: defaults.tick_hz,
        }
    };
    let mut controller = ExportController::new(project.project, media, settings, probe, muxers);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_on_signal = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received; finalizing partial export");
            stop_on_signal.store(true, Ordering::Relaxed);
        }
    });

    let progress: ProgressCallback = Box::new(|p: ExportProgress| {
        match p.stage {
            ExportStage::Recording => print!(
                "\r  Progress: {:.1}% ({}/{} frames, ETA: {:.0}s)  ",
                p.progress * 100.0,
                p.frames_rendered,
                p.total_frames,
                p.eta_secs
            ),
            ExportStage::Finalizing => print!("\r  Finalizing...{:40}", ""),
            _ => {}
        }
        let _ = std::io::stdout().flush();
    });

    let options = ExportOptions {
        pacing,
        ..ExportOptions::default()
    };
    let result = run_export(&mut controller, options, stop, Some(progress)).await;

    match result {
        Ok(artifact) => {
            if args.dry_run {
                println!(
                    "\nDry run complete: {} ({} frames, {} audio frames, {:.2}s)",
                    artifact.file_name, artifact.frames, artifact.audio_frames, artifact.duration_secs
                );
                return Ok(());
            }
            let dir = args.output.unwrap_or_else(|| config.exports_dir.clone());
            let path = artifact.write_to(&dir)?;
            println!(
                "\nExport complete: {} ({}, {:.1} MB, {} frames)",
                path.display(),
                artifact.mime_type(),
                artifact.bytes.len() as f64 / (1024.0 * 1024.0),
                artifact.frames
            );
            Ok(())
        }
        Err(e) => {
            println!("\nExport failed: {e}");
            Err(e.into())
        }
    }
}
