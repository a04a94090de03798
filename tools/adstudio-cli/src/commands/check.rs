//! Check system capabilities.

use adstudio_common::config::{config_file_path, AppConfig};
use adstudio_render_engine::codec::{negotiate_format, EncoderProbe, DEFAULT_PREFERENCE};
use adstudio_render_engine::compositor::CaptionRenderer;
use adstudio_render_engine::export::ExportSettings;
use adstudio_render_engine::ffmpeg::{command_exists, FfmpegProbe};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Ad Studio System Check");
    println!("{}", "=".repeat(50));

    for tool in ["ffmpeg", "ffprobe"] {
        if command_exists(tool) {
            println!("[OK] {tool} found in PATH");
        } else {
            println!("[WARN] {tool} not found in PATH");
        }
    }

    println!();
    let ready = match FfmpegProbe::detect() {
        Ok(probe) => {
            println!("Containers:");
            for format in DEFAULT_PREFERENCE {
                let status = if probe.supports(format) { "OK" } else { "--" };
                println!(
                    "  [{status}] {:<10} ({} + {})",
                    format.as_str(),
                    format.video_encoder(),
                    format.audio_encoder()
                );
            }

            match ExportSettings::from_defaults(&config.export) {
                Ok(settings) => match negotiate_format(&settings.formats, &probe) {
                    Ok(format) => {
                        println!("[OK] Export will use {}", format.as_str());
                        true
                    }
                    Err(e) => {
                        println!("[WARN] {e}");
                        false
                    }
                },
                Err(e) => {
                    println!("[WARN] Export defaults: {e}");
                    false
                }
            }
        }
        Err(e) => {
            println!("[WARN] {e}");
            false
        }
    };

    println!();
    let captions = CaptionRenderer::load(config.export.caption_font.as_deref());
    if captions.is_available() {
        println!("[OK] Caption font loaded");
    } else {
        println!("[WARN] No caption font found; captions will be skipped");
    }
    println!("     Config: {}", config_file_path().display());
    println!("     Exports: {}", config.exports_dir.display());

    println!();
    if ready {
        println!("Export pipeline is ready.");
    } else {
        println!("Export is not available. Install ffmpeg with a supported encoder pair.");
    }

    Ok(())
}
