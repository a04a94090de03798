//! Play a project's timeline in the terminal.
//!
//! Scene and soundtrack targets only log their transport changes; the
//! command prints each scene switch with its timeline position.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use adstudio_common::config::AppConfig;
use adstudio_project_model::LoadedProject;
use adstudio_render_engine::preview::{PlaybackTarget, PreviewPlayer};

struct LogTarget {
    label: String,
}

impl LogTarget {
    fn boxed(label: impl Into<String>) -> Box<dyn PlaybackTarget> {
        Box::new(Self {
            label: label.into(),
        })
    }
}

impl PlaybackTarget for LogTarget {
    fn set_playing(&mut self, playing: bool) {
        tracing::debug!(target_label = %self.label, playing, "Preview target transport");
    }

    fn set_visible(&mut self, visible: bool) {
        tracing::debug!(target_label = %self.label, visible, "Preview target visibility");
    }

    fn seek(&mut self, secs: f64) {
        tracing::debug!(target_label = %self.label, secs, "Preview target seek");
    }
}

pub async fn run(config: &AppConfig, path: PathBuf, speed: f64, start: f64) -> anyhow::Result<()> {
    if !(speed.is_finite() && speed > 0.0) {
        anyhow::bail!("Playback speed must be a positive number, got {speed}");
    }

    let project =
        LoadedProject::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
    let p = &project.project;

    let scenes = p
        .scenes
        .iter()
        .map(|scene| LogTarget::boxed(format!("scene-{}", scene.order)))
        .collect();
    let narration = p.narration.as_ref().map(|_| LogTarget::boxed("narration"));
    let music = p.music.as_ref().map(|_| LogTarget::boxed("music"));
    let mut player = PreviewPlayer::new(p.durations(), scenes, narration, music);

    println!("Previewing '{}' ({:.2}s)", p.title, p.total_duration());
    player.seek(start);
    if !player.play() {
        println!("Nothing to play: the timeline is empty.");
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_on_signal = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop_on_signal.store(true, Ordering::Relaxed);
        }
    });

    let period = Duration::from_secs_f64(1.0 / f64::from(config.export.tick_hz.max(1)));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut shown = None;
    let mut last = Instant::now();
    loop {
        let state = player.state();
        if state.active_scene_index != shown {
            shown = state.active_scene_index;
            if let Some(scene) = shown.and_then(|i| p.scenes.get(i)) {
                println!(
                    "  [{:>6.2}s] Scene {}{}",
                    state.current_time,
                    scene.order,
                    scene
                        .visible_caption()
                        .map(|c| format!(": \"{c}\""))
                        .unwrap_or_default()
                );
            }
        }

        if stop.load(Ordering::Relaxed) {
            player.pause();
            println!("  Stopped at {:.2}s", player.state().current_time);
            return Ok(());
        }

        interval.tick().await;
        let now = Instant::now();
        let step = player.tick(now.duration_since(last).as_secs_f64() * speed);
        last = now;
        if step.ended {
            println!("  [{:>6.2}s] End of timeline", p.total_duration());
            return Ok(());
        }
    }
}
