use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use adstudio_common::error::StudioError;
use adstudio_project_model::project::Project;
use adstudio_project_model::scene::{AspectRatio, OverlayConfig, OverlayPosition, OverlaySize, Scene};
use adstudio_render_engine::codec::{ContainerFormat, StaticProbe};
use adstudio_render_engine::compositor::{layout_caption, TextMeasure};
use adstudio_render_engine::media::{AudioTrack, PcmSource, SessionMedia, StillSource, TrackRole};
use adstudio_render_engine::sink::MemoryMuxerFactory;
use adstudio_render_engine::{
    run_export, ExportController, ExportOptions, ExportPhase, ExportProgress, ExportSettings,
    ExportStage, Pacing, Sequencer,
};

const FPS: u32 = 5;
const SAMPLE_RATE: u32 = 100;

/// Every glyph advances 0.6 em.
struct MonospaceMeasure;

impl TextMeasure for MonospaceMeasure {
    fn measure(&self, text: &str, font_px: f32) -> f32 {
        text.chars().count() as f32 * font_px * 0.6
    }
}

fn two_scene_project() -> Project {
    let mut project = Project::new("Summer Launch", AspectRatio::Landscape);
    project.scenes = vec![
        Scene::new(0, 4.0).with_caption("Meet the new bottle"),
        Scene::new(1, 6.0),
    ];
    project
}

fn media(project: &Project) -> SessionMedia {
    let seconds = project.total_duration();
    let frames = (seconds * SAMPLE_RATE as f64) as usize;
    SessionMedia::empty(project.scenes.len())
        .with_visual(0, StillSource::solid("intro", 640, 480, [30, 120, 200, 255]))
        .with_audio(AudioTrack::new(
            TrackRole::Narration,
            PcmSource::new("narration", vec![0.5; frames * 2]),
        ))
        .with_audio(AudioTrack::new(
            TrackRole::Music,
            PcmSource::new("music", vec![0.5; frames * 2]),
        ))
}

fn settings(formats: Vec<ContainerFormat>) -> ExportSettings {
    ExportSettings {
        fps: FPS,
        sample_rate: SAMPLE_RATE,
        formats,
        ..ExportSettings::default()
    }
}

fn controller(project: Project, probe: StaticProbe, factory: &MemoryMuxerFactory) -> ExportController {
    let media = media(&project);
    ExportController::new(
        project,
        media,
        settings(vec![
            ContainerFormat::Mp4H264,
            ContainerFormat::WebmVp9,
            ContainerFormat::Mp4Mpeg4,
        ]),
        Box::new(probe),
        Box::new(factory.clone()),
    )
}

fn offline() -> ExportOptions {
    ExportOptions {
        pacing: Pacing::Offline,
        progress_hz: 1000,
    }
}

#[test]
fn scene_timeline_activates_and_ends() {
    let mut seq = Sequencer::new(vec![4.0, 6.0]);
    assert!((seq.total_duration() - 10.0).abs() < 1e-12);

    seq.seek(3.0);
    assert_eq!(seq.active_index(), Some(0));
    seq.seek(4.0);
    assert_eq!(seq.active_index(), Some(1));
    seq.seek(9.9);
    assert_eq!(seq.active_index(), Some(1));

    assert!(seq.start());
    let step = seq.tick(0.2);
    assert!(step.ended);
    assert_eq!(seq.current_time(), 0.0);
    assert!(!seq.is_playing());
}

#[tokio::test]
async fn empty_timeline_is_rejected_without_side_effects() {
    let factory = MemoryMuxerFactory::new();
    let project = Project::new("Nothing", AspectRatio::Landscape);
    let mut ctrl = controller(project, StaticProbe::all(), &factory);

    assert!(matches!(ctrl.start_export(), Err(StudioError::EmptyTimeline)));
    assert_eq!(ctrl.phase(), ExportPhase::Idle);

    let result = run_export(&mut ctrl, offline(), Arc::new(AtomicBool::new(false)), None).await;
    assert!(matches!(result, Err(StudioError::EmptyTimeline)));
    assert_eq!(ctrl.phase(), ExportPhase::Idle);
    assert!(factory.stats().lock().unwrap().spec.is_none());
}

#[test]
fn bottom_right_small_caption_on_720p() {
    let text = "Cold brew concentrate made in small batches, shipped the same day, \
                and ready to pour over ice whenever the afternoon slump arrives";
    let config = OverlayConfig {
        position: OverlayPosition::BottomRight,
        size: OverlaySize::Small,
    };
    let layout = layout_caption(text, &config, 1280, 720, &MonospaceMeasure);

    assert!(layout.lines.len() >= 2, "caption should wrap");
    for line in &layout.lines {
        assert!(line.width <= 1280.0 * 0.8 + 1e-3);
        assert!((line.x + line.width - (1280.0 - 64.0)).abs() < 1e-3);
    }
    let (left, top, right, bottom) = layout.bounds().expect("non-empty layout");
    assert!(left >= 0.0 && top >= 0.0);
    assert!((right - 1216.0).abs() < 1e-3);
    assert!((bottom - 656.0).abs() < 1e-3);
}

#[test]
fn second_start_while_recording_is_rejected() {
    let factory = MemoryMuxerFactory::new();
    let mut ctrl = controller(two_scene_project(), StaticProbe::all(), &factory);

    ctrl.start_export().expect("first export starts");
    ctrl.tick(1.0);
    let frames_before = factory.stats().lock().unwrap().frames;
    assert!(frames_before > 0);

    match ctrl.start_export() {
        Err(StudioError::ExportBusy { phase }) => assert_eq!(phase, "recording"),
        other => panic!("expected ExportBusy, got {other:?}"),
    }
    assert_eq!(ctrl.phase(), ExportPhase::Recording);
    // The running capture was not reopened.
    assert_eq!(factory.stats().lock().unwrap().frames, frames_before);

    ctrl.tick(20.0);
    let artifact = ctrl.finalize().expect("export finishes");
    assert_eq!(artifact.frames, 50);
}

#[tokio::test]
async fn codec_fallback_selects_supported_container() {
    let factory = MemoryMuxerFactory::new();
    let probe = StaticProbe::new([ContainerFormat::WebmVp9]);
    let mut ctrl = controller(two_scene_project(), probe, &factory);

    let artifact = run_export(&mut ctrl, offline(), Arc::new(AtomicBool::new(false)), None)
        .await
        .expect("export succeeds");

    assert_eq!(artifact.format, ContainerFormat::WebmVp9);
    assert_eq!(artifact.file_name, "Summer_Launch_final_mix.webm");
    assert_eq!(artifact.mime_type(), "video/webm");
    let stats = factory.stats();
    let spec = stats.lock().unwrap().spec.clone().expect("capture opened");
    assert_eq!(spec.format, ContainerFormat::WebmVp9);
}

#[tokio::test]
async fn no_supported_container_fails_setup() {
    let factory = MemoryMuxerFactory::new();
    let mut ctrl = controller(two_scene_project(), StaticProbe::default(), &factory);

    let result = run_export(&mut ctrl, offline(), Arc::new(AtomicBool::new(false)), None).await;
    assert!(matches!(result, Err(StudioError::EncoderUnsupported { .. })));
    assert_eq!(ctrl.phase(), ExportPhase::Error);

    ctrl.acknowledge_error();
    assert_eq!(ctrl.phase(), ExportPhase::Idle);
}

#[tokio::test]
async fn offline_round_trip_matches_timeline_length() {
    let factory = MemoryMuxerFactory::new();
    let mut ctrl = controller(two_scene_project(), StaticProbe::all(), &factory);
    let stages = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&stages);

    let artifact = run_export(
        &mut ctrl,
        offline(),
        Arc::new(AtomicBool::new(false)),
        Some(Box::new(move |p: ExportProgress| seen.lock().unwrap().push(p.stage))),
    )
    .await
    .expect("export succeeds");

    let expected = 10.0;
    assert!((artifact.duration_secs - expected).abs() <= 1.0 / FPS as f64);
    assert_eq!(artifact.frames, 50);
    assert_eq!(artifact.audio_frames, 1000);
    assert_eq!(ctrl.phase(), ExportPhase::Idle);

    let summary: serde_json::Value = serde_json::from_slice(&artifact.bytes).expect("summary json");
    assert_eq!(summary["frames"], 50);

    let stats = factory.stats();
    let stats = stats.lock().unwrap();
    assert!(stats.finished);
    // Narration at 0.5 plus music at 0.5 x 0.6.
    assert!((stats.peak_amplitude - 0.8).abs() < 1e-5);
    let last = stats.last_frame.as_ref().expect("frames captured");
    assert_eq!(last.dimensions(), (1280, 720));

    let stages = stages.lock().unwrap();
    assert_eq!(stages.first(), Some(&ExportStage::Preparing));
    assert_eq!(stages.last(), Some(&ExportStage::Complete));
}

#[tokio::test]
async fn stop_flag_finalizes_partial_export() {
    let factory = MemoryMuxerFactory::new();
    let mut ctrl = controller(two_scene_project(), StaticProbe::all(), &factory);

    let artifact = run_export(&mut ctrl, offline(), Arc::new(AtomicBool::new(true)), None)
        .await
        .expect("stopped export still finalizes");
    assert!(artifact.frames < 50);
    assert_eq!(ctrl.phase(), ExportPhase::Idle);
}

#[tokio::test]
async fn real_time_pacing_completes_short_timeline() {
    let factory = MemoryMuxerFactory::new();
    let mut project = Project::new("Flash", AspectRatio::Portrait);
    project.scenes = vec![Scene::new(0, 0.2)];
    let mut ctrl = controller(project, StaticProbe::all(), &factory);

    let options = ExportOptions {
        pacing: Pacing::RealTime { tick_hz: 200 },
        progress_hz: 10,
    };
    let artifact = run_export(&mut ctrl, options, Arc::new(AtomicBool::new(false)), None)
        .await
        .expect("export succeeds");
    assert_eq!(artifact.frames, 1);
    let stats = factory.stats();
    let spec = stats.lock().unwrap().spec.clone().expect("capture opened");
    assert_eq!((spec.width, spec.height), (720, 1280));
}
