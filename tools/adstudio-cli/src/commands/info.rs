//! Show project information.

use std::path::PathBuf;

use adstudio_project_model::LoadedProject;
use adstudio_render_engine::activator::scene_offsets;
use adstudio_render_engine::codec::DEFAULT_PREFERENCE;

pub fn run(path: PathBuf, json: bool) -> anyhow::Result<()> {
    let project =
        LoadedProject::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&project.project)?);
        return Ok(());
    }

    let p = &project.project;
    let (width, height) = p.output_size();

    println!("Project: {}", p.title);
    println!("  Version: {}", p.version);
    println!("  Root: {}", project.root.display());
    println!("  Output: {width}x{height} ({}, {})", p.aspect_ratio, p.resolution);
    println!("  Duration: {:.2}s", p.total_duration());
    println!();

    println!("Scenes:");
    let durations = p.durations();
    let offsets = scene_offsets(&durations);
    for (scene, start) in p.scenes.iter().zip(offsets) {
        println!(
            "  #{} [{:>6.2}s - {:>6.2}s] {}",
            scene.order,
            start,
            start + scene.duration_secs.max(0.0),
            scene
                .visual
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "(no visual)".to_string())
        );
        if let Some(caption) = scene.visible_caption() {
            let overlay = scene.overlay_or_default();
            println!(
                "      Caption: \"{caption}\" ({}, {})",
                overlay.position, overlay.size
            );
        }
    }
    println!();

    println!("Soundtrack:");
    match &p.narration {
        Some(locator) => println!("  Narration: {locator}"),
        None => println!("  Narration: (none)"),
    }
    match &p.music {
        Some(locator) => println!("  Music: {locator}"),
        None => println!("  Music: (none)"),
    }
    println!();

    println!("Export file names:");
    for format in DEFAULT_PREFERENCE {
        println!(
            "  {:<10} {}",
            format.as_str(),
            p.export_file_name(format.extension())
        );
    }

    Ok(())
}
