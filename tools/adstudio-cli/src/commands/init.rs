//! Initialize a new Ad Studio project.

use std::path::PathBuf;

use adstudio_project_model::{sanitize_title, AspectRatio, LoadedProject};

pub fn run(title: String, output: Option<PathBuf>, aspect: String) -> anyhow::Result<()> {
    let aspect_ratio: AspectRatio = aspect.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let project_dir = output.unwrap_or_else(|| PathBuf::from(sanitize_title(&title)));
    println!("Creating project '{}' at {}", title, project_dir.display());

    let project = LoadedProject::create(&project_dir, &title, aspect_ratio)
        .map_err(|e| anyhow::anyhow!("Failed to create project: {e}"))?;

    let (width, height) = project.project.output_size();
    println!("Project created successfully:");
    println!("  Directory: {}", project.root.display());
    println!("  Aspect ratio: {aspect_ratio}");
    println!("  Output: {width}x{height}");
    println!(
        "  Scenes: {} ({:.1}s total)",
        project.project.scenes.len(),
        project.project.total_duration()
    );
    println!();
    println!("Directory structure:");
    println!("  {}/", project_dir.display());
    println!("  ├── project.json (scenes, captions, soundtrack)");
    println!("  └── media/       (scene clips, narration, music)");

    Ok(())
}
