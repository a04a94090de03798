//! Validate an Ad Studio project.

use std::path::PathBuf;

use adstudio_project_model::LoadedProject;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating project at: {}", path.display());

    let project =
        LoadedProject::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    println!("  Title: {}", project.project.title);
    println!("  Version: {}", project.project.version);
    println!("  Scenes: {}", project.project.scenes.len());
    println!("  Duration: {:.2}s", project.project.total_duration());

    let mut errors = Vec::new();
    if let Err(e) = project.validate() {
        errors.push(e.to_string());
    }
    errors.extend(project.validate_sources());

    if errors.is_empty() {
        println!("  Sources: All present");
        println!("\nProject is valid.");
    } else {
        println!("\nValidation issues:");
        for error in &errors {
            println!("  - {error}");
        }
        println!(
            "\n{} issue(s) found. Missing sources render as placeholders or silence.",
            errors.len()
        );
    }

    Ok(())
}
