//! `bashbot model-info` — Save a model's metadata report.

use bashbot_providers::{ModelInfo, OllamaProvider};
use std::path::Path;

use super::{CmdResult, load_config};

pub async fn run(model: &str, output_dir: &Path) -> CmdResult {
    let config = load_config()?;
    let provider = OllamaProvider::from_config(&config)?;

    let info = provider.show_model(model).await?;
    let path = output_dir.join(ModelInfo::report_file_name(model));
    std::fs::write(&path, info.render_report(model))
        .map_err(|e| format!("Failed to write {}: {e}", path.display()))?;

    println!("Model information saved to {}", path.display());
    Ok(())
}
