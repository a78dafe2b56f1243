//! Local, one-shot processing of a demo file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use console::style;

use crate::config::Settings;
use crate::pipeline::DemoProcessor;
use crate::utils::{download_name, format_size, sanitize_upload_name};

/// Run the full pipeline on `file` and write the archive to `output`.
pub async fn cmd_process(settings: &Settings, file: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    if !file.is_file() {
        anyhow::bail!("{} is not a file", file.display());
    }

    let processor = DemoProcessor::from_settings(settings)?;
    let name = sanitize_upload_name(file.file_name().and_then(|n| n.to_str()));
    let destination = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(download_name(&name)));

    println!(
        "{} Analyzing {} with {}",
        style("→").cyan(),
        file.display(),
        settings.analyzer.command
    );

    let lease = processor.allocate()?;
    let input = lease.input_dir().join(&name);
    tokio::fs::copy(file, &input)
        .await
        .with_context(|| format!("failed to copy {} into workspace", file.display()))?;

    let archive = processor.analyze_and_package(&lease, &input).await?;
    let size = tokio::fs::copy(&archive, &destination)
        .await
        .with_context(|| format!("failed to write {}", destination.display()))?;

    lease.release();

    println!(
        "  {} Wrote {} ({})",
        style("✓").green(),
        destination.display(),
        format_size(size)
    );
    Ok(())
}
