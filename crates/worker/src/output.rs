//! Final document output.

use std::path::Path;

use promptline_pipeline::summary::OutputDocument;

/// Write `document` as pretty-printed JSON, creating parent directories.
pub async fn write_document(path: &Path, document: &OutputDocument) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(document)?;
    tokio::fs::write(path, json).await?;

    tracing::info!(
        path = %path.display(),
        prompts = document.prompts.len(),
        "Wrote prompt document",
    );
    Ok(())
}
