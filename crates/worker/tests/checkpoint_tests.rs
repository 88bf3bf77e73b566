//! Integration tests for snapshot persistence and document output.

use std::path::Path;

use assert_matches::assert_matches;
use promptline_core::types::PromptCandidate;
use promptline_pipeline::error::PipelineError;
use promptline_pipeline::orchestrator::{FailedChunk, GenerationRun, NoCheckpoint, RunCheckpoint};
use promptline_pipeline::runner::{Pipeline, PipelineSettings};
use promptline_worker::checkpoint::{checkpoint_path_for, FileCheckpoint};
use promptline_worker::output::write_document;

use async_trait::async_trait;
use promptline_llm::error::GenerationError;
use promptline_llm::generator::{ChunkRequest, TextGenerator};
use tokio_util::sync::CancellationToken;

fn snapshot() -> GenerationRun {
    let mut run = GenerationRun::new(3, 19);
    run.processed_chunks = 2;
    run.candidates.push(PromptCandidate::new("Wide shot of a harbor", 0, 0, 0.0));
    run.failed_chunks.push(FailedChunk {
        chunk_index: 1,
        error: "timeout".into(),
    });
    run
}

// ---------------------------------------------------------------------------
// Snapshot file
// ---------------------------------------------------------------------------

#[test]
fn snapshot_path_appends_suffix() {
    assert_eq!(
        checkpoint_path_for(Path::new("out/book.prompts.json")),
        Path::new("out/book.prompts.json.partial.json")
    );
}

#[tokio::test]
async fn saved_snapshot_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCheckpoint::for_output(&dir.path().join("book.prompts.json"));

    store.save(&snapshot()).await.expect("save should succeed");
    assert_eq!(store.load().await, Some(snapshot()));
}

#[tokio::test]
async fn missing_snapshot_loads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCheckpoint::new(dir.path().join("absent.partial.json"));
    assert_eq!(store.load().await, None);
}

#[tokio::test]
async fn corrupt_snapshot_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.partial.json");
    std::fs::write(&path, b"{ not json").unwrap();

    assert_eq!(FileCheckpoint::new(&path).load().await, None);
}

#[tokio::test]
async fn clear_removes_snapshot_and_tolerates_absence() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCheckpoint::new(dir.path().join("run.partial.json"));

    store.save(&snapshot()).await.unwrap();
    assert!(store.path().exists());
    store.clear().await.unwrap();
    assert!(!store.path().exists());
    store.clear().await.expect("clearing twice is fine");
}

#[tokio::test]
async fn save_into_missing_directory_is_a_checkpoint_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCheckpoint::new(dir.path().join("nope").join("run.partial.json"));

    assert_matches!(
        store.save(&snapshot()).await,
        Err(PipelineError::Checkpoint(msg)) if msg.contains("run.partial.json")
    );
}

// ---------------------------------------------------------------------------
// Output document
// ---------------------------------------------------------------------------

struct FixedGenerator;

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn generate(&self, request: &ChunkRequest) -> Result<Vec<String>, GenerationError> {
        Ok((0..request.requested_count)
            .map(|i| format!("Wide shot of a lone figure {i} on a hill at dusk, warm light"))
            .collect())
    }
}

#[tokio::test]
async fn document_has_metadata_and_prompts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("story.prompts.json");

    let settings = PipelineSettings {
        filters: promptline_core::types::FilterConfig::disabled(),
        ..PipelineSettings::default()
    };
    let text = vec!["word"; 300].join(" ");
    let document = Pipeline::new(FixedGenerator, settings)
        .run(&text, None, &NoCheckpoint, &CancellationToken::new())
        .await
        .unwrap();

    write_document(&path, &document).await.unwrap();

    let written: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    let metadata = &written["metadata"];
    assert_eq!(metadata["target_count"], 20);
    assert_eq!(metadata["generation_count"], 23);
    assert_eq!(metadata["final_count"], 22);
    assert_eq!(metadata["buffer_factor"], 1.15);
    assert!(metadata["run_id"].is_string());
    assert!(metadata["started_at"].is_string());
    assert_eq!(written["prompts"].as_array().unwrap().len(), 22);
    assert!(written["prompts"][0]["id"].as_str().unwrap().starts_with("scene_0_"));
    assert_eq!(written["prompts"][0]["timestamp"], 0.0);
}
