//! `promptline-worker` -- converts a narrative text file into a timed
//! sequence of image prompts.
//!
//! Reads the input, sizes the run from the narration timeline, asks the
//! configured LLM provider for prompts chunk by chunk, filters and
//! reconciles them, and writes `{ metadata, prompts }` as JSON.
//!
//! Progress is snapshotted next to the output after every chunk. Ctrl-C
//! lets the request in flight finish, then stops and writes what was
//! generated so far;
//! rerunning with the same settings resumes from the snapshot. See
//! [`WorkerConfig::from_env`] for the environment variables.

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use promptline_llm::client::ChatClient;
use promptline_llm::retry::RetryingGenerator;
use promptline_pipeline::error::PipelineError;
use promptline_pipeline::orchestrator::RunCheckpoint;
use promptline_pipeline::runner::Pipeline;
use promptline_worker::checkpoint::FileCheckpoint;
use promptline_worker::config::WorkerConfig;
use promptline_worker::output::write_document;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "promptline_worker=info,promptline_pipeline=info,promptline_llm=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env().context("invalid configuration")?;

    tracing::info!(
        input = %config.input.display(),
        output = %config.output.display(),
        provider = config.llm.provider.as_str(),
        model = %config.llm.model,
        "Starting promptline-worker",
    );

    let text = tokio::fs::read_to_string(&config.input)
        .await
        .with_context(|| format!("cannot read input {}", config.input.display()))?;

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let client = ChatClient::new(config.llm.clone()).context("cannot build HTTP client")?;
    let generator = RetryingGenerator::new(client, config.retry.clone(), cancel.clone());
    let pipeline = Pipeline::new(generator, config.pipeline.clone());

    let checkpoint = FileCheckpoint::for_output(&config.output);
    let prior = checkpoint.load().await;

    let document = match pipeline.run(&text, prior, &checkpoint, &cancel).await {
        Ok(document) => document,
        Err(PipelineError::CollaboratorPermanent {
            chunk_index,
            message,
            partial,
        }) => {
            // Keep the finished chunks so a corrected configuration can resume.
            checkpoint.save(&partial).await?;
            anyhow::bail!(
                "chunk {chunk_index} failed permanently: {message} (progress saved to {})",
                checkpoint.path().display()
            );
        }
        Err(e) => return Err(e.into()),
    };

    write_document(&config.output, &document)
        .await
        .with_context(|| format!("cannot write output {}", config.output.display()))?;

    if document.metadata.cancelled {
        tracing::warn!(
            snapshot = %checkpoint.path().display(),
            "Run was cancelled; output is partial and the snapshot is kept for resume",
        );
    } else {
        checkpoint
            .clear()
            .await
            .with_context(|| format!("cannot remove snapshot {}", checkpoint.path().display()))?;
    }

    for warning in &document.metadata.warnings {
        tracing::warn!("{warning}");
    }
    tracing::info!(
        final_count = document.metadata.final_count,
        target_count = document.metadata.target_count,
        "Done",
    );
    Ok(())
}

/// Cancel `token` on the first Ctrl-C.
fn spawn_ctrl_c_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, stopping after the current chunk");
            token.cancel();
        }
    });
}
