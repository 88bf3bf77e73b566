//! Generation orchestration and post-processing.
//!
//! [`runner`] ties the stages together: size the run from the timeline,
//! drive the [`TextGenerator`](promptline_llm::generator::TextGenerator)
//! chunk by chunk ([`orchestrator`]), then filter and reconcile the
//! candidates into the final timed sequence ([`post_process`]) and
//! describe the run ([`summary`]).

pub mod error;
pub mod orchestrator;
pub mod post_process;
pub mod runner;
pub mod summary;
