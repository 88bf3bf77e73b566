//! Pure domain logic for turning narrated text into a timed sequence of
//! image prompts.
//!
//! Everything here is synchronous and free of I/O: timeline sizing, text
//! chunking, prompt similarity and deduplication, quality scoring,
//! over-generation estimation and count reconciliation.

pub mod bounds;
pub mod buffer;
pub mod enhancement;
pub mod error;
pub mod quality;
pub mod reconcile;
pub mod similarity;
pub mod text;
pub mod timeline;
pub mod types;
