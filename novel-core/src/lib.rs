//! Novel character extraction pipeline with an AI lookup agent.
//!
//! This crate provides:
//! - A three-stage analysis pipeline: extract character candidates from
//!   narrative text, validate them against the source with a judge model,
//!   and persist the survivors to an embedded store
//! - A conversational query agent over the persisted characters
//! - An SQLite-backed character store keyed by full name
//!
//! # Quick Start
//!
//! ```ignore
//! use novel_core::{CharacterStore, Pipeline};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let model = Arc::new(gemini::Gemini::from_env()?);
//!     let store = Arc::new(CharacterStore::open("characters.db")?);
//!
//!     let pipeline = Pipeline::new(model, store.clone());
//!     let summary = pipeline.analyze(novel_text, Some("철의 계절")).await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

pub mod character;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod query;
pub mod store;
pub mod testing;

// Primary public API
pub use character::{CharacterRecord, CharacterSummary, StoredCharacter};
pub use model::Model;
pub use pipeline::{
    Pipeline, PipelineConfig, PipelineError, RecordFailure, RunSummary, Verdict,
};
pub use query::{QueryAgent, QueryConfig, QueryError};
pub use store::{CharacterSink, CharacterStore, StorageError};
pub use testing::{MockModel, PipelineHarness};
