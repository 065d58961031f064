//! Core pipeline for JobAtlas: aggregation, validation, export, and
//! run orchestration.
//!
//! The heavy lifting lives in the sibling crates (`jobatlas-scoring`,
//! `jobatlas-storage`, `jobatlas-ingest`); this crate wires them into
//! the import → score → validate → export pipeline and owns the
//! [`view::StaticView`] contract all export formats derive from.

pub mod export;
pub mod pipeline;
pub mod validate;
pub mod view;

pub use export::{ExportStats, MetaCatalog};
pub use pipeline::{ProgressReporter, RunConfig, RunResult, SilentProgress, run};
pub use view::{LevelFilter, StaticView, build_view};
