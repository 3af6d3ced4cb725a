//! Core orchestration for libstage native library loading.
//!
//! This crate ties together the resource listing, staging, and loader
//! backends into the `Engine`: try the primary library through the system
//! search path, and when that fails stage the bundle and load every library of
//! the configured order from the staging directory, recording one outcome per
//! library in a `LoadReport`. `global::ensure_initialized` runs this once per
//! process.

pub mod engine;
pub mod global;
pub mod lifecycle;
pub mod loader;
pub mod report;

pub use engine::{Engine, InitOutcome};
pub use global::{ensure_initialized, is_initialized};
pub use lifecycle::{validate_transition, InitPhase};
pub use loader::{load_all, resolve_library, LoadPlan};
pub use report::{LibraryOutcome, LoadReport, LoadStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config error: {0}")]
    Config(#[from] libstage_schema::ConfigError),
    #[error("store error: {0}")]
    Store(#[from] libstage_store::StoreError),
    #[error("runtime error: {0}")]
    Runtime(#[from] libstage_runtime::RuntimeError),
    #[error("invalid initialization transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("native library initialization failed: {0}")]
    UnexpectedInitialization(String),
}
