//! Shared types, error model, and configuration for the courseforge
//! publish pipeline.
//!
//! This crate is the foundation depended on by all other courseforge crates.
//! It provides:
//! - [`PublishError`] — the unified error type
//! - Domain types ([`PublishRequest`], [`ReleaseManifest`], [`ReleaseRecord`], [`ReleaseId`])
//! - Configuration ([`PublishConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    BuilderConfig, PathsConfig, PublishConfig, StoreConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{PublishError, Result};
pub use types::{
    MANIFEST_FILENAME, PublishMode, PublishRequest, ReleaseId, ReleaseManifest, ReleaseRecord,
    STORE_INDEX_FILENAME,
};
