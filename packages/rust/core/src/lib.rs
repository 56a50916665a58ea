//! Publish pipeline orchestration for courseforge.
//!
//! This crate ties the build, packaging, and release crates together into
//! the end-to-end publish workflow, and exposes the per-course job registry
//! the calling layer uses for long-running-job polling.

pub mod jobs;
pub mod pipeline;
pub mod source;
