//! Per-course release store: staging, manifest rotation, retention, and
//! pruning of the public content-delivery directory.

pub mod store;

pub use store::ReleaseStore;
