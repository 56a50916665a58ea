//! Rebuild decision.
//!
//! Pure rule over four explicit inputs, plus the side-effect helpers that
//! probe prior output and empty the build directory before a rebuild.

use std::path::Path;

use courseforge_shared::{PublishError, PublishMode, Result, STORE_INDEX_FILENAME};

/// Inputs to the rebuild decision for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct RebuildInputs {
    /// Invocation mode.
    pub mode: PublishMode,
    /// Caller requested a forced rebuild.
    pub force: bool,
    /// The durable rebuild sentinel is present.
    pub flag_present: bool,
    /// Usable prior build output exists.
    pub output_exists: bool,
}

/// Whether a fresh build is required.
///
/// Export and publish always regenerate. Otherwise a set sentinel, a force
/// request, or missing prior output each mandate a rebuild. Preview without
/// force and with valid prior output is the only path that skips the
/// builder.
pub fn rebuild_required(inputs: &RebuildInputs) -> bool {
    inputs.mode.always_rebuilds() || inputs.flag_present || inputs.force || !inputs.output_exists
}

/// Whether usable prior build output exists: the built entry point must be
/// present, not merely a non-empty directory.
pub fn output_exists(build_dir: &Path) -> bool {
    build_dir.join(STORE_INDEX_FILENAME).exists()
}

/// Empty and recreate the build output directory.
///
/// Runs before every rebuild so no stale files survive a failed partial
/// build.
pub fn prepare_build_dir(build_dir: &Path) -> Result<()> {
    if build_dir.exists() {
        std::fs::remove_dir_all(build_dir).map_err(|e| PublishError::io(build_dir, e))?;
    }
    std::fs::create_dir_all(build_dir).map_err(|e| PublishError::io(build_dir, e))?;
    tracing::debug!(path = %build_dir.display(), "build directory cleared");
    Ok(())
}
