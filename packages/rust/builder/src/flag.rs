//! Durable rebuild sentinel.
//!
//! A marker file in the build output directory records "the previous build
//! was interrupted or its output is stale". It is set when a build starts
//! and cleared only after confirmed success, so a crashed or failed build
//! forces a rebuild on the next invocation.

use std::path::{Path, PathBuf};

use courseforge_shared::{PublishError, Result};

/// Name of the sentinel file inside the build output directory.
pub const BUILD_FLAG_FILENAME: &str = ".rebuild";

/// Handle to a course's rebuild sentinel.
///
/// Presence of the file is the signal; its content is irrelevant. The flag
/// is never inferred from directory emptiness: "flag present" and "no prior
/// output" are distinct rebuild inputs.
#[derive(Debug, Clone)]
pub struct BuildFlag {
    path: PathBuf,
}

impl BuildFlag {
    /// Sentinel for the given build output directory.
    pub fn new(build_dir: &Path) -> Self {
        Self {
            path: build_dir.join(BUILD_FLAG_FILENAME),
        }
    }

    /// Whether the sentinel is currently set.
    pub fn is_set(&self) -> bool {
        self.path.exists()
    }

    /// Set the sentinel. Creates the build directory if needed.
    pub fn set(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PublishError::io(parent, e))?;
        }
        std::fs::write(&self.path, b"").map_err(|e| PublishError::io(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), "build flag set");
        Ok(())
    }

    /// Clear the sentinel. Clearing an absent flag is a no-op.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "build flag cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PublishError::io(&self.path, e)),
        }
    }

    /// Path of the sentinel file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
