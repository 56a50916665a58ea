//! Build-side concerns of the publish pipeline: the durable rebuild
//! sentinel, the rebuild decision, and the external builder subprocess.

pub mod decider;
pub mod executor;
pub mod flag;

pub use decider::{RebuildInputs, output_exists, prepare_build_dir, rebuild_required};
pub use executor::{BuildExecutor, BuildReport, BuildSpec};
pub use flag::{BUILD_FLAG_FILENAME, BuildFlag};
