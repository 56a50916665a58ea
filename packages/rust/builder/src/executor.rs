//! External builder subprocess.
//!
//! Invokes the static-site builder with derived arguments, captures its
//! combined output, and classifies the result. Stderr-only output with
//! exit 0 counts as a failure: builders that route diagnostics to stderr
//! without failing the process are not trusted.

use std::path::Path;
use std::process::Command;

use courseforge_shared::config::BuilderConfig;
use courseforge_shared::{PublishError, Result};

/// Start of the diagnostic block in builder stdout.
const FATAL_ERROR_MARKER: &str = "\nFatal error: ";

/// Section marker terminating the diagnostic block.
const SECTION_END_MARKER: &str = "\n\nExecution Time";

// ---------------------------------------------------------------------------
// BuildSpec
// ---------------------------------------------------------------------------

/// Derived arguments for one builder invocation.
#[derive(Debug, Clone)]
pub struct BuildSpec {
    /// Build output directory, relative to the framework root.
    pub output_dir: String,
    /// Applied theme identifier.
    pub theme: String,
    /// Applied menu identifier.
    pub menu: String,
    /// Whether source-map generation was requested (selects dev mode).
    pub source_maps: bool,
}

impl BuildSpec {
    /// Builder mode suffix: `dev` when source maps are requested, else `prod`.
    pub fn mode(&self) -> &'static str {
        if self.source_maps { "dev" } else { "prod" }
    }

    /// Full argument vector for the builder process.
    pub fn to_args(&self, builder: &BuilderConfig) -> Vec<String> {
        vec![
            builder.runner.clone(),
            format!("{}:{}", builder.task, self.mode()),
            format!("--outputdir={}", self.output_dir),
            format!("--theme={}", self.theme),
            format!("--menu={}", self.menu),
        ]
    }
}

// ---------------------------------------------------------------------------
// BuildExecutor
// ---------------------------------------------------------------------------

/// Captured output of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub stdout: String,
    pub stderr: String,
}

/// Runs the external builder and classifies its outcome.
#[derive(Debug, Clone)]
pub struct BuildExecutor {
    builder: BuilderConfig,
}

impl BuildExecutor {
    pub fn new(builder: BuilderConfig) -> Self {
        Self { builder }
    }

    /// Invoke the builder from `working_dir`, blocking until it exits.
    ///
    /// The only recognized success conditions are exit 0 with non-empty
    /// stdout, and the degenerate exit 0 with both streams empty.
    pub fn run(&self, spec: &BuildSpec, working_dir: &Path) -> Result<BuildReport> {
        let args = spec.to_args(&self.builder);

        tracing::info!(
            command = %self.builder.command,
            args = ?args,
            cwd = %working_dir.display(),
            "invoking builder"
        );

        let output = Command::new(&self.builder.command)
            .args(&args)
            .current_dir(working_dir)
            .output()
            .map_err(|e| {
                PublishError::Build(format!(
                    "failed to spawn builder `{}`: {e}",
                    self.builder.command
                ))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        classify(output.status.success(), output.status.code(), &stdout, &stderr)?;

        tracing::info!(stdout_len = stdout.len(), "builder finished");
        Ok(BuildReport { stdout, stderr })
    }
}

/// The four-way classification policy.
fn classify(exit_ok: bool, code: Option<i32>, stdout: &str, stderr: &str) -> Result<()> {
    if !exit_ok {
        let mut message = match code {
            Some(code) => format!("builder exited with status {code}"),
            None => "builder terminated by signal".to_string(),
        };
        if let Some(excerpt) = fatal_error_excerpt(stdout) {
            message.push_str(": ");
            message.push_str(excerpt.trim());
        }
        tracing::error!(%message, "build failed");
        return Err(PublishError::Build(message));
    }

    if !stdout.is_empty() {
        return Ok(());
    }

    if !stderr.is_empty() {
        // Exit 0 but nothing on stdout and diagnostics on stderr.
        tracing::error!(stderr, "build produced stderr-only output");
        return Err(PublishError::Build(format!(
            "builder produced stderr output with no stdout: {}",
            stderr.trim()
        )));
    }

    // Exit 0, both streams empty. Degenerate but accepted.
    Ok(())
}

/// Extract the diagnostic text between the fatal-error marker and the next
/// section marker, when present.
fn fatal_error_excerpt(stdout: &str) -> Option<&str> {
    let start = stdout.find(FATAL_ERROR_MARKER)?;
    let rest = &stdout[start..];
    match rest.find(SECTION_END_MARKER) {
        Some(end) => Some(&rest[..end]),
        None => Some(rest),
    }
}
