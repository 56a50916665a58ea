//! End-to-end publish pipeline: course JSON → theme/menu → (conditional)
//! build → staged release → rotated manifest → pruned store → archive.
//!
//! The pipeline is a linear sequence of fallible stages with fail-fast
//! propagation: any fatal error aborts the remaining stages and no later
//! stage mutates the store. There is no compensating rollback: recovery is
//! idempotent re-invocation, relying on the build-flag sentinel and the
//! keep-only-what-is-referenced pruning rule to converge the store.

use std::path::Path;
use std::time::Instant;

use serde_json::Value;
use tracing::{info, instrument, warn};
use url::Url;

use courseforge_builder::{
    BuildExecutor, BuildFlag, BuildSpec, RebuildInputs, output_exists, prepare_build_dir,
    rebuild_required,
};
use courseforge_release::ReleaseStore;
use courseforge_shared::{
    PublishConfig, PublishError, PublishRequest, ReleaseId, ReleaseRecord, Result,
};

use crate::source::{CourseSource, ThemeResolver};

// ---------------------------------------------------------------------------
// Stages & progress
// ---------------------------------------------------------------------------

/// Pipeline stages in execution order. `Failed` is implicit: any stage's
/// error terminates the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchingData,
    Theming,
    Sanitizing,
    DecidingRebuild,
    Building,
    SkippingBuild,
    ClearingBuildFlag,
    RemovingBuildIncludes,
    StagingStore,
    StagingRelease,
    LoadingManifest,
    Rotating,
    Pruning,
    Packaging,
    Done,
}

impl Stage {
    /// Position of the stage on the 0–100 polling scale.
    pub fn percent(self) -> u8 {
        match self {
            Self::FetchingData => 5,
            Self::Theming => 10,
            Self::Sanitizing => 15,
            Self::DecidingRebuild => 20,
            Self::Building | Self::SkippingBuild => 25,
            Self::ClearingBuildFlag => 60,
            Self::RemovingBuildIncludes => 65,
            Self::StagingStore => 70,
            Self::StagingRelease => 75,
            Self::LoadingManifest => 80,
            Self::Rotating => 85,
            Self::Pruning => 90,
            Self::Packaging => 95,
            Self::Done => 100,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::FetchingData => "fetching-data",
            Self::Theming => "theming",
            Self::Sanitizing => "sanitizing",
            Self::DecidingRebuild => "deciding-rebuild",
            Self::Building => "building",
            Self::SkippingBuild => "skipping-build",
            Self::ClearingBuildFlag => "clearing-build-flag",
            Self::RemovingBuildIncludes => "removing-build-includes",
            Self::StagingStore => "staging-store",
            Self::StagingRelease => "staging-release",
            Self::LoadingManifest => "loading-manifest",
            Self::Rotating => "rotating",
            Self::Pruning => "pruning",
            Self::Packaging => "packaging",
            Self::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a stage.
    fn stage(&self, stage: Stage);
    /// Called when the pipeline completes successfully.
    fn done(&self, outcome: &PublishOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: Stage) {}
    fn done(&self, _outcome: &PublishOutcome) {}
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of a successful publish run.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// Public URL of the course's store.
    pub url: Url,
    /// The release record now referenced as `current`.
    pub record: ReleaseRecord,
    /// Whether the external builder actually ran.
    pub rebuilt: bool,
    /// Set when the run published but store cleanup was incomplete
    /// (prune failures are non-fatal; a later prune self-heals).
    pub prune_warning: Option<String>,
    /// Total elapsed time.
    pub elapsed: std::time::Duration,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the full publish pipeline for one request.
#[instrument(skip_all, fields(course = %request.course_id, mode = %request.mode))]
pub fn run_publish(
    config: &PublishConfig,
    request: &PublishRequest,
    source: &dyn CourseSource,
    themes: &dyn ThemeResolver,
    progress: &dyn ProgressReporter,
) -> Result<PublishOutcome> {
    let start = Instant::now();

    // --- Fetch + validate course data ---
    progress.stage(Stage::FetchingData);
    let mut course = source.fetch(&request.tenant_id, &request.course_id)?;
    source.validate(&course)?;

    // --- Theme + menu materialization ---
    progress.stage(Stage::Theming);
    let theme_staging = Path::new(&config.paths.theme_root).join(&request.tenant_id);
    let theme = themes.apply_theme(request, &mut course, &theme_staging)?;
    let menu_staging = Path::new(&config.paths.menu_root).join(&request.tenant_id);
    let menu = themes.apply_menu(request, &mut course, &menu_staging)?;
    info!(%theme, %menu, "theme and menu applied");

    // --- Mode-dependent sanitization ---
    progress.stage(Stage::Sanitizing);
    course = source.sanitize(request.mode, course)?;

    // --- Rebuild decision ---
    progress.stage(Stage::DecidingRebuild);
    let build_dir = config
        .paths
        .build_dir(&request.tenant_id, &request.course_id);
    let flag = BuildFlag::new(&build_dir);
    let inputs = RebuildInputs {
        mode: request.mode,
        force: request.force_rebuild,
        flag_present: flag.is_set(),
        output_exists: output_exists(&build_dir),
    };
    let rebuild = rebuild_required(&inputs);
    info!(rebuild, ?inputs, "rebuild decision");

    if rebuild {
        prepare_build_dir(&build_dir)?;
        // Set before the builder runs; cleared only after confirmed success.
        flag.set()?;
    }
    write_course_json(&build_dir, &course)?;

    // --- Build (or reuse prior output) ---
    if rebuild {
        progress.stage(Stage::Building);
        let framework_root = config.paths.framework_root();
        let spec = BuildSpec {
            output_dir: relative_output_dir(&framework_root, &build_dir),
            theme,
            menu,
            source_maps: source_maps_requested(&course),
        };
        BuildExecutor::new(config.builder.clone()).run(&spec, &framework_root)?;
    } else {
        progress.stage(Stage::SkippingBuild);
        info!("prior build output reused, builder not invoked");
    }

    // --- Clear the rebuild sentinel ---
    progress.stage(Stage::ClearingBuildFlag);
    if let Err(e) = flag.clear() {
        warn!(error = %e, "could not clear build flag");
    }

    // --- Strip build includes from the built config ---
    progress.stage(Stage::RemovingBuildIncludes);
    remove_build_includes(&build_dir.join("course/config.json"))?;

    // --- Store initialization ---
    progress.stage(Stage::StagingStore);
    let store = ReleaseStore::from_config(&config.store, &request.course_id)?;
    store.ensure(config.store.seed_dir.as_deref().map(Path::new))?;

    // --- Stage the release (complete copy before any manifest reference) ---
    progress.stage(Stage::StagingRelease);
    let release_id = ReleaseId::new();
    store.stage_release(&build_dir, &release_id)?;

    // --- Manifest load + rotation ---
    progress.stage(Stage::LoadingManifest);
    let mut manifest = store.load_manifest();

    progress.stage(Stage::Rotating);
    let record = store.rotate(&mut manifest, &release_id)?;

    // --- Prune (non-fatal: the run still reports success) ---
    progress.stage(Stage::Pruning);
    let prune_warning = match store.prune(&manifest) {
        Ok(()) => None,
        Err(e) => {
            warn!(error = %e, "prune failed, store cleanup deferred to a later run");
            Some(e.to_string())
        }
    };

    // --- Package the build output ---
    progress.stage(Stage::Packaging);
    courseforge_packager::archive(&build_dir, &store.archive_path(&release_id))?;

    let outcome = PublishOutcome {
        url: store.course_url()?,
        record,
        rebuilt: rebuild,
        prune_warning,
        elapsed: start.elapsed(),
    };

    progress.stage(Stage::Done);
    progress.done(&outcome);

    info!(
        release = %outcome.record.id,
        index = outcome.record.index,
        rebuilt = outcome.rebuilt,
        elapsed_ms = outcome.elapsed.as_millis(),
        "publish complete"
    );
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Write the sanitized course JSON into the build directory
/// (`course/course.json`, plus `course/config.json` when the course carries
/// a config object).
fn write_course_json(build_dir: &Path, course: &Value) -> Result<()> {
    let course_dir = build_dir.join("course");
    std::fs::create_dir_all(&course_dir).map_err(|e| PublishError::io(&course_dir, e))?;

    let write = |path: &Path, value: &Value| -> Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| PublishError::validation(format!("course JSON serialization: {e}")))?;
        std::fs::write(path, json).map_err(|e| PublishError::io(path, e))
    };

    write(&course_dir.join("course.json"), course)?;
    if let Some(config) = course.get("config") {
        write(&course_dir.join("config.json"), config)?;
    }
    Ok(())
}

/// Whether the course requests source-map generation (selects a dev build).
fn source_maps_requested(course: &Value) -> bool {
    course
        .pointer("/config/_generateSourcemap")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Builder `--outputdir` value: the build directory relative to the
/// framework root where possible, absolute otherwise.
fn relative_output_dir(framework_root: &Path, build_dir: &Path) -> String {
    build_dir
        .strip_prefix(framework_root)
        .unwrap_or(build_dir)
        .display()
        .to_string()
}

/// Remove the `build` includes block from the built course config, when the
/// file exists. Absence is not an error: a skipped build may have no config.
fn remove_build_includes(config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        return Ok(());
    }
    let content =
        std::fs::read_to_string(config_path).map_err(|e| PublishError::io(config_path, e))?;
    let mut config: Value = serde_json::from_str(&content)
        .map_err(|e| PublishError::validation(format!("built config.json: {e}")))?;

    if let Some(obj) = config.as_object_mut() {
        if obj.remove("build").is_some() {
            let json = serde_json::to_string_pretty(&config)
                .map_err(|e| PublishError::validation(e.to_string()))?;
            std::fs::write(config_path, json).map_err(|e| PublishError::io(config_path, e))?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
