//! Application configuration for the publish pipeline.
//!
//! User config lives at `~/.courseforge/courseforge.toml`.
//! Environment-specific deployments override the defaults below; callers
//! of the pipeline pass a loaded [`PublishConfig`] in.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PublishError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "courseforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".courseforge";

// ---------------------------------------------------------------------------
// Config structs (matching courseforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level publish pipeline config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Framework and build output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Public release store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// External static-site builder invocation.
    #[serde(default)]
    pub builder: BuilderConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Framework/temp root. The builder subprocess runs from here.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Per-tenant build output root (courses live at
    /// `<build_root>/<tenant>/<course>/build`).
    #[serde(default = "default_build_root")]
    pub build_root: String,

    /// Theme template staging root.
    #[serde(default = "default_theme_root")]
    pub theme_root: String,

    /// Menu template staging root.
    #[serde(default = "default_menu_root")]
    pub menu_root: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            temp_root: default_temp_root(),
            build_root: default_build_root(),
            theme_root: default_theme_root(),
            menu_root: default_menu_root(),
        }
    }
}

fn default_temp_root() -> String {
    "var/tmp/courseforge".into()
}
fn default_build_root() -> String {
    "var/tmp/courseforge/courses".into()
}
fn default_theme_root() -> String {
    "var/tmp/courseforge/src/theme".into()
}
fn default_menu_root() -> String {
    "var/tmp/courseforge/src/menu".into()
}

impl PathsConfig {
    /// Working directory for the external builder.
    pub fn framework_root(&self) -> PathBuf {
        PathBuf::from(&self.temp_root)
    }

    /// A course's directory under the per-tenant build root.
    pub fn course_dir(&self, tenant_id: &str, course_id: &str) -> PathBuf {
        Path::new(&self.build_root).join(tenant_id).join(course_id)
    }

    /// A course's build output directory.
    pub fn build_dir(&self, tenant_id: &str, course_id: &str) -> PathBuf {
        self.course_dir(tenant_id, course_id).join("build")
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Public store base path; each course gets a directory under it.
    #[serde(default = "default_store_root")]
    pub root: String,

    /// Public base URL the store is served from.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Number of past releases retained alongside the current one.
    /// 0 disables history: only the current release survives pruning.
    #[serde(default)]
    pub retention: u32,

    /// Static support files copied into a course's store on first use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_dir: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
            base_url: default_base_url(),
            retention: 0,
            seed_dir: None,
        }
    }
}

fn default_store_root() -> String {
    "var/cdn".into()
}
fn default_base_url() -> String {
    "https://cdn.example.com/".into()
}

impl StoreConfig {
    /// Parsed public base URL, normalized to end with a slash so joins
    /// append path segments instead of replacing them.
    pub fn public_base_url(&self) -> Result<Url> {
        let raw = if self.base_url.ends_with('/') {
            self.base_url.clone()
        } else {
            format!("{}/", self.base_url)
        };
        raw.parse()
            .map_err(|e| PublishError::config(format!("invalid store base_url {raw:?}: {e}")))
    }
}

/// `[builder]` section.
///
/// The external builder is invoked as
/// `<command> <runner> <task>:<dev|prod> --outputdir=… --theme=… --menu=…`
/// from the framework root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Process to spawn.
    #[serde(default = "default_builder_command")]
    pub command: String,

    /// First argument: the build runner.
    #[serde(default = "default_builder_runner")]
    pub runner: String,

    /// Task name; the build mode is appended as a `:dev` / `:prod` suffix.
    #[serde(default = "default_builder_task")]
    pub task: String,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            command: default_builder_command(),
            runner: default_builder_runner(),
            task: default_builder_task(),
        }
    }
}

fn default_builder_command() -> String {
    "npx".into()
}
fn default_builder_runner() -> String {
    "grunt".into()
}
fn default_builder_task() -> String {
    "server-build".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.courseforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PublishError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.courseforge/courseforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the pipeline config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<PublishConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(PublishConfig::default());
    }

    load_config_from(&path)
}

/// Load the pipeline config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<PublishConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PublishError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| PublishError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PublishError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = PublishConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PublishError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PublishError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
