//! Core domain types for the publish pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// File name of the release manifest inside a course's public store.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// The course's public entry point inside the store, seeded at
/// initialization and always preserved by pruning.
pub const STORE_INDEX_FILENAME: &str = "index.html";

// ---------------------------------------------------------------------------
// PublishMode
// ---------------------------------------------------------------------------

/// The three invocation modes of the publish pipeline.
///
/// `export` and `publish` always regenerate; `preview` may reuse existing
/// build output when nothing forces a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    Export,
    Publish,
    Preview,
}

impl PublishMode {
    /// Modes that regenerate build output unconditionally.
    pub fn always_rebuilds(&self) -> bool {
        matches!(self, Self::Export | Self::Publish)
    }
}

impl std::fmt::Display for PublishMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Export => "export",
            Self::Publish => "publish",
            Self::Preview => "preview",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for PublishMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "export" => Ok(Self::Export),
            "publish" => Ok(Self::Publish),
            "preview" => Ok(Self::Preview),
            other => Err(format!("unknown publish mode: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// PublishRequest
// ---------------------------------------------------------------------------

/// Identifies one publish invocation. Immutable for the pipeline's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    /// Course being published.
    pub course_id: String,
    /// Owning tenant (scopes the build output directory).
    pub tenant_id: String,
    /// Invocation mode.
    pub mode: PublishMode,
    /// Force a rebuild even when prior output looks usable.
    #[serde(default)]
    pub force_rebuild: bool,
}

// ---------------------------------------------------------------------------
// ReleaseId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for release identifiers (time-sortable).
///
/// Displayed in compact lowercase hex so it doubles as a directory and
/// archive file name under the public store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseId(pub Uuid);

impl ReleaseId {
    /// Generate a new time-sortable release identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ReleaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl std::str::FromStr for ReleaseId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// ReleaseRecord / ReleaseManifest
// ---------------------------------------------------------------------------

/// One published release as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    /// Strictly monotonically increasing across the manifest's lifetime.
    pub index: u64,
    /// Identifier of the release directory and archive.
    pub id: ReleaseId,
    /// Owning course.
    pub course: String,
    /// Creation timestamp.
    pub date: DateTime<Utc>,
    /// Public URL of the release directory.
    pub url: Url,
    /// Public URL of the release archive.
    pub zip: Url,
}

/// The `manifest.json` structure persisted at the root of a course's public
/// store.
///
/// `releases` holds the retained history when retention is enabled; when
/// retention is disabled the field is omitted from the serialized form
/// entirely, so every release other than `current` is a prune candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    /// The active release, set only after a successful rotation.
    pub current: Option<ReleaseRecord>,
    /// Retained history, newest last. Absent when retention is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub releases: Option<Vec<ReleaseRecord>>,
    /// Allocation counter for release indices.
    #[serde(default)]
    pub index: u64,
}
