//! Collaborator seams of the publish pipeline.
//!
//! Course data retrieval/validation and theme/menu materialization are
//! owned by the surrounding platform; the pipeline consumes them through
//! these traits. In-memory implementations are provided for headless/test
//! usage.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use courseforge_shared::{PublishError, PublishMode, PublishRequest, Result};

/// Source of a course's structured representation.
pub trait CourseSource: Send + Sync {
    /// Fetch the full course JSON for a tenant/course pair.
    fn fetch(&self, tenant_id: &str, course_id: &str) -> Result<Value>;

    /// Validate the fetched course before any build work starts.
    fn validate(&self, course: &Value) -> Result<()>;

    /// Mode-dependent cleanup of the course JSON before it is written into
    /// the build directory.
    fn sanitize(&self, mode: PublishMode, course: Value) -> Result<Value>;
}

/// Materializes a concrete theme and menu into their staging areas and
/// returns the identifiers the builder is invoked with.
pub trait ThemeResolver: Send + Sync {
    /// Apply the course's theme; returns the applied theme name.
    fn apply_theme(
        &self,
        request: &PublishRequest,
        course: &mut Value,
        staging_dir: &Path,
    ) -> Result<String>;

    /// Apply the course's menu; returns the applied menu name.
    fn apply_menu(
        &self,
        request: &PublishRequest,
        course: &mut Value,
        staging_dir: &Path,
    ) -> Result<String>;
}

// ---------------------------------------------------------------------------
// In-memory implementations (headless/test usage)
// ---------------------------------------------------------------------------

/// Course source backed by a map of pre-loaded course JSON documents.
#[derive(Debug, Default)]
pub struct InMemoryCourseSource {
    courses: HashMap<(String, String), Value>,
}

impl InMemoryCourseSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a course document under a tenant/course pair.
    pub fn insert(&mut self, tenant_id: &str, course_id: &str, course: Value) {
        self.courses
            .insert((tenant_id.to_string(), course_id.to_string()), course);
    }
}

impl CourseSource for InMemoryCourseSource {
    fn fetch(&self, tenant_id: &str, course_id: &str) -> Result<Value> {
        self.courses
            .get(&(tenant_id.to_string(), course_id.to_string()))
            .cloned()
            .ok_or_else(|| {
                PublishError::DataFetch(format!("course {course_id} not found for {tenant_id}"))
            })
    }

    fn validate(&self, course: &Value) -> Result<()> {
        if !course.is_object() {
            return Err(PublishError::validation("course JSON must be an object"));
        }
        Ok(())
    }

    fn sanitize(&self, _mode: PublishMode, course: Value) -> Result<Value> {
        Ok(course)
    }
}

/// Theme resolver that applies fixed theme/menu names and records them in
/// the course config, without materializing template files.
#[derive(Debug, Clone)]
pub struct FixedThemeResolver {
    pub theme: String,
    pub menu: String,
}

impl FixedThemeResolver {
    pub fn new(theme: impl Into<String>, menu: impl Into<String>) -> Self {
        Self {
            theme: theme.into(),
            menu: menu.into(),
        }
    }
}

impl ThemeResolver for FixedThemeResolver {
    fn apply_theme(
        &self,
        _request: &PublishRequest,
        course: &mut Value,
        _staging_dir: &Path,
    ) -> Result<String> {
        if let Some(config) = course.get_mut("config").and_then(Value::as_object_mut) {
            config.insert("_theme".into(), Value::String(self.theme.clone()));
        }
        Ok(self.theme.clone())
    }

    fn apply_menu(
        &self,
        _request: &PublishRequest,
        course: &mut Value,
        _staging_dir: &Path,
    ) -> Result<String> {
        if let Some(config) = course.get_mut("config").and_then(Value::as_object_mut) {
            config.insert("_menu".into(), Value::String(self.menu.clone()));
        }
        Ok(self.menu.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> PublishRequest {
        PublishRequest {
            course_id: "c1".into(),
            tenant_id: "t1".into(),
            mode: PublishMode::Publish,
            force_rebuild: false,
        }
    }

    #[test]
    fn fetch_unknown_course_is_data_fetch_error() {
        let source = InMemoryCourseSource::new();
        let err = source.fetch("t1", "missing").unwrap_err();
        assert!(matches!(err, PublishError::DataFetch(_)));
    }

    #[test]
    fn fetch_returns_registered_course() {
        let mut source = InMemoryCourseSource::new();
        source.insert("t1", "c1", json!({"config": {}}));
        let course = source.fetch("t1", "c1").unwrap();
        assert!(course.get("config").is_some());
    }

    #[test]
    fn non_object_course_fails_validation() {
        let source = InMemoryCourseSource::new();
        assert!(source.validate(&json!([1, 2, 3])).is_err());
        assert!(source.validate(&json!({"config": {}})).is_ok());
    }

    #[test]
    fn resolver_records_applied_names() {
        let resolver = FixedThemeResolver::new("vanilla", "boxmenu");
        let mut course = json!({"config": {}});

        let theme = resolver
            .apply_theme(&request(), &mut course, Path::new("unused"))
            .unwrap();
        let menu = resolver
            .apply_menu(&request(), &mut course, Path::new("unused"))
            .unwrap();

        assert_eq!(theme, "vanilla");
        assert_eq!(menu, "boxmenu");
        assert_eq!(course["config"]["_theme"], "vanilla");
        assert_eq!(course["config"]["_menu"], "boxmenu");
    }
}
