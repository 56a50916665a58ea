//! On-disk release store for a single course.
//!
//! Layout under `<store_root>/<course_id>/`:
//! - `manifest.json` — the [`ReleaseManifest`]
//! - one directory per retained release, named by its release id
//! - a matching `<release-id>.zip` per retained release
//! - static support files seeded once at initialization (`index.html`, …)
//!
//! Ordering invariant: a release directory is copied in full before any
//! manifest reference to it is written, so readers of `current` never
//! observe a half-written release.

use std::path::{Path, PathBuf};

use chrono::Utc;
use url::Url;

use courseforge_shared::config::StoreConfig;
use courseforge_shared::{
    MANIFEST_FILENAME, PublishError, ReleaseId, ReleaseManifest, ReleaseRecord, Result,
    STORE_INDEX_FILENAME,
};

/// Handle to one course's public release store.
#[derive(Debug, Clone)]
pub struct ReleaseStore {
    dir: PathBuf,
    course_id: String,
    base_url: Url,
    retention: u32,
}

impl ReleaseStore {
    /// Open (without touching disk) the store for `course_id`.
    ///
    /// `base_url` must end with a slash so joined release URLs append
    /// segments; [`ReleaseStore::from_config`] handles normalization.
    pub fn open(store_root: &Path, course_id: &str, base_url: Url, retention: u32) -> Self {
        Self {
            dir: store_root.join(course_id),
            course_id: course_id.to_string(),
            base_url,
            retention,
        }
    }

    /// Open the store using a loaded `[store]` config section.
    pub fn from_config(config: &StoreConfig, course_id: &str) -> Result<Self> {
        Ok(Self::open(
            Path::new(&config.root),
            course_id,
            config.public_base_url()?,
            config.retention,
        ))
    }

    /// Store directory for this course.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory a staged release lives in.
    pub fn release_dir(&self, id: &ReleaseId) -> PathBuf {
        self.dir.join(id.to_string())
    }

    /// Archive file paired with a release.
    pub fn archive_path(&self, id: &ReleaseId) -> PathBuf {
        self.dir.join(format!("{id}.zip"))
    }

    /// Path of the persisted manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILENAME)
    }

    /// Public URL of the course's store root.
    pub fn course_url(&self) -> Result<Url> {
        self.base_url
            .join(&self.course_id)
            .map_err(|e| PublishError::config(format!("course URL: {e}")))
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Create the store directory on first use, seeding static support files
    /// from `seed_dir` if the store did not exist yet. Idempotent: a second
    /// call leaves existing files untouched.
    pub fn ensure(&self, seed_dir: Option<&Path>) -> Result<()> {
        if self.dir.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.dir).map_err(|e| PublishError::release(&self.dir, e))?;

        if let Some(seed) = seed_dir {
            copy_dir_contents(seed, &self.dir)?;
            tracing::info!(
                store = %self.dir.display(),
                seed = %seed.display(),
                "store initialized with static support files"
            );
        } else {
            tracing::info!(store = %self.dir.display(), "store initialized");
        }
        Ok(())
    }

    /// Copy the completed build output into an immutable release directory.
    ///
    /// Must complete in full before [`ReleaseStore::rotate`] writes any
    /// manifest reference to `id`.
    pub fn stage_release(&self, build_dir: &Path, id: &ReleaseId) -> Result<PathBuf> {
        let dest = self.release_dir(id);
        std::fs::create_dir_all(&dest).map_err(|e| PublishError::release(&dest, e))?;
        copy_dir_contents(build_dir, &dest)?;

        tracing::info!(release = %id, dir = %dest.display(), "release staged");
        Ok(dest)
    }

    /// Load the persisted manifest. A missing or corrupt manifest is treated
    /// as the empty one, not as an error.
    pub fn load_manifest(&self) -> ReleaseManifest {
        let path = self.manifest_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return ReleaseManifest::default(),
        };
        match serde_json::from_str(&content) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "corrupt manifest, starting from empty"
                );
                ReleaseManifest::default()
            }
        }
    }

    /// Persist the manifest (pretty JSON).
    pub fn write_manifest(&self, manifest: &ReleaseManifest) -> Result<()> {
        let path = self.manifest_path();
        let json = serde_json::to_string_pretty(manifest)
            .map_err(|e| PublishError::ReleasePublish(format!("manifest serialization: {e}")))?;
        std::fs::write(&path, json).map_err(|e| PublishError::release(&path, e))?;
        Ok(())
    }

    /// Rotate the manifest onto a fully staged release and persist it.
    ///
    /// Increments the monotonic index, builds the new record with computed
    /// public URLs, and sets it as `current`. With retention enabled the
    /// record is appended to the history and entries outside the window are
    /// evicted from the manifest; with retention disabled the history field
    /// is dropped entirely so every prior release becomes a prune candidate.
    pub fn rotate(&self, manifest: &mut ReleaseManifest, id: &ReleaseId) -> Result<ReleaseRecord> {
        manifest.index += 1;

        let join = |suffix: String| -> Result<Url> {
            self.base_url
                .join(&suffix)
                .map_err(|e| PublishError::config(format!("release URL {suffix:?}: {e}")))
        };
        let record = ReleaseRecord {
            index: manifest.index,
            id: id.clone(),
            course: self.course_id.clone(),
            date: Utc::now(),
            url: join(format!("{}/{id}", self.course_id))?,
            zip: join(format!("{}/{id}.zip", self.course_id))?,
        };

        manifest.current = Some(record.clone());

        if self.retention > 0 {
            let cutoff = manifest.index.saturating_sub(u64::from(self.retention));
            let releases = manifest.releases.get_or_insert_with(Vec::new);
            releases.push(record.clone());
            releases.retain(|r| r.index > cutoff);
        } else {
            manifest.releases = None;
        }

        self.write_manifest(manifest)?;

        tracing::info!(
            release = %id,
            index = record.index,
            url = %record.url,
            "manifest rotated"
        );
        Ok(record)
    }

    /// Remove everything in the store the post-rotation manifest does not
    /// reference.
    ///
    /// The keep-set is the manifest file, the store's index entry point, and
    /// each retained release's directory and archive (or only the current
    /// release's when no history is kept). Re-entrant: reads only the given
    /// manifest and the live directory listing, so orphans from crashed
    /// prior runs are reclaimed on any later successful prune.
    pub fn prune(&self, manifest: &ReleaseManifest) -> Result<()> {
        let mut keep: Vec<String> = vec![
            MANIFEST_FILENAME.to_string(),
            STORE_INDEX_FILENAME.to_string(),
        ];
        match (&manifest.releases, &manifest.current) {
            (Some(releases), _) => {
                for release in releases {
                    keep.push(release.id.to_string());
                    keep.push(format!("{}.zip", release.id));
                }
            }
            (None, Some(current)) => {
                keep.push(current.id.to_string());
                keep.push(format!("{}.zip", current.id));
            }
            (None, None) => {}
        }

        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| PublishError::Prune(format!("{}: {e}", self.dir.display())))?;

        let mut removed = 0usize;
        for entry in entries {
            let entry = entry.map_err(|e| PublishError::Prune(e.to_string()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if keep.iter().any(|k| k == &name) {
                continue;
            }

            let path = entry.path();
            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            result.map_err(|e| PublishError::Prune(format!("{}: {e}", path.display())))?;
            removed += 1;
            tracing::debug!(path = %path.display(), "pruned expired store entry");
        }

        if removed > 0 {
            tracing::info!(removed, store = %self.dir.display(), "store pruned");
        }
        Ok(())
    }
}

/// Recursively copy the contents of `src` into `dst` (which must exist or be
/// creatable). Staging and seeding both use this.
fn copy_dir_contents(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst).map_err(|e| PublishError::release(dst, e))?;

    let entries = std::fs::read_dir(src).map_err(|e| PublishError::release(src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| PublishError::release(src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|e| PublishError::release(&from, e))?;

        if file_type.is_dir() {
            copy_dir_contents(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(|e| PublishError::release(&from, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cf-store-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn store(root: &Path, retention: u32) -> ReleaseStore {
        ReleaseStore::open(
            root,
            "c1",
            "https://cdn.example.com/".parse().unwrap(),
            retention,
        )
    }

    fn make_build_dir(root: &Path) -> PathBuf {
        let build = root.join("build");
        std::fs::create_dir_all(build.join("course")).unwrap();
        std::fs::write(build.join("index.html"), "<html/>").unwrap();
        std::fs::write(build.join("course/config.json"), "{}").unwrap();
        build
    }

    /// Stage + rotate + fake archive, as the pipeline does.
    fn publish_once(store: &ReleaseStore, manifest: &mut ReleaseManifest, build: &Path) -> ReleaseRecord {
        let id = ReleaseId::new();
        store.stage_release(build, &id).unwrap();
        let record = store.rotate(manifest, &id).unwrap();
        store.prune(manifest).unwrap();
        std::fs::write(store.archive_path(&id), b"zip").unwrap();
        record
    }

    fn store_entries(store: &ReleaseStore) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn ensure_is_idempotent_and_seeds_once() {
        let tmp = temp_dir();
        let seed = tmp.join("seed");
        std::fs::create_dir_all(&seed).unwrap();
        std::fs::write(seed.join("index.html"), "player v1").unwrap();

        let store = store(&tmp.join("cdn"), 0);
        store.ensure(Some(&seed)).unwrap();
        assert_eq!(
            std::fs::read_to_string(store.dir().join("index.html")).unwrap(),
            "player v1"
        );

        // Mutate the seeded file; a second ensure must not clobber it.
        std::fs::write(store.dir().join("index.html"), "live copy").unwrap();
        store.ensure(Some(&seed)).unwrap();
        assert_eq!(
            std::fs::read_to_string(store.dir().join("index.html")).unwrap(),
            "live copy"
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn stage_release_copies_full_tree() {
        let tmp = temp_dir();
        let build = make_build_dir(&tmp);
        let store = store(&tmp.join("cdn"), 0);
        store.ensure(None).unwrap();

        let id = ReleaseId::new();
        let dest = store.stage_release(&build, &id).unwrap();
        assert!(dest.join("index.html").exists());
        assert!(dest.join("course/config.json").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_manifest_loads_empty() {
        let tmp = temp_dir();
        let store = store(&tmp, 0);
        assert_eq!(store.load_manifest(), ReleaseManifest::default());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn corrupt_manifest_loads_empty() {
        let tmp = temp_dir();
        let store = store(&tmp, 0);
        store.ensure(None).unwrap();
        std::fs::write(store.manifest_path(), "{not json").unwrap();

        assert_eq!(store.load_manifest(), ReleaseManifest::default());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn manifest_write_load_roundtrip() {
        let tmp = temp_dir();
        let store = store(&tmp, 2);
        store.ensure(None).unwrap();

        let mut manifest = ReleaseManifest::default();
        store.rotate(&mut manifest, &ReleaseId::new()).unwrap();
        store.rotate(&mut manifest, &ReleaseId::new()).unwrap();

        let loaded = store.load_manifest();
        assert_eq!(loaded, manifest);
        assert_eq!(
            loaded.releases.as_ref().unwrap().len(),
            manifest.releases.as_ref().unwrap().len()
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rotate_is_strictly_monotonic() {
        let tmp = temp_dir();
        let build = make_build_dir(&tmp);
        let store = store(&tmp.join("cdn"), 0);
        store.ensure(None).unwrap();

        let mut manifest = ReleaseManifest::default();
        let mut indices = Vec::new();
        for _ in 0..5 {
            // Prune in between must not affect index allocation.
            let record = publish_once(&store, &mut manifest, &build);
            indices.push(record.index);
        }
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rotate_computes_public_urls() {
        let tmp = temp_dir();
        let store = store(&tmp, 0);
        store.ensure(None).unwrap();

        let id = ReleaseId::new();
        let mut manifest = ReleaseManifest::default();
        let record = store.rotate(&mut manifest, &id).unwrap();

        assert_eq!(
            record.url.as_str(),
            format!("https://cdn.example.com/c1/{id}")
        );
        assert_eq!(
            record.zip.as_str(),
            format!("https://cdn.example.com/c1/{id}.zip")
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn retention_window_keeps_last_n() {
        let tmp = temp_dir();
        let build = make_build_dir(&tmp);
        let store = store(&tmp.join("cdn"), 2);
        store.ensure(None).unwrap();

        let mut manifest = ReleaseManifest::default();
        let mut records = Vec::new();
        for _ in 0..4 {
            records.push(publish_once(&store, &mut manifest, &build));
        }

        let history = manifest.releases.as_ref().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].index, 3);
        assert_eq!(history[1].index, 4);
        assert_eq!(manifest.current.as_ref().unwrap().index, 4);

        // Store holds exactly releases 3 and 4 (dir + zip), manifest, nothing else.
        // The zip for release 4 is written after the final prune in publish_once.
        let entries = store_entries(&store);
        let mut expected = vec![MANIFEST_FILENAME.to_string()];
        for record in &records[2..] {
            expected.push(record.id.to_string());
            expected.push(format!("{}.zip", record.id));
        }
        expected.sort();
        assert_eq!(entries, expected);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn retention_disabled_keeps_only_current() {
        let tmp = temp_dir();
        let build = make_build_dir(&tmp);
        let store = store(&tmp.join("cdn"), 0);
        store.ensure(None).unwrap();

        let mut manifest = ReleaseManifest::default();
        let mut last = None;
        for _ in 0..3 {
            last = Some(publish_once(&store, &mut manifest, &build));
        }
        let last = last.unwrap();

        assert!(manifest.releases.is_none());
        let entries = store_entries(&store);
        let mut expected = vec![
            MANIFEST_FILENAME.to_string(),
            last.id.to_string(),
            format!("{}.zip", last.id),
        ];
        expected.sort();
        assert_eq!(entries, expected);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn prune_preserves_index_entry_point() {
        let tmp = temp_dir();
        let seed = tmp.join("seed");
        std::fs::create_dir_all(&seed).unwrap();
        std::fs::write(seed.join("index.html"), "player").unwrap();
        let build = make_build_dir(&tmp);

        let store = store(&tmp.join("cdn"), 0);
        store.ensure(Some(&seed)).unwrap();

        let mut manifest = ReleaseManifest::default();
        publish_once(&store, &mut manifest, &build);

        assert!(store.dir().join("index.html").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn prune_reclaims_orphans_from_crashed_runs() {
        let tmp = temp_dir();
        let build = make_build_dir(&tmp);
        let store = store(&tmp.join("cdn"), 0);
        store.ensure(None).unwrap();

        // Orphan release dir + zip from a run that crashed before rotate.
        let orphan = ReleaseId::new();
        store.stage_release(&build, &orphan).unwrap();
        std::fs::write(store.archive_path(&orphan), b"zip").unwrap();

        let mut manifest = ReleaseManifest::default();
        let record = publish_once(&store, &mut manifest, &build);

        assert!(!store.release_dir(&orphan).exists());
        assert!(!store.archive_path(&orphan).exists());
        assert!(store.release_dir(&record.id).exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn prune_on_empty_manifest_clears_releases() {
        let tmp = temp_dir();
        let build = make_build_dir(&tmp);
        let store = store(&tmp.join("cdn"), 0);
        store.ensure(None).unwrap();

        let stale = ReleaseId::new();
        store.stage_release(&build, &stale).unwrap();

        store.prune(&ReleaseManifest::default()).unwrap();
        assert!(!store.release_dir(&stale).exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
