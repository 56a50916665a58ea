//! Release archive materialization.
//!
//! Walks a finished build directory deterministically and writes a single
//! deflate-compressed zip into the release store. The archive is written to
//! a temp sibling and renamed into place only after the writer has finished
//! and flushed, so the manifest-referenced path never holds a partial file.

use std::fs::File;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use courseforge_shared::{PublishError, Result};

/// Archive `source_dir` recursively into a zip at `dest`.
///
/// Entries are added in sorted order (stable output for identical input).
/// Returns the final archive path. Any stream error surfaces as
/// [`PublishError::Packaging`] and leaves no file at `dest`.
pub fn archive(source_dir: &Path, dest: &Path) -> Result<PathBuf> {
    if !source_dir.is_dir() {
        return Err(PublishError::Packaging(format!(
            "source directory missing: {}",
            source_dir.display()
        )));
    }

    let temp = temp_path(dest);
    let result = write_archive(source_dir, &temp);

    if let Err(e) = result {
        let _ = std::fs::remove_file(&temp);
        return Err(e);
    }

    std::fs::rename(&temp, dest)
        .map_err(|e| PublishError::Packaging(format!("{}: {e}", dest.display())))?;

    tracing::info!(
        source = %source_dir.display(),
        archive = %dest.display(),
        "archive written"
    );
    Ok(dest.to_path_buf())
}

/// Temp sibling used while the archive is streaming.
fn temp_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive.zip".into());
    name.insert(0, '.');
    name.push_str(".tmp");
    dest.with_file_name(name)
}

fn write_archive(source_dir: &Path, temp: &Path) -> Result<()> {
    let file =
        File::create(temp).map_err(|e| PublishError::Packaging(format!("{}: {e}", temp.display())))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(source_dir).min_depth(1).sort_by_file_name() {
        let entry =
            entry.map_err(|e| PublishError::Packaging(format!("walking build output: {e}")))?;
        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| PublishError::Packaging(e.to_string()))?;
        let name = zip_entry_name(relative);

        if entry.file_type().is_dir() {
            writer
                .add_directory(name, options)
                .map_err(|e| PublishError::Packaging(e.to_string()))?;
        } else {
            writer
                .start_file(name, options)
                .map_err(|e| PublishError::Packaging(e.to_string()))?;
            let mut src = File::open(entry.path())
                .map_err(|e| PublishError::Packaging(format!("{}: {e}", entry.path().display())))?;
            std::io::copy(&mut src, &mut writer)
                .map_err(|e| PublishError::Packaging(format!("{}: {e}", entry.path().display())))?;
        }
    }

    // Completion is reported only after the stream is fully flushed.
    let file = writer
        .finish()
        .map_err(|e| PublishError::Packaging(e.to_string()))?;
    file.sync_all()
        .map_err(|e| PublishError::Packaging(format!("{}: {e}", temp.display())))?;

    Ok(())
}

/// Zip entry names always use forward slashes.
fn zip_entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
