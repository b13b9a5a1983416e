use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use recipe_errors::{ExportCopySnafu, LibError};
use snafu::ResultExt;
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

/// Copy the allow-listed entries of `src_root` into `dest_root`.
///
/// Files are copied as is and directories recursively, preserving their
/// path relative to `src_root`. Entries that do not exist are skipped.
/// Returns the relative paths of the files copied.
pub fn copy_allow_list(
    src_root: &Path,
    dest_root: &Path,
    entries: &[PathBuf],
) -> Result<Vec<PathBuf>, LibError> {
    let mut copied = Vec::new();

    for entry in entries {
        let src = src_root.join(entry);
        if !src.exists() {
            debug!(entry = %entry.display(), "allow-listed entry not present, skipping");
            continue;
        }

        for item in WalkDir::new(&src).sort_by_file_name() {
            let item = item
                .map_err(io::Error::from)
                .context(ExportCopySnafu { path: &src })?;

            let rel = item
                .path()
                .strip_prefix(src_root)
                .unwrap_or(item.path())
                .to_path_buf();
            let dest = dest_root.join(&rel);

            if item.file_type().is_dir() {
                fs::create_dir_all(&dest).context(ExportCopySnafu { path: item.path() })?;
                continue;
            }

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).context(ExportCopySnafu { path: item.path() })?;
            }
            fs::copy(item.path(), &dest).context(ExportCopySnafu { path: item.path() })?;
            copied.push(rel);
        }
    }

    Ok(copied)
}

/// Collapse `.` and `..` segments without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    path_clean::clean(path)
}

/// Absolute, symlink-free form of an existing path.
pub fn resolve_absolute(path: &Path) -> io::Result<PathBuf> {
    dunce::canonicalize(path)
}

/// Write `contents` to `path` through a sibling temporary file, creating
/// parent directories. Readers never observe a partially written file.
pub fn write_text_file(path: &Path, contents: &str) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;

    // Temporary files are created owner-only.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o644))?;
    }

    Ok(())
}

/// True when `dir` is missing or has no entries.
pub fn is_empty_dir(dir: &Path) -> bool {
    match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => !dir.exists(),
    }
}
