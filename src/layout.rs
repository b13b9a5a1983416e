use std::path::{Path, PathBuf};

use crate::source::SourceRecord;

/// Folder layout of one packaging run.
///
/// ```text
/// <run>/recipedata.yml
/// <run>/export_source/
/// <run>/source/
/// <run>/build/<build_type>/generators/
/// <run>/package/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    run_dir: PathBuf,
    build_type: String,
}

impl RunLayout {
    pub fn new(run_dir: impl Into<PathBuf>, build_type: impl Into<String>) -> Self {
        Self {
            run_dir: run_dir.into(),
            build_type: build_type.into(),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn export_source(&self) -> PathBuf {
        self.run_dir.join("export_source")
    }

    /// Destination of fetched remote sources.
    pub fn fetched_source(&self) -> PathBuf {
        self.run_dir.join("source")
    }

    /// The tree the build consumes, chosen by the persisted record.
    pub fn source_folder(&self, record: &SourceRecord) -> PathBuf {
        match record {
            SourceRecord::Local => self.export_source(),
            SourceRecord::Remote { .. } => self.fetched_source(),
        }
    }

    pub fn build_folder(&self) -> PathBuf {
        self.run_dir.join("build").join(&self.build_type)
    }

    pub fn generators_folder(&self) -> PathBuf {
        self.build_folder().join("generators")
    }

    /// Install prefix and root of the packaged artifact.
    pub fn package_folder(&self) -> PathBuf {
        self.run_dir.join("package")
    }
}
