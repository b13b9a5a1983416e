use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use recipe_errors::{AlreadyRecordedSnafu, LibError, LibResult};
use serde::{Serialize, de::DeserializeOwned};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::fsutil;

/// File name of the persisted run metadata inside a run directory.
pub const METADATA_FILE: &str = "recipedata.yml";

/// Written into every run directory so a run inside the recipe's own
/// working tree does not show up as uncommitted changes.
const RUN_DIR_GIT_IGNORE: &str = "# Created by recipe-rs\n*\n";

/// Keys of the run metadata document and the component that owns each.
pub mod keys {
    /// Written once by the version resolver.
    pub const VERSION: &str = "version";
    /// Written once by the source identity recorder.
    pub const SOURCE_RECORD: &str = "source_record";
    /// Rewritten by every stage transition.
    pub const STATE: &str = "state";
    /// Path of the generated cache script, written by the generate stage.
    pub const GENERATED: &str = "generated";
    pub const RECIPE: &str = "recipe";
}

//
// ──────────────────────────────────────────────────────────────────────────────
//  RUN METADATA
// ──────────────────────────────────────────────────────────────────────────────
//
// A YAML key-value document scoped to one packaging run. Stages may execute
// in separate processes, so every write goes straight to disk through a
// temporary file that is renamed over the previous document.
//

#[derive(Debug, Clone)]
pub struct RunMetadata {
    path: PathBuf,
    doc: BTreeMap<String, serde_yml::Value>,
}

impl RunMetadata {
    /// Start a fresh document for a new run, discarding any previous one.
    pub fn create(run_dir: &Path) -> LibResult<Self> {
        fs::create_dir_all(run_dir).map_err(|e| Self::error(run_dir, e))?;
        let ignore = run_dir.join(".gitignore");
        fsutil::write_text_file(&ignore, RUN_DIR_GIT_IGNORE)
            .map_err(|e| Self::error(&ignore, e))?;

        let meta = Self {
            path: run_dir.join(METADATA_FILE),
            doc: BTreeMap::new(),
        };
        meta.save()?;
        debug!(path = %meta.path.display(), "created run metadata");
        Ok(meta)
    }

    /// Load the document written by earlier stages of this run.
    pub fn open(run_dir: &Path) -> LibResult<Self> {
        let path = run_dir.join(METADATA_FILE);
        let yaml = fs::read_to_string(&path).map_err(|e| Self::error(&path, e))?;
        let doc = if yaml.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_yml::from_str(&yaml).map_err(|e| Self::error(&path, e))?
        };
        Ok(Self { path, doc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, key: &str) -> bool {
        self.doc.contains_key(key)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> LibResult<Option<T>> {
        match self.doc.get(key) {
            None => Ok(None),
            Some(value) => serde_yml::from_value(value.clone())
                .map(Some)
                .map_err(|e| Self::error(&self.path, format!("key `{key}`: {e}")).into()),
        }
    }

    /// Like `get`, but a missing key is an error naming the key.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> LibResult<T> {
        self.get(key)?.ok_or_else(|| {
            Self::error(&self.path, format!("key `{key}` has not been recorded")).into()
        })
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> LibResult<()> {
        let value = serde_yml::to_value(value)
            .map_err(|e| Self::error(&self.path, format!("key `{key}`: {e}")))?;
        self.doc.insert(key.to_string(), value);
        self.save()
    }

    /// Write a key that may only be decided once per run.
    pub fn set_once<T: Serialize>(&mut self, key: &str, value: &T) -> LibResult<()> {
        if self.contains(key) {
            return Err(AlreadyRecordedSnafu { key }.build().into());
        }
        self.set(key, value)
    }

    pub fn to_yaml(&self) -> LibResult<String> {
        serde_yml::to_string(&self.doc).map_err(|e| Self::error(&self.path, e).into())
    }

    fn save(&self) -> LibResult<()> {
        let yaml = self.to_yaml()?;
        let dir = self.path.parent().unwrap_or(Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Self::error(&self.path, e))?;
        tmp.write_all(yaml.as_bytes())
            .map_err(|e| Self::error(&self.path, e))?;
        tmp.persist(&self.path)
            .map_err(|e| Self::error(&self.path, e.error))?;
        Ok(())
    }

    fn error(path: &Path, message: impl ToString) -> LibError {
        LibError::Metadata {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}
