use std::path::{Path, PathBuf};

use recipe_errors::{LibResult, VcsInconsistencySnafu};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    fsutil,
    metadata::{RunMetadata, keys},
    vcs::RevisionInspector,
};

/// Where the package source comes from, decided once at export time.
///
/// Persisted as `{origin_kind: local}` or
/// `{origin_kind: remote, url: ..., commit: ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin_kind", rename_all = "lowercase")]
pub enum SourceRecord {
    /// Built in place from the exported snapshot; nothing to fetch.
    Local,
    /// A pinned commit of a fetchable repository.
    Remote { url: String, commit: String },
}

impl SourceRecord {
    pub fn is_local(&self) -> bool {
        matches!(self, SourceRecord::Local)
    }

    pub fn origin_kind(&self) -> &'static str {
        match self {
            SourceRecord::Local => "local",
            SourceRecord::Remote { .. } => "remote",
        }
    }
}

/// Inputs of the export-time identity decision.
pub struct ExportSpec<'a> {
    pub recipe_path: &'a Path,
    /// Snapshot directory receiving the allow-list for local sources.
    pub export_dir: &'a Path,
    pub exports_sources: &'a [PathBuf],
}

/// Decide whether the recipe's source is local or a pinned remote revision,
/// persist the decision under `source_record`, and return it.
///
/// A repository root yields `Remote` with the current remote URL and HEAD
/// commit; a lookup failure at that point is fatal because it contradicts
/// the probe. Anything else yields `Local`, and the allow-listed files are
/// copied into the export snapshot since they cannot be re-fetched later.
pub fn record_source_identity(
    spec: &ExportSpec<'_>,
    inspector: &RevisionInspector<'_>,
    meta: &mut RunMetadata,
) -> LibResult<SourceRecord> {
    let path = spec.recipe_path;

    let record = if inspector.is_repository_root(path) {
        let (url, commit) = inspector.current_url_and_commit(path).map_err(|e| {
            VcsInconsistencySnafu {
                path,
                message: e.to_string(),
            }
            .build()
        })?;

        if url.is_empty() || commit.is_empty() {
            return Err(VcsInconsistencySnafu {
                path,
                message: "empty url or commit",
            }
            .build()
            .into());
        }

        if inspector.is_dirty(path) {
            warn!(
                path = %path.display(),
                %commit,
                "working tree has uncommitted changes that the recorded commit does not include"
            );
        }

        SourceRecord::Remote { url, commit }
    } else {
        SourceRecord::Local
    };

    meta.set_once(keys::SOURCE_RECORD, &record)?;

    if record.is_local() {
        let copied = fsutil::copy_allow_list(path, spec.export_dir, spec.exports_sources)?;
        info!(
            files = copied.len(),
            dest = %spec.export_dir.display(),
            "captured local sources"
        );
    }

    info!(origin_kind = record.origin_kind(), "recorded source identity");
    Ok(record)
}

/// Read the persisted record; later stages never re-derive it.
pub fn persisted_record(meta: &RunMetadata) -> LibResult<SourceRecord> {
    meta.require(keys::SOURCE_RECORD)
}
