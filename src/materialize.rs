use std::{fs, path::Path};

use recipe_errors::{LibResult, SourceFetchSnafu};
use tracing::{debug, info};

use crate::{fsutil, source::SourceRecord, vcs::Vcs};

/// Make the recorded source available at `destination`.
///
/// `Local` records are a no-op: the exported snapshot is already the
/// source tree and `destination` is left untouched. `Remote` records are
/// cloned into an empty `destination` and checked out at exactly the
/// recorded commit. Failures are not retried.
pub fn materialize(record: &SourceRecord, destination: &Path, vcs: &dyn Vcs) -> LibResult<()> {
    let SourceRecord::Remote { url, commit } = record else {
        debug!("local source, nothing to fetch");
        return Ok(());
    };

    let fail = |message: String| {
        SourceFetchSnafu {
            url: url.as_str(),
            commit: commit.as_str(),
            destination,
            message,
        }
        .build()
    };

    if !fsutil::is_empty_dir(destination) {
        return Err(fail("destination is not empty".to_string()).into());
    }
    fs::create_dir_all(destination).map_err(|e| fail(e.to_string()))?;

    info!(%url, %commit, dest = %destination.display(), "fetching recorded revision");
    vcs.clone_repo(url, destination)
        .map_err(|e| fail(e.to_string()))?;
    vcs.checkout(destination, commit)
        .map_err(|e| fail(e.to_string()))?;

    let head = vcs
        .head_commit(destination)
        .map_err(|e| fail(e.to_string()))?;
    if !head.starts_with(commit.as_str()) {
        return Err(fail(format!("checked out {head} instead")).into());
    }

    Ok(())
}
