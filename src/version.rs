use std::path::Path;

use recipe_errors::{LibResult, VersionResolutionSnafu};
use tracing::{debug, info};

use crate::vcs::RevisionInspector;

/// Resolve the package version for a run.
///
/// An explicit override is returned untouched without consulting version
/// control. Otherwise the nearest tag at `recipe_path` is described and its
/// first character is dropped (`v1.2.3` becomes `1.2.3`). Tags without a
/// prefix lose their first character too: `2.0.0` becomes `.0.0`.
pub fn resolve_version(
    explicit_override: Option<&str>,
    recipe_path: &Path,
    inspector: &RevisionInspector<'_>,
) -> LibResult<String> {
    if let Some(version) = explicit_override {
        debug!(%version, "using explicit version override");
        return Ok(version.to_string());
    }

    let tag = inspector.describe_tag(recipe_path).map_err(|e| {
        VersionResolutionSnafu {
            path: recipe_path,
            message: e.to_string(),
        }
        .build()
    })?;

    let version = strip_tag_prefix(&tag);
    if version.is_empty() {
        return Err(VersionResolutionSnafu {
            path: recipe_path,
            message: format!("tag `{tag}` has no version after its prefix"),
        }
        .build()
        .into());
    }

    info!(%tag, %version, "resolved version from tag");
    Ok(version.to_string())
}

/// Drop exactly one leading character, the conventional tag prefix.
pub fn strip_tag_prefix(tag: &str) -> &str {
    let mut chars = tag.chars();
    chars.next();
    chars.as_str()
}
