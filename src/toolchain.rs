use std::{
    fs, io,
    path::{Path, PathBuf},
};

use minijinja::{Environment, context};
use recipe_errors::{LibResult, ToolchainEmitSnafu};
use snafu::{IntoError, ResultExt};
use tracing::{debug, info};

use crate::{build_tool::BuildTool, fsutil, source::SourceRecord};

pub const SNIPPET_FILE: &str = "dependent-toolchain.cmake";

/// Path of the package root as seen from the snippet's directory.
const ROOT_FROM_SNIPPET: &str = "../../..";

const SNIPPET_TEMPLATE: &str = r#"include_guard(GLOBAL)
message(STATUS "{{ name }} {{ version }}: loading dependent toolchain ${CMAKE_CURRENT_LIST_FILE}")
cmake_path(SET {{ root_variable }} NORMALIZE "${CMAKE_CURRENT_LIST_DIR}/{{ root_from_snippet }}")
"#;

/// `<package_root>/lib/cmake/<name>/dependent-toolchain.cmake`
pub fn snippet_path(package_root: &Path, name: &str) -> PathBuf {
    package_root
        .join("lib")
        .join("cmake")
        .join(name)
        .join(SNIPPET_FILE)
}

//
// ──────────────────────────────────────────────────────────────────────────────
//  TOOLCHAIN EMITTER
// ──────────────────────────────────────────────────────────────────────────────
//
// Two duties around the build: before configure, bake the resolved version
// into builds of local sources; after install, leave a snippet that lets
// dependents find this package's root.
//

#[derive(Debug, Clone)]
pub struct ToolchainEmitter {
    pub name: String,
    pub root_variable: String,
    pub local_version_variable: String,
}

impl ToolchainEmitter {
    /// Inject the local-version variable iff the source is local.
    /// Returns whether the variable was injected.
    pub fn inject_local_version(
        &self,
        record: &SourceRecord,
        version: &str,
        tool: &mut dyn BuildTool,
    ) -> bool {
        if !record.is_local() {
            debug!("remote source, version fixed by the recorded commit");
            return false;
        }
        tool.define(&self.local_version_variable, version);
        info!(variable = %self.local_version_variable, %version, "injected local version");
        true
    }

    pub fn render(&self, version: &str) -> Result<String, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template(SNIPPET_FILE, SNIPPET_TEMPLATE)?;
        env.get_template(SNIPPET_FILE)?.render(context! {
            name => &self.name,
            version => version,
            root_variable => &self.root_variable,
            root_from_snippet => ROOT_FROM_SNIPPET,
        })
    }

    /// Write the snippet under `package_root` and return its path.
    pub fn emit(
        &self,
        package_root: &Path,
        record: &SourceRecord,
        version: &str,
    ) -> LibResult<PathBuf> {
        let path = snippet_path(package_root, &self.name);

        let text = self
            .render(version)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            .context(ToolchainEmitSnafu { path: &path })?;
        fsutil::write_text_file(&path, &text).context(ToolchainEmitSnafu { path: &path })?;

        info!(
            path = %path.display(),
            origin_kind = record.origin_kind(),
            "emitted dependent toolchain"
        );
        Ok(path)
    }
}

/// Evaluate the root assignment of a written snippet against the snippet's
/// own location, the way the build system would.
pub fn resolve_snippet_root(snippet: &Path) -> LibResult<PathBuf> {
    let text = fs::read_to_string(snippet).context(ToolchainEmitSnafu { path: snippet })?;

    let invalid = || {
        io::Error::new(
            io::ErrorKind::InvalidData,
            "no `cmake_path(SET ... NORMALIZE \"...\")` assignment",
        )
    };

    let line = text
        .lines()
        .find(|l| l.trim_start().starts_with("cmake_path(SET"))
        .ok_or_else(invalid)
        .context(ToolchainEmitSnafu { path: snippet })?;

    let (start, end) = match (line.find('"'), line.rfind('"')) {
        (Some(start), Some(end)) if end > start => (start, end),
        _ => {
            return Err(ToolchainEmitSnafu { path: snippet }
                .into_error(invalid())
                .into());
        }
    };

    let list_dir = snippet.parent().unwrap_or(Path::new("."));
    let expr = line[start + 1..end].replace(
        "${CMAKE_CURRENT_LIST_DIR}",
        &list_dir.to_string_lossy(),
    );
    Ok(fsutil::normalize(Path::new(&expr)))
}
