use std::{
    path::{Path, PathBuf},
    process::Command,
};

use recipe_errors::{LibError, VcsUnavailableSnafu};
use tracing::debug;

use crate::fsutil;

//
// ──────────────────────────────────────────────────────────────────────────────
//  VERSION-CONTROL COLLABORATOR
// ──────────────────────────────────────────────────────────────────────────────
//
// The recipe never implements version control itself; it asks a `Vcs` for a
// handful of primitives. `GitCli` answers them by running the `git` binary
// synchronously. Tests substitute an in-memory implementation.
//

pub trait Vcs {
    /// Top-level directory of the working tree containing `path`.
    fn toplevel(&self, path: &Path) -> Result<PathBuf, LibError>;

    /// Nearest-tag description of HEAD (`git describe --tags`).
    fn describe_tag(&self, path: &Path) -> Result<String, LibError>;

    /// Remote URL and HEAD commit of the repository at `path`.
    fn url_and_commit(&self, path: &Path) -> Result<(String, String), LibError>;

    /// Whether the working tree has uncommitted changes.
    fn is_dirty(&self, path: &Path) -> Result<bool, LibError>;

    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), LibError>;

    fn checkout(&self, dest: &Path, commit: &str) -> Result<(), LibError>;

    fn head_commit(&self, path: &Path) -> Result<String, LibError>;
}

#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    remote: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git", "origin")
    }
}

impl GitCli {
    pub fn new(program: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            remote: remote.into(),
        }
    }

    /// Run git in `cwd` and return trimmed stdout, or the failure as
    /// `VcsUnavailable` carrying the command line and stderr.
    fn run(&self, cwd: &Path, args: &[&str]) -> Result<String, LibError> {
        let command = format!("{} {}", self.program, args.join(" "));
        debug!(cwd = %cwd.display(), %command, "running version-control command");

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(cwd)
            .output();

        match output {
            Ok(out) if out.status.success() => {
                Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
                let message = if stderr.is_empty() {
                    format!("exited with {}", out.status)
                } else {
                    stderr
                };
                VcsUnavailableSnafu {
                    path: cwd,
                    command,
                    message,
                }
                .fail()
            }
            Err(e) => VcsUnavailableSnafu {
                path: cwd,
                command,
                message: e.to_string(),
            }
            .fail(),
        }
    }

    fn non_empty(&self, cwd: &Path, args: &[&str]) -> Result<String, LibError> {
        let out = self.run(cwd, args)?;
        if out.is_empty() {
            return VcsUnavailableSnafu {
                path: cwd,
                command: format!("{} {}", self.program, args.join(" ")),
                message: "empty output",
            }
            .fail();
        }
        Ok(out)
    }
}

impl Vcs for GitCli {
    fn toplevel(&self, path: &Path) -> Result<PathBuf, LibError> {
        self.non_empty(path, &["rev-parse", "--show-toplevel"])
            .map(PathBuf::from)
    }

    fn describe_tag(&self, path: &Path) -> Result<String, LibError> {
        self.non_empty(path, &["describe", "--tags"])
    }

    fn url_and_commit(&self, path: &Path) -> Result<(String, String), LibError> {
        let url = self.non_empty(path, &["remote", "get-url", self.remote.as_str()])?;
        let commit = self.head_commit(path)?;
        Ok((url, commit))
    }

    fn is_dirty(&self, path: &Path) -> Result<bool, LibError> {
        self.run(path, &["status", "--porcelain"])
            .map(|out| !out.is_empty())
    }

    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), LibError> {
        // git resolves `dest` against its own working directory.
        let dest = std::path::absolute(dest).map_err(|e| LibError::VcsUnavailable {
            path: dest.to_path_buf(),
            command: format!("{} clone", self.program),
            message: e.to_string(),
        })?;
        let parent = dest.parent().unwrap_or(&dest);
        let target = dest.to_string_lossy();
        self.run(parent, &["clone", "--quiet", url, &*target])
            .map(|_| ())
    }

    fn checkout(&self, dest: &Path, commit: &str) -> Result<(), LibError> {
        self.run(
            dest,
            &["-c", "advice.detachedHead=false", "checkout", "--quiet", commit],
        )
        .map(|_| ())
    }

    fn head_commit(&self, path: &Path) -> Result<String, LibError> {
        self.non_empty(path, &["rev-parse", "HEAD"])
    }
}

//
// ──────────────────────────────────────────────────────────────────────────────
//  REVISION INSPECTOR
// ──────────────────────────────────────────────────────────────────────────────
//
// Narrow view over a `Vcs` used by the export stage. The repository-root
// check is a probe: any failure to ask means "not a root", never an error.
//

pub struct RevisionInspector<'a> {
    vcs: &'a dyn Vcs,
}

impl<'a> RevisionInspector<'a> {
    pub fn new(vcs: &'a dyn Vcs) -> Self {
        Self { vcs }
    }

    /// True iff `path`, canonicalized, is the top level of its working tree.
    pub fn is_repository_root(&self, path: &Path) -> bool {
        let Ok(path) = fsutil::resolve_absolute(path) else {
            return false;
        };

        let root = self
            .vcs
            .toplevel(&path)
            .map_err(|e| e.to_string())
            .and_then(|root| fsutil::resolve_absolute(&root).map_err(|e| e.to_string()));

        match root {
            Ok(root) => root == path,
            Err(reason) => {
                debug!(path = %path.display(), %reason, "not a repository root");
                false
            }
        }
    }

    pub fn describe_tag(&self, path: &Path) -> Result<String, LibError> {
        self.vcs.describe_tag(path)
    }

    pub fn current_url_and_commit(&self, path: &Path) -> Result<(String, String), LibError> {
        self.vcs.url_and_commit(path)
    }

    /// Dirty-tree check; unknown state reads as clean.
    pub fn is_dirty(&self, path: &Path) -> bool {
        self.vcs.is_dirty(path).unwrap_or(false)
    }
}
