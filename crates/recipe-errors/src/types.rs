/*
 * Structured Error Definitions.
 *
 * One variant per failure kind of a packaging run. Every variant carries
 * the path or collaborator involved plus the underlying message, so the
 * orchestrator can diagnose a halted run without re-running it.
 */

#![allow(unused_assignments)]

use std::path::PathBuf;

use miette::Diagnostic;
use snafu::prelude::*;

#[derive(Debug, Snafu, Diagnostic)]
#[snafu(visibility(pub))]
pub enum LibError {
    /// The version-control tool could not answer a query.
    #[snafu(display("`{command}` failed in {}: {message}", path.display()))]
    #[diagnostic(
        code(vcs::unavailable),
        help("Check that the version-control tool is installed and that the directory is a repository.")
    )]
    VcsUnavailable {
        /// Directory the command ran in.
        path: PathBuf,
        /// The command line that failed.
        command: String,
        /// Captured stderr or spawn error.
        message: String,
    },

    /// No override was given and no tag describes the current revision.
    #[snafu(display("Cannot resolve a version for {}: {message}", path.display()))]
    #[diagnostic(
        code(version::unresolved),
        help("Tag the current commit (e.g. `git tag v1.2.3`) or pass an explicit `--pkg-version`.")
    )]
    VersionResolution { path: PathBuf, message: String },

    /// The repository-root probe succeeded but url/commit lookup did not.
    #[snafu(display(
        "{} is a repository root but its url and commit could not be read: {message}",
        path.display()
    ))]
    #[diagnostic(
        code(vcs::inconsistent),
        help("Make sure the recorded remote exists (`git remote -v`) and HEAD points at a commit.")
    )]
    VcsInconsistency { path: PathBuf, message: String },

    /// Clone or checkout of the recorded revision failed.
    #[snafu(display(
        "Failed to fetch {url} at {commit} into {}: {message}",
        destination.display()
    ))]
    #[diagnostic(
        code(source::fetch_failed),
        help("The recorded commit must be reachable from the recorded url; push it or re-export.")
    )]
    SourceFetch {
        url: String,
        commit: String,
        destination: PathBuf,
        message: String,
    },

    /// Writing the toolchain snippet failed.
    #[snafu(display("Failed to write toolchain snippet {}", path.display()))]
    #[diagnostic(code(toolchain::emit_failed))]
    ToolchainEmit {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The underlying build tool reported a failure.
    #[snafu(display("Build tool step `{step}` failed: {message}"))]
    #[diagnostic(code(build::failed))]
    BuildTool { step: String, message: String },

    /// The recipe file is missing or malformed.
    #[snafu(display("Invalid recipe configuration at {}: {message}", path.display()))]
    #[diagnostic(
        code(config::invalid_format),
        help("Ensure recipe.yaml is valid YAML and names the package.")
    )]
    Config { path: PathBuf, message: String },

    /// The persisted run metadata cannot be read or written.
    #[snafu(display("Run metadata at {} is unusable: {message}", path.display()))]
    #[diagnostic(
        code(metadata::unusable),
        help("Start a fresh run with the `export` stage.")
    )]
    Metadata { path: PathBuf, message: String },

    /// A write-once metadata key was written twice in one run.
    #[snafu(display("`{key}` is already recorded for this run"))]
    #[diagnostic(code(metadata::already_recorded))]
    AlreadyRecorded { key: String },

    /// A stage was invoked out of order.
    #[snafu(display("Stage `{stage}` cannot run from state `{state}`"))]
    #[diagnostic(
        code(run::stage_order),
        help("Stages run in order: export, source, generate, build, package.")
    )]
    StageOrder { stage: String, state: String },

    /// Copying an allow-listed file into the exported sources failed.
    #[snafu(display("Failed to copy {} into the exported sources", path.display()))]
    #[diagnostic(code(export::copy_failed))]
    ExportCopy {
        path: PathBuf,
        source: std::io::Error,
    },
}
