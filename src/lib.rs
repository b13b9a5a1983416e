//! Source-identity resolution and toolchain propagation for packaging a
//! CMake-built C++ library.
//!
//! A packaging run moves through `export -> source -> generate -> build ->
//! package`. The export stage resolves the version and decides, once,
//! whether the source is a local working copy or a pinned remote commit;
//! that decision is persisted in the run metadata and every later stage
//! branches on the persisted value.

pub mod build_tool;
pub mod config;
pub mod fsutil;
pub mod layout;
pub mod materialize;
pub mod metadata;
pub mod run;
pub mod source;
pub mod toolchain;
pub mod vcs;
pub mod version;

pub use build_tool::{BuildTool, CMake};
pub use config::RecipeConfig;
pub use layout::RunLayout;
pub use materialize::materialize;
pub use metadata::RunMetadata;
pub use run::{Recipe, RunState};
pub use source::{SourceRecord, record_source_identity};
pub use toolchain::{ToolchainEmitter, resolve_snippet_root};
pub use vcs::{GitCli, RevisionInspector, Vcs};
pub use version::resolve_version;

#[cfg(test)]
mod common;
