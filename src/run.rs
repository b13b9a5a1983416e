use std::{
    fmt, fs,
    path::PathBuf,
};

use recipe_errors::{Annotate, ExportCopySnafu, LibError, LibResult, StageOrderSnafu};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use tracing::{info, warn};

use crate::{
    build_tool::{BuildTool, CMake},
    config::RecipeConfig,
    layout::RunLayout,
    materialize::materialize,
    metadata::{RunMetadata, keys},
    source::{ExportSpec, SourceRecord, persisted_record, record_source_identity},
    toolchain::{ToolchainEmitter, resolve_snippet_root, snippet_path},
    vcs::{RevisionInspector, Vcs},
    version::resolve_version,
};

//
// ──────────────────────────────────────────────────────────────────────────────
//  RUN STATE
// ──────────────────────────────────────────────────────────────────────────────
//
// Start -> VersionResolved -> SourceIdentityRecorded
//       -> SourceReady (local) | SourceMaterialized (remote)
//       -> Built -> Installed -> ToolchainEmitted -> Done
//
// Transitions only move forward. Any failure moves the run to Failed, from
// which only a fresh export recovers.
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Start,
    VersionResolved,
    SourceIdentityRecorded,
    SourceReady,
    SourceMaterialized,
    Built,
    Installed,
    ToolchainEmitted,
    Done,
    Failed,
}

impl RunState {
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;

        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Start, VersionResolved)
            | (VersionResolved, SourceIdentityRecorded)
            | (SourceIdentityRecorded, SourceReady | SourceMaterialized)
            | (SourceReady | SourceMaterialized, Built)
            | (Built, Installed)
            | (Installed, ToolchainEmitted)
            | (ToolchainEmitted, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Start => "start",
            RunState::VersionResolved => "version_resolved",
            RunState::SourceIdentityRecorded => "source_identity_recorded",
            RunState::SourceReady => "source_ready",
            RunState::SourceMaterialized => "source_materialized",
            RunState::Built => "built",
            RunState::Installed => "installed",
            RunState::ToolchainEmitted => "toolchain_emitted",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

pub fn current_state(meta: &RunMetadata) -> LibResult<RunState> {
    Ok(meta.get(keys::STATE)?.unwrap_or(RunState::Start))
}

fn advance(meta: &mut RunMetadata, stage: &str, next: RunState) -> LibResult<()> {
    let current = current_state(meta)?;
    if !current.can_advance_to(next) {
        return Err(StageOrderSnafu {
            stage,
            state: current.to_string(),
        }
        .build()
        .into());
    }
    meta.set(keys::STATE, &next)
}

fn expect_state(meta: &RunMetadata, stage: &str, allowed: &[RunState]) -> LibResult<RunState> {
    let current = current_state(meta)?;
    if !allowed.contains(&current) {
        return Err(StageOrderSnafu {
            stage,
            state: current.to_string(),
        }
        .build()
        .into());
    }
    Ok(current)
}

//
// ──────────────────────────────────────────────────────────────────────────────
//  RECIPE STAGES
// ──────────────────────────────────────────────────────────────────────────────
//
// Each stage opens the run metadata, reads only the keys it is contracted
// to read and writes only the keys it owns. Stages may run in separate
// processes; the metadata file is the only state they share.
//

pub struct Recipe<'a> {
    pub config: RecipeConfig,
    pub recipe_dir: PathBuf,
    pub layout: RunLayout,
    pub vcs: &'a dyn Vcs,
    /// Version given on the command line; wins over `config.version`.
    pub version_override: Option<String>,
}

impl<'a> Recipe<'a> {
    pub fn new(config: RecipeConfig, recipe_dir: PathBuf, run_dir: PathBuf, vcs: &'a dyn Vcs) -> Self {
        let layout = RunLayout::new(run_dir, config.build_type.clone());
        Self {
            config,
            recipe_dir,
            layout,
            vcs,
            version_override: None,
        }
    }

    pub fn with_version_override(mut self, version: Option<String>) -> Self {
        self.version_override = version;
        self
    }

    pub fn emitter(&self) -> ToolchainEmitter {
        ToolchainEmitter {
            name: self.config.name.clone(),
            root_variable: self.config.root_variable(),
            local_version_variable: self.config.local_version_variable(),
        }
    }

    /// The CMake collaborator configured for this run and source.
    pub fn cmake_for(&self, record: &SourceRecord) -> CMake {
        CMake::new(
            self.config.cmake.clone(),
            self.config.build_type.clone(),
            self.layout.source_folder(record),
            self.layout.build_folder(),
            self.layout.package_folder(),
        )
        .with_generator(self.config.generator.clone())
    }

    pub fn open_metadata(&self) -> LibResult<RunMetadata> {
        RunMetadata::open(self.layout.run_dir())
    }

    /// Export: start a fresh run, resolve the version and decide the
    /// source identity.
    pub fn export(&self) -> LibResult<SourceRecord> {
        let mut meta = RunMetadata::create(self.layout.run_dir())?;

        self.guarded("export", &mut meta, |meta| {
            meta.set(keys::RECIPE, &self.config.name)?;
            meta.set(keys::STATE, &RunState::Start)?;

            let inspector = RevisionInspector::new(self.vcs);
            let explicit = self
                .version_override
                .as_deref()
                .or(self.config.version.as_deref());
            let version = resolve_version(explicit, &self.recipe_dir, &inspector)?;
            meta.set_once(keys::VERSION, &version)?;
            advance(meta, "export", RunState::VersionResolved)?;

            self.clear_stale_folders()?;

            let export_dir = self.layout.export_source();
            let spec = ExportSpec {
                recipe_path: &self.recipe_dir,
                export_dir: &export_dir,
                exports_sources: &self.config.exports_sources,
            };
            let record = record_source_identity(&spec, &inspector, meta)?;
            advance(meta, "export", RunState::SourceIdentityRecorded)?;
            Ok(record)
        })
    }

    /// Source: make the recorded source available to the build.
    pub fn source(&self) -> LibResult<SourceRecord> {
        let mut meta = self.open_metadata()?;

        self.guarded("source", &mut meta, |meta| {
            expect_state(meta, "source", &[RunState::SourceIdentityRecorded])?;
            let record = persisted_record(meta)?;

            materialize(&record, &self.layout.fetched_source(), self.vcs)?;

            let next = if record.is_local() {
                RunState::SourceReady
            } else {
                RunState::SourceMaterialized
            };
            advance(meta, "source", next)?;
            Ok(record)
        })
    }

    /// Generate: inject build-time variables and write them out for
    /// configure. Returns whether the local version was injected.
    pub fn generate(&self, tool: &mut dyn BuildTool) -> LibResult<bool> {
        let mut meta = self.open_metadata()?;

        self.guarded("generate", &mut meta, |meta| {
            expect_state(
                meta,
                "generate",
                &[RunState::SourceReady, RunState::SourceMaterialized],
            )?;
            let record = persisted_record(meta)?;
            let version: String = meta.require(keys::VERSION)?;

            let injected = self.emitter().inject_local_version(&record, &version, tool);
            let cache = tool.generate()?;
            meta.set(keys::GENERATED, &cache)?;
            Ok(injected)
        })
    }

    /// Build: configure and compile through the build tool.
    pub fn build(&self, tool: &mut dyn BuildTool) -> LibResult<()> {
        let mut meta = self.open_metadata()?;

        self.guarded("build", &mut meta, |meta| {
            expect_state(
                meta,
                "build",
                &[RunState::SourceReady, RunState::SourceMaterialized],
            )?;
            let _: PathBuf = meta.require(keys::GENERATED)?;

            tool.configure()?;
            tool.build()?;
            advance(meta, "build", RunState::Built)
        })
    }

    /// Package: install, then emit the dependent toolchain snippet.
    pub fn package(&self, tool: &mut dyn BuildTool) -> LibResult<PathBuf> {
        let mut meta = self.open_metadata()?;

        self.guarded("package", &mut meta, |meta| {
            expect_state(meta, "package", &[RunState::Built])?;
            let record = persisted_record(meta)?;
            let version: String = meta.require(keys::VERSION)?;

            tool.install()?;
            advance(meta, "package", RunState::Installed)?;

            let snippet = self
                .emitter()
                .emit(&self.layout.package_folder(), &record, &version)?;
            advance(meta, "package", RunState::ToolchainEmitted)?;
            advance(meta, "package", RunState::Done)?;
            Ok(snippet)
        })
    }

    /// Run every stage in order in this process.
    pub fn create<T, F>(&self, make_tool: F) -> LibResult<PathBuf>
    where
        T: BuildTool,
        F: FnOnce(&Self, &SourceRecord) -> T,
    {
        self.export()?;
        let record = self.source()?;

        let mut tool = make_tool(self, &record);
        self.generate(&mut tool)?;
        self.build(&mut tool)?;
        self.package(&mut tool)
    }

    /// Resolve the root that the installed snippet would compute.
    pub fn verify_snippet(&self) -> LibResult<PathBuf> {
        let path = snippet_path(&self.layout.package_folder(), &self.config.name);
        resolve_snippet_root(&path)
    }

    fn clear_stale_folders(&self) -> LibResult<()> {
        for dir in [
            self.layout.export_source(),
            self.layout.fetched_source(),
            self.layout.build_folder(),
            self.layout.package_folder(),
        ] {
            if dir.exists() {
                fs::remove_dir_all(&dir).context(ExportCopySnafu { path: &dir })?;
            }
        }
        Ok(())
    }

    fn guarded<T>(
        &self,
        stage: &str,
        meta: &mut RunMetadata,
        body: impl FnOnce(&mut RunMetadata) -> LibResult<T>,
    ) -> LibResult<T> {
        info!(stage, run = %self.layout.run_dir().display(), "stage started");

        let result = body(meta);
        match &result {
            Ok(_) => info!(stage, "stage finished"),
            // A stage invoked out of order did no work; the run stays where it was.
            Err(report) if matches!(report.kind(), LibError::StageOrder { .. }) => {
                warn!(stage, "stage invoked out of order");
            }
            Err(_) => {
                if let Err(e) = meta.set(keys::STATE, &RunState::Failed) {
                    warn!(stage, error = %e, "could not persist failed state");
                }
            }
        }

        result
            .annotate(format!("stage: {stage}"))
            .annotate(format!("run dir: {}", self.layout.run_dir().display()))
    }
}
