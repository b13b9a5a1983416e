use std::{
    fs,
    path::{Path, PathBuf},
};

use recipe_errors::{LibError, LibResult};
use serde::Deserialize;

/// File name of the recipe description inside a recipe directory.
pub const RECIPE_FILE: &str = "recipe.yaml";

//
// ──────────────────────────────────────────────────────────────────────────────
//  RECIPE CONFIGURATION
// ──────────────────────────────────────────────────────────────────────────────
//
// Mirrors recipe.yaml so serde_yml can deserialize directly into it. Only
// `name` is required; every collaborator setting has a default so a minimal
// recipe is a single line.
//

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RecipeConfig {
    /// Package name, used for the snippet directory `lib/cmake/<name>`.
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub license: Option<String>,

    /// Explicit version; when set no tag lookup happens.
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default = "default_build_type")]
    pub build_type: String,

    /// Allow-list copied verbatim when the recipe is not a repository root.
    #[serde(default = "default_exports_sources")]
    pub exports_sources: Vec<PathBuf>,

    /// Remote whose URL is recorded for repository sources.
    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_git")]
    pub git: String,

    #[serde(default = "default_cmake")]
    pub cmake: String,

    #[serde(default)]
    pub generator: Option<String>,

    #[serde(default)]
    pub root_variable: Option<String>,

    #[serde(default)]
    pub local_version_variable: Option<String>,
}

fn default_build_type() -> String {
    "Release".to_string()
}

fn default_exports_sources() -> Vec<PathBuf> {
    ["CMakeLists.txt", "cmake", "LICENSE", "README.md"]
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_git() -> String {
    "git".to_string()
}

fn default_cmake() -> String {
    "cmake".to_string()
}

/// The name becomes a single directory under `lib/cmake/`, and the snippet's
/// fixed `../../..` only reaches the package root from exactly that depth.
fn check_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("`name` must not be empty".to_string());
    }
    if name == "." || name == ".." {
        return Err(format!("`name` must not be `{name}`"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| matches!(*c, '/' | '\\') || c.is_whitespace() || c.is_control())
    {
        return Err(format!("`name` must not contain {c:?}"));
    }
    Ok(())
}

impl RecipeConfig {
    /// Load `recipe.yaml` from a recipe directory.
    pub fn load(recipe_dir: &Path) -> LibResult<Self> {
        let path = recipe_dir.join(RECIPE_FILE);
        let yaml = fs::read_to_string(&path).map_err(|e| LibError::Config {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Self::parse(&yaml, &path)
    }

    pub fn parse(yaml: &str, path: &Path) -> LibResult<Self> {
        let config: RecipeConfig = serde_yml::from_str(yaml).map_err(|e| LibError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if let Err(message) = check_name(&config.name) {
            return Err(LibError::Config {
                path: path.to_path_buf(),
                message,
            }
            .into());
        }

        Ok(config)
    }

    /// Variable the toolchain snippet assigns the package root to.
    pub fn root_variable(&self) -> String {
        self.root_variable
            .clone()
            .unwrap_or_else(|| format!("{}_ROOT", self.name))
    }

    /// Build-time variable carrying the version for local sources.
    pub fn local_version_variable(&self) -> String {
        self.local_version_variable.clone().unwrap_or_else(|| {
            format!(
                "{}_LOCAL_VERSION",
                self.name.to_uppercase().replace('-', "_")
            )
        })
    }
}
