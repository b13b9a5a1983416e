use std::{
    collections::BTreeMap,
    path::PathBuf,
    process::Command,
};

use minijinja::{Environment, context};
use recipe_errors::{BuildToolSnafu, LibResult};
use serde::Serialize;
use tracing::{debug, info};

use crate::fsutil;

/// File written by `generate` and consumed by `configure`.
pub const GENERATED_CACHE_FILE: &str = "recipe_toolchain.cmake";

const CACHE_TEMPLATE: &str = r#"# Generated by recipe-rs. Do not edit.
{% for var in variables -%}
set({{ var.name }} {{ var.value | cmake_quote }} CACHE STRING "" FORCE)
{% endfor -%}
"#;

//
// ──────────────────────────────────────────────────────────────────────────────
//  BUILD TOOL COLLABORATOR
// ──────────────────────────────────────────────────────────────────────────────
//
// Compiling and installing are delegated. `define` is the only way stages
// influence the build: variables collected during the generate stage are
// written to a cache script that a later, possibly separate, configure
// step picks up.
//

pub trait BuildTool {
    /// Inject a named string variable into the build configuration.
    fn define(&mut self, name: &str, value: &str);

    /// Persist the injected variables for `configure`.
    fn generate(&self) -> LibResult<PathBuf>;

    fn configure(&self) -> LibResult<()>;

    fn build(&self) -> LibResult<()>;

    fn install(&self) -> LibResult<()>;
}

#[derive(Debug, Serialize)]
struct CacheVariable<'a> {
    name: &'a str,
    value: &'a str,
}

#[derive(Debug, Clone)]
pub struct CMake {
    pub program: String,
    pub generator: Option<String>,
    pub build_type: String,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub generators_dir: PathBuf,
    pub install_prefix: PathBuf,
    variables: BTreeMap<String, String>,
}

impl CMake {
    pub fn new(
        program: impl Into<String>,
        build_type: impl Into<String>,
        source_dir: impl Into<PathBuf>,
        build_dir: impl Into<PathBuf>,
        install_prefix: impl Into<PathBuf>,
    ) -> Self {
        let build_dir = build_dir.into();
        Self {
            program: program.into(),
            generator: None,
            build_type: build_type.into(),
            source_dir: source_dir.into(),
            generators_dir: build_dir.join("generators"),
            build_dir,
            install_prefix: install_prefix.into(),
            variables: BTreeMap::new(),
        }
    }

    pub fn with_generator(mut self, generator: Option<String>) -> Self {
        self.generator = generator;
        self
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn cache_file(&self) -> PathBuf {
        self.generators_dir.join(GENERATED_CACHE_FILE)
    }

    /// Render the cache script for the collected variables.
    pub fn render_cache(&self) -> Result<String, minijinja::Error> {
        let mut env = Environment::new();
        env.add_filter("cmake_quote", cmake_quote);
        env.add_template(GENERATED_CACHE_FILE, CACHE_TEMPLATE)?;

        let variables: Vec<CacheVariable<'_>> = self
            .variables
            .iter()
            .map(|(name, value)| CacheVariable { name, value })
            .collect();

        env.get_template(GENERATED_CACHE_FILE)?
            .render(context! { variables => variables })
    }

    pub fn configure_args(&self) -> Vec<String> {
        let mut args = vec![
            "-S".to_string(),
            self.source_dir.display().to_string(),
            "-B".to_string(),
            self.build_dir.display().to_string(),
        ];

        let cache = self.cache_file();
        if cache.exists() {
            args.push("-C".to_string());
            args.push(cache.display().to_string());
        }

        if let Some(generator) = &self.generator {
            args.push("-G".to_string());
            args.push(generator.clone());
        }

        args.push(format!("-DCMAKE_BUILD_TYPE={}", self.build_type));
        args.push(format!(
            "-DCMAKE_INSTALL_PREFIX={}",
            self.install_prefix.display()
        ));
        args
    }

    fn step_args(&self, flag: &str) -> Vec<String> {
        vec![
            flag.to_string(),
            self.build_dir.display().to_string(),
            "--config".to_string(),
            self.build_type.clone(),
        ]
    }

    fn run(&self, step: &str, args: &[String]) -> LibResult<()> {
        info!(step, "running build tool");
        debug!(program = %self.program, ?args, "build tool command");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| {
                BuildToolSnafu {
                    step,
                    message: format!("cannot run `{}`: {e}", self.program),
                }
                .build()
            })?;

        debug!(stdout = %String::from_utf8_lossy(&output.stdout).trim(), "build tool output");

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuildToolSnafu {
                step,
                message: format!("{}: {}", output.status, stderr.trim()),
            }
            .build()
            .into());
        }
        Ok(())
    }
}

impl BuildTool for CMake {
    fn define(&mut self, name: &str, value: &str) {
        debug!(variable = name, value, "injecting build variable");
        self.variables.insert(name.to_string(), value.to_string());
    }

    fn generate(&self) -> LibResult<PathBuf> {
        let path = self.cache_file();
        let text = self.render_cache().map_err(|e| {
            BuildToolSnafu {
                step: "generate",
                message: e.to_string(),
            }
            .build()
        })?;

        fsutil::write_text_file(&path, &text).map_err(|e| {
            BuildToolSnafu {
                step: "generate",
                message: format!("{}: {e}", path.display()),
            }
            .build()
        })?;
        Ok(path)
    }

    fn configure(&self) -> LibResult<()> {
        self.run("configure", &self.configure_args())
    }

    fn build(&self) -> LibResult<()> {
        let args = self.step_args("--build");
        self.run("build", &args)
    }

    fn install(&self) -> LibResult<()> {
        let args = self.step_args("--install");
        self.run("install", &args)
    }
}

/// Quote a value as a CMake bracket-free string literal.
pub fn cmake_quote(value: String) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' | '"' | '$' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
