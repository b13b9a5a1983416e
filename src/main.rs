use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use recipe_errors::{CliResult, LibError, LibResult, ReportExt};
use recipe_rs::{GitCli, Recipe, RecipeConfig, source::persisted_record};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

//
// ──────────────────────────────────────────────────────────────────────────────
//  CLI ARGUMENTS
// ──────────────────────────────────────────────────────────────────────────────
//
// Each stage is its own subcommand so an orchestrator can run them in
// separate processes; `create` runs them all in order. Stages share state
// only through the run directory.
//

#[derive(Parser, Debug)]
#[command(
    name = "recipe-rs",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("RECIPE_BUILD_DATE"), ")"),
    about = "Package a CMake library with a pinned source identity"
)]
pub struct Cli {
    /// Directory holding recipe.yaml.
    #[arg(short, long, default_value = ".")]
    recipe: PathBuf,

    /// Directory owned by this packaging run.
    #[arg(long, default_value = ".recipe-run")]
    run_dir: PathBuf,

    /// Explicit package version; skips the tag lookup.
    #[arg(long)]
    pkg_version: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the version and record the source identity.
    Export,
    /// Fetch the recorded revision (no-op for local sources).
    Source,
    /// Write build-time variables for configure.
    Generate,
    /// Configure and build.
    Build,
    /// Install and emit the dependent toolchain.
    Package,
    /// Run every stage in order.
    Create,
    /// Print the persisted run metadata.
    Show {
        /// Also resolve the installed snippet's package root.
        #[arg(long)]
        verify: bool,
    },
}

fn init_tracing(log_dir: &Path) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "recipe.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Respect RUST_LOG or default to 'info', for the file and the terminal alike
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_writer(non_blocking))
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}

fn absolute(path: &Path) -> LibResult<PathBuf> {
    std::path::absolute(path).map_err(|e| {
        LibError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
        .into()
    })
}

fn run(cli: &Cli, run_dir: &Path) -> LibResult<()> {
    let recipe_dir = absolute(&cli.recipe)?;
    let config = RecipeConfig::load(&recipe_dir)?;
    let git = GitCli::new(config.git.clone(), config.remote.clone());

    let recipe = Recipe::new(config, recipe_dir, run_dir.to_path_buf(), &git)
        .with_version_override(cli.pkg_version.clone());

    match &cli.command {
        Command::Export => {
            let record = recipe.export()?;
            println!("origin_kind: {}", record.origin_kind());
        }
        Command::Source => {
            recipe.source()?;
        }
        Command::Generate => {
            let record = persisted_record(&recipe.open_metadata()?)?;
            let mut cmake = recipe.cmake_for(&record);
            recipe.generate(&mut cmake)?;
        }
        Command::Build => {
            let record = persisted_record(&recipe.open_metadata()?)?;
            let mut cmake = recipe.cmake_for(&record);
            recipe.build(&mut cmake)?;
        }
        Command::Package => {
            let record = persisted_record(&recipe.open_metadata()?)?;
            let mut cmake = recipe.cmake_for(&record);
            let snippet = recipe.package(&mut cmake)?;
            println!("{}", snippet.display());
        }
        Command::Create => {
            let snippet = recipe.create(|recipe, record| recipe.cmake_for(record))?;
            println!("{}", snippet.display());
        }
        Command::Show { verify } => {
            let meta = recipe.open_metadata()?;

            let config = &recipe.config;
            println!("# {}", config.name);
            for (label, value) in [
                ("description", &config.description),
                ("author", &config.author),
                ("url", &config.url),
                ("license", &config.license),
            ] {
                if let Some(value) = value {
                    println!("# {label}: {value}");
                }
            }
            print!("{}", meta.to_yaml()?);

            if *verify {
                let root = recipe.verify_snippet()?;
                let expected = recipe.layout.package_folder();
                let status = if root == expected { "[OK]" } else { "[MISMATCH]" };
                println!("snippet root: {} {status}", root.display());
            }
        }
    }

    Ok(())
}

fn main() -> CliResult<()> {
    // Color-Eyre renders unhandled panics.
    color_eyre::install().map_err(|e| miette::miette!("{e}"))?;

    let cli = Cli::parse();

    let run_dir = std::path::absolute(&cli.run_dir)
        .map_err(|e| miette::miette!("resolving {}: {e}", cli.run_dir.display()))?;
    let _guard = init_tracing(&run_dir.join("logs")).map_err(|e| miette::miette!("{e:#}"))?;

    if let Err(report) = run(&cli, &run_dir) {
        let api_err = report.to_api_error();
        eprintln!("\n[Diagnostic ID: {}]", api_err.correlation_id);

        return Err(miette::Report::new(report));
    }

    Ok(())
}
