#![forbid(unsafe_code)]

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use cipherforge_config::BuildConfig;
use cipherforge_engine::Orchestrator;
use cipherforge_targets::{supported_on, HostOs, TargetId, CATALOG};
use cipherforge_util::log::StderrLog;
use cipherforge_util::process::SystemRunner;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "cipherforge", about = "Cross-platform OpenSSL and SQLCipher builds")]
#[command(version)]
struct Cli {
    /// Working directory for sources, scripts, and collected artifacts
    #[arg(long, default_value = "build", global = true)]
    workroot: PathBuf,

    /// Show tool output while building
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build specific targets (defaults to the manifest's selection)
    Build {
        /// Target id (repeatable), e.g. linuxX64 or androidArm64
        #[arg(long = "target")]
        targets: Vec<String>,
    },
    /// Build every selected target and report their output directories
    BuildAll,
    /// Remove a target's collected artifacts and cached sources
    Clean {
        /// Target id (repeatable); defaults to the manifest's selection
        #[arg(long = "target")]
        targets: Vec<String>,
    },
    /// List the target catalog and what the current host can build
    Targets,
}

fn main() {
    let cli = Cli::parse();

    let log = StderrLog {
        verbose: cli.verbose,
    };
    let result = match cli.command {
        Command::Build { targets } => cmd_build(&cli.workroot, &targets, &log),
        Command::BuildAll => cmd_build_all(&cli.workroot, &log),
        Command::Clean { targets } => cmd_clean(&cli.workroot, &targets, &log),
        Command::Targets => cmd_targets(),
    };

    if let Err(msg) = result {
        eprintln!("error: {msg}");
        process::exit(1);
    }
}

/// Load `cipherforge.toml` from the current directory.
fn load_config() -> Result<BuildConfig, Box<dyn Error>> {
    let cwd = std::env::current_dir()?;
    let manifest = cwd.join("cipherforge.toml");
    if !manifest.exists() {
        return Err("no cipherforge.toml found in current directory".into());
    }
    Ok(BuildConfig::from_path(&manifest)?)
}

fn parse_targets(config: &BuildConfig, names: &[String]) -> Result<Vec<TargetId>, Box<dyn Error>> {
    if names.is_empty() {
        return Ok(config.selected_targets()?);
    }
    let mut targets = Vec::new();
    for name in names {
        targets.push(name.parse::<TargetId>()?);
    }
    Ok(targets)
}

fn cmd_build(workroot: &Path, names: &[String], log: &StderrLog) -> CliResult {
    let config = load_config()?;
    let runner = SystemRunner;
    let orchestrator = Orchestrator::new(&config, workroot, &runner, log)?;

    for target in parse_targets(&config, names)? {
        let outcome = orchestrator.run_target(target)?;
        if let Some(dir) = outcome.output_dir {
            eprintln!("    Finished {target} \u{2192} {}", dir.display());
        }
    }
    Ok(())
}

fn cmd_build_all(workroot: &Path, log: &StderrLog) -> CliResult {
    let config = load_config()?;
    let runner = SystemRunner;
    let orchestrator = Orchestrator::new(&config, workroot, &runner, log)?;

    let outputs = orchestrator.build_all()?;
    for (target, dir) in &outputs {
        eprintln!("    Finished {target} \u{2192} {}", dir.display());
    }
    if outputs.is_empty() {
        eprintln!("    Nothing built - no selected target is supported on this host");
    }
    Ok(())
}

fn cmd_clean(workroot: &Path, names: &[String], log: &StderrLog) -> CliResult {
    let config = load_config()?;
    let runner = SystemRunner;
    let orchestrator = Orchestrator::new(&config, workroot, &runner, log)?;

    for target in parse_targets(&config, names)? {
        orchestrator.clean(target)?;
    }
    Ok(())
}

fn cmd_targets() -> CliResult {
    let host = HostOs::query()?;
    eprintln!("host: {host}");
    for descriptor in CATALOG {
        let marker = if supported_on(descriptor.id, host) {
            "buildable"
        } else {
            "ignored on this host"
        };
        eprintln!(
            "    {:<14} {:?}/{:?} \u{2014} {marker}",
            descriptor.id.to_string(),
            descriptor.arch,
            descriptor.toolchain
        );
    }
    Ok(())
}
