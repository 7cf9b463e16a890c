//! Applies hardware sizing to an existing VM.
//!
//! Loads `provision.toml`, validates it, and runs the hardware pipeline step
//! against the target VM through `govc`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use provision::core::types::VmRef;
use provision::exit_codes;
use provision::io::config::{DEFAULT_CONFIG_PATH, ProvisionConfig, load_config, write_config};
use provision::io::context::ExecutionContext;
use provision::io::govc::GovcClient;
use provision::io::reporter::ConsoleReporter;
use provision::logging;
use provision::pipeline::{Pipeline, PipelineOutcome, PipelineState, Step};
use provision::step::StepConfigureHardware;

#[derive(Parser)]
#[command(
    name = "provision",
    version,
    about = "Apply CPU and memory settings to an existing virtual machine"
)]
struct Cli {
    /// Path to the config file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Emit debug diagnostics on stderr (ignored when `RUST_LOG` is set).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Load the config and check hardware settings for conflicts.
    Validate,
    /// Reconfigure the VM and wait for the change to finish.
    Apply {
        /// Inventory path or name of the VM (overrides `vm` in the config).
        #[arg(long)]
        vm: Option<String>,
        /// Pipeline deadline in seconds (overrides `timeout_secs`; 0 = none).
        #[arg(long)]
        timeout: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Validate => cmd_validate(&cli.config),
        Command::Apply { vm, timeout } => cmd_apply(&cli.config, vm, timeout),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if !force && path.exists() {
        bail!("{} already exists (pass --force to overwrite)", path.display());
    }
    write_config(path, &ProvisionConfig::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_validate(path: &Path) -> Result<i32> {
    load_config(path)?;
    Ok(exit_codes::OK)
}

fn cmd_apply(path: &Path, vm: Option<String>, timeout: Option<u64>) -> Result<i32> {
    let cfg = load_config(path)?;
    let vm = vm.or_else(|| cfg.vm.clone()).ok_or_else(|| {
        anyhow!(
            "no target VM (pass --vm or set `vm` in {})",
            path.display()
        )
    })?;

    let timeout_secs = timeout.unwrap_or(cfg.timeout_secs);
    let ctx = if timeout_secs > 0 {
        ExecutionContext::background().with_timeout(Duration::from_secs(timeout_secs))
    } else {
        ExecutionContext::background()
    };

    let mut state = PipelineState::new(VmRef::new(vm), ctx, Box::new(ConsoleReporter));
    let hardware: Box<dyn Step> = Box::new(StepConfigureHardware::new(
        cfg.hardware,
        GovcClient::new(cfg.remote.clone()),
    ));
    let mut pipeline = Pipeline::new(vec![hardware]);

    info!(vm = %state.vm, timeout_secs, "starting pipeline");
    let outcome = pipeline.run(&mut state);
    Ok(report_outcome(&outcome, &state))
}

fn report_outcome(outcome: &PipelineOutcome, state: &PipelineState) -> i32 {
    let detail = state
        .error
        .as_ref()
        .map(|err| format!("{err:#}"))
        .unwrap_or_else(|| "no error recorded".to_string());
    match outcome {
        PipelineOutcome::Completed => exit_codes::OK,
        PipelineOutcome::Halted { step } => {
            state.reporter.error(&format!("Step '{step}' failed: {detail}"));
            exit_codes::HALTED
        }
        PipelineOutcome::Cancelled { step } => {
            state.reporter.error(&format!("Cancelled before step '{step}': {detail}"));
            exit_codes::CANCELLED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_apply_with_overrides() {
        let cli = Cli::parse_from(["provision", "apply", "--vm", "build-01", "--timeout", "60"]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        match cli.command {
            Command::Apply { vm, timeout } => {
                assert_eq!(vm.as_deref(), Some("build-01"));
                assert_eq!(timeout, Some(60));
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn parse_validate_with_config() {
        let cli = Cli::parse_from(["provision", "validate", "--config", "hw.toml"]);
        assert_eq!(cli.config, PathBuf::from("hw.toml"));
        assert!(matches!(cli.command, Command::Validate));
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["provision", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::parse_from(["provision", "apply", "-v", "--vm", "build-01"]);
        assert!(cli.verbose);
    }
}
