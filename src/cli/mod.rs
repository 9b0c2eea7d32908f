//! Command-line front end
//!
//! - `batch`: set up the workspace, build, test and collect results
//! - `package`: set up the workspace, build a release and archive it
//! - `completions`: generate shell completions

pub mod completions;

use anyhow::{Context, Result};
use clap::builder::PossibleValuesParser;
use clap::{Args as ClapArgs, CommandFactory, Parser, Subcommand, ValueEnum};
use ros2_batch::executor::CommandRunner;
use ros2_batch::infrastructure::{Config, init_logging};
use ros2_batch::pipeline::{
    BatchReport, JobConfiguration, PackagingStage, PipelineError, Space, WaitForOperator,
    WorkspaceLayout, WorkspacePipeline,
};
use ros2_batch::platform::TargetOs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// CLI arguments for ros2-batch
#[derive(Parser, Debug)]
#[command(name = "ros2-batch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build and test a fresh workspace
    Batch(BatchArgs),

    /// Build a fresh workspace and archive the install space
    Package(PackageArgs),

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: ShellArg,
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Flags shared by `batch` and `package`
#[derive(ClapArgs, Debug, Clone, Default)]
struct CommonArgs {
    /// URL of the repository manifest
    #[arg(long)]
    repo_file_url: Option<String>,

    /// Branch to switch every repository to after checkout
    #[arg(long)]
    test_branch: Option<String>,

    /// Build inside a fresh virtualenv (not on windows)
    #[arg(long)]
    do_venv: bool,

    /// Target OS: linux, osx or windows (detected when omitted)
    #[arg(long)]
    os: Option<String>,

    /// Force ANSI colour in the log output
    #[arg(long)]
    force_ansi_color: bool,

    /// Host Python interpreter
    #[arg(long)]
    python_interpreter: Option<PathBuf>,

    /// YAML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the run report as JSON to this file
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct BatchArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Workspace directories whose names should contain white space
    #[arg(
        long,
        num_args = 0..,
        value_parser = PossibleValuesParser::new(Space::ALL.map(|s| s.as_str()))
    )]
    white_space_in: Vec<String>,

    /// Build with RTI Connext
    #[arg(long)]
    connext: bool,

    /// Wait for Enter on stdin when the build fails
    #[arg(long)]
    pause_on_build_failure: bool,
}

#[derive(ClapArgs, Debug)]
struct PackageArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Build every package in isolation
    #[arg(long)]
    isolated: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ShellArg {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Build the CLI command for completion generation
pub fn build_cli() -> clap::Command {
    Args::command()
}

/// Parse and execute CLI arguments
pub fn run() -> Result<ExitCode> {
    let args = Args::parse();

    match args.command {
        Command::Batch(batch) => {
            let settings = load_settings(&batch.common, args.log_level.as_deref())?;
            let spaced = batch
                .white_space_in
                .iter()
                .map(|name| name.parse::<Space>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(PipelineError::from)?;
            let config = job_configuration(&batch.common, &settings)?
                .with_layout(WorkspaceLayout::with_white_space_in(&spaced))
                .with_connext(batch.connext);

            let mut pipeline = WorkspacePipeline::new(config, CommandRunner::system(), base_dir()?)?;
            if batch.pause_on_build_failure {
                pipeline = pipeline.with_build_failure_hook(Box::new(WaitForOperator::stdin()));
            }
            let outcome = pipeline.run();
            finish(pipeline.report(), batch.common.summary_json.as_deref(), outcome)
        }
        Command::Package(package) => {
            let settings = load_settings(&package.common, args.log_level.as_deref())?;
            let config = job_configuration(&package.common, &settings)?.with_isolated(package.isolated);

            let pipeline = WorkspacePipeline::new(config, CommandRunner::system(), base_dir()?)?;
            let mut packaging = PackagingStage::new(pipeline);
            let outcome = packaging.run();
            finish(packaging.report(), package.common.summary_json.as_deref(), outcome)
        }
        Command::Completions { shell, output } => {
            use clap_complete::Shell;

            let shell_enum = match shell {
                ShellArg::Bash => Shell::Bash,
                ShellArg::Zsh => Shell::Zsh,
                ShellArg::Fish => Shell::Fish,
                ShellArg::PowerShell => Shell::PowerShell,
            };

            let completions = completions::generate_completions(shell_enum)?;

            if let Some(output_path) = output {
                completions::save_completions(&completions, &output_path)?;
            } else {
                println!("{completions}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Reads the settings file, if any, and starts logging
fn load_settings(common: &CommonArgs, log_level: Option<&str>) -> Result<Config> {
    let settings = match &common.config {
        Some(path) => Config::load(path).map_err(PipelineError::from)?,
        None => Config::default(),
    };
    init_logging(log_level.unwrap_or(&settings.log_level), common.force_ansi_color);
    Ok(settings)
}

/// Flags win over the settings file, which wins over built-in defaults
fn job_configuration(common: &CommonArgs, settings: &Config) -> Result<JobConfiguration> {
    let os = TargetOs::select(common.os.as_deref()).map_err(PipelineError::from)?;
    let mut config = JobConfiguration::new(os)
        .with_repo_file_url(
            common
                .repo_file_url
                .clone()
                .unwrap_or_else(|| settings.default_repo_file_url.clone()),
        )
        .with_test_branch(common.test_branch.clone())
        .with_venv(common.do_venv)
        .with_force_ansi_color(common.force_ansi_color)
        .with_pip_dependencies(settings.pip_dependencies.clone());
    if let Some(interpreter) = common
        .python_interpreter
        .clone()
        .or_else(|| settings.python_interpreter.clone())
    {
        config = config.with_python_interpreter(interpreter);
    }
    Ok(config)
}

fn base_dir() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to resolve the current directory")
}

/// Prints the summary and writes the JSON report, also after a fatal failure
fn finish(
    report: &BatchReport,
    summary_json: Option<&Path>,
    outcome: Result<i32, PipelineError>,
) -> Result<ExitCode> {
    println!("{}", report.summary());
    if let Some(path) = summary_json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to: {}", path.display()))?;
    }
    let code = outcome?;
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_batch_flags() {
        let args = Args::try_parse_from([
            "ros2-batch",
            "batch",
            "--os",
            "linux",
            "--white-space-in",
            "sourcespace",
            "installspace",
            "--test-branch",
            "feature",
            "--connext",
        ])
        .unwrap();

        let Command::Batch(batch) = args.command else {
            panic!("expected batch");
        };
        assert_eq!(batch.white_space_in, vec!["sourcespace", "installspace"]);
        assert_eq!(batch.common.test_branch.as_deref(), Some("feature"));
        assert!(batch.connext);
        assert!(!batch.common.do_venv);
    }

    #[test]
    fn test_unknown_space_is_rejected_by_parser() {
        let parsed = Args::try_parse_from(["ros2-batch", "batch", "--white-space-in", "homespace"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_package_has_no_connext_flag() {
        assert!(Args::try_parse_from(["ros2-batch", "package", "--connext"]).is_err());
        let args = Args::try_parse_from(["ros2-batch", "package", "--isolated"]).unwrap();
        assert!(matches!(args.command, Command::Package(PackageArgs { isolated: true, .. })));
    }

    #[test]
    fn test_flags_override_settings() {
        let common = CommonArgs {
            os: Some("osx".to_string()),
            python_interpreter: Some(PathBuf::from("/opt/python3")),
            ..CommonArgs::default()
        };
        let settings = Config {
            default_repo_file_url: "https://example.com/custom.repos".to_string(),
            python_interpreter: Some(PathBuf::from("/usr/bin/python3")),
            ..Config::default()
        };

        let config = job_configuration(&common, &settings).unwrap();

        assert_eq!(config.os, TargetOs::Osx);
        assert_eq!(config.repo_file_url, "https://example.com/custom.repos");
        assert_eq!(config.python_interpreter, PathBuf::from("/opt/python3"));
    }

    #[test]
    fn test_unsupported_os_is_a_configuration_error() {
        let common = CommonArgs {
            os: Some("solaris".to_string()),
            ..CommonArgs::default()
        };
        let err = job_configuration(&common, &Config::default()).unwrap_err();
        let pipeline_err = err.downcast_ref::<PipelineError>().unwrap();
        assert!(matches!(pipeline_err, PipelineError::Configuration(_)));
        assert_eq!(pipeline_err.exit_code(), 1);
    }
}
