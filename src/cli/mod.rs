//! CLI module for the docgate harness
//!
//! This module provides the command-line interface for the harness.
//!
//! ## Commands
//!
//! - `test [ROOT]` - Run the doctest fixtures (also the default when no subcommand is given)
//! - `markers` - List the registered version markers
//! - `doc <action> [FILE]` - Run a documentation-engine helper on a source file
//!
//! ## Modules
//!
//! - `commands` - Command implementations
//! - `locate` - Fixture-root lookup
//! - `test_runner` - Harness driver and reporters
//! - `test_interfaces` - Interpreter/session I/O boundary
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;
pub mod locate;
pub mod test_interfaces;
pub mod test_runner;

use std::fmt;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use docgate_core::RuntimeVersion;

use crate::harness::config::{HarnessConfig, NAME_PLACEHOLDER, ReportFormat, RequirementMode, SOURCE_PLACEHOLDER};
use crate::version::DOCGATE_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Version-gated doctest harness
#[derive(Parser, Debug)]
#[command(name = "docgate")]
#[command(version = DOCGATE_VERSION)]
#[command(about = "Run version-gated doctest fixtures against a live interpreter", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Harness options (default action when no subcommand given)
    #[command(flatten)]
    pub run: RunArgs,

    // Debug/development flags
    /// Parse a fixture and dump its examples (debug)
    #[arg(long = "parse", value_name = "FILE", conflicts_with = "scan_file")]
    pub parse_file: Option<PathBuf>,

    /// List a fixture's requirement directives and how they resolve (debug)
    #[arg(long = "scan", value_name = "FILE")]
    pub scan_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the doctest fixtures
    Test(RunArgs),

    /// List the registered version markers
    Markers,

    /// Run a documentation-engine helper and print its output
    Doc(DocArgs),
}

/// Options for a harness run.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Fixture root directory (default: $DOCGATE_FIXTURES, then ./doctests)
    #[arg(value_name = "ROOT")]
    pub root: Option<PathBuf>,

    /// Print progress dots instead of one line per example
    #[arg(short, long)]
    pub quiet: bool,

    /// Stop on first failure
    #[arg(short = 'x', long = "exitfirst")]
    pub stop_on_fail: bool,

    /// Only run fixtures whose name contains EXPR
    #[arg(short = 'k', value_name = "EXPR")]
    pub filter: Option<String>,

    /// Gate examples against this version instead of probing the interpreter
    #[arg(long, value_name = "X.Y")]
    pub runtime_version: Option<RuntimeVersion>,

    /// Interpreter program
    #[arg(long, value_name = "PROG")]
    pub interpreter: Option<String>,

    /// Interpreter argument (repeatable; replaces the defaults)
    #[arg(long = "interpreter-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub interpreter_args: Vec<String>,

    /// Line sent to each new session before the first example (repeatable; replaces the defaults)
    #[arg(long = "init", value_name = "LINE", allow_hyphen_values = true)]
    pub init: Vec<String>,

    /// Command each example is wrapped in; `{source}` becomes the quoted example source
    #[arg(long, value_name = "TEMPLATE", conflicts_with = "raw_source")]
    pub source_template: Option<String>,

    /// Send example source lines as typed instead of wrapping them
    #[arg(long)]
    pub raw_source: bool,

    /// Command that prints `{sentinel}`
    #[arg(long, value_name = "TEMPLATE")]
    pub sentinel: Option<String>,

    /// Do not send a blank line after each example
    #[arg(long)]
    pub no_blank_line: bool,

    /// Per-example timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Command that exits 0 when `{name}` is available
    #[arg(long, value_name = "TEMPLATE", conflicts_with = "require_path")]
    pub require_probe: Option<String>,

    /// Resolve requirements by looking for executables on PATH
    #[arg(long)]
    pub require_path: bool,

    /// Do not set the debug flag in interpreter sessions
    #[arg(long)]
    pub no_debug: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long)]
    pub no_color: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl RunArgs {
    /// Build the harness configuration these options describe.
    pub fn to_config(&self) -> CliResult<HarnessConfig> {
        let mut config = HarnessConfig::new()
            .with_stop_on_fail(self.stop_on_fail)
            .with_verbose(!self.quiet)
            .with_debug(!self.no_debug)
            .with_color(!self.no_color)
            .with_format(match self.format {
                OutputFormat::Text => ReportFormat::Text,
                OutputFormat::Json => ReportFormat::Json,
            });
        if let Some(root) = &self.root {
            config = config.with_fixture_root(root);
        }
        if let Some(keyword) = &self.filter {
            config = config.with_keyword(keyword);
        }
        if let Some(version) = self.runtime_version {
            config = config.with_runtime_version(version);
        }

        let mut session = config.session.clone();
        if let Some(program) = &self.interpreter {
            session = session.with_program(program);
        }
        if !self.interpreter_args.is_empty() {
            session = session.with_args(self.interpreter_args.clone());
        }
        if !self.init.is_empty() {
            session = session.with_init(self.init.clone());
        }
        if self.raw_source {
            session = session.with_source_template(None);
        } else if let Some(template) = &self.source_template {
            if !template.contains(SOURCE_PLACEHOLDER) {
                return Err(CliError::failure(format!(
                    "Error: source template '{template}' does not contain {SOURCE_PLACEHOLDER}"
                )));
            }
            session = session.with_source_template(Some(template.clone()));
        }
        if let Some(template) = &self.sentinel {
            session = session.with_sentinel_template(template);
        }
        if self.no_blank_line {
            session = session.with_blank_line_terminator(false);
        }
        if let Some(secs) = self.timeout {
            let timeout = Duration::try_from_secs_f64(secs)
                .ok()
                .filter(|t| !t.is_zero())
                .ok_or_else(|| CliError::failure(format!("Error: invalid timeout '{secs}'")))?;
            session = session.with_timeout(timeout);
        }

        let mode = if self.require_path {
            RequirementMode::Path
        } else if let Some(template) = &self.require_probe {
            RequirementMode::Probe(template.split_whitespace().map(str::to_string).collect())
        } else if let Some(program) = &self.interpreter {
            // Probe with the same interpreter the examples run on.
            RequirementMode::Probe(vec![
                program.clone(),
                "-c".to_string(),
                format!("import {NAME_PLACEHOLDER}"),
            ])
        } else {
            RequirementMode::default()
        };

        Ok(config.with_session(session).with_requirement_mode(mode))
    }
}

/// Options for `docgate doc`.
#[derive(Args, Debug, Clone)]
pub struct DocArgs {
    /// Helper to run
    #[arg(value_enum)]
    pub action: DocAction,

    /// Source file, or `-` for stdin
    #[arg(value_name = "FILE", default_value = "-")]
    pub file: PathBuf,

    /// Documentation engine program (default: $DOCGATE_ENGINE)
    #[arg(long, value_name = "PROG")]
    pub engine: Option<String>,

    /// Whitespace-separated attributes to show
    #[arg(long, value_name = "ATTRS")]
    pub include: Option<String>,

    /// Whitespace-separated attributes to hide
    #[arg(long, value_name = "ATTRS")]
    pub exclude: Option<String>,

    /// Dotted name of the object to list instead of the whole module
    #[arg(long, value_name = "NAME")]
    pub target: Option<String>,

    /// Build HTML docstrings from parsed source only (encoding)
    #[arg(long, conflicts_with = "no_parse")]
    pub no_introspect: bool,

    /// Build HTML docstrings from introspection only (encoding)
    #[arg(long)]
    pub no_parse: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocAction {
    Build,
    Parse,
    Introspect,
    /// Docstrings as plain text
    Plain,
    Encoding,
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    // Handle debug flags first
    if let Some(file) = cli.parse_file {
        return commands::parse_file(&file, cli.run.runtime_version);
    }
    if let Some(file) = cli.scan_file {
        let config = cli.run.to_config()?;
        return commands::scan_file(&file, &config.requirement_mode);
    }

    match cli.command {
        Some(Command::Test(args)) => test_runner::run_doctests(&args.to_config()?),
        Some(Command::Markers) => commands::list_markers(),
        Some(Command::Doc(args)) => commands::doc_command(&args),
        None => test_runner::run_doctests(&cli.run.to_config()?),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_default_run() {
        let cli = Cli::try_parse_from(["docgate", "fixtures", "-x", "-k", "unicode"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.root, Some(PathBuf::from("fixtures")));
        assert!(cli.run.stop_on_fail);
        assert_eq!(cli.run.filter.as_deref(), Some("unicode"));
    }

    #[test]
    fn test_cli_parse_test_subcommand() {
        let cli = Cli::try_parse_from(["docgate", "test", "-q", "--runtime-version", "2.7"]).unwrap();
        if let Some(Command::Test(args)) = cli.command {
            assert!(args.quiet);
            assert_eq!(args.runtime_version, Some(RuntimeVersion::new(2, 7)));
        } else {
            panic!("Expected Test command");
        }
    }

    #[test]
    fn test_cli_parse_markers() {
        let cli = Cli::try_parse_from(["docgate", "markers"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Markers)));
    }

    #[test]
    fn test_cli_parse_doc() {
        let cli = Cli::try_parse_from(["docgate", "doc", "build", "mod.py", "--include", "a b"]).unwrap();
        if let Some(Command::Doc(args)) = cli.command {
            assert_eq!(args.action, DocAction::Build);
            assert_eq!(args.file, PathBuf::from("mod.py"));
            assert_eq!(args.include.as_deref(), Some("a b"));
        } else {
            panic!("Expected Doc command");
        }

        let cli = Cli::try_parse_from(["docgate", "doc", "encoding"]).unwrap();
        if let Some(Command::Doc(args)) = cli.command {
            assert_eq!(args.file, PathBuf::from("-"));
            assert!(!args.no_introspect && !args.no_parse);
        } else {
            panic!("Expected Doc command");
        }
    }

    #[test]
    fn test_cli_parse_doc_sources() {
        let cli = Cli::try_parse_from(["docgate", "doc", "encoding", "enc.py", "--no-parse"]).unwrap();
        if let Some(Command::Doc(args)) = cli.command {
            assert!(args.no_parse);
            assert!(!args.no_introspect);
        } else {
            panic!("Expected Doc command");
        }

        assert!(Cli::try_parse_from(["docgate", "doc", "encoding", "--no-parse", "--no-introspect"]).is_err());

        let cli = Cli::try_parse_from(["docgate", "doc", "plain", "mod.py", "--target", "f"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Doc(DocArgs { action: DocAction::Plain, .. }))));
    }

    #[test]
    fn test_cli_parse_debug_flags() {
        let cli = Cli::try_parse_from(["docgate", "--parse", "a.doctest"]).unwrap();
        assert!(cli.parse_file.is_some());

        let cli = Cli::try_parse_from(["docgate", "--scan", "a.doctest"]).unwrap();
        assert!(cli.scan_file.is_some());

        assert!(Cli::try_parse_from(["docgate", "--parse", "a", "--scan", "b"]).is_err());
    }

    #[test]
    fn test_cli_rejects_bad_version() {
        assert!(Cli::try_parse_from(["docgate", "--runtime-version", "three"]).is_err());
    }

    #[test]
    fn test_interpreter_args_accept_hyphens() {
        let cli =
            Cli::try_parse_from(["docgate", "--interpreter", "sh", "--interpreter-arg", "-s", "--init", "set -e"])
                .unwrap();
        let config = cli.run.to_config().unwrap();
        assert_eq!(config.session.program, "sh");
        assert_eq!(config.session.args, vec!["-s".to_string()]);
        assert_eq!(config.session.init, vec!["set -e".to_string()]);
    }

    // ========================================
    // RunArgs -> HarnessConfig
    // ========================================

    #[test]
    fn test_default_config() {
        let config = RunArgs::default().to_config().unwrap();
        assert!(config.verbose);
        assert!(config.debug);
        assert!(config.color);
        assert_eq!(config.format, ReportFormat::Text);
        assert_eq!(config.requirement_mode, RequirementMode::default());
    }

    #[test]
    fn test_interpreter_drives_requirement_probe() {
        let args = RunArgs {
            interpreter: Some("python2".to_string()),
            ..RunArgs::default()
        };
        let config = args.to_config().unwrap();
        assert_eq!(
            config.requirement_mode,
            RequirementMode::Probe(vec!["python2".into(), "-c".into(), "import {name}".into()])
        );
    }

    #[test]
    fn test_explicit_requirement_modes() {
        let args = RunArgs {
            require_probe: Some("has {name}".to_string()),
            ..RunArgs::default()
        };
        assert_eq!(
            args.to_config().unwrap().requirement_mode,
            RequirementMode::Probe(vec!["has".into(), "{name}".into()])
        );

        let args = RunArgs {
            require_path: true,
            ..RunArgs::default()
        };
        assert_eq!(args.to_config().unwrap().requirement_mode, RequirementMode::Path);
    }

    #[test]
    fn test_session_overrides() {
        let args = RunArgs {
            quiet: true,
            no_debug: true,
            no_blank_line: true,
            timeout: Some(2.5),
            sentinel: Some("echo {sentinel}".to_string()),
            format: OutputFormat::Json,
            ..RunArgs::default()
        };
        let config = args.to_config().unwrap();
        assert!(!config.verbose);
        assert!(!config.debug);
        assert!(!config.session.blank_line_terminator);
        assert_eq!(config.session.timeout, Duration::from_millis(2500));
        assert_eq!(config.session.sentinel_template, "echo {sentinel}");
        assert_eq!(config.format, ReportFormat::Json);
    }

    #[test]
    fn test_source_template_flags() {
        let config = RunArgs::default().to_config().unwrap();
        assert_eq!(
            config.session.source_template.as_deref(),
            Some("exec(compile({source}, '<doctest>', 'single'))")
        );

        let cli = Cli::try_parse_from(["docgate", "--source-template", "run({source})"]).unwrap();
        let config = cli.run.to_config().unwrap();
        assert_eq!(config.session.source_template.as_deref(), Some("run({source})"));

        let cli = Cli::try_parse_from(["docgate", "--raw-source"]).unwrap();
        assert_eq!(cli.run.to_config().unwrap().session.source_template, None);

        assert!(Cli::try_parse_from(["docgate", "--raw-source", "--source-template", "run({source})"]).is_err());
    }

    #[test]
    fn test_source_template_needs_placeholder() {
        let args = RunArgs {
            source_template: Some("run()".to_string()),
            ..RunArgs::default()
        };
        let err = args.to_config().unwrap_err();
        assert_eq!(err.message, "Error: source template 'run()' does not contain {source}");
    }

    #[test]
    fn test_invalid_timeout() {
        for secs in [0.0, -1.0, f64::NAN] {
            let args = RunArgs {
                timeout: Some(secs),
                ..RunArgs::default()
            };
            assert!(args.to_config().is_err());
        }
    }
}
