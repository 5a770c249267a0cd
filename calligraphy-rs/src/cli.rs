//! Command-line argument parsing.
//!
//! Usage:
//!   calligraphy [-e|--explain] [-i|--intermediate] [-v...] <file|-> [args...]
//!
//! Everything after the script path is handed to the script untouched, even
//! arguments that look like flags.

use std::path::{Path, PathBuf};

use clap::Parser;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "calligraphy")]
#[command(about = "Run scripts that mix Python and shell", long_about = None)]
#[command(version)]
pub struct CliArgs {
    /// Show how each line was classified instead of running
    #[arg(short, long, conflicts_with = "intermediate")]
    pub explain: bool,

    /// Print the compiled Python instead of running it
    #[arg(short, long)]
    pub intermediate: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Script file, or `-` to read from stdin
    pub script: String,

    /// Arguments passed to the script
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// What the binary should do with the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Run,
    Explain,
    Intermediate,
}

/// Where the script text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Stdin,
    File(PathBuf),
}

impl CliArgs {
    pub fn mode(&self) -> Mode {
        if self.explain {
            Mode::Explain
        } else if self.intermediate {
            Mode::Intermediate
        } else {
            Mode::Run
        }
    }

    pub fn input(&self) -> Input {
        if self.script == "-" {
            Input::Stdin
        } else {
            Input::File(PathBuf::from(&self.script))
        }
    }

    /// Default `tracing` filter for the `-v` count.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

impl Input {
    /// Directory relative `source` paths resolve against.
    pub fn base_dir(&self) -> PathBuf {
        match self {
            Input::Stdin => PathBuf::from("."),
            Input::File(path) => path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse a slice of argument strings, without the program name (exposed for
/// testing).
pub fn parse_argv(argv: &[&str]) -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse_from(std::iter::once("calligraphy").chain(argv.iter().copied()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn script_only() {
        let a = parse_argv(&["build.script"]).unwrap();
        assert_eq!(a.mode(), Mode::Run);
        assert_eq!(a.input(), Input::File(PathBuf::from("build.script")));
        assert!(a.args.is_empty());
        assert_eq!(a.verbose, 0);
    }

    #[test]
    fn stdin_dash() {
        let a = parse_argv(&["-"]).unwrap();
        assert_eq!(a.input(), Input::Stdin);
        assert_eq!(a.input().base_dir(), PathBuf::from("."));
    }

    #[test]
    fn explain_and_intermediate() {
        assert_eq!(parse_argv(&["-e", "x"]).unwrap().mode(), Mode::Explain);
        assert_eq!(parse_argv(&["--explain", "x"]).unwrap().mode(), Mode::Explain);
        assert_eq!(parse_argv(&["-i", "x"]).unwrap().mode(), Mode::Intermediate);
        assert_eq!(parse_argv(&["--intermediate", "x"]).unwrap().mode(), Mode::Intermediate);
    }

    #[test]
    fn explain_conflicts_with_intermediate() {
        let err = parse_argv(&["-e", "-i", "x"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn script_arguments_keep_their_flags() {
        let a = parse_argv(&["-i", "deploy.script", "prod", "-e", "--force"]).unwrap();
        assert_eq!(a.mode(), Mode::Intermediate);
        assert_eq!(a.args, vec!["prod", "-e", "--force"]);
    }

    #[test]
    fn verbosity_counts() {
        let a = parse_argv(&["-vv", "x"]).unwrap();
        assert_eq!(a.verbose, 2);
        assert_eq!(a.log_filter(), "debug");
        assert_eq!(parse_argv(&["x"]).unwrap().log_filter(), "warn");
    }

    #[test]
    fn script_is_required() {
        let err = parse_argv(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn base_dir_of_nested_script() {
        let a = parse_argv(&["scripts/ci/build.script"]).unwrap();
        assert_eq!(a.input().base_dir(), PathBuf::from("scripts/ci"));
        let a = parse_argv(&["build.script"]).unwrap();
        assert_eq!(a.input().base_dir(), PathBuf::from("."));
    }
}
