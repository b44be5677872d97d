//! Brew CLI: inspect and maintain a pipeline's state file.
//!
//! Provides `brew list`, `brew get` and `brew delete` for individual entries,
//! `brew stats` for a per-stage overview, `brew verify` to check a snapshot
//! without loading it, and `brew reset` to start over.

#![warn(missing_docs)]

mod inspect;
mod reset;
mod verify;

use std::path::{Path, PathBuf};
use std::process;

use brew_common::CorruptStatePolicy;
use brew_config::ConfigError;
use clap::{Parser, Subcommand, ValueEnum};

/// Command-line access to a pipeline state file.
#[derive(Parser, Debug)]
#[command(name = "brew", version, about = "Inspect and maintain pipeline state")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `brewpipe.toml` file; its directory is the project root.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// State file to operate on, overriding the configuration.
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List entries, optionally for one stage.
    List(ListArgs),
    /// Print the value stored under a key.
    Get {
        /// Qualified key, e.g. `WintonStockData##df##train`.
        key: String,
    },
    /// Remove the entry stored under a key.
    Delete {
        /// Qualified key.
        key: String,
    },
    /// Summarize the state file and count entries per stage.
    Stats,
    /// Check the state file's header and checksum without loading it.
    Verify,
    /// Remove every entry, replacing an unreadable file if necessary.
    Reset(ResetArgs),
}

/// Arguments for the `brew list` subcommand.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Only list entries recorded by this stage.
    #[arg(long)]
    pub stage: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Arguments for the `brew reset` subcommand.
#[derive(Parser, Debug)]
pub struct ResetArgs {
    /// Confirm that all recorded state may be discarded.
    #[arg(long)]
    pub yes: bool,
}

/// Output format for listings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One `key value` line per entry.
    Text,
    /// A single JSON object.
    Json,
}

/// Global settings resolved from the command line and configuration.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// State file to operate on.
    pub state_path: PathBuf,
    /// Directory stages write their outputs to.
    pub intermediate_dir: PathBuf,
    /// Recovery policy from the configuration.
    pub policy: CorruptStatePolicy,
}

/// Locations and policy taken from the command line and configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Resolved {
    state_path: PathBuf,
    intermediate_dir: PathBuf,
    policy: CorruptStatePolicy,
}

/// Resolves the state file, intermediate directory and recovery policy.
///
/// `--state` wins over the configured file. The configuration comes from
/// `--config` if given, else from `brewpipe.toml` in `cwd` if present, else
/// the defaults.
fn resolve_state(
    config: Option<&Path>,
    state: Option<&Path>,
    cwd: &Path,
) -> Result<Resolved, ConfigError> {
    let (project_dir, config) = match config {
        Some(file) => {
            let content = std::fs::read_to_string(file)?;
            let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
            (cwd.join(dir), brew_config::load_config_from_str(&content)?)
        }
        None => (cwd.to_path_buf(), brew_config::load_config_or_default(cwd)?),
    };
    let state_path = match state {
        Some(state) => cwd.join(state),
        None => config.state_path(&project_dir),
    };
    Ok(Resolved {
        state_path,
        intermediate_dir: config.intermediate_dir(&project_dir),
        policy: config.state.on_corrupt,
    })
}

fn setup_logging(quiet: bool, verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("brew=debug,brew_state=debug,brew_artifact=debug")
        } else if quiet {
            EnvFilter::new("brew=warn,brew_state=warn")
        } else {
            EnvFilter::new("brew=info,brew_state=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.quiet, cli.verbose);

    let resolved = std::env::current_dir()
        .map_err(ConfigError::from)
        .and_then(|cwd| resolve_state(cli.config.as_deref(), cli.state.as_deref(), &cwd));
    let resolved = match resolved {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    tracing::debug!(
        path = %resolved.state_path.display(),
        policy = ?resolved.policy,
        "resolved state file"
    );

    let global = GlobalArgs {
        quiet: cli.quiet,
        state_path: resolved.state_path,
        intermediate_dir: resolved.intermediate_dir,
        policy: resolved.policy,
    };

    let result = match cli.command {
        Command::List(ref args) => inspect::list(args, &global),
        Command::Get { ref key } => inspect::get(key, &global),
        Command::Delete { ref key } => inspect::delete(key, &global),
        Command::Stats => inspect::stats(&global),
        Command::Verify => verify::run(&global),
        Command::Reset(ref args) => reset::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_list_default() {
        let cli = Cli::parse_from(["brew", "list"]);
        match cli.command {
            Command::List(ref args) => {
                assert!(args.stage.is_none());
                assert_eq!(args.format, OutputFormat::Text);
            }
            _ => panic!("expected List command"),
        }
        assert!(cli.state.is_none());
    }

    #[test]
    fn parse_list_with_args() {
        let cli = Cli::parse_from([
            "brew",
            "list",
            "--stage",
            "WintonStockData",
            "--format",
            "json",
            "--state",
            "other.state",
        ]);
        match cli.command {
            Command::List(ref args) => {
                assert_eq!(args.stage.as_deref(), Some("WintonStockData"));
                assert_eq!(args.format, OutputFormat::Json);
            }
            _ => panic!("expected List command"),
        }
        assert_eq!(cli.state, Some(PathBuf::from("other.state")));
    }

    #[test]
    fn parse_get_and_delete() {
        let cli = Cli::parse_from(["brew", "get", "Loader##df"]);
        assert!(matches!(cli.command, Command::Get { ref key } if key == "Loader##df"));

        let cli = Cli::parse_from(["brew", "-q", "delete", "Loader##df"]);
        assert!(cli.quiet);
        assert!(matches!(cli.command, Command::Delete { .. }));
    }

    #[test]
    fn parse_reset_requires_flag_for_yes() {
        let cli = Cli::parse_from(["brew", "reset"]);
        assert!(matches!(cli.command, Command::Reset(ResetArgs { yes: false })));

        let cli = Cli::parse_from(["brew", "reset", "--yes"]);
        assert!(matches!(cli.command, Command::Reset(ResetArgs { yes: true })));
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "brew",
            "stats",
            "--verbose",
            "--config",
            "p/brewpipe.toml",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("p/brewpipe.toml")));
        assert!(matches!(cli.command, Command::Stats));
    }

    #[test]
    fn resolve_defaults_to_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_state(None, None, dir.path()).unwrap();
        assert_eq!(
            resolved,
            Resolved {
                state_path: dir.path().join("pipelinestate.state"),
                intermediate_dir: dir.path().join("intermediates"),
                policy: CorruptStatePolicy::Reset,
            }
        );
    }

    #[test]
    fn resolve_reads_config_in_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("brewpipe.toml"),
            "[state]\nfile = \"cache/s.state\"\non_corrupt = \"fail\"\n\n\
             [pipeline]\nintermediate_dir = \"cache/out\"\n",
        )
        .unwrap();
        let resolved = resolve_state(None, None, dir.path()).unwrap();
        assert_eq!(resolved.state_path, dir.path().join("cache/s.state"));
        assert_eq!(resolved.intermediate_dir, dir.path().join("cache/out"));
        assert_eq!(resolved.policy, CorruptStatePolicy::Fail);
    }

    #[test]
    fn resolve_explicit_config_is_relative_to_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("proj")).unwrap();
        let config = dir.path().join("proj").join("brewpipe.toml");
        std::fs::write(&config, "[state]\nfile = \"x.state\"\n").unwrap();

        let resolved = resolve_state(Some(&config), None, dir.path()).unwrap();
        assert_eq!(resolved.state_path, dir.path().join("proj").join("x.state"));
        assert_eq!(
            resolved.intermediate_dir,
            dir.path().join("proj").join("intermediates")
        );
    }

    #[test]
    fn resolve_state_flag_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("brewpipe.toml"),
            "[state]\nfile = \"a.state\"\n",
        )
        .unwrap();
        let resolved = resolve_state(None, Some(Path::new("b.state")), dir.path()).unwrap();
        assert_eq!(resolved.state_path, dir.path().join("b.state"));
    }

    #[test]
    fn resolve_missing_explicit_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            resolve_state(Some(&missing), None, dir.path()),
            Err(ConfigError::IoError(_))
        ));
    }
}
