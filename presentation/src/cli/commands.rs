//! CLI command definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for gatehouse
#[derive(Parser, Debug)]
#[command(name = "gatehouse")]
#[command(author, version, about = "Governed execution engine for coding agents")]
#[command(long_about = r#"
Gatehouse runs an agent through a fixed sequence of phases:

  PLANNING -> AWAITING_APPROVAL -> EXECUTING -> VALIDATING -> CI_CHECK

Every mutating tool call passes an approval gate, file edits go through an
atomic patch engine, and every transition and tool call is written to a
JSONL session log that `gatehouse replay` can check later.

Configuration files are loaded from (in priority order):
1. GATEHOUSE_<SECTION>__<KEY> environment variables
2. --config <path>          Explicit config file
3. ./gatehouse.toml         Project-level config
4. ~/.config/gatehouse/config.toml   Global config

Example:
  gatehouse run --plan plan.json
  gatehouse run --plan plan.json --yes "Rename the helper"
  gatehouse replay .gatehouse/sessions/20260101-120000.jsonl
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a goal through the governed phase loop
    Run(RunArgs),

    /// Rebuild agent phases from a session log and check them
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// The goal to pursue (defaults to the plan document's goal)
    pub goal: Option<String>,

    /// JSON plan document serving the planner's answers
    #[arg(short, long, value_name = "PATH")]
    pub plan: PathBuf,

    /// Approve every gate without asking
    #[arg(short, long, conflicts_with = "reject")]
    pub yes: bool,

    /// Reject every gate without asking
    #[arg(long)]
    pub reject: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// Working directory for tools (overrides `[tools] working_dir`)
    #[arg(short = 'C', long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Session log path (overrides `[logging] session_log`)
    #[arg(long, value_name = "PATH", conflicts_with = "no_session_log")]
    pub session_log: Option<PathBuf>,

    /// Do not write a session log
    #[arg(long)]
    pub no_session_log: bool,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Session log written by `gatehouse run`
    pub log: PathBuf,

    /// Print the replay report as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from(["gatehouse", "-vv", "run", "--plan", "p.json", "--yes", "Fix it"]);
        assert_eq!(cli.verbose, 2);
        let Some(Command::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.goal.as_deref(), Some("Fix it"));
        assert_eq!(args.plan, PathBuf::from("p.json"));
        assert!(args.yes);
        assert!(!args.json);
    }

    #[test]
    fn test_yes_conflicts_with_reject() {
        let result = Cli::try_parse_from(["gatehouse", "run", "--plan", "p.json", "--yes", "--reject"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_replay() {
        let cli = Cli::parse_from(["gatehouse", "replay", "log.jsonl", "--json"]);
        let Some(Command::Replay(args)) = cli.command else {
            panic!("expected replay");
        };
        assert_eq!(args.log, PathBuf::from("log.jsonl"));
        assert!(args.json);
    }
}
