//! CLI entrypoint for gatehouse
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use gatehouse_application::{
    AgentProgressNotifier, ApprovalChannel, AutoApproveChannel, AutoRejectChannel,
    NoAgentProgress, SessionBuilder, SessionRecorder,
};
use gatehouse_domain::ApprovalMode;
use gatehouse_domain::session::replay;
use gatehouse_infrastructure::{
    ConfigLoader, FileConfig, JsonlSessionRecorder, PlanFileProvider, Severity, default_bodies,
    default_registry, read_session_log,
};
use gatehouse_presentation::{
    AgentProgressReporter, Cli, Command, ConsoleApprovalChannel, ReplayArgs, ReportFormatter,
    RunArgs, SimpleAgentProgress,
};
use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.show_config {
        for line in ConfigLoader::describe_sources(cli.config.as_deref()) {
            println!("{}", line);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?
    };

    let _guard = init_logging(cli.verbose, config.logging.dir.as_deref());

    for issue in config.validate() {
        let label = match issue.severity {
            Severity::Warning => "warning:".yellow().bold(),
            Severity::Error => "error:".red().bold(),
        };
        eprintln!("{} {}", label, issue);
    }

    match cli.command {
        Some(Command::Run(args)) => run(args, config, cli.quiet, cli.verbose).await,
        Some(Command::Replay(args)) => replay_log(args),
        None => bail!("No command given. Try `gatehouse run --plan <PATH>` or `gatehouse --help`."),
    }
}

/// Console logging from `-v` (or RUST_LOG), plus a daily file when
/// `[logging] dir` is set.
fn init_logging(verbose: u8, dir: Option<&Path>) -> Option<WorkerGuard> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = if verbose == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file, guard) = match dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "gatehouse.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    guard
}

async fn run(args: RunArgs, config: FileConfig, quiet: bool, verbose: u8) -> Result<ExitCode> {
    let provider = PlanFileProvider::from_path(&args.plan)?;
    let goal = match (&args.goal, provider.goal()) {
        (Some(goal), _) => goal.clone(),
        (None, Some(goal)) => goal.to_string(),
        (None, None) => bail!(
            "No goal given and {} does not state one",
            args.plan.display()
        ),
    };

    // === Dependency Injection ===
    let cwd = std::env::current_dir().context("Could not determine the current directory")?;
    let mut settings = config.to_tool_settings(&cwd);
    if let Some(dir) = &args.working_dir {
        settings = settings.with_working_dir(cwd.join(dir));
    }
    let hooks = config.to_hook_runner(&settings.working_dir);
    if !hooks.is_empty() {
        info!(hooks = hooks.hooks().len(), "Lifecycle hooks configured");
    }
    let registry = default_registry()?;
    let bodies = default_bodies(settings);

    let mut engine = config.to_engine_config();
    if args.yes {
        engine.policy.approval_mode = ApprovalMode::AutoApprove;
    } else if args.reject {
        engine.policy.approval_mode = ApprovalMode::AutoReject;
    }
    info!(goal = %goal, mode = engine.policy.approval_mode.as_str(), "Starting session");

    let reporter = (!quiet && std::io::stderr().is_terminal())
        .then(|| Arc::new(AgentProgressReporter::new()));
    let progress: Arc<dyn AgentProgressNotifier> = match &reporter {
        Some(reporter) => reporter.clone(),
        None if quiet => Arc::new(NoAgentProgress),
        None => Arc::new(SimpleAgentProgress::new(verbose > 0)),
    };

    let channel: Arc<dyn ApprovalChannel> = match engine.policy.approval_mode {
        ApprovalMode::AutoApprove => Arc::new(AutoApproveChannel),
        ApprovalMode::AutoReject => Arc::new(AutoRejectChannel),
        ApprovalMode::Interactive => {
            let console = ConsoleApprovalChannel::new();
            match &reporter {
                Some(reporter) => Arc::new(console.with_progress(reporter.multi())),
                None => Arc::new(console),
            }
        }
    };

    let mut builder = SessionBuilder::new(engine, registry, bodies, Arc::new(provider))
        .with_approval_channel(channel)
        .with_progress(progress)
        .with_hooks(Arc::new(hooks));

    if !args.no_session_log {
        let path = args
            .session_log
            .clone()
            .unwrap_or_else(|| config.logging.session_log_path());
        match JsonlSessionRecorder::new(&path) {
            Some(recorder) => {
                if !quiet {
                    eprintln!("{} {}", "Session log:".dimmed(), recorder.path().display());
                }
                let recorder: Arc<dyn SessionRecorder> = Arc::new(recorder);
                builder = builder.with_recorder(recorder);
            }
            None => warn!(path = %path.display(), "Session log disabled"),
        }
    }

    let session = builder.build()?;

    let run = session.run(goal);
    tokio::pin!(run);
    let report = tokio::select! {
        report = &mut run => report,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling agents");
            session.shutdown().await;
            run.await
        }
    };
    session.shutdown().await;

    if args.json {
        println!("{}", ReportFormatter::format_json(&report));
    } else {
        println!("{}", ReportFormatter::format(&report));
    }

    Ok(if report.status.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn replay_log(args: ReplayArgs) -> Result<ExitCode> {
    let records = read_session_log(&args.log)?;
    let report = replay(&records);

    if args.json {
        println!("{}", ReportFormatter::format_replay_json(&report));
    } else {
        println!("{}", ReportFormatter::format_replay(&report));
    }

    Ok(if report.is_consistent() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
