//! REEL CLI
//!
//! Inspect, validate and replay recorded agent session journals.
//! The CLI never writes workspace files: Apply mode only lists the paths an
//! external apply tool should write.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod render;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, bail};
use reel_replay::{
    RangeStop, ReplayExecutor, ReplayMode, ReplayOptions, ReplayReport, ReplaySession,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "reel")]
#[command(about = "REEL - replay recorded agent sessions", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a session summary and its steps
    Inspect {
        /// Path to session journal
        #[arg(short, long)]
        session: PathBuf,
    },
    /// Replay a session
    Replay {
        /// Path to session journal
        #[arg(short, long)]
        session: PathBuf,
        /// Replay mode (overrides the options file)
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,
        /// First step index
        #[arg(long)]
        from: Option<usize>,
        /// Last step index, inclusive
        #[arg(long)]
        to: Option<usize>,
        /// Step index to skip (repeatable)
        #[arg(long)]
        skip: Vec<usize>,
        /// Stop after the first divergent step
        #[arg(long)]
        stop_on_divergence: bool,
        /// JSON options file
        #[arg(long)]
        options: Option<PathBuf>,
        /// Permit Apply mode
        #[arg(long)]
        allow_apply: bool,
        /// Print results and report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load and validate a session journal
    Validate {
        /// Path to session journal
        #[arg(short, long)]
        session: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    ReadOnly,
    Simulate,
    Apply,
}

impl From<ModeArg> for ReplayMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::ReadOnly => ReplayMode::ReadOnly,
            ModeArg::Simulate => ReplayMode::Simulate,
            ModeArg::Apply => ReplayMode::Apply,
        }
    }
}

/// Flags that shape `ReplayOptions`
#[derive(Debug, Default)]
struct ReplayFlags {
    mode: Option<ModeArg>,
    from: Option<usize>,
    to: Option<usize>,
    skip: Vec<usize>,
    stop_on_divergence: bool,
    options: Option<PathBuf>,
    allow_apply: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Inspect { session } => {
            let session = load_session(&session)?;
            print!("{}", render::session_overview(&session));
            Ok(())
        }
        Commands::Replay {
            session,
            mode,
            from,
            to,
            skip,
            stop_on_divergence,
            options,
            allow_apply,
            json,
        } => {
            let session = load_session(&session)?;
            let options = build_options(ReplayFlags {
                mode,
                from,
                to,
                skip,
                stop_on_divergence,
                options,
                allow_apply,
            })?;
            replay(&session, options, json)
        }
        Commands::Validate { session } => {
            let loaded = load_session(&session)?;
            println!(
                "{} {} ({} steps, format {})",
                render::ok_mark(),
                loaded.id,
                loaded.len(),
                loaded.version
            );
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8, json: bool) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("REEL_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_session(path: &Path) -> Result<ReplaySession> {
    debug!(path = %path.display(), "loading session");
    ReplaySession::load(path).wrap_err_with(|| format!("failed to load {}", path.display()))
}

fn build_options(flags: ReplayFlags) -> Result<ReplayOptions> {
    let mut options = match &flags.options {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            ReplayOptions::from_json(&text)
                .wrap_err_with(|| format!("invalid options in {}", path.display()))?
        }
        None => ReplayOptions::default(),
    };

    if let Some(mode) = flags.mode {
        options = options.with_mode(mode.into());
    }
    if let Some(from) = flags.from {
        options = options.starting_at(from);
    }
    if let Some(to) = flags.to {
        options = options.ending_at(to);
    }
    for index in flags.skip {
        options = options.skip(index);
    }
    if flags.stop_on_divergence {
        options = options.with_stop_on_divergence(true);
    }

    if !options.is_safe_mode() && !flags.allow_apply {
        bail!("apply mode requires --allow-apply");
    }
    Ok(options)
}

fn replay(session: &ReplaySession, options: ReplayOptions, json: bool) -> Result<()> {
    info!(session = %session.id, mode = %options.mode, steps = session.len(), "starting replay");
    let mut executor = ReplayExecutor::with_options(session, options);
    let outcome = executor.run_to_end();
    let report = ReplayReport::from_results(executor.state(), &outcome.results);

    if json {
        let value = serde_json::json!({
            "results": outcome.results,
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        for result in &outcome.results {
            print!("{}", render::step_result(result));
        }
        if let RangeStop::Divergence { index } = outcome.stop {
            println!("stopped at divergence in step {}", index);
        }
        print!("{}", render::report(&report));
    }

    match outcome.stop {
        RangeStop::Failed(err) => Err(err.into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_replay::{ReplayDiff, ReplayStep, StepKind};

    #[test]
    fn test_parse_replay_command() {
        let cli = Cli::try_parse_from([
            "reel", "replay", "--session", "s.json", "--mode", "simulate", "--skip", "1",
            "--skip", "3", "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Replay { mode, skip, .. } => {
                assert_eq!(mode, Some(ModeArg::Simulate));
                assert_eq!(skip, vec![1, 3]);
            }
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn test_mode_arg_names() {
        let cli =
            Cli::try_parse_from(["reel", "replay", "-s", "s.json", "-m", "read-only"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Replay {
                mode: Some(ModeArg::ReadOnly),
                ..
            }
        ));
    }

    #[test]
    fn test_apply_requires_flag() {
        let flags = ReplayFlags {
            mode: Some(ModeArg::Apply),
            ..Default::default()
        };
        assert!(build_options(flags).is_err());

        let flags = ReplayFlags {
            mode: Some(ModeArg::Apply),
            allow_apply: true,
            ..Default::default()
        };
        assert_eq!(build_options(flags).unwrap().mode, ReplayMode::Apply);
    }

    #[test]
    fn test_flags_override_options_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(
            &path,
            r#"{"mode": "simulate", "start_from_step": 2, "skip_steps": [5]}"#,
        )
        .unwrap();

        let options = build_options(ReplayFlags {
            from: Some(1),
            skip: vec![7],
            options: Some(path),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(options.mode, ReplayMode::Simulate);
        assert_eq!(options.start_from_step, 1);
        assert!(options.skip_steps.contains(&5));
        assert!(options.skip_steps.contains(&7));
        assert!(options.validate_checksums);
    }

    #[test]
    fn test_apply_in_options_file_still_gated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, r#"{"mode": "apply"}"#).unwrap();

        let flags = ReplayFlags {
            options: Some(path),
            ..Default::default()
        };
        assert!(build_options(flags).is_err());
    }

    #[test]
    fn test_replay_reports_failure() {
        let session = ReplaySession::new("cli").with_step(
            ReplayStep::new(0, StepKind::FileDiff).with_file_diff(ReplayDiff::new("", "a", "b")),
        );
        let options = ReplayOptions::new(ReplayMode::Simulate);
        assert!(replay(&session, options, true).is_err());

        let ok = ReplaySession::new("cli-ok").with_step(ReplayStep::new(0, StepKind::UserPrompt));
        assert!(replay(&ok, ReplayOptions::default(), false).is_ok());
    }

    #[test]
    fn test_load_session_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        ReplaySession::new("disk").save(&path).unwrap();

        let loaded = load_session(&path).unwrap();
        assert_eq!(loaded.id.as_str(), "disk");
        assert!(load_session(&dir.path().join("missing.json")).is_err());
    }
}
