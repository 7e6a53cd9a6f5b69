// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use reseed_application::{
    build_orchestrator, InMemoryEventBus, OrchestrationError, OrchestrationReport,
    TerminalPrompter,
};
use reseed_config::{load as load_config, RunConfig};
use reseed_domain::{ReleaseMetadata, RunMode};
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Check a prepared release against every requested tracker and decide where it may be uploaded.
#[derive(Debug, Parser)]
#[command(name = "reseed")]
#[command(version)]
struct Args {
    /// Release metadata (JSON)
    release: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long, env = "RESEED_CONFIG")]
    config: Option<PathBuf>,

    /// Trackers to process; replaces the list in the release file
    #[arg(short, long, value_delimiter = ',')]
    trackers: Vec<String>,

    #[arg(long)]
    unattended: bool,

    /// Ask for confirmation even in unattended mode
    #[arg(long)]
    unattended_confirm: bool,

    /// Run every check but never approve a real upload
    #[arg(long)]
    debug: bool,

    /// Decide duplicates without asking
    #[arg(long)]
    ask_dupe: bool,

    /// Upload even when duplicates were found
    #[arg(long)]
    allow_dupes: bool,

    /// Write the processed release and emitted events here (JSON)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    init_tracing(&config.telemetry.log_level);

    let raw = tokio::fs::read_to_string(&args.release)
        .await
        .with_context(|| format!("reading release file {}", args.release.display()))?;
    let mut meta: ReleaseMetadata = serde_json::from_str(&raw)
        .with_context(|| format!("parsing release file {}", args.release.display()))?;
    if !args.trackers.is_empty() {
        meta.trackers = args.trackers.clone();
    }
    meta.mode = merge_mode(&config.run, &args, meta.mode);

    let events = Arc::new(InMemoryEventBus::new());
    let orchestrator = build_orchestrator(&config, Arc::new(TerminalPrompter::new()))?
        .with_events(events.clone());

    info!(target: "cli", release = %meta.name, trackers = meta.trackers.len(), "processing release");
    let report = match orchestrator.process_all(&mut meta).await {
        Ok(report) => report,
        Err(OrchestrationError::Cancelled) => {
            error!(target: "cli", "cancelled; nothing was approved");
            return Ok(ExitCode::from(130));
        }
        Err(other) => return Err(other.into()),
    };

    print!("{}", render_summary(&report));

    if let Some(output) = &args.output {
        let document = json!({
            "release": meta,
            "successful": report.successful,
            "events": events.drain(),
        });
        tokio::fs::write(output, serde_json::to_vec_pretty(&document)?)
            .await
            .with_context(|| format!("writing {}", output.display()))?;
        info!(target: "cli", path = %output.display(), "results written");
    }

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(default_level: &str) {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Any switch enabled on the command line, in the config file or in the release itself stays on.
fn merge_mode(config: &RunConfig, args: &Args, release: RunMode) -> RunMode {
    RunMode {
        unattended: args.unattended || config.unattended || release.unattended,
        unattended_confirm: args.unattended_confirm
            || config.unattended_confirm
            || release.unattended_confirm,
        debug: args.debug || config.debug || release.debug,
        ask_dupe: args.ask_dupe || config.ask_dupe || release.ask_dupe,
        allow_dupes: args.allow_dupes || config.allow_dupes || release.allow_dupes,
    }
}

fn render_summary(report: &OrchestrationReport) -> String {
    let width = report
        .outcomes
        .keys()
        .map(String::len)
        .max()
        .unwrap_or(0)
        .max("TRACKER".len());

    let mut out = format!("{:<width$}  RESULT\n", "TRACKER");
    for (tracker, outcome) in &report.outcomes {
        let mut result = outcome.classification().to_string();
        if outcome.other {
            result.push_str(" (other)");
        }
        out.push_str(&format!("{tracker:<width$}  {result}\n"));
    }
    out.push_str(&format!("{} tracker(s) approved for upload\n", report.successful));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use reseed_domain::TrackerOutcome;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["reseed", "release.json"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn parses_tracker_list() {
        let args = args(&["--trackers", "AAA,BBB", "--unattended"]);
        assert_eq!(args.trackers, vec!["AAA".to_string(), "BBB".to_string()]);
        assert!(args.unattended);
        assert!(args.config.is_none());
    }

    #[test]
    fn switches_from_every_source_are_kept() {
        let config = RunConfig {
            allow_dupes: true,
            ..RunConfig::default()
        };
        let release = RunMode {
            debug: true,
            ..RunMode::default()
        };

        let mode = merge_mode(&config, &args(&["--unattended"]), release);

        assert!(mode.unattended);
        assert!(mode.allow_dupes);
        assert!(mode.debug);
        assert!(!mode.ask_dupe);
        assert!(!mode.unattended_confirm);
    }

    #[test]
    fn summary_lists_each_tracker() {
        let mut report = OrchestrationReport::default();
        report.outcomes.insert(
            "AAA".to_string(),
            TrackerOutcome {
                upload: true,
                ..TrackerOutcome::default()
            },
        );
        report.outcomes.insert(
            "BBB".to_string(),
            TrackerOutcome {
                dupe: true,
                ..TrackerOutcome::default()
            },
        );
        report.outcomes.insert(
            "CCC".to_string(),
            TrackerOutcome {
                skipped: true,
                other: true,
                ..TrackerOutcome::default()
            },
        );
        report.successful = 1;

        let rendered = render_summary(&report);

        assert!(rendered.contains("AAA      upload"));
        assert!(rendered.contains("BBB      dupe"));
        assert!(rendered.contains("CCC      skipped (other)"));
        assert!(rendered.ends_with("1 tracker(s) approved for upload\n"));
    }
}
