//! Replay command orchestration.
//!
//! Runs a recorded stream through the engine against a dry-run effector.
//! The clock follows record time, and timers still pending after the last
//! record are drained so every expiry and re-check is accounted for.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use guildwatch_clock::{Clock, MockClock};
use guildwatch_core::{CommandOutcome, GuardEngine, Logger};
use guildwatch_fs::Filesystem;
use guildwatch_schema::StreamRecord;
use serde::Serialize;

use crate::cli::{CliError, ReplayArgs};
use crate::io::parse_stream;

use super::{dry_run_effector, trusted_actors, AuditSink, CommandResult};

const COMPONENT: &str = "replay";

/// File name of the summary written next to the audit logs.
pub const SUMMARY_FILE: &str = "summary.json";

/// Result of replay command execution.
#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub events: usize,
    pub commands: usize,
    /// Scheduled tasks run after the last record.
    pub timers_drained: usize,
    pub audit_records: usize,
    /// Effector calls that went through.
    pub effects: usize,
    /// Effector calls refused by a denied capability.
    pub refused: usize,
    pub audit_titles: BTreeMap<String, usize>,
    pub outcomes: Vec<CommandOutcome>,
    #[serde(skip)]
    pub summary_path: Option<PathBuf>,
}

/// Execute the replay command.
pub fn execute_replay<F>(
    args: &ReplayArgs,
    fs: &F,
    logger: Arc<dyn Logger>,
) -> CommandResult<ReplaySummary>
where
    F: Filesystem + Clone,
{
    let config = args.validate()?;
    let trusted = trusted_actors(fs, &args.guard)?;

    let content = fs.read_file(&args.events)?;
    let records = parse_stream(&content)?;
    logger.verbose(
        COMPONENT,
        &format!(
            "Replaying {} records from {} ({} trusted actors)",
            records.len(),
            args.events.display(),
            trusted.len()
        ),
    );

    let start_ms = records.first().map(StreamRecord::ts_ms).unwrap_or(0);
    let clock = Arc::new(MockClock::new(start_ms));
    let effector = dry_run_effector(&args.deny);
    let mut engine = GuardEngine::new(config, effector.clone(), clock.clone(), logger.clone())
        .map_err(CliError::from)?
        .with_trusted(trusted);

    let mut events = 0;
    let mut outcomes = Vec::new();
    for record in &records {
        // out-of-order lines never move the clock backwards
        clock.set(record.ts_ms().max(clock.now_unix_ms()));
        match engine.apply(record) {
            Some(outcome) => outcomes.push(outcome),
            None => events += 1,
        }
    }
    let timers_drained = engine.drain();

    let mut sink = AuditSink::new(fs.clone(), args.out_dir.as_deref());
    sink.flush(&effector)?;

    let mut summary = ReplaySummary {
        events,
        commands: outcomes.len(),
        timers_drained,
        audit_records: sink.written(),
        effects: sink.effects(),
        refused: sink.refused(),
        audit_titles: sink.titles().clone(),
        outcomes,
        summary_path: None,
    };

    if let Some(out_dir) = &args.out_dir {
        let path = out_dir.join(SUMMARY_FILE);
        let json = serde_json::to_string_pretty(&summary).unwrap_or_default();
        fs.create_dir_all(out_dir)?;
        fs.write_atomic(&path, json.as_bytes())?;
        logger.verbose(COMPONENT, &format!("Wrote {}", path.display()));
        summary.summary_path = Some(path);
    }

    Ok(summary)
}
