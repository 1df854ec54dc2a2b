//! Watch command orchestration.
//!
//! Reads JSONL records from a line source (stdin in the binary) on a
//! background thread. The main loop applies records as they arrive and runs
//! due timers whenever the source stays idle for one tick. It stops at EOF
//! or when shutdown is requested.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use guildwatch_clock::Clock;
use guildwatch_core::{CommandOutcome, GuardEngine, Logger};
use guildwatch_fs::Filesystem;

use crate::cli::{CliError, WatchArgs};
use crate::io::parse_record_line;

use super::{dry_run_effector, trusted_actors, AuditSink, CommandResult};

const COMPONENT: &str = "watch";

/// Result of watch command execution.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchSummary {
    pub records: usize,
    pub commands: usize,
    /// Lines that were unreadable or not valid records. They are logged
    /// and skipped.
    pub rejected: usize,
    pub timers_run: usize,
    pub audit_records: usize,
    /// Effector calls that went through.
    pub effects: usize,
    /// Effector calls refused by a denied capability.
    pub refused: usize,
    /// Timers still pending when the loop stopped.
    pub pending_timers: usize,
    pub interrupted: bool,
}

/// Stop request shared between the Ctrl+C handler and the watch loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    /// Flag raised by the process-wide Ctrl+C handler.
    ///
    /// Fails if another handler is already installed.
    pub fn on_ctrl_c() -> Result<Self, ctrlc::Error> {
        let flag = Self::default();
        let raised_by_handler = flag.clone();
        ctrlc::set_handler(move || raised_by_handler.trigger())?;
        Ok(flag)
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn spawn_line_reader<R>(input: R) -> Receiver<std::io::Result<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in input.lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// One-line rendering of a command outcome for the log.
pub fn describe_outcome(outcome: &CommandOutcome) -> String {
    match outcome {
        CommandOutcome::Applied(message) | CommandOutcome::NoOp(message) => message.clone(),
        CommandOutcome::Status(status) => serde_json::to_string(status).unwrap_or_default(),
    }
}

/// Execute the watch command.
pub fn execute_watch<R, C, F>(
    args: &WatchArgs,
    input: R,
    clock: C,
    fs: &F,
    shutdown: &ShutdownFlag,
    logger: Arc<dyn Logger>,
) -> CommandResult<WatchSummary>
where
    R: BufRead + Send + 'static,
    C: Clock,
    F: Filesystem + Clone,
{
    let config = args.validate()?;
    let trusted = trusted_actors(fs, &args.guard)?;

    let effector = dry_run_effector(&args.deny);
    let mut engine = GuardEngine::new(config, effector.clone(), clock, logger.clone())
        .map_err(CliError::from)?
        .with_trusted(trusted);
    let mut sink = AuditSink::new(fs.clone(), args.out_dir.as_deref());

    logger.verbose(
        COMPONENT,
        &format!("Watching input, tick every {}ms", args.tick_ms),
    );

    let lines = spawn_line_reader(input);
    let tick = Duration::from_millis(args.tick_ms);
    let mut summary = WatchSummary::default();
    let mut line_num = 0;

    loop {
        if shutdown.is_set() {
            summary.interrupted = true;
            break;
        }

        match lines.recv_timeout(tick) {
            Ok(line) => {
                line_num += 1;
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        summary.rejected += 1;
                        logger.info(COMPONENT, &format!("line {line_num}: unreadable: {e}"));
                        continue;
                    }
                };
                match parse_record_line(line_num, &line) {
                    Ok(Some(record)) => {
                        summary.records += 1;
                        if let Some(outcome) = engine.apply(&record) {
                            summary.commands += 1;
                            logger.info(COMPONENT, &describe_outcome(&outcome));
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        summary.rejected += 1;
                        logger.info(COMPONENT, &e.to_string());
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => summary.timers_run += engine.tick(),
            Err(RecvTimeoutError::Disconnected) => break,
        }

        summary.audit_records += sink.flush(&effector)?;
    }

    summary.effects = sink.effects();
    summary.refused = sink.refused();
    summary.pending_timers = engine.pending_tasks();
    logger.verbose(
        COMPONENT,
        &format!(
            "Stopped after {} records ({} pending timers dropped)",
            summary.records, summary.pending_timers
        ),
    );
    Ok(summary)
}
