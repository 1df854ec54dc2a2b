//! Command orchestration for CLI subcommands.
//!
//! - `replay` - run a recorded stream through the engine
//! - `watch` - run stdin through the engine until EOF or Ctrl+C
//! - `check` - validate and print the effective configuration

pub mod check;
pub mod replay;
pub mod watch;

pub use check::{execute_check, CheckReport};
pub use replay::{execute_replay, ReplaySummary};
pub use watch::{describe_outcome, execute_watch, ShutdownFlag, WatchSummary};

use std::collections::BTreeMap;
use std::path::Path;

use crate::cli::{CliError, GuardArgs};
use crate::io::{load_trusted, StreamReadError, TrustLoadError};
use guildwatch_core::{Capability, RecordingEffector};
use guildwatch_fs::{AuditWriter, Filesystem, FsError, JsonlAuditWriter};
use guildwatch_schema::ActorId;
use thiserror::Error;

/// Errors from command execution.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] CliError),

    #[error("filesystem error: {0}")]
    Filesystem(#[from] FsError),

    #[error("trusted list error: {0}")]
    TrustList(#[from] TrustLoadError),

    #[error("stream error: {0}")]
    Stream(#[from] StreamReadError),
}

/// Result of command execution.
pub type CommandResult<T> = Result<T, CommandError>;

/// Trusted actors named by `--trusted`, or none.
pub(crate) fn trusted_actors<F: Filesystem>(
    fs: &F,
    args: &GuardArgs,
) -> CommandResult<Vec<ActorId>> {
    match &args.trusted {
        Some(path) => Ok(load_trusted(fs, path)?),
        None => Ok(Vec::new()),
    }
}

/// Dry-run effector with the requested capabilities denied.
pub(crate) fn dry_run_effector(deny: &[Capability]) -> RecordingEffector {
    let effector = RecordingEffector::new();
    for capability in deny {
        effector.deny(*capability);
    }
    effector
}

/// Drains the dry-run effector: audit records go to the JSONL log, effect
/// attempts are reduced to applied and refused counts.
pub(crate) struct AuditSink<F: Filesystem> {
    writer: Option<JsonlAuditWriter<F>>,
    written: usize,
    titles: BTreeMap<String, usize>,
    effects: usize,
    refused: usize,
}

impl<F: Filesystem> AuditSink<F> {
    pub(crate) fn new(fs: F, out_dir: Option<&Path>) -> Self {
        Self {
            writer: out_dir.map(|dir| JsonlAuditWriter::new(fs, dir.to_path_buf())),
            written: 0,
            titles: BTreeMap::new(),
            effects: 0,
            refused: 0,
        }
    }

    /// Take everything the effector recorded since the last flush. Returns
    /// the number of audit records taken.
    pub(crate) fn flush(&mut self, effector: &RecordingEffector) -> Result<usize, FsError> {
        for attempt in effector.take_attempts() {
            if attempt.succeeded {
                self.effects += 1;
            } else {
                self.refused += 1;
            }
        }

        let audits = effector.take_audits();
        for record in &audits {
            if let Some(writer) = &self.writer {
                writer.write(record)?;
            }
            *self.titles.entry(record.title.clone()).or_default() += 1;
        }
        self.written += audits.len();
        Ok(audits.len())
    }

    pub(crate) fn written(&self) -> usize {
        self.written
    }

    pub(crate) fn effects(&self) -> usize {
        self.effects
    }

    pub(crate) fn refused(&self) -> usize {
        self.refused
    }

    pub(crate) fn titles(&self) -> &BTreeMap<String, usize> {
        &self.titles
    }
}
