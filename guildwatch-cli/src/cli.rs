//! CLI argument parsing using clap.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use guildwatch_clock::{MS_PER_DAY, MS_PER_MIN, MS_PER_SEC};
use guildwatch_core::{Capability, ConfigError, GuardConfig};
use thiserror::Error;

/// Default idle tick interval for `watch`, in milliseconds.
pub const DEFAULT_TICK_MS: u64 = 1_000;

/// CLI validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("tick interval must be at least 1ms")]
    InvalidTick,
}

/// guildwatch - abuse detection for community guilds
#[derive(Debug, Parser)]
#[command(name = "guildwatch", version, about, long_about = None)]
pub struct Cli {
    /// Verbosity (-v escalations, -vv window counts)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a recorded JSONL stream of events and admin commands
    Replay(ReplayArgs),
    /// Read JSONL records from stdin until EOF or Ctrl+C
    Watch(WatchArgs),
    /// Validate thresholds and the trusted list, print the effective config
    Check(CheckArgs),
}

/// Detector overrides shared by every subcommand.
#[derive(Debug, Clone, Default, PartialEq, Args)]
pub struct GuardArgs {
    /// File of trusted actor IDs, one per line, `#` comments allowed
    #[arg(long)]
    pub trusted: Option<PathBuf>,

    /// Messages per window before an actor is spamming
    #[arg(long)]
    pub spam_limit: Option<usize>,

    #[arg(long)]
    pub spam_window_sec: Option<u64>,

    /// Calm-down period after a spam warning
    #[arg(long)]
    pub spam_grace_sec: Option<u64>,

    /// Joins per window before raid protection activates
    #[arg(long)]
    pub raid_join_limit: Option<usize>,

    #[arg(long)]
    pub raid_window_sec: Option<u64>,

    #[arg(long)]
    pub raid_protection_min: Option<u64>,

    /// Accounts younger than this are suspicious during a raid
    #[arg(long)]
    pub min_account_age_days: Option<u64>,

    /// Username fragments marking a joiner as suspicious (replaces the defaults)
    #[arg(long, value_delimiter = ',')]
    pub deny_username: Vec<String>,

    /// Privileged actions per window before containment
    #[arg(long)]
    pub nuke_action_limit: Option<usize>,

    #[arg(long)]
    pub nuke_window_sec: Option<u64>,

    #[arg(long)]
    pub nuke_protection_min: Option<u64>,
}

impl GuardArgs {
    /// Apply the overrides on top of the defaults and validate the result.
    pub fn to_config(&self) -> Result<GuardConfig, CliError> {
        let mut config = GuardConfig::default();

        if let Some(limit) = self.spam_limit {
            config.spam.message_limit = limit;
        }
        if let Some(sec) = self.spam_window_sec {
            config.spam.window_ms = sec * MS_PER_SEC;
        }
        if let Some(sec) = self.spam_grace_sec {
            config.spam.grace_ms = sec * MS_PER_SEC;
        }

        if let Some(limit) = self.raid_join_limit {
            config.raid.join_limit = limit;
        }
        if let Some(sec) = self.raid_window_sec {
            config.raid.window_ms = sec * MS_PER_SEC;
        }
        if let Some(min) = self.raid_protection_min {
            config.raid.protection_ms = min * MS_PER_MIN;
        }
        if let Some(days) = self.min_account_age_days {
            config.raid.min_account_age_ms = days * MS_PER_DAY;
        }
        if !self.deny_username.is_empty() {
            config.raid = config.raid.with_username_denylist(&self.deny_username);
        }

        if let Some(limit) = self.nuke_action_limit {
            config.nuke.action_limit = limit;
        }
        if let Some(sec) = self.nuke_window_sec {
            config.nuke.window_ms = sec * MS_PER_SEC;
        }
        if let Some(min) = self.nuke_protection_min {
            config.nuke.protection_ms = min * MS_PER_MIN;
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct ReplayArgs {
    /// JSONL stream to replay
    #[arg(short, long)]
    pub events: PathBuf,

    /// Directory for audit logs and summary.json
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Simulate a missing capability (kick, timeout, remove-roles, ...)
    #[arg(long)]
    pub deny: Vec<Capability>,

    #[command(flatten)]
    pub guard: GuardArgs,
}

impl ReplayArgs {
    pub fn validate(&self) -> Result<GuardConfig, CliError> {
        self.guard.to_config()
    }
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct WatchArgs {
    /// Directory for audit logs
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// How often pending timers are checked while stdin is idle
    #[arg(long, default_value_t = DEFAULT_TICK_MS)]
    pub tick_ms: u64,

    #[arg(long)]
    pub deny: Vec<Capability>,

    #[command(flatten)]
    pub guard: GuardArgs,
}

impl WatchArgs {
    pub fn validate(&self) -> Result<GuardConfig, CliError> {
        if self.tick_ms == 0 {
            return Err(CliError::InvalidTick);
        }
        self.guard.to_config()
    }
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub guard: GuardArgs,
}

/// Parse CLI arguments from an iterator (for testing).
pub fn parse_from<I, T>(iter: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(iter)
}
