//! Check command: validate overrides and the trusted list.

use guildwatch_core::GuardConfig;
use guildwatch_fs::Filesystem;
use guildwatch_schema::ActorId;

use crate::cli::CheckArgs;

use super::{trusted_actors, CommandResult};

/// Effective configuration after overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub config: GuardConfig,
    pub trusted: Vec<ActorId>,
}

impl CheckReport {
    /// Human-readable lines, one per detector plus the trusted list.
    pub fn lines(&self) -> Vec<String> {
        let spam = &self.config.spam;
        let raid = &self.config.raid;
        let nuke = &self.config.nuke;
        let trusted: Vec<String> = self.trusted.iter().map(ToString::to_string).collect();

        vec![
            format!(
                "anti-spam: {} messages per {}, grace {}, notice {}, timeout {}",
                spam.message_limit,
                secs(spam.window_ms),
                secs(spam.grace_ms),
                secs(spam.notice_ttl_ms),
                secs(spam.timeout_ms)
            ),
            format!(
                "anti-raid: {} joins per {}, protection {}, min account age {}, timeout {}",
                raid.join_limit,
                secs(raid.window_ms),
                secs(raid.protection_ms),
                secs(raid.min_account_age_ms),
                secs(raid.timeout_ms)
            ),
            format!("anti-raid: username denylist [{}]", raid.username_denylist.join(", ")),
            format!(
                "anti-nuke: {} actions per {}, protection {}, timeout {}",
                nuke.action_limit,
                secs(nuke.window_ms),
                secs(nuke.protection_ms),
                secs(nuke.timeout_ms)
            ),
            format!("trusted: {} [{}]", trusted.len(), trusted.join(", ")),
        ]
    }
}

fn secs(ms: u64) -> String {
    format!("{}s", ms / 1_000)
}

/// Execute the check command.
pub fn execute_check<F: Filesystem>(args: &CheckArgs, fs: &F) -> CommandResult<CheckReport> {
    let config = args.guard.to_config()?;
    let trusted = trusted_actors(fs, &args.guard)?;
    Ok(CheckReport { config, trusted })
}
