//! Detector thresholds and timers.

use guildwatch_clock::{MS_PER_DAY, MS_PER_HOUR, MS_PER_MIN, MS_PER_SEC};
use thiserror::Error;

/// Trailing window for message counting.
pub const DEFAULT_SPAM_WINDOW_MS: u64 = 60 * MS_PER_SEC;

/// Messages allowed per window before the actor is considered spamming.
pub const DEFAULT_SPAM_MESSAGE_LIMIT: usize = 35;

/// Time a warned actor has to calm down before the re-check.
pub const DEFAULT_SPAM_GRACE_MS: u64 = 30 * MS_PER_SEC;

/// Lifetime of the public warning notice.
pub const DEFAULT_SPAM_NOTICE_TTL_MS: u64 = 10 * MS_PER_SEC;

/// Timeout applied when a spammer cannot be kicked.
pub const DEFAULT_SPAM_TIMEOUT_MS: u64 = 10 * MS_PER_MIN;

/// Trailing window for join counting.
pub const DEFAULT_RAID_WINDOW_MS: u64 = 5 * MS_PER_SEC;

/// Joins allowed per window; one more activates raid protection.
pub const DEFAULT_RAID_JOIN_LIMIT: usize = 13;

/// How long raid protection stays armed.
pub const DEFAULT_RAID_PROTECTION_MS: u64 = 30 * MS_PER_MIN;

/// Accounts younger than this are suspicious.
pub const DEFAULT_RAID_MIN_ACCOUNT_AGE_MS: u64 = 3 * MS_PER_DAY;

/// Timeout applied to a suspicious joiner that cannot be kicked.
pub const DEFAULT_RAID_TIMEOUT_MS: u64 = MS_PER_HOUR;

/// Username fragments that mark a joiner as suspicious.
pub const DEFAULT_USERNAME_DENYLIST: [&str; 4] = ["user", "member", "spam", "bot"];

/// Trailing window for privileged actions.
pub const DEFAULT_NUKE_WINDOW_MS: u64 = 10 * MS_PER_SEC;

/// Privileged actions allowed per window across all tracked kinds.
pub const DEFAULT_NUKE_ACTION_LIMIT: usize = 8;

/// How long anti-nuke protective mode stays armed.
pub const DEFAULT_NUKE_PROTECTION_MS: u64 = 60 * MS_PER_MIN;

/// Containment timeout.
pub const DEFAULT_NUKE_TIMEOUT_MS: u64 = 5 * MS_PER_MIN;

/// Errors from configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{detector}: {field} must be at least 1, got 0")]
    Zero {
        detector: &'static str,
        field: &'static str,
    },

    #[error("anti-spam: grace period ({grace_ms}ms) must be shorter than the window ({window_ms}ms)")]
    GraceExceedsWindow { grace_ms: u64, window_ms: u64 },

    #[error("anti-raid: username denylist entry {0:?} is empty")]
    EmptyDenylistEntry(usize),
}

fn non_zero(detector: &'static str, field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Zero { detector, field });
    }
    Ok(())
}

/// Anti-spam settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpamConfig {
    pub window_ms: u64,
    pub message_limit: usize,
    pub grace_ms: u64,
    pub notice_ttl_ms: u64,
    pub timeout_ms: u64,
}

impl Default for SpamConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_SPAM_WINDOW_MS,
            message_limit: DEFAULT_SPAM_MESSAGE_LIMIT,
            grace_ms: DEFAULT_SPAM_GRACE_MS,
            notice_ttl_ms: DEFAULT_SPAM_NOTICE_TTL_MS,
            timeout_ms: DEFAULT_SPAM_TIMEOUT_MS,
        }
    }
}

impl SpamConfig {
    pub fn with_message_limit(mut self, limit: usize) -> Self {
        self.message_limit = limit;
        self
    }

    pub fn with_window_ms(mut self, window_ms: u64) -> Self {
        self.window_ms = window_ms;
        self
    }

    pub fn with_grace_ms(mut self, grace_ms: u64) -> Self {
        self.grace_ms = grace_ms;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        non_zero("anti-spam", "window", self.window_ms)?;
        non_zero("anti-spam", "message limit", self.message_limit as u64)?;
        non_zero("anti-spam", "grace period", self.grace_ms)?;
        non_zero("anti-spam", "timeout", self.timeout_ms)?;
        // the re-check must still see the messages that caused the warning
        if self.grace_ms >= self.window_ms {
            return Err(ConfigError::GraceExceedsWindow {
                grace_ms: self.grace_ms,
                window_ms: self.window_ms,
            });
        }
        Ok(())
    }
}

/// Anti-raid settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaidConfig {
    pub window_ms: u64,
    pub join_limit: usize,
    pub protection_ms: u64,
    pub min_account_age_ms: u64,
    pub timeout_ms: u64,
    /// Lower-case fragments matched against lower-cased usernames.
    pub username_denylist: Vec<String>,
}

impl Default for RaidConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_RAID_WINDOW_MS,
            join_limit: DEFAULT_RAID_JOIN_LIMIT,
            protection_ms: DEFAULT_RAID_PROTECTION_MS,
            min_account_age_ms: DEFAULT_RAID_MIN_ACCOUNT_AGE_MS,
            timeout_ms: DEFAULT_RAID_TIMEOUT_MS,
            username_denylist: DEFAULT_USERNAME_DENYLIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl RaidConfig {
    pub fn with_join_limit(mut self, limit: usize) -> Self {
        self.join_limit = limit;
        self
    }

    pub fn with_window_ms(mut self, window_ms: u64) -> Self {
        self.window_ms = window_ms;
        self
    }

    pub fn with_protection_ms(mut self, protection_ms: u64) -> Self {
        self.protection_ms = protection_ms;
        self
    }

    /// Builder: replace the username denylist. Entries are lower-cased.
    pub fn with_username_denylist<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.username_denylist = entries
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .collect();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        non_zero("anti-raid", "window", self.window_ms)?;
        non_zero("anti-raid", "join limit", self.join_limit as u64)?;
        non_zero("anti-raid", "protection duration", self.protection_ms)?;
        non_zero("anti-raid", "timeout", self.timeout_ms)?;
        if let Some(idx) = self.username_denylist.iter().position(|s| s.is_empty()) {
            return Err(ConfigError::EmptyDenylistEntry(idx));
        }
        Ok(())
    }
}

/// Anti-nuke settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NukeConfig {
    pub window_ms: u64,
    pub action_limit: usize,
    pub protection_ms: u64,
    pub timeout_ms: u64,
}

impl Default for NukeConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_NUKE_WINDOW_MS,
            action_limit: DEFAULT_NUKE_ACTION_LIMIT,
            protection_ms: DEFAULT_NUKE_PROTECTION_MS,
            timeout_ms: DEFAULT_NUKE_TIMEOUT_MS,
        }
    }
}

impl NukeConfig {
    pub fn with_action_limit(mut self, limit: usize) -> Self {
        self.action_limit = limit;
        self
    }

    pub fn with_window_ms(mut self, window_ms: u64) -> Self {
        self.window_ms = window_ms;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        non_zero("anti-nuke", "window", self.window_ms)?;
        non_zero("anti-nuke", "action limit", self.action_limit as u64)?;
        non_zero("anti-nuke", "protection duration", self.protection_ms)?;
        non_zero("anti-nuke", "timeout", self.timeout_ms)
    }
}

/// Settings for all three detectors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardConfig {
    pub spam: SpamConfig,
    pub raid: RaidConfig,
    pub nuke: NukeConfig,
}

impl GuardConfig {
    pub fn with_spam(mut self, spam: SpamConfig) -> Self {
        self.spam = spam;
        self
    }

    pub fn with_raid(mut self, raid: RaidConfig) -> Self {
        self.raid = raid;
        self
    }

    pub fn with_nuke(mut self, nuke: NukeConfig) -> Self {
        self.nuke = nuke;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.spam.validate()?;
        self.raid.validate()?;
        self.nuke.validate()
    }
}
