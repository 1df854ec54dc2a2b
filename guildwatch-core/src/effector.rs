//! Capability interface through which detectors apply consequences.
//!
//! The platform layer implements [`EscalationEffector`]; the core never
//! learns how a kick or an audit record is transported. Every call reports
//! its own outcome so a failed step can fall through to the next one.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};

use guildwatch_schema::{
    ActorId, ActorSnapshot, AuditRecord, ChannelId, Event, GuildId, NoticeId, RoleId,
    VerificationLevel,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single capability of the effector, used to report and simulate denials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    RemoveRoles,
    Timeout,
    Kick,
    SetVerification,
    DirectMessage,
    PostNotice,
    Audit,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::RemoveRoles => "remove-roles",
            Capability::Timeout => "timeout",
            Capability::Kick => "kick",
            Capability::SetVerification => "set-verification",
            Capability::DirectMessage => "direct-message",
            Capability::PostNotice => "post-notice",
            Capability::Audit => "audit",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "remove-roles" => Ok(Capability::RemoveRoles),
            "timeout" => Ok(Capability::Timeout),
            "kick" => Ok(Capability::Kick),
            "set-verification" => Ok(Capability::SetVerification),
            "direct-message" => Ok(Capability::DirectMessage),
            "post-notice" => Ok(Capability::PostNotice),
            "audit" => Ok(Capability::Audit),
            other => Err(format!("unknown capability: {other}")),
        }
    }
}

/// Why a capability call failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EffectError {
    /// The system lacks rank or capability over the target.
    #[error("permission denied for {capability}: {reason}")]
    PermissionDenied {
        capability: Capability,
        reason: String,
    },

    /// The audit/alert destination does not exist.
    #[error("channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("platform error: {0}")]
    Platform(String),
}

/// Abstract consequences the detectors may apply.
pub trait EscalationEffector: Send + Sync {
    fn remove_roles(
        &self,
        guild: GuildId,
        actor: ActorId,
        roles: &[RoleId],
        reason: &str,
    ) -> Result<(), EffectError>;

    fn timeout_actor(
        &self,
        guild: GuildId,
        actor: ActorId,
        duration_ms: u64,
        reason: &str,
    ) -> Result<(), EffectError>;

    fn kick_actor(&self, guild: GuildId, actor: ActorId, reason: &str) -> Result<(), EffectError>;

    fn verification_level(&self, guild: GuildId) -> Result<VerificationLevel, EffectError>;

    fn set_verification_level(
        &self,
        guild: GuildId,
        level: VerificationLevel,
    ) -> Result<(), EffectError>;

    /// Private message to the actor.
    fn send_direct_warning(&self, actor: ActorId, text: &str) -> Result<(), EffectError>;

    /// Public message in `channel`; the returned handle deletes it later.
    fn post_notice(
        &self,
        guild: GuildId,
        channel: ChannelId,
        text: &str,
    ) -> Result<NoticeId, EffectError>;

    fn delete_notice(&self, guild: GuildId, notice: NoticeId) -> Result<(), EffectError>;

    /// Deliver an audit record. Callers treat failure as a dropped record.
    fn emit_audit(&self, record: &AuditRecord) -> Result<(), EffectError>;

    /// Resolve who really performed a privileged action.
    ///
    /// Platforms that learn the executor from an audit log lookup override
    /// this; `None` means the executor could not be attributed.
    fn attribute_executor(&self, event: &Event) -> Option<ActorSnapshot> {
        Some(event.actor.clone())
    }
}

/// One capability call as seen by [`RecordingEffector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectCall {
    RemoveRoles {
        guild: GuildId,
        actor: ActorId,
        roles: Vec<RoleId>,
    },
    Timeout {
        guild: GuildId,
        actor: ActorId,
        duration_ms: u64,
    },
    Kick {
        guild: GuildId,
        actor: ActorId,
    },
    SetVerification {
        guild: GuildId,
        level: VerificationLevel,
    },
    DirectWarning {
        actor: ActorId,
    },
    PostNotice {
        guild: GuildId,
        channel: ChannelId,
        notice: Option<NoticeId>,
    },
    DeleteNotice {
        guild: GuildId,
        notice: NoticeId,
    },
}

/// A recorded call and whether it was allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub call: EffectCall,
    pub succeeded: bool,
}

#[derive(Debug, Default)]
struct RecorderState {
    attempts: Vec<Attempt>,
    audits: Vec<AuditRecord>,
    denied: HashSet<Capability>,
    levels: HashMap<GuildId, VerificationLevel>,
    live_notices: HashSet<NoticeId>,
    next_notice: u64,
    unknown_executors: bool,
}

/// In-memory effector that records every call.
///
/// Capabilities can be denied to simulate an actor that outranks the
/// system. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct RecordingEffector {
    state: Arc<RwLock<RecorderState>>,
}

/// Verification level assumed for guilds never seen before.
const DEFAULT_LEVEL: VerificationLevel = VerificationLevel::Medium;

impl RecordingEffector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: deny a capability from the start.
    pub fn denying(self, capability: Capability) -> Self {
        self.deny(capability);
        self
    }

    pub fn deny(&self, capability: Capability) {
        self.write(|s| {
            s.denied.insert(capability);
        });
    }

    pub fn allow(&self, capability: Capability) {
        self.write(|s| {
            s.denied.remove(&capability);
        });
    }

    /// Make `attribute_executor` fail for every event.
    pub fn hide_executors(&self) {
        self.write(|s| s.unknown_executors = true);
    }

    pub fn set_level(&self, guild: GuildId, level: VerificationLevel) {
        self.write(|s| {
            s.levels.insert(guild, level);
        });
    }

    pub fn level(&self, guild: GuildId) -> VerificationLevel {
        self.read(|s| s.levels.get(&guild).copied().unwrap_or(DEFAULT_LEVEL))
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.read(|s| s.attempts.clone())
    }

    /// Calls that went through.
    pub fn successful_calls(&self) -> Vec<EffectCall> {
        self.read(|s| {
            s.attempts
                .iter()
                .filter(|a| a.succeeded)
                .map(|a| a.call.clone())
                .collect()
        })
    }

    /// Remove and return every recorded attempt.
    pub fn take_attempts(&self) -> Vec<Attempt> {
        self.write(|s| std::mem::take(&mut s.attempts))
    }

    pub fn audits(&self) -> Vec<AuditRecord> {
        self.read(|s| s.audits.clone())
    }

    /// Remove and return every audit record written so far.
    pub fn take_audits(&self) -> Vec<AuditRecord> {
        self.write(|s| std::mem::take(&mut s.audits))
    }

    pub fn audit_titles(&self) -> Vec<String> {
        self.read(|s| s.audits.iter().map(|r| r.title.clone()).collect())
    }

    /// Number of audit records with exactly this title.
    pub fn audit_count(&self, title: &str) -> usize {
        self.read(|s| s.audits.iter().filter(|r| r.title == title).count())
    }

    /// Successful kicks of `actor`.
    pub fn kicks_of(&self, actor: ActorId) -> usize {
        self.count_successful(|c| matches!(c, EffectCall::Kick { actor: a, .. } if *a == actor))
    }

    /// Successful timeouts of `actor`.
    pub fn timeouts_of(&self, actor: ActorId) -> usize {
        self.count_successful(|c| matches!(c, EffectCall::Timeout { actor: a, .. } if *a == actor))
    }

    /// Notices still visible.
    pub fn live_notices(&self) -> usize {
        self.read(|s| s.live_notices.len())
    }

    fn count_successful<F: Fn(&EffectCall) -> bool>(&self, predicate: F) -> usize {
        self.read(|s| {
            s.attempts
                .iter()
                .filter(|a| a.succeeded && predicate(&a.call))
                .count()
        })
    }

    fn read<T, F: FnOnce(&RecorderState) -> T>(&self, f: F) -> T {
        match self.state.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn write<T, F: FnOnce(&mut RecorderState) -> T>(&self, f: F) -> T {
        match self.state.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Record an attempt, failing it when `capability` is denied.
    fn attempt(&self, capability: Capability, call: EffectCall) -> Result<(), EffectError> {
        self.write(|s| {
            let succeeded = !s.denied.contains(&capability);
            s.attempts.push(Attempt { call, succeeded });
            if succeeded {
                Ok(())
            } else {
                Err(EffectError::PermissionDenied {
                    capability,
                    reason: "target outranks the automated system".to_string(),
                })
            }
        })
    }
}

impl EscalationEffector for RecordingEffector {
    fn remove_roles(
        &self,
        guild: GuildId,
        actor: ActorId,
        roles: &[RoleId],
        _reason: &str,
    ) -> Result<(), EffectError> {
        self.attempt(
            Capability::RemoveRoles,
            EffectCall::RemoveRoles {
                guild,
                actor,
                roles: roles.to_vec(),
            },
        )
    }

    fn timeout_actor(
        &self,
        guild: GuildId,
        actor: ActorId,
        duration_ms: u64,
        _reason: &str,
    ) -> Result<(), EffectError> {
        self.attempt(
            Capability::Timeout,
            EffectCall::Timeout {
                guild,
                actor,
                duration_ms,
            },
        )
    }

    fn kick_actor(&self, guild: GuildId, actor: ActorId, _reason: &str) -> Result<(), EffectError> {
        self.attempt(Capability::Kick, EffectCall::Kick { guild, actor })
    }

    fn verification_level(&self, guild: GuildId) -> Result<VerificationLevel, EffectError> {
        Ok(self.level(guild))
    }

    fn set_verification_level(
        &self,
        guild: GuildId,
        level: VerificationLevel,
    ) -> Result<(), EffectError> {
        self.attempt(
            Capability::SetVerification,
            EffectCall::SetVerification { guild, level },
        )?;
        self.set_level(guild, level);
        Ok(())
    }

    fn send_direct_warning(&self, actor: ActorId, _text: &str) -> Result<(), EffectError> {
        self.attempt(Capability::DirectMessage, EffectCall::DirectWarning { actor })
    }

    fn post_notice(
        &self,
        guild: GuildId,
        channel: ChannelId,
        _text: &str,
    ) -> Result<NoticeId, EffectError> {
        self.write(|s| {
            if s.denied.contains(&Capability::PostNotice) {
                s.attempts.push(Attempt {
                    call: EffectCall::PostNotice {
                        guild,
                        channel,
                        notice: None,
                    },
                    succeeded: false,
                });
                return Err(EffectError::ChannelUnavailable(format!("channel {channel}")));
            }
            s.next_notice += 1;
            let notice = NoticeId(s.next_notice);
            s.live_notices.insert(notice);
            s.attempts.push(Attempt {
                call: EffectCall::PostNotice {
                    guild,
                    channel,
                    notice: Some(notice),
                },
                succeeded: true,
            });
            Ok(notice)
        })
    }

    fn delete_notice(&self, guild: GuildId, notice: NoticeId) -> Result<(), EffectError> {
        self.write(|s| {
            let existed = s.live_notices.remove(&notice);
            s.attempts.push(Attempt {
                call: EffectCall::DeleteNotice { guild, notice },
                succeeded: existed,
            });
            if existed {
                Ok(())
            } else {
                Err(EffectError::Platform(format!("notice {notice} already gone")))
            }
        })
    }

    fn emit_audit(&self, record: &AuditRecord) -> Result<(), EffectError> {
        self.write(|s| {
            if s.denied.contains(&Capability::Audit) {
                return Err(EffectError::ChannelUnavailable("audit log".to_string()));
            }
            s.audits.push(record.clone());
            Ok(())
        })
    }

    fn attribute_executor(&self, event: &Event) -> Option<ActorSnapshot> {
        if self.read(|s| s.unknown_executors) {
            return None;
        }
        Some(event.actor.clone())
    }
}
