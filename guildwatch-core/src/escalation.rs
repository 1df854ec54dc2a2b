//! Fallback chain shared by the spam and raid detectors.

use guildwatch_schema::{ActorId, GuildId};

use crate::effector::EscalationEffector;

/// Which step of kick → timeout → log-only actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationOutcome {
    Kicked,
    TimedOut,
    /// Neither consequence could be applied; only the record remains.
    DetectedOnly,
}

impl EscalationOutcome {
    /// Label used in audit records.
    pub fn label(self) -> &'static str {
        match self {
            EscalationOutcome::Kicked => "KICKED",
            EscalationOutcome::TimedOut => "TIMED OUT",
            EscalationOutcome::DetectedOnly => "DETECTED",
        }
    }
}

/// Parameters for one escalation.
#[derive(Debug, Clone, Copy)]
pub struct EscalationPlan<'a> {
    pub kick_reason: &'a str,
    pub timeout_ms: u64,
    pub timeout_reason: &'a str,
}

/// Try to kick; if that is refused try a timeout; otherwise settle for the
/// record. Each step is attempted at most once.
pub fn escalate_member(
    effector: &dyn EscalationEffector,
    guild: GuildId,
    actor: ActorId,
    plan: &EscalationPlan<'_>,
) -> EscalationOutcome {
    if effector.kick_actor(guild, actor, plan.kick_reason).is_ok() {
        return EscalationOutcome::Kicked;
    }
    if effector
        .timeout_actor(guild, actor, plan.timeout_ms, plan.timeout_reason)
        .is_ok()
    {
        return EscalationOutcome::TimedOut;
    }
    EscalationOutcome::DetectedOnly
}
