//! Guild-wide join-burst detection and suspicious-account screening.
//!
//! A burst of joins arms raid protection for the guild: verification is
//! raised one level and, while armed, every suspicious joiner is removed.
//! Protection disarms after its duration or on command and restores the
//! verification level that was in place before.

use std::collections::HashMap;
use std::fmt;

use chrono::{TimeZone, Utc};
use guildwatch_schema::{
    ActorId, ActorSnapshot, AuditRecord, AuditSource, Event, EventKind, GuildId, Severity,
    VerificationLevel,
};

use crate::config::RaidConfig;
use crate::engine::{describe_duration, DispatchContext, EventSubscriber, RaidStatus};
use crate::escalation::{escalate_member, EscalationOutcome, EscalationPlan};
use crate::protective::{ModeTransition, ProtectiveMode};
use crate::schedule::ScheduledTask;
use crate::window::SlidingWindowTracker;

const COMPONENT: &str = "anti-raid";

/// Level restored when the level before activation could not be read.
const FALLBACK_RESTORE_LEVEL: VerificationLevel = VerificationLevel::Medium;

/// Level applied when the current level could not be read.
const FALLBACK_RAISED_LEVEL: VerificationLevel = VerificationLevel::High;

/// Why a joiner looks suspicious. The first matching rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspicionReason {
    NewAccount,
    SuspiciousUsername,
    NoAvatar,
}

impl fmt::Display for SuspicionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SuspicionReason::NewAccount => "New account",
            SuspicionReason::SuspiciousUsername => "Suspicious username",
            SuspicionReason::NoAvatar => "No avatar",
        };
        f.write_str(s)
    }
}

impl SuspicionReason {
    /// Screen a joiner. Account age dominates username and avatar.
    pub fn assess(config: &RaidConfig, actor: &ActorSnapshot, now_ms: u64) -> Option<Self> {
        if actor.account_age_ms(now_ms) < config.min_account_age_ms {
            return Some(SuspicionReason::NewAccount);
        }
        let username = actor.username.to_lowercase();
        if config
            .username_denylist
            .iter()
            .any(|fragment| username.contains(fragment.as_str()))
        {
            return Some(SuspicionReason::SuspiciousUsername);
        }
        if !actor.has_avatar {
            return Some(SuspicionReason::NoAvatar);
        }
        None
    }
}

#[derive(Debug)]
struct GuildRaidState {
    mode: ProtectiveMode,
    /// Verification level before the current activation, if it could be read.
    prior_level: Option<VerificationLevel>,
    suspicious: HashMap<ActorId, SuspicionReason>,
}

impl GuildRaidState {
    fn new(protection_ms: u64) -> Self {
        Self {
            mode: ProtectiveMode::new(protection_ms),
            prior_level: None,
            suspicious: HashMap::new(),
        }
    }
}

/// What armed raid protection.
#[derive(Debug, Clone, Copy)]
enum Trigger {
    Burst { joins: usize },
    Manual,
}

/// Join-rate subscriber.
#[derive(Debug)]
pub struct RaidDetector {
    config: RaidConfig,
    joins: SlidingWindowTracker<GuildId>,
    guilds: HashMap<GuildId, GuildRaidState>,
}

impl RaidDetector {
    pub fn new(config: RaidConfig) -> Self {
        Self {
            config,
            joins: SlidingWindowTracker::new(),
            guilds: HashMap::new(),
        }
    }

    pub fn is_active(&self, guild: GuildId) -> bool {
        self.guilds.get(&guild).is_some_and(|s| s.mode.is_active())
    }

    /// Suspicion recorded for a current member, if any.
    pub fn suspicion(&self, guild: GuildId, actor: ActorId) -> Option<SuspicionReason> {
        self.guilds
            .get(&guild)
            .and_then(|s| s.suspicious.get(&actor).copied())
    }

    fn state(&mut self, guild: GuildId) -> &mut GuildRaidState {
        let protection_ms = self.config.protection_ms;
        self.guilds
            .entry(guild)
            .or_insert_with(|| GuildRaidState::new(protection_ms))
    }

    fn on_join(&mut self, event: &Event, ctx: &mut DispatchContext<'_>) {
        let guild = event.guild;
        let actor = &event.actor;

        let joins = self
            .joins
            .record_and_count(guild, ctx.now_ms, self.config.window_ms);
        ctx.logger
            .debug(COMPONENT, &format!("Guild {guild}: {joins} joins in window"));

        let reason = SuspicionReason::assess(&self.config, actor, ctx.now_ms);
        if let Some(reason) = reason {
            self.state(guild).suspicious.insert(actor.id, reason);
        }
        ctx.audit(COMPONENT, self.joined_record(ctx.now_ms, guild, actor, reason));

        if joins > self.config.join_limit {
            self.activate(guild, ctx, Trigger::Burst { joins });
        }

        if let Some(reason) = reason {
            if self.is_active(guild) {
                self.remove_suspicious(guild, actor, reason, ctx);
            }
        }
    }

    fn joined_record(
        &self,
        now_ms: u64,
        guild: GuildId,
        actor: &ActorSnapshot,
        reason: Option<SuspicionReason>,
    ) -> AuditRecord {
        let created = match Utc.timestamp_millis_opt(actor.created_at_ms as i64).single() {
            Some(dt) => dt.format("%Y-%m-%d").to_string(),
            None => "unknown".to_string(),
        };
        let severity = match reason {
            Some(_) => Severity::Warning,
            None => Severity::Info,
        };
        AuditRecord::new(guild, now_ms, AuditSource::AntiRaid, severity, "Member Joined")
            .with_field("User", format!("{} ({})", actor.username, actor.id))
            .with_field("Account Created", created)
            .with_field(
                "Suspicious",
                reason.map_or_else(|| "No".to_string(), |r| format!("Yes: {r}")),
            )
    }

    fn remove_suspicious(
        &mut self,
        guild: GuildId,
        actor: &ActorSnapshot,
        reason: SuspicionReason,
        ctx: &mut DispatchContext<'_>,
    ) {
        let timeout_reason = format!("Raid Protection: {reason}");
        let plan = EscalationPlan {
            kick_reason: "Raid Protection",
            timeout_ms: self.config.timeout_ms,
            timeout_reason: &timeout_reason,
        };
        let outcome = escalate_member(ctx.effector, guild, actor.id, &plan);

        let (title, severity) = match outcome {
            EscalationOutcome::Kicked => ("SUSPICIOUS USER KICKED", Severity::Warning),
            EscalationOutcome::TimedOut => ("SUSPICIOUS USER TIMED OUT", Severity::Warning),
            EscalationOutcome::DetectedOnly => {
                ("SUSPICIOUS USER DETECTED (No Permission)", Severity::Alert)
            }
        };
        ctx.audit(
            COMPONENT,
            AuditRecord::new(guild, ctx.now_ms, AuditSource::AntiRaid, severity, title)
                .with_field("User", format!("{} ({})", actor.username, actor.id))
                .with_field("Reason", reason.to_string())
                .with_field("Action", outcome.label()),
        );
        if outcome != EscalationOutcome::DetectedOnly {
            self.state(guild).suspicious.remove(&actor.id);
        }
        ctx.logger.verbose(
            COMPONENT,
            &format!("Guild {guild}: suspicious joiner {} {}", actor.id, outcome.label()),
        );
    }

    fn activate(
        &mut self,
        guild: GuildId,
        ctx: &mut DispatchContext<'_>,
        trigger: Trigger,
    ) -> ModeTransition {
        let now_ms = ctx.now_ms;
        let window_ms = self.config.window_ms;
        let protection_ms = self.config.protection_ms;
        let state = self.state(guild);

        let transition = state.mode.activate(now_ms);
        let ModeTransition::Activated {
            generation,
            expires_at_ms,
        } = transition
        else {
            return transition;
        };

        let prior = ctx.effector.verification_level(guild).ok();
        let raised = prior.map_or(FALLBACK_RAISED_LEVEL, VerificationLevel::raised);
        state.prior_level = prior;
        if let Err(e) = ctx.effector.set_verification_level(guild, raised) {
            ctx.logger
                .info(COMPONENT, &format!("Guild {guild}: could not raise verification: {e}"));
        }

        ctx.schedule(expires_at_ms, ScheduledTask::RaidExpiry { guild, generation });

        let trigger_text = match trigger {
            Trigger::Burst { joins } => {
                format!("Detected {joins} joins in {}", describe_duration(window_ms))
            }
            Trigger::Manual => "Manual activation".to_string(),
        };
        ctx.audit(
            COMPONENT,
            AuditRecord::new(
                guild,
                now_ms,
                AuditSource::AntiRaid,
                Severity::Alert,
                "RAID PROTECTION ACTIVATED",
            )
            .with_field("Trigger", trigger_text.as_str())
            .with_field("Verification Level", raised.to_string())
            .with_field("Duration", describe_duration(protection_ms)),
        );
        if let Trigger::Burst { .. } = trigger {
            ctx.audit(
                COMPONENT,
                AuditRecord::new(
                    guild,
                    now_ms,
                    AuditSource::AntiRaid,
                    Severity::Alert,
                    "RAID DETECTED",
                )
                .with_field("Details", trigger_text.as_str())
                .with_field("Action", "Raid protection enabled"),
            );
        }
        ctx.logger.info(
            COMPONENT,
            &format!("Guild {guild}: raid protection activated ({trigger_text})"),
        );
        transition
    }

    fn deactivate(
        &mut self,
        guild: GuildId,
        ctx: &mut DispatchContext<'_>,
        expiry: Option<u64>,
    ) -> ModeTransition {
        let now_ms = ctx.now_ms;
        let Some(state) = self.guilds.get_mut(&guild) else {
            return ModeTransition::AlreadyInactive;
        };

        let transition = match expiry {
            Some(generation) => state.mode.expire(generation),
            None => state.mode.deactivate(),
        };
        if transition != ModeTransition::Deactivated {
            ctx.logger.debug(
                COMPONENT,
                &format!("Guild {guild}: deactivation skipped ({transition:?})"),
            );
            return transition;
        }

        let restored = state.prior_level.take().unwrap_or(FALLBACK_RESTORE_LEVEL);
        if let Err(e) = ctx.effector.set_verification_level(guild, restored) {
            ctx.logger.info(
                COMPONENT,
                &format!("Guild {guild}: could not restore verification: {e}"),
            );
        }
        let cleared = state.suspicious.len();
        state.suspicious.clear();

        let reason = match expiry {
            Some(_) => "Automatic timeout",
            None => "Manual deactivation",
        };
        ctx.audit(
            COMPONENT,
            AuditRecord::new(
                guild,
                now_ms,
                AuditSource::AntiRaid,
                Severity::Info,
                "RAID PROTECTION DEACTIVATED",
            )
            .with_field("Reason", reason)
            .with_field("Verification Level", restored.to_string()),
        );
        ctx.logger.info(
            COMPONENT,
            &format!(
                "Guild {guild}: raid protection deactivated ({reason}, {cleared} suspicious cleared)"
            ),
        );
        transition
    }

    /// Arm protection on command. A no-op while already armed.
    pub fn activate_manual(
        &mut self,
        guild: GuildId,
        ctx: &mut DispatchContext<'_>,
    ) -> ModeTransition {
        self.activate(guild, ctx, Trigger::Manual)
    }

    /// Disarm protection on command. A no-op while already disarmed.
    pub fn deactivate_manual(
        &mut self,
        guild: GuildId,
        ctx: &mut DispatchContext<'_>,
    ) -> ModeTransition {
        self.deactivate(guild, ctx, None)
    }

    /// Forget recent joins and suspicion records without touching the mode.
    ///
    /// Returns whether joins were tracked and how many suspicion records went.
    pub fn clear(&mut self, guild: GuildId) -> (bool, usize) {
        let joins = self.joins.clear(&guild);
        let suspicious = self.guilds.get_mut(&guild).map_or(0, |s| {
            let n = s.suspicious.len();
            s.suspicious.clear();
            n
        });
        (joins, suspicious)
    }

    pub fn status(&mut self, guild: GuildId, now_ms: u64) -> RaidStatus {
        let recent_joins = self
            .joins
            .count_within(&guild, self.config.window_ms, now_ms);
        let state = self.guilds.get(&guild);
        RaidStatus {
            active: state.is_some_and(|s| s.mode.is_active()),
            expires_at_ms: state.and_then(|s| s.mode.expires_at_ms()),
            recent_joins,
            suspicious_members: state.map_or(0, |s| s.suspicious.len()),
        }
    }
}

impl EventSubscriber for RaidDetector {
    fn name(&self) -> &'static str {
        COMPONENT
    }

    fn on_event(&mut self, event: &Event, ctx: &mut DispatchContext<'_>) {
        match event.kind {
            EventKind::MemberJoined => self.on_join(event, ctx),
            EventKind::MemberLeft => {
                if let Some(state) = self.guilds.get_mut(&event.guild) {
                    state.suspicious.remove(&event.actor.id);
                }
            }
            _ => {}
        }
    }

    fn on_task(&mut self, task: &ScheduledTask, ctx: &mut DispatchContext<'_>) {
        if let ScheduledTask::RaidExpiry { guild, generation } = *task {
            self.deactivate(guild, ctx, Some(generation));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effector::{Capability, RecordingEffector};
    use crate::logger::MockLogger;
    use crate::schedule::Scheduler;
    use guildwatch_clock::{MS_PER_DAY, MS_PER_MIN, MS_PER_SEC};

    const GUILD: GuildId = GuildId(1);
    /// Far enough past the epoch that year-old accounts exist.
    const NOW: u64 = 400 * MS_PER_DAY;

    struct Harness {
        detector: RaidDetector,
        effector: RecordingEffector,
        logger: MockLogger,
        scheduler: Scheduler,
    }

    impl Harness {
        fn new(effector: RecordingEffector) -> Self {
            Self {
                detector: RaidDetector::new(RaidConfig::default()),
                effector,
                logger: MockLogger::new(),
                scheduler: Scheduler::new(),
            }
        }

        fn event(&mut self, event: Event) {
            let mut ctx = DispatchContext {
                now_ms: event.ts_ms,
                effector: &self.effector,
                logger: &self.logger,
                scheduler: &mut self.scheduler,
            };
            self.detector.on_event(&event, &mut ctx);
        }

        fn join(&mut self, actor: ActorSnapshot, ts_ms: u64) {
            self.event(Event::joined(GUILD, ts_ms, actor));
        }

        fn with_ctx<T>(&mut self, now_ms: u64, f: impl FnOnce(&mut RaidDetector, &mut DispatchContext<'_>) -> T) -> T {
            let mut ctx = DispatchContext {
                now_ms,
                effector: &self.effector,
                logger: &self.logger,
                scheduler: &mut self.scheduler,
            };
            f(&mut self.detector, &mut ctx)
        }

        fn advance_to(&mut self, now_ms: u64) {
            while let Some((due, task)) = self.scheduler.pop_due(now_ms) {
                self.with_ctx(due, |d, ctx| d.on_task(&task, ctx));
            }
        }
    }

    fn regular(id: u64) -> ActorSnapshot {
        ActorSnapshot::new(id, format!("regular{id}"), 0).with_avatar()
    }

    fn fresh(id: u64, ts_ms: u64) -> ActorSnapshot {
        ActorSnapshot::new(id, format!("fresh{id}"), ts_ms - MS_PER_DAY).with_avatar()
    }

    // ===========================================
    // Category A — Suspicion heuristic
    // ===========================================

    #[test]
    fn test_new_account_dominates() {
        let config = RaidConfig::default();
        let actor = ActorSnapshot::new(1, "spambot", NOW - MS_PER_DAY);
        assert_eq!(
            SuspicionReason::assess(&config, &actor, NOW),
            Some(SuspicionReason::NewAccount)
        );
    }

    #[test]
    fn test_denylisted_username() {
        let config = RaidConfig::default();
        let actor = ActorSnapshot::new(1, "FreeMember99", 0).with_avatar();
        assert_eq!(
            SuspicionReason::assess(&config, &actor, NOW),
            Some(SuspicionReason::SuspiciousUsername)
        );
    }

    #[test]
    fn test_missing_avatar() {
        let config = RaidConfig::default();
        let actor = ActorSnapshot::new(1, "alice", 0);
        assert_eq!(
            SuspicionReason::assess(&config, &actor, NOW),
            Some(SuspicionReason::NoAvatar)
        );
    }

    #[test]
    fn test_established_account_not_suspicious() {
        let config = RaidConfig::default();
        let actor = ActorSnapshot::new(1, "alice", 0).with_avatar();
        assert_eq!(SuspicionReason::assess(&config, &actor, NOW), None);
    }

    #[test]
    fn test_account_age_boundary() {
        let config = RaidConfig::default();
        let exactly_three_days = ActorSnapshot::new(1, "alice", NOW - 3 * MS_PER_DAY).with_avatar();
        assert_eq!(SuspicionReason::assess(&config, &exactly_three_days, NOW), None);
    }

    // ===========================================
    // Category B — Join burst
    // ===========================================

    #[test]
    fn test_burst_activates_once() {
        let mut h = Harness::new(RecordingEffector::new());
        for i in 0..20 {
            h.join(regular(i), NOW + i * 200);
        }

        assert!(h.detector.is_active(GUILD));
        assert_eq!(h.effector.audit_count("RAID PROTECTION ACTIVATED"), 1);
        assert_eq!(h.effector.audit_count("RAID DETECTED"), 1);
        assert_eq!(h.effector.level(GUILD), VerificationLevel::High);
        let activations = h
            .logger
            .messages_from(COMPONENT)
            .into_iter()
            .filter(|m| m.contains("raid protection activated"))
            .count();
        assert_eq!(activations, 1);
    }

    #[test]
    fn test_limit_joins_do_not_activate() {
        let mut h = Harness::new(RecordingEffector::new());
        for i in 0..13 {
            h.join(regular(i), NOW + i * 100);
        }
        assert!(!h.detector.is_active(GUILD));
        assert_eq!(h.effector.audit_count("Member Joined"), 13);
    }

    #[test]
    fn test_suspicious_joiner_removed_while_active() {
        let mut h = Harness::new(RecordingEffector::new());
        for i in 0..14 {
            h.join(regular(i), NOW + i * 300);
        }
        assert!(h.detector.is_active(GUILD));

        let late = NOW + 6 * MS_PER_SEC;
        let newcomer = fresh(100, late);
        h.join(newcomer.clone(), late);

        assert_eq!(h.effector.kicks_of(newcomer.id), 1);
        assert_eq!(h.effector.audit_count("SUSPICIOUS USER KICKED"), 1);
        assert_eq!(h.detector.suspicion(GUILD, newcomer.id), None);
    }

    #[test]
    fn test_suspicious_joiner_only_recorded_while_inactive() {
        let mut h = Harness::new(RecordingEffector::new());
        let newcomer = fresh(100, NOW);
        h.join(newcomer.clone(), NOW);

        assert_eq!(h.effector.kicks_of(newcomer.id), 0);
        assert_eq!(
            h.detector.suspicion(GUILD, newcomer.id),
            Some(SuspicionReason::NewAccount)
        );
        let joined = &h.effector.audits()[0];
        assert_eq!(joined.title, "Member Joined");
        assert_eq!(joined.field("Suspicious"), Some("Yes: New account"));
        assert_eq!(joined.field("Account Created"), Some("1971-02-04"));
    }

    #[test]
    fn test_unremovable_joiner_is_reported() {
        let effector = RecordingEffector::new()
            .denying(Capability::Kick)
            .denying(Capability::Timeout);
        let mut h = Harness::new(effector);
        h.with_ctx(NOW, |d, ctx| d.activate_manual(GUILD, ctx));

        let newcomer = fresh(100, NOW);
        h.join(newcomer.clone(), NOW);

        assert_eq!(
            h.effector.audit_count("SUSPICIOUS USER DETECTED (No Permission)"),
            1
        );
        assert!(h.detector.suspicion(GUILD, newcomer.id).is_some());
    }

    #[test]
    fn test_departure_removes_suspicion() {
        let mut h = Harness::new(RecordingEffector::new());
        let newcomer = fresh(100, NOW);
        h.join(newcomer.clone(), NOW);
        h.event(Event::left(GUILD, NOW + 1, newcomer.clone()));
        assert_eq!(h.detector.suspicion(GUILD, newcomer.id), None);
    }

    // ===========================================
    // Category C — Protective mode
    // ===========================================

    #[test]
    fn test_expiry_restores_prior_level() {
        let effector = RecordingEffector::new();
        effector.set_level(GUILD, VerificationLevel::Low);
        let mut h = Harness::new(effector);
        for i in 0..14 {
            h.join(regular(i), NOW + i * 100);
        }
        assert_eq!(h.effector.level(GUILD), VerificationLevel::Medium);

        h.advance_to(NOW + 1_300 + 30 * MS_PER_MIN);
        assert!(!h.detector.is_active(GUILD));
        assert_eq!(h.effector.level(GUILD), VerificationLevel::Low);

        let records = h.effector.audits();
        let deactivated = records
            .iter()
            .find(|r| r.title == "RAID PROTECTION DEACTIVATED")
            .expect("deactivation record");
        assert_eq!(deactivated.field("Reason"), Some("Automatic timeout"));
    }

    #[test]
    fn test_manual_cycle_is_idempotent() {
        let mut h = Harness::new(RecordingEffector::new());

        assert!(h.with_ctx(NOW, |d, ctx| d.activate_manual(GUILD, ctx)).changed());
        assert_eq!(
            h.with_ctx(NOW + 1, |d, ctx| d.activate_manual(GUILD, ctx)),
            ModeTransition::AlreadyActive
        );
        assert_eq!(h.effector.audit_count("RAID PROTECTION ACTIVATED"), 1);
        // manual activation posts no burst alert
        assert_eq!(h.effector.audit_count("RAID DETECTED"), 0);

        assert!(h.with_ctx(NOW + 2, |d, ctx| d.deactivate_manual(GUILD, ctx)).changed());
        assert_eq!(
            h.with_ctx(NOW + 3, |d, ctx| d.deactivate_manual(GUILD, ctx)),
            ModeTransition::AlreadyInactive
        );
        assert_eq!(h.effector.audit_count("RAID PROTECTION DEACTIVATED"), 1);
    }

    #[test]
    fn test_deactivate_never_activated_guild() {
        let mut h = Harness::new(RecordingEffector::new());
        assert_eq!(
            h.with_ctx(NOW, |d, ctx| d.deactivate_manual(GuildId(9), ctx)),
            ModeTransition::AlreadyInactive
        );
        assert!(h.effector.audits().is_empty());
    }

    #[test]
    fn test_stale_expiry_after_manual_cycle() {
        let mut h = Harness::new(RecordingEffector::new());
        h.with_ctx(NOW, |d, ctx| d.activate_manual(GUILD, ctx));
        h.with_ctx(NOW + 1, |d, ctx| d.deactivate_manual(GUILD, ctx));
        h.with_ctx(NOW + 10 * MS_PER_MIN, |d, ctx| d.activate_manual(GUILD, ctx));

        // first timer fires while the second activation is running
        h.advance_to(NOW + 30 * MS_PER_MIN);
        assert!(h.detector.is_active(GUILD));

        h.advance_to(NOW + 40 * MS_PER_MIN);
        assert!(!h.detector.is_active(GUILD));
        assert_eq!(h.effector.audit_count("RAID PROTECTION DEACTIVATED"), 2);
    }

    #[test]
    fn test_deactivation_clears_suspicion() {
        let effector = RecordingEffector::new();
        let mut h = Harness::new(effector);
        let newcomer = fresh(100, NOW);
        h.join(newcomer.clone(), NOW);
        h.with_ctx(NOW, |d, ctx| d.activate_manual(GUILD, ctx));
        h.with_ctx(NOW + 1, |d, ctx| d.deactivate_manual(GUILD, ctx));
        assert_eq!(h.detector.status(GUILD, NOW + 1).suspicious_members, 0);
    }

    #[test]
    fn test_refused_verification_change_keeps_mode() {
        let effector = RecordingEffector::new().denying(Capability::SetVerification);
        let mut h = Harness::new(effector);
        h.with_ctx(NOW, |d, ctx| d.activate_manual(GUILD, ctx));

        // the change was refused but the mode is still armed and reported
        assert!(h.detector.is_active(GUILD));
        assert_eq!(h.effector.level(GUILD), VerificationLevel::Medium);
        assert!(h.logger.contains("could not raise verification"));
    }

    #[test]
    fn test_clear_keeps_mode() {
        let mut h = Harness::new(RecordingEffector::new());
        for i in 0..14 {
            h.join(ActorSnapshot::new(i, format!("u{i}"), 0), NOW + i);
        }
        assert!(h.detector.is_active(GUILD));

        let (joins, suspicious) = h.detector.clear(GUILD);
        assert!(joins);
        // the joiner that tripped the burst was kicked, the rest stay recorded
        assert_eq!(suspicious, 13);
        assert!(h.detector.is_active(GUILD));
        assert_eq!(h.detector.status(GUILD, NOW + 20).recent_joins, 0);
    }
}
