//! Privileged-action guard ("anti-nuke").
//!
//! Every tracked action kind counts toward one shared per-actor window.
//! Crossing the limit contains the actor (dangerous roles stripped, short
//! timeout) and arms guild-wide protection mode. Trusted actors are never
//! tracked. Actions below the limit still leave a passive record.

use std::collections::HashMap;

use guildwatch_schema::{
    ActorId, ActorSnapshot, AuditRecord, AuditSource, Event, EventKind, GuildId, Permission,
    PrivilegedAction, Severity,
};

use crate::config::NukeConfig;
use crate::effector::EffectError;
use crate::engine::{describe_duration, DispatchContext, EventSubscriber, NukeStatus};
use crate::protective::{ModeTransition, ProtectiveMode};
use crate::schedule::ScheduledTask;
use crate::trust::TrustRegistry;
use crate::window::SlidingWindowTracker;

const COMPONENT: &str = "anti-nuke";

const CONTAINMENT_REASON: &str = "Anti-Nuke: mass destructive actions";

/// Destructive-action subscriber.
#[derive(Debug)]
pub struct PrivilegedActionGuard {
    config: NukeConfig,
    trust: TrustRegistry,
    actions: SlidingWindowTracker<(GuildId, ActorId)>,
    modes: HashMap<GuildId, ProtectiveMode>,
}

impl PrivilegedActionGuard {
    pub fn new(config: NukeConfig) -> Self {
        Self {
            config,
            trust: TrustRegistry::new(),
            actions: SlidingWindowTracker::new(),
            modes: HashMap::new(),
        }
    }

    /// Returns `false` if already trusted.
    pub fn trust(&mut self, actor: ActorId) -> bool {
        self.trust.trust(actor)
    }

    /// Returns `false` if not trusted. Tracking restarts from zero.
    pub fn untrust(&mut self, actor: ActorId) -> bool {
        self.trust.untrust(actor)
    }

    pub fn is_trusted(&self, actor: ActorId) -> bool {
        self.trust.is_trusted(actor)
    }

    pub fn trusted(&self) -> Vec<ActorId> {
        self.trust.sorted()
    }

    pub fn is_active(&self, guild: GuildId) -> bool {
        self.modes.get(&guild).is_some_and(ProtectiveMode::is_active)
    }

    fn on_action(
        &mut self,
        event: &Event,
        action: PrivilegedAction,
        target: Option<&str>,
        ctx: &mut DispatchContext<'_>,
    ) {
        let guild = event.guild;
        let Some(executor) = ctx.effector.attribute_executor(event) else {
            ctx.logger.debug(
                COMPONENT,
                &format!("Guild {guild}: no executor for {}, dropped", action.label()),
            );
            return;
        };

        if self.trust.is_trusted(executor.id) {
            ctx.logger.debug(
                COMPONENT,
                &format!("{} is trusted, {} not tracked", executor.id, action.label()),
            );
            ctx.audit(COMPONENT, passive_record(ctx.now_ms, guild, &executor, action, target));
            return;
        }

        let count = self.actions.record_and_count(
            (guild, executor.id),
            ctx.now_ms,
            self.config.window_ms,
        );
        ctx.logger.debug(
            COMPONENT,
            &format!("{} has {} privileged actions in window", executor.id, count),
        );

        if count > self.config.action_limit {
            self.contain(guild, &executor, action, count, ctx);
        } else {
            ctx.audit(COMPONENT, passive_record(ctx.now_ms, guild, &executor, action, target));
        }
    }

    fn contain(
        &mut self,
        guild: GuildId,
        executor: &ActorSnapshot,
        action: PrivilegedAction,
        count: usize,
        ctx: &mut DispatchContext<'_>,
    ) {
        let dangerous = executor.roles_granting(&Permission::DANGEROUS);
        let removal = if dangerous.is_empty() {
            Ok(())
        } else {
            ctx.effector
                .remove_roles(guild, executor.id, &dangerous, CONTAINMENT_REASON)
        };
        // the timeout is attempted even when role removal failed
        let timeout = ctx.effector.timeout_actor(
            guild,
            executor.id,
            self.config.timeout_ms,
            CONTAINMENT_REASON,
        );

        let user = format!("{} ({})", executor.username, executor.id);
        let detail = format!(
            "{}: {count} actions in {}",
            action.burst_description(),
            describe_duration(self.config.window_ms)
        );
        let record = match first_error(removal, timeout) {
            None => {
                ctx.logger.info(
                    COMPONENT,
                    &format!("Guild {guild}: contained {} ({detail})", executor.id),
                );
                AuditRecord::new(
                    guild,
                    ctx.now_ms,
                    AuditSource::AntiNuke,
                    Severity::Alert,
                    "NUKE ATTEMPT BLOCKED",
                )
                .with_field("User", user)
                .with_field("Action", detail)
                .with_field("Roles Removed", dangerous.len().to_string())
                .with_field("Timeout", describe_duration(self.config.timeout_ms))
            }
            Some(e) => {
                ctx.logger.info(
                    COMPONENT,
                    &format!("Guild {guild}: could not contain {}: {e}", executor.id),
                );
                AuditRecord::new(
                    guild,
                    ctx.now_ms,
                    AuditSource::AntiNuke,
                    Severity::Alert,
                    "NUKE ATTEMPT DETECTED (No Perm)",
                )
                .with_field("User", user)
                .with_field("Action", detail)
                .with_field("Error", e.to_string())
            }
        };
        ctx.audit(COMPONENT, record);

        self.actions.clear(&(guild, executor.id));
        self.activate(guild, executor, action, ctx);
    }

    fn activate(
        &mut self,
        guild: GuildId,
        executor: &ActorSnapshot,
        action: PrivilegedAction,
        ctx: &mut DispatchContext<'_>,
    ) {
        let protection_ms = self.config.protection_ms;
        let mode = self
            .modes
            .entry(guild)
            .or_insert_with(|| ProtectiveMode::new(protection_ms));

        let ModeTransition::Activated {
            generation,
            expires_at_ms,
        } = mode.activate(ctx.now_ms)
        else {
            ctx.logger.debug(
                COMPONENT,
                &format!("Guild {guild}: protection mode already active"),
            );
            return;
        };
        ctx.schedule(expires_at_ms, ScheduledTask::NukeExpiry { guild, generation });

        ctx.audit(
            COMPONENT,
            AuditRecord::new(
                guild,
                ctx.now_ms,
                AuditSource::AntiNuke,
                Severity::Alert,
                "PROTECTION MODE ACTIVATED",
            )
            .with_field("Duration", describe_duration(protection_ms)),
        );
        ctx.audit(
            COMPONENT,
            AuditRecord::new(
                guild,
                ctx.now_ms,
                AuditSource::AntiNuke,
                Severity::Alert,
                "NUKE ATTEMPT DETECTED",
            )
            .with_field("User", format!("{} ({})", executor.username, executor.id))
            .with_field("Action", action.burst_description()),
        );
        ctx.logger.info(
            COMPONENT,
            &format!("Guild {guild}: protection mode activated"),
        );
    }

    fn deactivate(
        &mut self,
        guild: GuildId,
        ctx: &mut DispatchContext<'_>,
        expiry: Option<u64>,
    ) -> ModeTransition {
        let Some(mode) = self.modes.get_mut(&guild) else {
            return ModeTransition::AlreadyInactive;
        };
        let transition = match expiry {
            Some(generation) => mode.expire(generation),
            None => mode.deactivate(),
        };
        if transition != ModeTransition::Deactivated {
            ctx.logger.debug(
                COMPONENT,
                &format!("Guild {guild}: deactivation skipped ({transition:?})"),
            );
            return transition;
        }

        let reason = match expiry {
            Some(_) => "Automatic timeout",
            None => "Manual deactivation",
        };
        ctx.audit(
            COMPONENT,
            AuditRecord::new(
                guild,
                ctx.now_ms,
                AuditSource::AntiNuke,
                Severity::Info,
                "PROTECTION MODE DEACTIVATED",
            )
            .with_field("Reason", reason),
        );
        ctx.logger.info(
            COMPONENT,
            &format!("Guild {guild}: protection mode deactivated ({reason})"),
        );
        transition
    }

    /// Disarm protection mode on command. A no-op while already disarmed.
    pub fn deactivate_manual(
        &mut self,
        guild: GuildId,
        ctx: &mut DispatchContext<'_>,
    ) -> ModeTransition {
        self.deactivate(guild, ctx, None)
    }

    /// Forget action tracking for `guild`. Returns how many actors were tracked.
    pub fn clear(&mut self, guild: GuildId) -> usize {
        self.actions.clear_where(|(g, _)| *g == guild)
    }

    /// Snapshot for `guild` as of `now_ms`. Actors with no action inside the
    /// window are not counted.
    pub fn status(&mut self, guild: GuildId, now_ms: u64) -> NukeStatus {
        let mode = self.modes.get(&guild);
        NukeStatus {
            active: mode.is_some_and(ProtectiveMode::is_active),
            expires_at_ms: mode.and_then(ProtectiveMode::expires_at_ms),
            trusted_actors: self.trust.len(),
            tracked_actors: self
                .actions
                .live_where(self.config.window_ms, now_ms, |(g, _)| *g == guild),
        }
    }
}

fn first_error(
    removal: Result<(), EffectError>,
    timeout: Result<(), EffectError>,
) -> Option<EffectError> {
    removal.err().or(timeout.err())
}

fn passive_record(
    now_ms: u64,
    guild: GuildId,
    executor: &ActorSnapshot,
    action: PrivilegedAction,
    target: Option<&str>,
) -> AuditRecord {
    let record = AuditRecord::new(
        guild,
        now_ms,
        AuditSource::AntiNuke,
        Severity::Info,
        action.passive_title(),
    )
    .with_field("Executor", format!("{} ({})", executor.username, executor.id))
    .with_field("Action", action.label());
    match target {
        Some(target) => record.with_field("Target", target),
        None => record,
    }
}

impl EventSubscriber for PrivilegedActionGuard {
    fn name(&self) -> &'static str {
        COMPONENT
    }

    fn on_event(&mut self, event: &Event, ctx: &mut DispatchContext<'_>) {
        match &event.kind {
            EventKind::ActionPerformed { action, target } => {
                self.on_action(event, *action, target.as_deref(), ctx);
            }
            EventKind::MemberLeft => {
                if self.actions.clear(&(event.guild, event.actor.id)) {
                    ctx.logger.debug(
                        COMPONENT,
                        &format!("{} left, action tracking cleared", event.actor.id),
                    );
                }
            }
            _ => {}
        }
    }

    fn on_task(&mut self, task: &ScheduledTask, ctx: &mut DispatchContext<'_>) {
        if let ScheduledTask::NukeExpiry { guild, generation } = *task {
            self.deactivate(guild, ctx, Some(generation));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effector::{Capability, EffectCall, RecordingEffector};
    use crate::logger::MockLogger;
    use crate::schedule::Scheduler;
    use guildwatch_clock::{MS_PER_MIN, MS_PER_SEC};
    use guildwatch_schema::{RoleId, RoleSnapshot};

    const GUILD: GuildId = GuildId(1);

    struct Harness {
        guard: PrivilegedActionGuard,
        effector: RecordingEffector,
        logger: MockLogger,
        scheduler: Scheduler,
    }

    impl Harness {
        fn new(effector: RecordingEffector) -> Self {
            Self {
                guard: PrivilegedActionGuard::new(NukeConfig::default()),
                effector,
                logger: MockLogger::new(),
                scheduler: Scheduler::new(),
            }
        }

        fn act(&mut self, actor: &ActorSnapshot, action: PrivilegedAction, ts_ms: u64) {
            self.event(Event::action(GUILD, ts_ms, actor.clone(), action, Some(format!("#c{ts_ms}"))));
        }

        fn event(&mut self, event: Event) {
            let mut ctx = DispatchContext {
                now_ms: event.ts_ms,
                effector: &self.effector,
                logger: &self.logger,
                scheduler: &mut self.scheduler,
            };
            self.guard.on_event(&event, &mut ctx);
        }

        fn advance_to(&mut self, now_ms: u64) {
            while let Some((due, task)) = self.scheduler.pop_due(now_ms) {
                let mut ctx = DispatchContext {
                    now_ms: due,
                    effector: &self.effector,
                    logger: &self.logger,
                    scheduler: &mut self.scheduler,
                };
                self.guard.on_task(&task, &mut ctx);
            }
        }

        fn deactivate(&mut self, now_ms: u64) -> ModeTransition {
            let mut ctx = DispatchContext {
                now_ms,
                effector: &self.effector,
                logger: &self.logger,
                scheduler: &mut self.scheduler,
            };
            self.guard.deactivate_manual(GUILD, &mut ctx)
        }
    }

    fn admin() -> ActorSnapshot {
        ActorSnapshot::new(7, "rogue", 0)
            .with_role(RoleSnapshot::new(70, "Admin", &[Permission::Administrator]))
            .with_role(RoleSnapshot::new(71, "Colour", &[]))
            .with_role(RoleSnapshot::new(72, "Mods", &[Permission::ManageChannels]))
    }

    // ===========================================
    // Category A — Threshold
    // ===========================================

    #[test]
    fn test_containment_on_ninth_action() {
        let mut h = Harness::new(RecordingEffector::new());
        let actor = ActorSnapshot::new(7, "rogue", 0);

        for i in 0..8 {
            h.act(&actor, PrivilegedAction::ChannelDelete, i * 500);
        }
        assert_eq!(h.effector.timeouts_of(actor.id), 0);
        assert_eq!(h.effector.audit_count("CHANNEL DELETED"), 8);

        h.act(&actor, PrivilegedAction::ChannelDelete, 4_000);
        assert_eq!(h.effector.timeouts_of(actor.id), 1);
        assert_eq!(h.effector.audit_count("NUKE ATTEMPT BLOCKED"), 1);
        assert_eq!(h.effector.audit_count("CHANNEL DELETED"), 8);
        assert!(h.guard.is_active(GUILD));
    }

    #[test]
    fn test_action_kinds_share_one_window() {
        let mut h = Harness::new(RecordingEffector::new());
        let actor = ActorSnapshot::new(7, "rogue", 0);
        for (i, action) in PrivilegedAction::ALL.iter().enumerate() {
            h.act(&actor, *action, i as u64 * 100);
        }
        assert_eq!(h.effector.timeouts_of(actor.id), 0);

        h.act(&actor, PrivilegedAction::RoleCreate, 900);
        assert_eq!(h.effector.timeouts_of(actor.id), 1);
    }

    #[test]
    fn test_spread_out_actions_never_trigger() {
        let mut h = Harness::new(RecordingEffector::new());
        let actor = ActorSnapshot::new(7, "rogue", 0);
        for i in 0..50 {
            h.act(&actor, PrivilegedAction::MemberBan, i * 2 * MS_PER_SEC);
        }
        assert_eq!(h.effector.timeouts_of(actor.id), 0);
        assert!(!h.guard.is_active(GUILD));
    }

    // ===========================================
    // Category B — Containment
    // ===========================================

    #[test]
    fn test_strips_only_dangerous_roles() {
        let mut h = Harness::new(RecordingEffector::new());
        let actor = admin();
        for i in 0..9 {
            h.act(&actor, PrivilegedAction::RoleDelete, i * 100);
        }

        assert!(h.effector.successful_calls().contains(&EffectCall::RemoveRoles {
            guild: GUILD,
            actor: actor.id,
            roles: vec![RoleId(70), RoleId(72)],
        }));
        let blocked = h
            .effector
            .audits()
            .into_iter()
            .find(|r| r.title == "NUKE ATTEMPT BLOCKED")
            .expect("blocked record");
        assert_eq!(blocked.field("Roles Removed"), Some("2"));
        assert_eq!(blocked.field("Action"), Some("Mass Role Deletion: 9 actions in 10s"));
    }

    #[test]
    fn test_outranking_actor_detected_not_contained() {
        let effector = RecordingEffector::new()
            .denying(Capability::RemoveRoles)
            .denying(Capability::Timeout);
        let mut h = Harness::new(effector);
        let actor = admin();
        for i in 0..9 {
            h.act(&actor, PrivilegedAction::ChannelDelete, i * 100);
        }

        assert_eq!(h.effector.audit_count("NUKE ATTEMPT DETECTED (No Perm)"), 1);
        assert_eq!(h.effector.audit_count("NUKE ATTEMPT BLOCKED"), 0);
        // protection mode is armed either way
        assert!(h.guard.is_active(GUILD));
        assert_eq!(h.effector.audit_count("PROTECTION MODE ACTIVATED"), 1);
    }

    #[test]
    fn test_failed_role_removal_still_attempts_timeout() {
        let mut h = Harness::new(RecordingEffector::new().denying(Capability::RemoveRoles));
        let actor = admin();
        for i in 0..9 {
            h.act(&actor, PrivilegedAction::ChannelDelete, i * 100);
        }
        assert_eq!(h.effector.timeouts_of(actor.id), 1);
        assert_eq!(h.effector.audit_count("NUKE ATTEMPT DETECTED (No Perm)"), 1);
    }

    #[test]
    fn test_second_burst_does_not_reactivate() {
        let mut h = Harness::new(RecordingEffector::new());
        let actor = ActorSnapshot::new(7, "rogue", 0);
        for i in 0..18 {
            h.act(&actor, PrivilegedAction::ChannelDelete, i * 100);
        }
        assert_eq!(h.effector.audit_count("NUKE ATTEMPT BLOCKED"), 2);
        assert_eq!(h.effector.audit_count("PROTECTION MODE ACTIVATED"), 1);
    }

    #[test]
    fn test_unattributed_actions_dropped() {
        let effector = RecordingEffector::new();
        effector.hide_executors();
        let mut h = Harness::new(effector);
        let actor = ActorSnapshot::new(7, "rogue", 0);
        for i in 0..20 {
            h.act(&actor, PrivilegedAction::ChannelDelete, i * 100);
        }
        assert!(h.effector.audits().is_empty());
        assert!(h.logger.contains("no executor"));
    }

    // ===========================================
    // Category C — Trust
    // ===========================================

    #[test]
    fn test_trusted_actor_never_contained() {
        let mut h = Harness::new(RecordingEffector::new());
        let actor = admin();
        h.guard.trust(actor.id);

        for i in 0..100 {
            h.act(&actor, PrivilegedAction::ChannelDelete, i * 10);
        }
        assert!(h.effector.attempts().is_empty());
        assert!(!h.guard.is_active(GUILD));
        assert_eq!(h.guard.status(GUILD, 1_000).tracked_actors, 0);
        // still visible to operators
        assert_eq!(h.effector.audit_count("CHANNEL DELETED"), 100);
    }

    #[test]
    fn test_untrusted_actor_starts_from_zero() {
        let mut h = Harness::new(RecordingEffector::new());
        let actor = ActorSnapshot::new(7, "rogue", 0);
        h.guard.trust(actor.id);
        for i in 0..8 {
            h.act(&actor, PrivilegedAction::ChannelDelete, i * 10);
        }
        h.guard.untrust(actor.id);
        h.act(&actor, PrivilegedAction::ChannelDelete, 100);
        assert_eq!(h.effector.timeouts_of(actor.id), 0);
    }

    // ===========================================
    // Category D — Protection mode
    // ===========================================

    #[test]
    fn test_protection_expires_after_an_hour() {
        let mut h = Harness::new(RecordingEffector::new());
        let actor = ActorSnapshot::new(7, "rogue", 0);
        for i in 0..9 {
            h.act(&actor, PrivilegedAction::ChannelDelete, i * 100);
        }

        h.advance_to(800 + 60 * MS_PER_MIN - 1);
        assert!(h.guard.is_active(GUILD));
        h.advance_to(800 + 60 * MS_PER_MIN);
        assert!(!h.guard.is_active(GUILD));
        assert_eq!(h.effector.audit_count("PROTECTION MODE DEACTIVATED"), 1);
    }

    #[test]
    fn test_manual_deactivation_idempotent() {
        let mut h = Harness::new(RecordingEffector::new());
        assert_eq!(h.deactivate(0), ModeTransition::AlreadyInactive);

        let actor = ActorSnapshot::new(7, "rogue", 0);
        for i in 0..9 {
            h.act(&actor, PrivilegedAction::ChannelDelete, i * 100);
        }
        assert_eq!(h.deactivate(1_000), ModeTransition::Deactivated);
        assert_eq!(h.deactivate(1_001), ModeTransition::AlreadyInactive);

        // the pending expiry is now stale
        h.advance_to(2 * 60 * MS_PER_MIN);
        assert_eq!(h.effector.audit_count("PROTECTION MODE DEACTIVATED"), 1);
    }

    #[test]
    fn test_clear_forgets_tracking() {
        let mut h = Harness::new(RecordingEffector::new());
        let actor = ActorSnapshot::new(7, "rogue", 0);
        for i in 0..8 {
            h.act(&actor, PrivilegedAction::ChannelDelete, i * 10);
        }
        assert_eq!(h.guard.clear(GUILD), 1);
        h.act(&actor, PrivilegedAction::ChannelDelete, 100);
        assert_eq!(h.effector.timeouts_of(actor.id), 0);
    }

    // ===========================================
    // Category E — Tracking lifetime
    // ===========================================

    #[test]
    fn test_departure_clears_tracking() {
        let mut h = Harness::new(RecordingEffector::new());
        let actors: Vec<ActorSnapshot> = (1..=3).map(|id| ActorSnapshot::new(id, "mod", 0)).collect();
        for (i, actor) in actors.iter().enumerate() {
            h.act(actor, PrivilegedAction::RoleDelete, i as u64 * 10);
        }
        assert_eq!(h.guard.status(GUILD, 100).tracked_actors, 3);

        for actor in &actors {
            h.event(Event::left(GUILD, 200, actor.clone()));
        }
        assert_eq!(h.guard.status(GUILD, 200).tracked_actors, 0);
        assert!(h.logger.contains("action tracking cleared"));
    }

    #[test]
    fn test_rejoin_starts_fresh_window() {
        let mut h = Harness::new(RecordingEffector::new());
        let actor = ActorSnapshot::new(7, "rogue", 0);
        for i in 0..8 {
            h.act(&actor, PrivilegedAction::ChannelDelete, i * 10);
        }
        h.event(Event::left(GUILD, 100, actor.clone()));

        // eight earlier actions no longer count toward the limit
        h.act(&actor, PrivilegedAction::ChannelDelete, 200);
        assert_eq!(h.effector.timeouts_of(actor.id), 0);
        assert!(!h.guard.is_active(GUILD));
    }

    #[test]
    fn test_status_skips_stale_actors() {
        let mut h = Harness::new(RecordingEffector::new());
        h.act(&ActorSnapshot::new(1, "early", 0), PrivilegedAction::WebhookCreate, 0);
        h.act(&ActorSnapshot::new(2, "late", 0), PrivilegedAction::WebhookCreate, 9_000);

        assert_eq!(h.guard.status(GUILD, 9_000).tracked_actors, 2);
        assert_eq!(h.guard.status(GUILD, 10 * MS_PER_SEC + 1).tracked_actors, 1);
    }
}
