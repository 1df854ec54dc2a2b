//! Per-actor message rate detection with a warn-then-punish escalation.
//!
//! ```text
//! unwarned --over limit--> warned(deadline) --over limit again------> punished
//!                                           --deadline, still over--> punished
//!                                           --deadline, calmed down-> unwarned
//! ```
//!
//! Punishment clears all tracking for the actor. Leaving the guild clears
//! both the window and the warning.

use std::collections::HashMap;

use guildwatch_schema::{
    ActorId, ActorSnapshot, AuditRecord, AuditSource, ChannelId, Event, EventKind, GuildId,
    Permission, Severity,
};

use crate::config::SpamConfig;
use crate::engine::{describe_duration, DispatchContext, EventSubscriber, SpamStatus};
use crate::escalation::{escalate_member, EscalationOutcome, EscalationPlan};
use crate::schedule::ScheduledTask;
use crate::window::SlidingWindowTracker;

const COMPONENT: &str = "anti-spam";

type Key = (GuildId, ActorId);

#[derive(Debug, Clone)]
struct Warning {
    deadline_ms: u64,
    /// Kept for audit records written by the re-check.
    username: String,
}

/// Message-rate subscriber.
#[derive(Debug)]
pub struct SpamDetector {
    config: SpamConfig,
    messages: SlidingWindowTracker<Key>,
    warned: HashMap<Key, Warning>,
}

impl SpamDetector {
    pub fn new(config: SpamConfig) -> Self {
        Self {
            config,
            messages: SlidingWindowTracker::new(),
            warned: HashMap::new(),
        }
    }

    /// Moderators and automated accounts are never rate-tracked.
    fn is_exempt(actor: &ActorSnapshot) -> bool {
        actor.bot || actor.has_permission(Permission::ManageMessages)
    }

    pub fn is_warned(&self, guild: GuildId, actor: ActorId) -> bool {
        self.warned.contains_key(&(guild, actor))
    }

    fn on_message(&mut self, event: &Event, channel: ChannelId, ctx: &mut DispatchContext<'_>) {
        let actor = &event.actor;
        if Self::is_exempt(actor) {
            return;
        }

        let key = (event.guild, actor.id);
        let count = self
            .messages
            .record_and_count(key, ctx.now_ms, self.config.window_ms);
        ctx.logger.debug(
            COMPONENT,
            &format!("{} has {} messages in window", actor.id, count),
        );

        if count <= self.config.message_limit {
            return;
        }

        if self.warned.contains_key(&key) {
            self.punish(
                ctx,
                event.guild,
                actor.id,
                &actor.username,
                count,
                "Continued spamming after warning",
            );
        } else {
            self.warn(ctx, event.guild, actor, channel, count);
        }
    }

    fn warn(
        &mut self,
        ctx: &mut DispatchContext<'_>,
        guild: GuildId,
        actor: &ActorSnapshot,
        channel: ChannelId,
        count: usize,
    ) {
        let window = describe_duration(self.config.window_ms);
        let grace = describe_duration(self.config.grace_ms);

        let private = format!(
            "You are sending messages too fast ({count} in {window}). \
             Slow down within {grace} or you will be removed."
        );
        if let Err(e) = ctx.effector.send_direct_warning(actor.id, &private) {
            ctx.logger
                .debug(COMPONENT, &format!("Could not warn {} privately: {}", actor.id, e));
        }

        let public = format!("<@{}> please stop spamming.", actor.id);
        match ctx.effector.post_notice(guild, channel, &public) {
            Ok(notice) => ctx.schedule(
                ctx.now_ms + self.config.notice_ttl_ms,
                ScheduledTask::DeleteNotice { guild, notice },
            ),
            Err(e) => ctx
                .logger
                .debug(COMPONENT, &format!("Could not post notice: {e}")),
        }

        ctx.audit(
            COMPONENT,
            self.record(ctx.now_ms, guild, actor.id, &actor.username, "WARNING", Severity::Warning)
                .with_field("Message Count", format!("{count} in {window}"))
                .with_field(
                    "Reason",
                    format!("Exceeded {} messages", self.config.message_limit),
                ),
        );

        let deadline_ms = ctx.now_ms + self.config.grace_ms;
        self.warned.insert(
            (guild, actor.id),
            Warning {
                deadline_ms,
                username: actor.username.clone(),
            },
        );
        ctx.schedule(
            deadline_ms,
            ScheduledTask::SpamGraceRecheck {
                guild,
                actor: actor.id,
                deadline_ms,
            },
        );
        ctx.logger.verbose(
            COMPONENT,
            &format!("Warned {} ({count} messages), re-check at {deadline_ms}", actor.id),
        );
    }

    fn recheck(
        &mut self,
        ctx: &mut DispatchContext<'_>,
        guild: GuildId,
        actor: ActorId,
        deadline_ms: u64,
    ) {
        let key = (guild, actor);
        let Some(warning) = self.warned.get(&key) else {
            ctx.logger
                .debug(COMPONENT, &format!("Re-check for {actor}: no longer warned"));
            return;
        };
        if warning.deadline_ms != deadline_ms {
            ctx.logger
                .debug(COMPONENT, &format!("Re-check for {actor}: stale deadline"));
            return;
        }

        let count = self
            .messages
            .count_within(&key, self.config.window_ms, ctx.now_ms);
        if count > self.config.message_limit {
            let username = warning.username.clone();
            self.punish(ctx, guild, actor, &username, count, "Still spamming after grace period");
        } else {
            self.warned.remove(&key);
            ctx.logger
                .verbose(COMPONENT, &format!("{actor} calmed down ({count} messages)"));
        }
    }

    fn punish(
        &mut self,
        ctx: &mut DispatchContext<'_>,
        guild: GuildId,
        actor: ActorId,
        username: &str,
        count: usize,
        reason: &str,
    ) {
        let timeout_reason = format!("Spam: {reason}");
        let plan = EscalationPlan {
            kick_reason: "Spam",
            timeout_ms: self.config.timeout_ms,
            timeout_reason: &timeout_reason,
        };
        let outcome = escalate_member(ctx.effector, guild, actor, &plan);

        let severity = match outcome {
            EscalationOutcome::DetectedOnly => Severity::Alert,
            _ => Severity::Warning,
        };
        ctx.audit(
            COMPONENT,
            self.record(ctx.now_ms, guild, actor, username, outcome.label(), severity)
                .with_field(
                    "Message Count",
                    format!("{count} in {}", describe_duration(self.config.window_ms)),
                )
                .with_field("Reason", reason),
        );

        let key = (guild, actor);
        self.messages.clear(&key);
        self.warned.remove(&key);

        let message = format!("{actor}: {} ({reason})", outcome.label());
        match outcome {
            EscalationOutcome::DetectedOnly => ctx.logger.info(COMPONENT, &message),
            _ => ctx.logger.verbose(COMPONENT, &message),
        }
    }

    fn record(
        &self,
        now_ms: u64,
        guild: GuildId,
        actor: ActorId,
        username: &str,
        action: &str,
        severity: Severity,
    ) -> AuditRecord {
        AuditRecord::new(guild, now_ms, AuditSource::AntiSpam, severity, action)
            .with_field("User", format!("{username} ({actor})"))
            .with_field("Action", action)
    }

    /// Forget one actor. Returns whether anything was tracked.
    pub fn clear_actor(&mut self, guild: GuildId, actor: ActorId) -> bool {
        let key = (guild, actor);
        let tracked = self.messages.clear(&key);
        let warned = self.warned.remove(&key).is_some();
        tracked || warned
    }

    /// Forget every actor in `guild`. Returns how many were tracked.
    pub fn clear_guild(&mut self, guild: GuildId) -> usize {
        let before = self.warned.len();
        self.warned.retain(|(g, _), _| *g != guild);
        let unwarned = before - self.warned.len();
        self.messages.clear_where(|(g, _)| *g == guild).max(unwarned)
    }

    /// Snapshot for `guild` as of `now_ms`. Actors whose messages have all
    /// aged out are dropped before counting.
    pub fn status(&mut self, guild: GuildId, now_ms: u64) -> SpamStatus {
        SpamStatus {
            tracked_actors: self
                .messages
                .live_where(self.config.window_ms, now_ms, |(g, _)| *g == guild),
            warned_actors: self.warned.keys().filter(|(g, _)| *g == guild).count(),
        }
    }
}

impl EventSubscriber for SpamDetector {
    fn name(&self) -> &'static str {
        COMPONENT
    }

    fn on_event(&mut self, event: &Event, ctx: &mut DispatchContext<'_>) {
        match &event.kind {
            EventKind::MessageSent { channel } => self.on_message(event, *channel, ctx),
            EventKind::MemberLeft => {
                if self.clear_actor(event.guild, event.actor.id) {
                    ctx.logger.debug(
                        COMPONENT,
                        &format!("{} left, tracking cleared", event.actor.id),
                    );
                }
            }
            _ => {}
        }
    }

    fn on_task(&mut self, task: &ScheduledTask, ctx: &mut DispatchContext<'_>) {
        match *task {
            ScheduledTask::SpamGraceRecheck {
                guild,
                actor,
                deadline_ms,
            } => self.recheck(ctx, guild, actor, deadline_ms),
            ScheduledTask::DeleteNotice { guild, notice } => {
                if let Err(e) = ctx.effector.delete_notice(guild, notice) {
                    ctx.logger
                        .debug(COMPONENT, &format!("Could not delete notice {notice}: {e}"));
                }
            }
            _ => {}
        }
    }
}
