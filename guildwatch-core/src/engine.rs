//! Event fan-out, timer delivery and administrative commands.

use std::sync::Arc;

use guildwatch_clock::{Clock, MS_PER_HOUR, MS_PER_MIN, MS_PER_SEC};
use guildwatch_schema::{ActorId, AdminCommand, AuditRecord, Event, GuildId, StreamRecord};
use serde::Serialize;

use crate::config::{ConfigError, GuardConfig};
use crate::effector::EscalationEffector;
use crate::logger::Logger;
use crate::nuke::PrivilegedActionGuard;
use crate::protective::ModeTransition;
use crate::raid::RaidDetector;
use crate::schedule::{ScheduledTask, Scheduler};
use crate::spam::SpamDetector;

const COMPONENT: &str = "engine";

/// Everything a subscriber may touch while handling one event or task.
pub struct DispatchContext<'a> {
    /// Event time for events, due time for tasks, clock time for commands.
    pub now_ms: u64,
    pub effector: &'a dyn EscalationEffector,
    pub logger: &'a dyn Logger,
    pub scheduler: &'a mut Scheduler,
}

impl DispatchContext<'_> {
    /// Emit an audit record. Delivery failures are logged and dropped.
    pub fn audit(&self, component: &str, record: AuditRecord) {
        if let Err(e) = self.effector.emit_audit(&record) {
            self.logger.debug(
                component,
                &format!("Dropped audit record {:?}: {}", record.title, e),
            );
        }
    }

    pub fn schedule(&mut self, due_ms: u64, task: ScheduledTask) {
        self.scheduler.schedule(due_ms, task);
    }
}

/// A detector plugged into the event stream.
pub trait EventSubscriber {
    fn name(&self) -> &'static str;

    fn on_event(&mut self, event: &Event, ctx: &mut DispatchContext<'_>);

    /// Handle a due task. Tasks owned by other subscribers are ignored.
    fn on_task(&mut self, task: &ScheduledTask, ctx: &mut DispatchContext<'_>);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpamStatus {
    pub tracked_actors: usize,
    pub warned_actors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RaidStatus {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
    pub recent_joins: usize,
    pub suspicious_members: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NukeStatus {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
    pub trusted_actors: usize,
    pub tracked_actors: usize,
}

/// Snapshot of every detector for one guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardStatus {
    pub guild: GuildId,
    pub spam: SpamStatus,
    pub raid: RaidStatus,
    pub nuke: NukeStatus,
}

/// Result of an administrative command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// State changed.
    Applied(String),
    /// Nothing to do, e.g. activating a mode that is already active.
    NoOp(String),
    Status(GuardStatus),
}

impl CommandOutcome {
    fn from_transition(transition: ModeTransition, applied: &str, noop: &str) -> Self {
        if transition.changed() {
            CommandOutcome::Applied(applied.to_string())
        } else {
            CommandOutcome::NoOp(noop.to_string())
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, CommandOutcome::Applied(_))
    }
}

/// Runs the three detectors over one event stream.
pub struct GuardEngine<E, C> {
    effector: E,
    clock: C,
    logger: Arc<dyn Logger>,
    scheduler: Scheduler,
    spam: SpamDetector,
    raid: RaidDetector,
    nuke: PrivilegedActionGuard,
}

impl<E: EscalationEffector, C: Clock> GuardEngine<E, C> {
    pub fn new(
        config: GuardConfig,
        effector: E,
        clock: C,
        logger: Arc<dyn Logger>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            effector,
            clock,
            logger,
            scheduler: Scheduler::new(),
            spam: SpamDetector::new(config.spam),
            raid: RaidDetector::new(config.raid),
            nuke: PrivilegedActionGuard::new(config.nuke),
        })
    }

    /// Builder: seed the anti-nuke trust registry.
    pub fn with_trusted<I: IntoIterator<Item = ActorId>>(mut self, actors: I) -> Self {
        for actor in actors {
            self.nuke.trust(actor);
        }
        self
    }

    pub fn effector(&self) -> &E {
        &self.effector
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.scheduler.next_due()
    }

    /// Feed one event to every detector, after running tasks due by its time.
    pub fn dispatch(&mut self, event: &Event) {
        self.run_due(event.ts_ms);

        let mut ctx = DispatchContext {
            now_ms: event.ts_ms,
            effector: &self.effector,
            logger: &*self.logger,
            scheduler: &mut self.scheduler,
        };
        let subscribers: [&mut dyn EventSubscriber; 3] =
            [&mut self.spam, &mut self.raid, &mut self.nuke];
        for subscriber in subscribers {
            subscriber.on_event(event, &mut ctx);
        }
    }

    /// Run every task due at or before `now_ms`. Returns how many ran.
    pub fn run_due(&mut self, now_ms: u64) -> usize {
        let mut ran = 0;
        while let Some((due_ms, task)) = self.scheduler.pop_due(now_ms) {
            self.deliver(due_ms, &task);
            ran += 1;
        }
        ran
    }

    /// Run tasks due at the clock's current time.
    pub fn tick(&mut self) -> usize {
        let now = self.clock.now_unix_ms();
        self.run_due(now)
    }

    /// Run every pending task regardless of due time, in order.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Some((due_ms, task)) = self.scheduler.pop_next() {
            self.deliver(due_ms, &task);
            ran += 1;
        }
        ran
    }

    fn deliver(&mut self, due_ms: u64, task: &ScheduledTask) {
        self.logger
            .debug(COMPONENT, &format!("Running {:?} due at {}", task, due_ms));
        let mut ctx = DispatchContext {
            now_ms: due_ms,
            effector: &self.effector,
            logger: &*self.logger,
            scheduler: &mut self.scheduler,
        };
        let subscribers: [&mut dyn EventSubscriber; 3] =
            [&mut self.spam, &mut self.raid, &mut self.nuke];
        for subscriber in subscribers {
            subscriber.on_task(task, &mut ctx);
        }
    }

    /// Apply a command at the clock's current time.
    pub fn execute(&mut self, guild: GuildId, command: &AdminCommand) -> CommandOutcome {
        let now = self.clock.now_unix_ms();
        self.execute_at(guild, command, now)
    }

    /// Apply a command at `now_ms`, after running tasks due by then.
    pub fn execute_at(
        &mut self,
        guild: GuildId,
        command: &AdminCommand,
        now_ms: u64,
    ) -> CommandOutcome {
        self.run_due(now_ms);
        self.logger
            .verbose(COMPONENT, &format!("Guild {}: command {:?}", guild, command));

        let mut ctx = DispatchContext {
            now_ms,
            effector: &self.effector,
            logger: &*self.logger,
            scheduler: &mut self.scheduler,
        };

        match command {
            AdminCommand::SpamClear { actor: Some(actor) } => {
                if self.spam.clear_actor(guild, *actor) {
                    CommandOutcome::Applied(format!("Cleared spam tracking for {actor}"))
                } else {
                    CommandOutcome::NoOp(format!("No spam tracking for {actor}"))
                }
            }
            AdminCommand::SpamClear { actor: None } => {
                let cleared = self.spam.clear_guild(guild);
                if cleared > 0 {
                    CommandOutcome::Applied(format!("Cleared spam tracking for {cleared} users"))
                } else {
                    CommandOutcome::NoOp("No spam tracking to clear".to_string())
                }
            }
            AdminCommand::RaidOn => CommandOutcome::from_transition(
                self.raid.activate_manual(guild, &mut ctx),
                "Raid protection activated",
                "Raid protection is already active",
            ),
            AdminCommand::RaidOff => CommandOutcome::from_transition(
                self.raid.deactivate_manual(guild, &mut ctx),
                "Raid protection deactivated",
                "Raid protection is already inactive",
            ),
            AdminCommand::RaidClear => {
                let (joins, suspicious) = self.raid.clear(guild);
                if joins || suspicious > 0 {
                    CommandOutcome::Applied(format!(
                        "Cleared recent joins and {suspicious} suspicious users"
                    ))
                } else {
                    CommandOutcome::NoOp("No raid tracking to clear".to_string())
                }
            }
            AdminCommand::NukeTrust { actor } => {
                if self.nuke.trust(*actor) {
                    CommandOutcome::Applied(format!("{actor} is now trusted"))
                } else {
                    CommandOutcome::NoOp(format!("{actor} is already trusted"))
                }
            }
            AdminCommand::NukeUntrust { actor } => {
                if self.nuke.untrust(*actor) {
                    CommandOutcome::Applied(format!("{actor} is no longer trusted"))
                } else {
                    CommandOutcome::NoOp(format!("{actor} was not trusted"))
                }
            }
            AdminCommand::NukeClear => {
                let cleared = self.nuke.clear(guild);
                if cleared > 0 {
                    CommandOutcome::Applied(format!("Cleared action tracking for {cleared} users"))
                } else {
                    CommandOutcome::NoOp("No action tracking to clear".to_string())
                }
            }
            AdminCommand::NukeOff => CommandOutcome::from_transition(
                self.nuke.deactivate_manual(guild, &mut ctx),
                "Protection mode deactivated",
                "Protection mode is already inactive",
            ),
            AdminCommand::Status => CommandOutcome::Status(self.status_at(guild, now_ms)),
        }
    }

    /// Apply one stream record at its own timestamp.
    ///
    /// Returns the command outcome for command records.
    pub fn apply(&mut self, record: &StreamRecord) -> Option<CommandOutcome> {
        match record {
            StreamRecord::Event(event) => {
                self.dispatch(event);
                None
            }
            StreamRecord::Command(c) => Some(self.execute_at(c.guild, &c.command, c.ts_ms)),
        }
    }

    /// Status at the clock's current time.
    pub fn status(&mut self, guild: GuildId) -> GuardStatus {
        let now = self.clock.now_unix_ms();
        self.status_at(guild, now)
    }

    fn status_at(&mut self, guild: GuildId, now_ms: u64) -> GuardStatus {
        GuardStatus {
            guild,
            spam: self.spam.status(guild, now_ms),
            raid: self.raid.status(guild, now_ms),
            nuke: self.nuke.status(guild, now_ms),
        }
    }
}

/// Render a duration the way audit records show it.
pub(crate) fn describe_duration(ms: u64) -> String {
    if ms >= MS_PER_HOUR && ms % MS_PER_HOUR == 0 {
        plural(ms / MS_PER_HOUR, "hour")
    } else if ms >= MS_PER_MIN && ms % MS_PER_MIN == 0 {
        plural(ms / MS_PER_MIN, "minute")
    } else if ms % MS_PER_SEC == 0 {
        format!("{}s", ms / MS_PER_SEC)
    } else {
        format!("{ms}ms")
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
