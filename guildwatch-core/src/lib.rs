//! guildwatch detection core
//!
//! Consumes abstract platform events and escalates through an abstract
//! effector:
//! - `spam` - per-actor message rate, warn then punish
//! - `raid` - guild-wide join bursts, suspicious-account screening
//! - `nuke` - per-actor destructive-action bursts, containment
//!
//! All three share the sliding window primitive and run as independent
//! subscribers behind [`GuardEngine`]. Timers are explicit scheduled tasks
//! that re-validate state when they fire.

pub mod config;
pub mod effector;
pub mod engine;
pub mod escalation;
pub mod logger;
pub mod nuke;
pub mod protective;
pub mod raid;
pub mod schedule;
pub mod spam;
pub mod trust;
pub mod window;

pub use config::{ConfigError, GuardConfig, NukeConfig, RaidConfig, SpamConfig};
pub use effector::{Capability, EffectCall, EffectError, EscalationEffector, RecordingEffector};
pub use engine::{
    CommandOutcome, DispatchContext, EventSubscriber, GuardEngine, GuardStatus, NukeStatus,
    RaidStatus, SpamStatus,
};
pub use escalation::EscalationOutcome;
pub use logger::{Logger, MockLogger, NullLogger, StderrLogger, Verbosity};
pub use nuke::PrivilegedActionGuard;
pub use protective::{ModeTransition, ProtectiveMode};
pub use raid::{RaidDetector, SuspicionReason};
pub use schedule::{ScheduledTask, Scheduler};
pub use spam::SpamDetector;
pub use trust::TrustRegistry;
pub use window::SlidingWindowTracker;
