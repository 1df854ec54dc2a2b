//! guildwatch wire schema
//!
//! Defines the versioned event stream consumed by the detection engine and
//! the audit records it emits. Everything here is plain data with JSON (JSONL)
//! encoding; no detection logic lives in this crate.

mod actor;
mod audit;
mod event;

pub use actor::{
    ActorId, ActorSnapshot, ChannelId, GuildId, NoticeId, Permission, RoleId, RoleSnapshot,
    VerificationLevel,
};
pub use audit::{AuditField, AuditRecord, AuditSource, Severity};
pub use event::{
    AdminCommand, CommandRecord, Event, EventKind, PrivilegedAction, SchemaError, StreamRecord,
    SCHEMA_VERSION,
};
