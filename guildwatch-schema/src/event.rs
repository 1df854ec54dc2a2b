//! Inbound event stream and administrative commands.

use serde::{Deserialize, Serialize};

use crate::actor::{ActorId, ActorSnapshot, ChannelId, GuildId};

/// Current schema version.
/// Version 1: initial event stream format.
pub const SCHEMA_VERSION: u32 = 1;

/// Destructive or high-impact actions watched by the anti-nuke guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegedAction {
    ChannelDelete,
    ChannelCreate,
    RoleDelete,
    RoleCreate,
    MemberBan,
    MemberKick,
    GuildUpdate,
    WebhookCreate,
}

impl PrivilegedAction {
    /// Every tracked action kind.
    pub const ALL: [PrivilegedAction; 8] = [
        PrivilegedAction::ChannelDelete,
        PrivilegedAction::ChannelCreate,
        PrivilegedAction::RoleDelete,
        PrivilegedAction::RoleCreate,
        PrivilegedAction::MemberBan,
        PrivilegedAction::MemberKick,
        PrivilegedAction::GuildUpdate,
        PrivilegedAction::WebhookCreate,
    ];

    /// Short machine label, e.g. `channel_delete`.
    pub fn label(self) -> &'static str {
        match self {
            PrivilegedAction::ChannelDelete => "channel_delete",
            PrivilegedAction::ChannelCreate => "channel_create",
            PrivilegedAction::RoleDelete => "role_delete",
            PrivilegedAction::RoleCreate => "role_create",
            PrivilegedAction::MemberBan => "member_ban",
            PrivilegedAction::MemberKick => "member_kick",
            PrivilegedAction::GuildUpdate => "guild_update",
            PrivilegedAction::WebhookCreate => "webhook_create",
        }
    }

    /// Human description of a burst of this action.
    pub fn burst_description(self) -> &'static str {
        match self {
            PrivilegedAction::ChannelDelete => "Mass Channel Deletion",
            PrivilegedAction::ChannelCreate => "Mass Channel Creation",
            PrivilegedAction::RoleDelete => "Mass Role Deletion",
            PrivilegedAction::RoleCreate => "Mass Role Creation",
            PrivilegedAction::MemberBan => "Mass Member Banning",
            PrivilegedAction::MemberKick => "Mass Member Kicking",
            PrivilegedAction::GuildUpdate => "Rapid Guild Modifications",
            PrivilegedAction::WebhookCreate => "Mass Webhook Creation",
        }
    }

    /// Title of the passive record written for a single occurrence.
    pub fn passive_title(self) -> &'static str {
        match self {
            PrivilegedAction::ChannelDelete => "CHANNEL DELETED",
            PrivilegedAction::ChannelCreate => "CHANNEL CREATED",
            PrivilegedAction::RoleDelete => "ROLE DELETED",
            PrivilegedAction::RoleCreate => "ROLE CREATED",
            PrivilegedAction::MemberBan => "MEMBER BANNED",
            PrivilegedAction::MemberKick => "MEMBER KICKED",
            PrivilegedAction::GuildUpdate => "GUILD UPDATED",
            PrivilegedAction::WebhookCreate => "WEBHOOK CREATED",
        }
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A privileged action attributed to `actor`.
    ActionPerformed {
        action: PrivilegedAction,
        /// Free-form description of what was acted upon (channel name, role name...).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    MessageSent {
        channel: ChannelId,
    },
    MemberJoined,
    MemberLeft,
}

/// A single platform event. Produced externally, consumed once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub version: u32,
    pub guild: GuildId,
    /// Event time, Unix milliseconds.
    pub ts_ms: u64,
    pub actor: ActorSnapshot,
    pub kind: EventKind,
}

impl Event {
    /// Create an event with the current schema version.
    pub fn new(guild: GuildId, ts_ms: u64, actor: ActorSnapshot, kind: EventKind) -> Self {
        Self {
            version: SCHEMA_VERSION,
            guild,
            ts_ms,
            actor,
            kind,
        }
    }

    pub fn message(guild: GuildId, ts_ms: u64, actor: ActorSnapshot, channel: ChannelId) -> Self {
        Self::new(guild, ts_ms, actor, EventKind::MessageSent { channel })
    }

    pub fn joined(guild: GuildId, ts_ms: u64, actor: ActorSnapshot) -> Self {
        Self::new(guild, ts_ms, actor, EventKind::MemberJoined)
    }

    pub fn left(guild: GuildId, ts_ms: u64, actor: ActorSnapshot) -> Self {
        Self::new(guild, ts_ms, actor, EventKind::MemberLeft)
    }

    pub fn action(
        guild: GuildId,
        ts_ms: u64,
        actor: ActorSnapshot,
        action: PrivilegedAction,
        target: Option<String>,
    ) -> Self {
        Self::new(guild, ts_ms, actor, EventKind::ActionPerformed { action, target })
    }

    /// Serialize to a single JSON line.
    pub fn to_json(&self) -> String {
        // Only plain data: serialization cannot fail.
        serde_json::to_string(self).expect("Event serialization cannot fail")
    }

    /// Deserialize from JSON, rejecting other schema versions.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let event: Event = serde_json::from_str(json)?;
        event.check_version()?;
        Ok(event)
    }

    fn check_version(&self) -> Result<(), SchemaError> {
        if self.version != SCHEMA_VERSION {
            return Err(SchemaError::VersionMismatch {
                expected: SCHEMA_VERSION,
                found: self.version,
            });
        }
        Ok(())
    }
}

/// Administrative commands, applied to one guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Reset spam tracking for one actor, or for everyone in the guild.
    SpamClear {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actor: Option<ActorId>,
    },
    RaidOn,
    RaidOff,
    /// Forget recent joins and suspicion records; the mode is left alone.
    RaidClear,
    NukeTrust {
        actor: ActorId,
    },
    NukeUntrust {
        actor: ActorId,
    },
    /// Forget privileged-action tracking for the guild.
    NukeClear,
    NukeOff,
    Status,
}

/// An administrative command issued at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub guild: GuildId,
    pub ts_ms: u64,
    pub command: AdminCommand,
}

/// One line of a replayable stream: either an event or an admin command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum StreamRecord {
    Event(Event),
    Command(CommandRecord),
}

impl StreamRecord {
    /// Time the record happened at.
    pub fn ts_ms(&self) -> u64 {
        match self {
            StreamRecord::Event(e) => e.ts_ms,
            StreamRecord::Command(c) => c.ts_ms,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("StreamRecord serialization cannot fail")
    }

    /// Parse one JSONL line. Event records must carry the current schema version.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let record: StreamRecord = serde_json::from_str(json)?;
        if let StreamRecord::Event(event) = &record {
            event.check_version()?;
        }
        Ok(record)
    }
}

/// Errors that can occur when decoding the event stream.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}
