//! Identifiers, permissions and the per-event actor snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Opaque identifier of a platform user.
    ActorId
);
id_type!(
    /// Opaque identifier of a community (guild). All scoped state keys on this.
    GuildId
);
id_type!(RoleId);
id_type!(ChannelId);
id_type!(
    /// Handle for a posted public notice, used to remove it later.
    NoticeId
);

/// Capabilities an actor may hold, directly or through a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Administrator,
    ManageGuild,
    ManageChannels,
    ManageRoles,
    ManageMessages,
    ManageWebhooks,
    KickMembers,
    BanMembers,
    ModerateMembers,
}

impl Permission {
    /// Permissions whose holders can wreck a guild quickly.
    pub const DANGEROUS: [Permission; 4] = [
        Permission::Administrator,
        Permission::ManageGuild,
        Permission::ManageChannels,
        Permission::ManageRoles,
    ];
}

/// A role held by an actor at event time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSnapshot {
    pub id: RoleId,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl RoleSnapshot {
    pub fn new(id: u64, name: impl Into<String>, permissions: &[Permission]) -> Self {
        Self {
            id: RoleId(id),
            name: name.into(),
            permissions: permissions.to_vec(),
        }
    }

    fn grants(&self, permission: Permission) -> bool {
        self.permissions
            .iter()
            .any(|p| *p == permission || *p == Permission::Administrator)
    }
}

/// Immutable view of an actor as it was when the event happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub id: ActorId,
    pub username: String,
    /// Automated accounts are never rate-tracked for spam.
    #[serde(default)]
    pub bot: bool,
    /// Account creation time, Unix milliseconds.
    pub created_at_ms: u64,
    #[serde(default)]
    pub has_avatar: bool,
    /// Permissions granted to the actor outside of roles.
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub roles: Vec<RoleSnapshot>,
}

impl ActorSnapshot {
    /// Create a plain actor with no roles, no permissions and no avatar.
    pub fn new(id: u64, username: impl Into<String>, created_at_ms: u64) -> Self {
        Self {
            id: ActorId(id),
            username: username.into(),
            bot: false,
            created_at_ms,
            has_avatar: false,
            permissions: Vec::new(),
            roles: Vec::new(),
        }
    }

    /// Builder: mark the actor as having a profile image.
    pub fn with_avatar(mut self) -> Self {
        self.has_avatar = true;
        self
    }

    /// Builder: mark the actor as an automated account.
    pub fn as_bot(mut self) -> Self {
        self.bot = true;
        self
    }

    /// Builder: grant a permission directly.
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    /// Builder: add a role.
    pub fn with_role(mut self, role: RoleSnapshot) -> Self {
        self.roles.push(role);
        self
    }

    /// Whether the actor holds `permission`, directly or through any role.
    /// Administrator implies every permission.
    pub fn has_permission(&self, permission: Permission) -> bool {
        let direct = self
            .permissions
            .iter()
            .any(|p| *p == permission || *p == Permission::Administrator);
        direct || self.roles.iter().any(|r| r.grants(permission))
    }

    /// Roles that grant any of `permissions`, in the order the actor holds them.
    pub fn roles_granting(&self, permissions: &[Permission]) -> Vec<RoleId> {
        self.roles
            .iter()
            .filter(|r| r.permissions.iter().any(|p| permissions.contains(p)))
            .map(|r| r.id)
            .collect()
    }

    /// Account age at `now_ms`. Clock skew yields zero rather than wrapping.
    pub fn account_age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at_ms)
    }
}

/// Join-verification requirement of a guild, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationLevel {
    None,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl VerificationLevel {
    /// One level stricter, saturating at `VeryHigh`.
    pub fn raised(self) -> Self {
        match self {
            VerificationLevel::None => VerificationLevel::Low,
            VerificationLevel::Low => VerificationLevel::Medium,
            VerificationLevel::Medium => VerificationLevel::High,
            VerificationLevel::High | VerificationLevel::VeryHigh => VerificationLevel::VeryHigh,
        }
    }
}

impl fmt::Display for VerificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerificationLevel::None => "none",
            VerificationLevel::Low => "low",
            VerificationLevel::Medium => "medium",
            VerificationLevel::High => "high",
            VerificationLevel::VeryHigh => "very_high",
        };
        f.write_str(s)
    }
}
