//! Exemption registry for the anti-nuke guard.

use std::collections::HashSet;

use guildwatch_schema::ActorId;

/// Set of actors whose privileged actions are never tracked.
#[derive(Debug, Clone, Default)]
pub struct TrustRegistry {
    trusted: HashSet<ActorId>,
}

impl TrustRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_trusted(&self, actor: ActorId) -> bool {
        self.trusted.contains(&actor)
    }

    /// Returns `false` if the actor was already trusted.
    pub fn trust(&mut self, actor: ActorId) -> bool {
        self.trusted.insert(actor)
    }

    /// Returns `false` if the actor was not trusted.
    pub fn untrust(&mut self, actor: ActorId) -> bool {
        self.trusted.remove(&actor)
    }

    pub fn len(&self) -> usize {
        self.trusted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trusted.is_empty()
    }

    /// Trusted actors in ascending order.
    pub fn sorted(&self) -> Vec<ActorId> {
        let mut actors: Vec<ActorId> = self.trusted.iter().copied().collect();
        actors.sort_unstable();
        actors
    }
}

impl FromIterator<ActorId> for TrustRegistry {
    fn from_iter<I: IntoIterator<Item = ActorId>>(iter: I) -> Self {
        Self {
            trusted: iter.into_iter().collect(),
        }
    }
}
