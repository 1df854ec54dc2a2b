//! Timed protective mode state machine.
//!
//! `INACTIVE --activate--> ACTIVE --(deactivate | expiry)--> INACTIVE`
//!
//! Every activation gets a new generation number. An expiry timer carries
//! the generation it was armed for, so a timer left over from an earlier
//! activation can never cut a later one short.

use serde::Serialize;

/// Result of a mode operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "transition")]
pub enum ModeTransition {
    Activated { generation: u64, expires_at_ms: u64 },
    AlreadyActive,
    Deactivated,
    AlreadyInactive,
    /// Expiry for a generation that is no longer current.
    StaleExpiry,
}

impl ModeTransition {
    /// Whether the call changed state.
    pub fn changed(self) -> bool {
        matches!(self, ModeTransition::Activated { .. } | ModeTransition::Deactivated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Activation {
    generation: u64,
    activated_at_ms: u64,
}

/// One protective mode instance for a (detector, guild) pair.
#[derive(Debug, Clone)]
pub struct ProtectiveMode {
    duration_ms: u64,
    active: Option<Activation>,
    generation: u64,
}

impl ProtectiveMode {
    /// Create an inactive mode that auto-expires `duration_ms` after each activation.
    pub fn new(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            active: None,
            generation: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Arm the mode. A no-op while already active.
    pub fn activate(&mut self, now_ms: u64) -> ModeTransition {
        if self.active.is_some() {
            return ModeTransition::AlreadyActive;
        }
        self.generation += 1;
        self.active = Some(Activation {
            generation: self.generation,
            activated_at_ms: now_ms,
        });
        ModeTransition::Activated {
            generation: self.generation,
            expires_at_ms: now_ms.saturating_add(self.duration_ms),
        }
    }

    /// Disarm the mode. A no-op while already inactive.
    pub fn deactivate(&mut self) -> ModeTransition {
        match self.active.take() {
            Some(_) => ModeTransition::Deactivated,
            None => ModeTransition::AlreadyInactive,
        }
    }

    /// Disarm only if `generation` is still the current activation.
    pub fn expire(&mut self, generation: u64) -> ModeTransition {
        match self.active {
            Some(a) if a.generation == generation => self.deactivate(),
            Some(_) => ModeTransition::StaleExpiry,
            None => ModeTransition::AlreadyInactive,
        }
    }

    pub fn activated_at_ms(&self) -> Option<u64> {
        self.active.map(|a| a.activated_at_ms)
    }

    pub fn expires_at_ms(&self) -> Option<u64> {
        self.active
            .map(|a| a.activated_at_ms.saturating_add(self.duration_ms))
    }

    /// Number of activations so far.
    pub fn activations(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activate_then_deactivate() {
        let mut mode = ProtectiveMode::new(1_000);
        assert!(!mode.is_active());

        assert_eq!(
            mode.activate(50),
            ModeTransition::Activated {
                generation: 1,
                expires_at_ms: 1_050
            }
        );
        assert!(mode.is_active());
        assert_eq!(mode.activated_at_ms(), Some(50));
        assert_eq!(mode.expires_at_ms(), Some(1_050));

        assert_eq!(mode.deactivate(), ModeTransition::Deactivated);
        assert!(!mode.is_active());
        assert_eq!(mode.expires_at_ms(), None);
    }

    #[test]
    fn test_activate_is_idempotent() {
        let mut mode = ProtectiveMode::new(1_000);
        assert!(mode.activate(0).changed());
        assert_eq!(mode.activate(10), ModeTransition::AlreadyActive);
        assert_eq!(mode.activations(), 1);
        // the original activation time is kept
        assert_eq!(mode.activated_at_ms(), Some(0));
    }

    #[test]
    fn test_deactivate_when_inactive_is_noop() {
        let mut mode = ProtectiveMode::new(1_000);
        assert_eq!(mode.deactivate(), ModeTransition::AlreadyInactive);
        assert!(!mode.deactivate().changed());
    }

    #[test]
    fn test_expiry_for_current_generation() {
        let mut mode = ProtectiveMode::new(1_000);
        mode.activate(0);
        assert_eq!(mode.expire(1), ModeTransition::Deactivated);
        assert_eq!(mode.expire(1), ModeTransition::AlreadyInactive);
    }

    #[test]
    fn test_stale_expiry_ignored_after_manual_cycle() {
        let mut mode = ProtectiveMode::new(1_000);
        mode.activate(0);
        mode.deactivate();
        mode.activate(500);

        // timer armed by the first activation fires
        assert_eq!(mode.expire(1), ModeTransition::StaleExpiry);
        assert!(mode.is_active());

        assert_eq!(mode.expire(2), ModeTransition::Deactivated);
    }
}
