//! The cyclic burst phases

use serde::{Deserialize, Serialize};

/// A stage of the burst cycle
///
/// Phases only ever advance forward: `Accumulate → Trigger → Race →
/// Cleanup → Accumulate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum Phase {
    /// Accumulators create every item with an under-threshold payload
    Accumulate = 0,
    /// The orchestrator fires the external flush at every live item
    Trigger = 1,
    /// Mutators expand every item past the threshold
    Race = 2,
    /// Accumulators close and delete every item
    Cleanup = 3,
}

impl Phase {
    /// Every phase in cycle order
    pub const ALL: [Phase; 4] = [Phase::Accumulate, Phase::Trigger, Phase::Race, Phase::Cleanup];

    /// The phase that follows this one, wrapping after `Cleanup`
    pub const fn next(self) -> Phase {
        match self {
            Phase::Accumulate => Phase::Trigger,
            Phase::Trigger => Phase::Race,
            Phase::Race => Phase::Cleanup,
            Phase::Cleanup => Phase::Accumulate,
        }
    }

    pub(crate) const fn as_u32(self) -> u32 {
        self as u32
    }

    pub(crate) const fn from_u32(value: u32) -> Phase {
        match value & 0b11 {
            0 => Phase::Accumulate,
            1 => Phase::Trigger,
            2 => Phase::Race,
            _ => Phase::Cleanup,
        }
    }

    /// Lowercase phase name
    pub const fn name(self) -> &'static str {
        match self {
            Phase::Accumulate => "accumulate",
            Phase::Trigger => "trigger",
            Phase::Race => "race",
            Phase::Cleanup => "cleanup",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_wraps() {
        assert_eq!(Phase::Accumulate.next(), Phase::Trigger);
        assert_eq!(Phase::Trigger.next(), Phase::Race);
        assert_eq!(Phase::Race.next(), Phase::Cleanup);
        assert_eq!(Phase::Cleanup.next(), Phase::Accumulate);
    }

    #[test]
    fn test_full_cycle_returns_to_start() {
        for phase in Phase::ALL {
            let mut p = phase;
            for _ in 0..Phase::ALL.len() {
                p = p.next();
            }
            assert_eq!(p, phase);
        }
    }

    #[test]
    fn test_u32_encoding() {
        for phase in Phase::ALL {
            assert_eq!(Phase::from_u32(phase.as_u32()), phase);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Phase::Race.to_string(), "race");
    }
}
