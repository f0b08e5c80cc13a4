//! Emergency mode flag shared between the data plane and the refresh worker

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Reachability the data plane observed for a member
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum InstanceStatus {
    /// Connection succeeded
    Reachable,

    /// The member's address could not be resolved or is malformed
    InvalidHost,

    /// Connection failed
    Unreachable,

    /// Connected, but the member refused to serve
    Unusable,
}

impl InstanceStatus {
    /// Whether this report should shorten the refresh cadence
    pub const fn triggers_emergency(self) -> bool {
        matches!(self, Self::InvalidHost | Self::Unreachable)
    }
}

/// "At least one unreachable report since the last clear".
///
/// Any thread may activate it; only the refresh worker clears it. The state is
/// a generation counter: odd while active, bumped by every report. A pass
/// records the generation before reading the cluster and may only clear the
/// exact generation it saw, so a report arriving mid-pass survives that pass.
#[derive(Debug, Default)]
pub struct EmergencyState {
    generation: AtomicU64,
}

impl EmergencyState {
    /// Create an inactive flag
    pub const fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
        }
    }

    /// Whether emergency mode is active
    pub fn is_active(&self) -> bool {
        is_active_generation(self.generation.load(Ordering::Acquire))
    }

    /// Activate emergency mode, returning whether it was previously inactive
    pub fn activate(&self) -> bool {
        let previous = self
            .generation
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |generation| {
                // Inactive -> active, or active -> a newer active generation
                Some(if is_active_generation(generation) {
                    generation.wrapping_add(2)
                } else {
                    generation.wrapping_add(1)
                })
            })
            .unwrap_or_else(|generation| generation);

        !is_active_generation(previous)
    }

    /// Current generation, taken by a pass before it reads the cluster
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Clear emergency mode if no report arrived since `generation` was taken.
    ///
    /// Returns whether it was cleared.
    pub(crate) fn clear_if_unchanged(&self, generation: u64) -> bool {
        is_active_generation(generation)
            && self
                .generation
                .compare_exchange(
                    generation,
                    generation.wrapping_add(1),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
    }
}

const fn is_active_generation(generation: u64) -> bool {
    generation % 2 == 1
}
