//! Soft takeover (pickup) for absolute controls
//!
//! After a profile switch, or when the engine value was changed from
//! elsewhere, a physical fader can sit far from the value it controls.
//! Until the fader is brought to the engine value its movements are ignored,
//! so the parameter never jumps.
//!
//! A control is picked up when its position comes within [`TAKEOVER_TOLERANCE`]
//! of the engine value, or when two consecutive readings straddle it.

use super::target::TAKEOVER_SLOTS;

/// Normalized distance that counts as "at" the engine value
pub const TAKEOVER_TOLERANCE: f32 = 0.02;

#[derive(Debug, Clone, Copy, Default)]
struct PickupState {
    engaged: bool,
    /// Previous physical position seen for this target
    last_position: Option<f32>,
    /// Value most recently written through this state
    applied: f32,
}

/// Fixed-size pickup table indexed by
/// [`ParameterTarget::takeover_slot`](super::ParameterTarget::takeover_slot)
pub struct SoftTakeover {
    states: [PickupState; TAKEOVER_SLOTS],
    tolerance: f32,
}

impl SoftTakeover {
    pub fn new() -> Self {
        Self {
            states: [PickupState::default(); TAKEOVER_SLOTS],
            tolerance: TAKEOVER_TOLERANCE,
        }
    }

    pub fn with_tolerance(tolerance: f32) -> Self {
        Self {
            tolerance: tolerance.max(0.0),
            ..Self::new()
        }
    }

    /// Decide whether a physical position may be written
    ///
    /// `position` and `engine` are both normalized 0..1. Returns `true` when
    /// the control has (or just gained) pickup.
    pub fn admit(&mut self, slot: usize, position: f32, engine: f32) -> bool {
        let tolerance = self.tolerance;
        let Some(state) = self.states.get_mut(slot) else {
            return true;
        };

        // Someone else moved the parameter: pickup must be regained
        if state.engaged && (engine - state.applied).abs() > tolerance {
            state.engaged = false;
        }

        if !state.engaged {
            let close = (position - engine).abs() <= tolerance;
            let crossed = state
                .last_position
                .is_some_and(|previous| (previous - engine) * (position - engine) <= 0.0);
            state.engaged = close || crossed;
        }

        state.last_position = Some(position);
        if state.engaged {
            state.applied = position;
        }
        state.engaged
    }

    /// True when the control for `slot` currently has pickup
    pub fn is_engaged(&self, slot: usize) -> bool {
        self.states.get(slot).is_some_and(|state| state.engaged)
    }

    /// Forget all pickup state, e.g. after a mapping change
    pub fn reset(&mut self) {
        self.states = [PickupState::default(); TAKEOVER_SLOTS];
    }
}

impl Default for SoftTakeover {
    fn default() -> Self {
        Self::new()
    }
}
