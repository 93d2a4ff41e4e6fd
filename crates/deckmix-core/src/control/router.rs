//! Control router: controller events to engine parameters
//!
//! Runs on the audio thread. Events arrive through the command queue, are
//! looked up in the current [`MappingTable`], transformed, and written
//! through [`ParameterAccess`]. The table itself lives in a
//! `basedrop::SharedCell`; the control thread swaps it while the engine is
//! quiescent and the router picks up the new table at the next block.

use std::sync::Arc;
use std::time::Duration;

use basedrop::{Shared, SharedCell};

use super::mapping::{MappingEntry, MappingTable, Transform};
use super::normalize::{encoder_to_delta, normalize_cc_value};
use super::takeover::SoftTakeover;
use super::target::{ParameterTarget, TargetKind};
use super::{ControlEvent, ControlKey};
use crate::engine::gc_handle;
use crate::error::EngineResult;

/// Read and write engine parameters by target
///
/// Values are in the target's [`range`](ParameterTarget::range): switches
/// read 0.0 or 1.0, stepped targets read their normalized position.
pub trait ParameterAccess {
    fn parameter(&self, target: ParameterTarget) -> Option<f32>;
    fn set_parameter(&mut self, target: ParameterTarget, value: f32) -> EngineResult<()>;
    /// Fire a one-shot target (tap, nudge, sync)
    fn trigger(&mut self, target: ParameterTarget, timestamp: Duration) -> EngineResult<()>;
}

/// Result of routing one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A parameter was written or a trigger fired
    Applied,
    /// Mapped, but nothing to do (release, or waiting for soft takeover)
    Ignored,
    /// No mapping for this control
    Unmapped,
}

/// Shared slot holding the active mapping table
pub type MappingCell = Arc<SharedCell<MappingTable>>;

/// Create a cell holding an empty table
pub fn mapping_cell() -> MappingCell {
    Arc::new(SharedCell::new(Shared::new(&gc_handle(), MappingTable::new())))
}

pub struct ControlRouter {
    cell: MappingCell,
    table: Shared<MappingTable>,
    takeover: SoftTakeover,
}

impl ControlRouter {
    pub fn new(cell: MappingCell) -> Self {
        let table = cell.get();
        Self {
            cell,
            table,
            takeover: SoftTakeover::new(),
        }
    }

    /// Pick up a newly installed table; call at the start of a block
    ///
    /// Dropping the previous table only queues it for the collector thread.
    pub fn refresh(&mut self) {
        let current = self.cell.get();
        if current.generation() != self.table.generation() {
            self.table = current;
            self.takeover.reset();
        }
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    pub fn generation(&self) -> u64 {
        self.table.generation()
    }

    /// Route one controller event
    pub fn dispatch<P: ParameterAccess>(
        &mut self,
        event: &ControlEvent,
        params: &mut P,
    ) -> EngineResult<DispatchOutcome> {
        let key = ControlKey {
            controller: event.controller,
            control: event.control,
        };
        let Some(entry) = self.table.get(&key).copied() else {
            return Ok(DispatchOutcome::Unmapped);
        };
        self.apply(entry, event, params)
    }

    fn apply<P: ParameterAccess>(
        &mut self,
        entry: MappingEntry,
        event: &ControlEvent,
        params: &mut P,
    ) -> EngineResult<DispatchOutcome> {
        let MappingEntry { target, transform } = entry;
        let range = target.range();

        match (target.kind(), transform) {
            (TargetKind::Trigger, _) => {
                if !event.is_press() {
                    return Ok(DispatchOutcome::Ignored);
                }
                params.trigger(target, event.timestamp)?;
            }
            (TargetKind::Switch, Transform::Toggle) => {
                if !event.is_press() {
                    return Ok(DispatchOutcome::Ignored);
                }
                let on = params.parameter(target).unwrap_or(0.0) >= 0.5;
                params.set_parameter(target, if on { 0.0 } else { 1.0 })?;
            }
            (TargetKind::Switch, _) => {
                // Momentary: held = on
                params.set_parameter(target, if event.is_press() { 1.0 } else { 0.0 })?;
            }
            (TargetKind::Stepped, Transform::Increment { mode, .. }) => {
                // One discrete position per tick; `step` only scales continuous targets
                let ticks = encoder_to_delta(event.value, mode);
                if ticks == 0 {
                    return Ok(DispatchOutcome::Ignored);
                }
                let last = target.step_count().unwrap_or(1).saturating_sub(1) as i32;
                let current = params.parameter(target).unwrap_or(range.min());
                let index = (target.step_index(current) as i32 + ticks).clamp(0, last);
                params.set_parameter(target, target.step_value(index as usize))?;
            }
            (TargetKind::Stepped, Transform::Linear | Transform::Log) => {
                let count = target.step_count().unwrap_or(1);
                let position = normalize_cc_value(event.value, range.center_deadzone());
                let index = ((position * count as f32) as usize).min(count.saturating_sub(1));
                params.set_parameter(target, target.step_value(index))?;
            }
            (TargetKind::Continuous, Transform::Increment { step, mode }) => {
                let ticks = encoder_to_delta(event.value, mode);
                if ticks == 0 {
                    return Ok(DispatchOutcome::Ignored);
                }
                let current = params.parameter(target).unwrap_or(range.min());
                let position = transform.position(current, range) + ticks as f32 * step;
                params.set_parameter(target, transform.apply(position.clamp(0.0, 1.0), range))?;
            }
            (TargetKind::Continuous, Transform::Linear | Transform::Log) => {
                let position = normalize_cc_value(event.value, range.center_deadzone());
                if let Some(slot) = target.takeover_slot() {
                    let current = params.parameter(target).unwrap_or(range.min());
                    let engine_position = transform.position(current, range);
                    if !self.takeover.admit(slot, position, engine_position) {
                        return Ok(DispatchOutcome::Ignored);
                    }
                }
                params.set_parameter(target, transform.apply(position, range))?;
            }
            // Rejected when the table is built
            (TargetKind::Continuous | TargetKind::Stepped, Transform::Toggle) => {
                return Ok(DispatchOutcome::Ignored);
            }
        }
        Ok(DispatchOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlNumber;
    use crate::error::EngineError;
    use std::collections::HashMap;

    /// Parameter store standing in for the engine
    #[derive(Default)]
    struct Params {
        values: HashMap<ParameterTarget, f32>,
        triggers: Vec<ParameterTarget>,
    }

    impl ParameterAccess for Params {
        fn parameter(&self, target: ParameterTarget) -> Option<f32> {
            Some(self.values.get(&target).copied().unwrap_or(0.0))
        }

        fn set_parameter(&mut self, target: ParameterTarget, value: f32) -> EngineResult<()> {
            if value.is_nan() {
                return Err(EngineError::UnknownParameter);
            }
            self.values.insert(target, value);
            Ok(())
        }

        fn trigger(&mut self, target: ParameterTarget, _timestamp: Duration) -> EngineResult<()> {
            self.triggers.push(target);
            Ok(())
        }
    }

    fn cc(number: u8, value: u8) -> ControlEvent {
        ControlEvent {
            controller: 1,
            control: ControlNumber::ControlChange { channel: 0, cc: number },
            value,
            timestamp: Duration::ZERO,
        }
    }

    fn router_with(mappings: &[(u8, &str, Transform)]) -> ControlRouter {
        let mut table = MappingTable::new();
        for (number, path, transform) in mappings {
            let key = ControlKey {
                controller: 1,
                control: ControlNumber::ControlChange { channel: 0, cc: *number },
            };
            let entry = MappingEntry {
                target: ParameterTarget::parse(path).unwrap(),
                transform: *transform,
            };
            table.insert(key, entry, 4).unwrap();
        }
        table.set_generation(1);
        let cell = mapping_cell();
        cell.set(Shared::new(&gc_handle(), table));
        ControlRouter::new(cell)
    }

    fn fader() -> ParameterTarget {
        ParameterTarget::parse("channel.1.fader").unwrap()
    }

    #[test]
    fn test_unmapped_event() {
        let mut router = router_with(&[]);
        let mut params = Params::default();
        assert_eq!(router.dispatch(&cc(1, 64), &mut params).unwrap(), DispatchOutcome::Unmapped);
    }

    #[test]
    fn test_soft_takeover_holds_until_crossing() {
        let mut router = router_with(&[(7, "channel.1.fader", Transform::Linear)]);
        let mut params = Params::default();
        params.values.insert(fader(), 0.5);

        // 0.20 physical: no change
        let outcome = router.dispatch(&cc(7, 25), &mut params).unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert_eq!(params.values[&fader()], 0.5);
        router.dispatch(&cc(7, 50), &mut params).unwrap();
        assert_eq!(params.values[&fader()], 0.5);

        // Crossing 0.5 picks the fader up
        let outcome = router.dispatch(&cc(7, 70), &mut params).unwrap();
        assert_eq!(outcome, DispatchOutcome::Applied);
        assert!((params.values[&fader()] - 70.0 / 127.0).abs() < 1e-6);
    }

    #[test]
    fn test_toggle_flips_on_press_only() {
        let mut router = router_with(&[(10, "channel.2.mute", Transform::Toggle)]);
        let mut params = Params::default();
        let mute = ParameterTarget::parse("channel.2.mute").unwrap();

        router.dispatch(&cc(10, 127), &mut params).unwrap();
        assert_eq!(params.values[&mute], 1.0);
        assert_eq!(router.dispatch(&cc(10, 0), &mut params).unwrap(), DispatchOutcome::Ignored);
        assert_eq!(params.values[&mute], 1.0);
        router.dispatch(&cc(10, 127), &mut params).unwrap();
        assert_eq!(params.values[&mute], 0.0);
    }

    #[test]
    fn test_trigger_fires_on_press() {
        let mut router = router_with(&[(20, "transport.tap", Transform::Toggle)]);
        let mut params = Params::default();
        router.dispatch(&cc(20, 127), &mut params).unwrap();
        router.dispatch(&cc(20, 0), &mut params).unwrap();
        assert_eq!(params.triggers.len(), 1);
    }

    #[test]
    fn test_increment_moves_by_step() {
        let step = Transform::Increment { step: 0.1, mode: Default::default() };
        let mut router = router_with(&[(30, "mixer.master", step)]);
        let mut params = Params::default();
        let master = ParameterTarget::parse("mixer.master").unwrap();
        params.values.insert(master, 0.5);

        router.dispatch(&cc(30, 2), &mut params).unwrap();
        assert!((params.values[&master] - 0.7).abs() < 1e-5);
        router.dispatch(&cc(30, 65), &mut params).unwrap();
        assert!((params.values[&master] - 0.6).abs() < 1e-5);
        // Clamped at the top of the range
        router.dispatch(&cc(30, 63), &mut params).unwrap();
        assert_eq!(params.values[&master], 1.0);
    }

    #[test]
    fn test_encoder_walks_stepped_positions() {
        let step = Transform::Increment { step: 0.1, mode: Default::default() };
        let mut router = router_with(&[(31, "channel.1.filter_mode", step)]);
        let mut params = Params::default();
        let mode = ParameterTarget::parse("channel.1.filter_mode").unwrap();

        router.dispatch(&cc(31, 1), &mut params).unwrap();
        assert_eq!(params.values[&mode], 0.5);
        for _ in 0..20 {
            router.dispatch(&cc(31, 1), &mut params).unwrap();
        }
        assert_eq!(params.values[&mode], 1.0);
        router.dispatch(&cc(31, 65), &mut params).unwrap();
        assert_eq!(params.values[&mode], 0.5);
    }

    #[test]
    fn test_division_follows_fader_sweep() {
        let mut router = router_with(&[(32, "effect.1.division", Transform::Linear)]);
        let mut params = Params::default();
        let division = ParameterTarget::parse("effect.1.division").unwrap();
        params.values.insert(division, 0.25);

        // No pickup on a stepped target: every move lands on a division
        for value in (6..=127).step_by(2) {
            let outcome = router.dispatch(&cc(32, value), &mut params).unwrap();
            assert_eq!(outcome, DispatchOutcome::Applied);
        }
        router.dispatch(&cc(32, 127), &mut params).unwrap();
        assert_eq!(params.values[&division], 4.0);
        router.dispatch(&cc(32, 0), &mut params).unwrap();
        assert_eq!(params.values[&division], 1.0 / 16.0);
    }

    #[test]
    fn test_refresh_picks_up_new_table_and_resets_pickup() {
        let cell = mapping_cell();
        let mut router = ControlRouter::new(Arc::clone(&cell));
        assert!(router.table().is_empty());

        let mut table = MappingTable::new();
        let key = ControlKey {
            controller: 1,
            control: ControlNumber::ControlChange { channel: 0, cc: 7 },
        };
        table
            .insert(key, MappingEntry { target: fader(), transform: Transform::Linear }, 4)
            .unwrap();
        table.set_generation(5);
        cell.set(Shared::new(&gc_handle(), table));

        router.refresh();
        assert_eq!(router.generation(), 5);
        assert_eq!(router.table().len(), 1);
    }
}
