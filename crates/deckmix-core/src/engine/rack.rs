//! Effect slots: one insert per channel plus one on the master
//!
//! Units arrive already allocated, wrapped in `basedrop::Owned`, so
//! replacing or removing one on the audio thread only queues the old unit
//! for the collector thread.
//!
//! The rack enforces the processing budget: at most `max_active` units may be
//! enabled at once. Going over is a [`EngineError::CapacityExceeded`] and
//! leaves every existing unit as it was.

use basedrop::Owned;

use crate::effect::{BeatDivision, EffectParam, EffectSlot, EffectUnit};
use crate::error::{EngineError, EngineResult};
use crate::types::{ChannelId, MAX_CHANNELS};

pub struct EffectRack {
    channels: Vec<Option<Owned<EffectUnit>>>,
    master: Option<Owned<EffectUnit>>,
    max_active: usize,
}

impl EffectRack {
    pub fn new(channel_count: usize, max_active: usize) -> Self {
        let channel_count = channel_count.min(MAX_CHANNELS);
        Self {
            channels: (0..channel_count).map(|_| None).collect(),
            master: None,
            max_active,
        }
    }

    pub fn max_active(&self) -> usize {
        self.max_active
    }

    /// Number of enabled units across all slots
    pub fn active_count(&self) -> usize {
        self.channels
            .iter()
            .chain(std::iter::once(&self.master))
            .flatten()
            .filter(|unit| unit.is_enabled())
            .count()
    }

    fn slot(&self, slot: EffectSlot) -> EngineResult<&Option<Owned<EffectUnit>>> {
        match slot {
            EffectSlot::Master => Ok(&self.master),
            EffectSlot::Channel(id) => id
                .index()
                .and_then(|index| self.channels.get(index))
                .ok_or(EngineError::UnknownChannel(id)),
        }
    }

    fn slot_mut(&mut self, slot: EffectSlot) -> EngineResult<&mut Option<Owned<EffectUnit>>> {
        match slot {
            EffectSlot::Master => Ok(&mut self.master),
            EffectSlot::Channel(id) => id
                .index()
                .and_then(|index| self.channels.get_mut(index))
                .ok_or(EngineError::UnknownChannel(id)),
        }
    }

    pub fn unit(&self, slot: EffectSlot) -> Option<&EffectUnit> {
        self.slot(slot).ok()?.as_deref()
    }

    fn unit_mut(&mut self, slot: EffectSlot) -> EngineResult<&mut EffectUnit> {
        self.slot_mut(slot)?
            .as_deref_mut()
            .ok_or(EngineError::EmptySlot(slot))
    }

    /// Install `unit` in `slot` and enable it
    ///
    /// A unit already in the slot is replaced and does not count against the
    /// budget. On error the new unit is dropped and the slot is unchanged.
    pub fn insert(&mut self, slot: EffectSlot, mut unit: Owned<EffectUnit>) -> EngineResult<()> {
        let replacing_active = self
            .slot(slot)?
            .as_ref()
            .is_some_and(|current| current.is_enabled());
        let active = self.active_count() - usize::from(replacing_active);
        if active >= self.max_active {
            return Err(EngineError::CapacityExceeded { max: self.max_active });
        }

        unit.set_enabled(true);
        *self.slot_mut(slot)? = Some(unit);
        Ok(())
    }

    /// Take the unit out of `slot`; its memory is reclaimed off-thread
    pub fn remove(&mut self, slot: EffectSlot) -> EngineResult<()> {
        match self.slot_mut(slot)?.take() {
            Some(_) => Ok(()),
            None => Err(EngineError::EmptySlot(slot)),
        }
    }

    pub fn set_enabled(&mut self, slot: EffectSlot, enabled: bool) -> EngineResult<()> {
        let max = self.max_active;
        let active = self.active_count();
        let unit = self.unit_mut(slot)?;
        if enabled && !unit.is_enabled() && active >= max {
            return Err(EngineError::CapacityExceeded { max });
        }
        unit.set_enabled(enabled);
        Ok(())
    }

    pub fn set_param(&mut self, slot: EffectSlot, param: EffectParam, value: f32) -> EngineResult<()> {
        self.unit_mut(slot)?.set_param(param, value)
    }

    pub fn set_division(&mut self, slot: EffectSlot, division: BeatDivision) -> EngineResult<()> {
        self.unit_mut(slot)?.set_division(division);
        Ok(())
    }

    /// Unit inserted after a channel strip, by zero-based index
    #[inline]
    pub(crate) fn channel_unit_mut(&mut self, index: usize) -> Option<&mut EffectUnit> {
        self.channels.get_mut(index)?.as_deref_mut()
    }

    #[inline]
    pub(crate) fn master_unit_mut(&mut self) -> Option<&mut EffectUnit> {
        self.master.as_deref_mut()
    }

    /// Slots that currently hold a unit
    pub fn occupied(&self) -> impl Iterator<Item = (EffectSlot, &EffectUnit)> {
        self.channels
            .iter()
            .enumerate()
            .filter_map(|(index, unit)| {
                let id = ChannelId::from_index(index)?;
                unit.as_deref().map(|unit| (EffectSlot::Channel(id), unit))
            })
            .chain(self.master.as_deref().map(|unit| (EffectSlot::Master, unit)))
    }
}
