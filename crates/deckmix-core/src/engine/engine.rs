//! The engine context and its control-side handle
//!
//! [`AudioEngine`] owns every piece of mixing state: clock, channel strips,
//! effect rack, mix bus and control router. It lives on the audio thread and
//! is never shared. The control thread talks to it only through an
//! [`EngineHandle`]: commands go in through an rtrb ring, events and meters
//! come back through another ring and a set of atomics.
//!
//! ```text
//! control thread                                   audio thread
//! ┌──────────────┐  EngineCommand (rtrb, 1024)  ┌──────────────────┐
//! │ EngineHandle │─────────────────────────────►│   AudioEngine    │
//! │              │◄─────────────────────────────│  process(block)  │
//! └──────┬───────┘   EngineEvent (rtrb, 256)    └────────┬─────────┘
//!        │  meters / transport / status (atomics)        │
//!        └◄──────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use basedrop::{Owned, Shared};

use super::channel::{ChannelStrip, EqBand};
use super::command::{command_channel, EngineCommand};
use super::event::{event_channel, EngineEvent, EventSender};
use super::filter::FilterMode;
use super::gc::gc_handle;
use super::meter::{EngineAtomics, EngineStatus, MeterSnapshot};
use super::mixer::{CrossfaderCurve, MixBus};
use super::quiescence::QuiescenceBarrier;
use super::rack::EffectRack;
use crate::clock::{SampleClock, SyncMaster, TapResult, TransportSnapshot};
use crate::config::EngineConfig;
use crate::control::{
    mapping_cell, ChannelParam, ControlEvent, ControlRouter, DispatchOutcome, EffectControl,
    MappingCell, MappingTable, MixerParam, ParameterAccess, ParameterTarget, TransportParam,
};
use crate::effect::{BeatDivision, EffectKind, EffectParam, EffectSlot, EffectUnit};
use crate::error::{EngineError, EngineResult};
use crate::types::{ChannelId, CrossfaderAssign, StereoBuffer, MAX_BLOCK_SIZE};

/// BPM change per nudge trigger
pub const NUDGE_STEP_BPM: f64 = 0.1;

/// Everything a parameter write can touch
///
/// Kept apart from the queues and router so the router can borrow it
/// mutably while the engine holds the router.
struct EngineState {
    clock: SampleClock,
    mix_bus: MixBus,
    rack: EffectRack,
}

impl EngineState {
    fn strip_mut(&mut self, id: ChannelId) -> EngineResult<&mut ChannelStrip> {
        self.mix_bus
            .channel_mut(id)
            .ok_or(EngineError::UnknownChannel(id))
    }

    fn strip(&self, id: ChannelId) -> EngineResult<&ChannelStrip> {
        self.mix_bus.channel(id).ok_or(EngineError::UnknownChannel(id))
    }

    /// Apply a command that changes a parameter or a slot
    ///
    /// `Control` events are routed by the engine, not here.
    fn apply(&mut self, command: EngineCommand) -> EngineResult<()> {
        use EngineCommand::*;
        match command {
            SetTrim { channel, db } => self.strip_mut(channel)?.set_trim_db(db),
            SetEq { channel, band, db } => self.strip_mut(channel)?.set_eq_db(band, db),
            SetFilterMode { channel, mode } => self.strip_mut(channel)?.set_filter_mode(mode),
            SetFilterCutoff { channel, hz } => self.strip_mut(channel)?.set_filter_cutoff(hz),
            SetFilterResonance { channel, resonance } => {
                self.strip_mut(channel)?.set_filter_resonance(resonance)
            }
            SetFader { channel, position } => self.strip_mut(channel)?.set_fader(position),
            SetCue { channel, enabled } => self.strip_mut(channel)?.set_cue(enabled),
            SetMute { channel, muted } => self.strip_mut(channel)?.set_mute(muted),
            SetSolo { channel, solo } => self.strip_mut(channel)?.set_solo(solo),
            SetInputSource { channel, source } => self.strip_mut(channel)?.set_input_source(source),
            SetCrossfaderAssign { channel, assign } => {
                self.strip_mut(channel)?.set_crossfader_assign(assign)
            }
            SetChannelBpm { channel, bpm } => {
                self.strip(channel)?;
                self.clock.set_channel_bpm(channel, bpm)?;
            }

            SetCrossfader { position } => self.mix_bus.set_crossfader(position),
            SetCrossfaderCurve { curve } => self.mix_bus.set_curve(curve),
            SetMaster { position } => self.mix_bus.set_master(position),
            SetBooth { gain } => self.mix_bus.set_booth(gain),
            SetBalance { balance } => self.mix_bus.set_balance(balance),
            SetCueMix { mix } => self.mix_bus.set_cue_mix(mix),
            SetCueVolume { volume } => self.mix_bus.set_cue_volume(volume),

            InsertEffect { slot, unit } => self.rack.insert(slot, unit)?,
            RemoveEffect { slot } => self.rack.remove(slot)?,
            SetEffectEnabled { slot, enabled } => self.rack.set_enabled(slot, enabled)?,
            SetEffectParam { slot, param, value } => self.rack.set_param(slot, param, value)?,
            SetEffectDivision { slot, division } => self.rack.set_division(slot, division)?,

            SetBpm { bpm } => self.clock.set_bpm(bpm)?,
            NudgeBpm { delta } => self.clock.nudge_bpm(delta)?,
            TapTempo { timestamp } => {
                self.clock.tap_tempo(timestamp);
            }
            SetSyncMaster { master } => self.set_sync_master(master)?,

            Control(_) => {}
        }
        Ok(())
    }

    fn set_sync_master(&mut self, master: SyncMaster) -> EngineResult<()> {
        if let SyncMaster::Channel(id) = master {
            self.strip(id)?;
        }
        self.clock.set_sync_master(master);
        Ok(())
    }
}

impl ParameterAccess for EngineState {
    fn parameter(&self, target: ParameterTarget) -> Option<f32> {
        let switch = |on: bool| if on { 1.0 } else { 0.0 };
        match target {
            ParameterTarget::Channel { channel, param } => {
                let strip = self.mix_bus.channel(channel)?;
                Some(match param {
                    ChannelParam::Trim => strip.trim_db(),
                    ChannelParam::EqLow => strip.eq_db(EqBand::Low),
                    ChannelParam::EqMid => strip.eq_db(EqBand::Mid),
                    ChannelParam::EqHigh => strip.eq_db(EqBand::High),
                    ChannelParam::FilterCutoff => strip.filter_cutoff(),
                    ChannelParam::FilterResonance => strip.filter_resonance(),
                    ChannelParam::FilterMode => strip.filter_mode().to_normalized(),
                    ChannelParam::Fader => strip.fader(),
                    ChannelParam::Cue => switch(strip.cue()),
                    ChannelParam::Mute => switch(strip.mute()),
                    ChannelParam::Solo => switch(strip.solo()),
                    ChannelParam::CrossfaderAssign => strip.crossfader_assign().to_normalized(),
                    ChannelParam::Sync => {
                        switch(self.clock.sync_master() == SyncMaster::Channel(channel))
                    }
                })
            }
            ParameterTarget::Mixer(param) => Some(match param {
                MixerParam::Crossfader => self.mix_bus.crossfader(),
                MixerParam::CrossfaderCurve => self.mix_bus.curve().to_normalized(),
                MixerParam::Master => self.mix_bus.master(),
                MixerParam::Booth => self.mix_bus.booth(),
                MixerParam::Balance => self.mix_bus.balance(),
                MixerParam::CueMix => self.mix_bus.cue_mix(),
                MixerParam::CueVolume => self.mix_bus.cue_volume(),
            }),
            ParameterTarget::Effect { slot, control } => {
                let unit = self.rack.unit(slot)?;
                match control {
                    EffectControl::Enabled => Some(switch(unit.is_enabled())),
                    EffectControl::Param(param) => unit.param(param),
                }
            }
            ParameterTarget::Transport(TransportParam::Bpm) => Some(self.clock.internal_bpm() as f32),
            ParameterTarget::Transport(_) => None,
        }
    }

    fn set_parameter(&mut self, target: ParameterTarget, value: f32) -> EngineResult<()> {
        let on = value >= 0.5;
        match target {
            ParameterTarget::Channel { channel, param } => {
                let strip = self.strip_mut(channel)?;
                match param {
                    ChannelParam::Trim => strip.set_trim_db(value),
                    ChannelParam::EqLow => strip.set_eq_db(EqBand::Low, value),
                    ChannelParam::EqMid => strip.set_eq_db(EqBand::Mid, value),
                    ChannelParam::EqHigh => strip.set_eq_db(EqBand::High, value),
                    ChannelParam::FilterCutoff => strip.set_filter_cutoff(value),
                    ChannelParam::FilterResonance => strip.set_filter_resonance(value),
                    ChannelParam::FilterMode => strip.set_filter_mode(FilterMode::from_normalized(value)),
                    ChannelParam::Fader => strip.set_fader(value),
                    ChannelParam::Cue => strip.set_cue(on),
                    ChannelParam::Mute => strip.set_mute(on),
                    ChannelParam::Solo => strip.set_solo(on),
                    ChannelParam::CrossfaderAssign => {
                        strip.set_crossfader_assign(CrossfaderAssign::from_normalized(value))
                    }
                    ChannelParam::Sync => {
                        if on {
                            self.clock.set_sync_master(SyncMaster::Channel(channel));
                        }
                    }
                }
            }
            ParameterTarget::Mixer(param) => match param {
                MixerParam::Crossfader => self.mix_bus.set_crossfader(value),
                MixerParam::CrossfaderCurve => {
                    self.mix_bus.set_curve(CrossfaderCurve::from_normalized(value))
                }
                MixerParam::Master => self.mix_bus.set_master(value),
                MixerParam::Booth => self.mix_bus.set_booth(value),
                MixerParam::Balance => self.mix_bus.set_balance(value),
                MixerParam::CueMix => self.mix_bus.set_cue_mix(value),
                MixerParam::CueVolume => self.mix_bus.set_cue_volume(value),
            },
            ParameterTarget::Effect { slot, control } => match control {
                EffectControl::Enabled => self.rack.set_enabled(slot, on)?,
                EffectControl::Param(param) => self.rack.set_param(slot, param, value)?,
            },
            ParameterTarget::Transport(TransportParam::Bpm) => self.clock.set_bpm(value as f64)?,
            ParameterTarget::Transport(_) => {}
        }
        Ok(())
    }

    fn trigger(&mut self, target: ParameterTarget, timestamp: Duration) -> EngineResult<()> {
        match target {
            ParameterTarget::Transport(TransportParam::Tap) => {
                self.clock.tap_tempo(timestamp);
            }
            ParameterTarget::Transport(TransportParam::NudgeUp) => self.clock.nudge_bpm(NUDGE_STEP_BPM)?,
            ParameterTarget::Transport(TransportParam::NudgeDown) => {
                self.clock.nudge_bpm(-NUDGE_STEP_BPM)?
            }
            ParameterTarget::Transport(TransportParam::Internal) => {
                self.clock.set_sync_master(SyncMaster::Internal)
            }
            other => self.set_parameter(other, 1.0)?,
        }
        Ok(())
    }
}

/// The mixing engine; owned by the audio thread
pub struct AudioEngine {
    state: EngineState,
    router: ControlRouter,
    command_rx: rtrb::Consumer<EngineCommand>,
    events: EventSender,
    atomics: Arc<EngineAtomics>,
    barrier: Arc<QuiescenceBarrier>,
    /// Per-channel working buffers, allocated once at full block capacity
    channel_buffers: Vec<StereoBuffer>,
    silence: StereoBuffer,
    config: EngineConfig,
}

impl AudioEngine {
    /// Build the engine and the handle the control thread keeps
    ///
    /// Allocates every buffer the audio thread will use; call off the audio thread.
    pub fn new(config: EngineConfig) -> (Self, EngineHandle) {
        let config = config.sanitized();
        let (command_tx, command_rx) = command_channel();
        let (events, event_rx) = event_channel();
        let atomics = Arc::new(EngineAtomics::new(config.channels));
        let barrier = Arc::new(QuiescenceBarrier::new());
        let mappings = mapping_cell();

        let state = EngineState {
            clock: SampleClock::new(
                config.sample_rate,
                config.initial_bpm,
                Duration::from_millis(config.tap_window_ms),
            ),
            mix_bus: MixBus::new(&config),
            rack: EffectRack::new(config.channels, config.max_active_effects),
        };
        atomics.store_transport(&state.clock.snapshot());

        log::info!(
            "engine: {} channels at {} Hz, {} BPM, up to {} active effects",
            config.channels,
            config.sample_rate,
            config.initial_bpm,
            config.max_active_effects
        );

        let engine = Self {
            state,
            router: ControlRouter::new(Arc::clone(&mappings)),
            command_rx,
            events,
            atomics: Arc::clone(&atomics),
            barrier: Arc::clone(&barrier),
            channel_buffers: (0..config.channels)
                .map(|_| StereoBuffer::with_capacity(MAX_BLOCK_SIZE))
                .collect(),
            silence: StereoBuffer::with_capacity(MAX_BLOCK_SIZE),
            config,
        };

        let handle = EngineHandle {
            command_tx,
            event_rx,
            atomics,
            barrier,
            mappings,
            sample_rate: engine.config.sample_rate,
            channel_count: engine.config.channels,
            dirty: false,
            next_generation: 1,
        };

        (engine, handle)
    }

    // ── Audio thread ────────────────────────────────────────────────────

    /// Render one block
    ///
    /// `inputs[i]` is the decoded PCM for channel `i + 1`; missing inputs are
    /// silence. The block length is `master_out.len()` and must not exceed
    /// [`MAX_BLOCK_SIZE`]. Commands queued before the call are applied
    /// before any audio is produced.
    pub fn process(
        &mut self,
        inputs: &[StereoBuffer],
        master_out: &mut StereoBuffer,
        cue_out: &mut StereoBuffer,
    ) {
        let frames = master_out.len().min(MAX_BLOCK_SIZE);
        master_out.set_len_from_capacity(frames);

        self.router.refresh();
        self.process_commands();
        if let Some(epoch) = self.barrier.acknowledge(self.command_rx.is_empty()) {
            self.events.send(EngineEvent::QuiescenceReached { epoch });
        }

        let transport = self.state.clock.advance(frames);

        self.silence.set_len_from_capacity(frames);
        let EngineState { mix_bus, rack, .. } = &mut self.state;
        for (index, (strip, buffer)) in mix_bus
            .channels_mut()
            .iter_mut()
            .zip(self.channel_buffers.iter_mut())
            .enumerate()
        {
            let input = inputs.get(index).unwrap_or(&self.silence);
            strip.process(input, buffer);
            // Pad short inputs so every strip contributes a full block
            buffer.set_len_from_capacity(frames);
            if let Some(unit) = rack.channel_unit_mut(index) {
                unit.process(buffer, &transport);
            }
        }

        mix_bus.mix_block(&self.channel_buffers, master_out, cue_out);
        if let Some(unit) = rack.master_unit_mut() {
            unit.process(master_out, &transport);
        }

        self.publish(master_out, cue_out);
    }

    /// Drain and apply every queued command
    pub fn process_commands(&mut self) {
        while let Ok(command) = self.command_rx.pop() {
            let name = command.name();
            if let Err(error) = self.apply_command(command) {
                self.events.send(EngineEvent::CommandRejected { command: name, error });
            }
        }
    }

    /// Apply a single command immediately
    pub fn apply_command(&mut self, command: EngineCommand) -> EngineResult<()> {
        match command {
            EngineCommand::Control(event) => self.dispatch_control(&event).map(|_| ()),
            other => self.state.apply(other),
        }
    }

    /// Route a controller event through the active mapping table
    pub fn dispatch_control(&mut self, event: &ControlEvent) -> EngineResult<DispatchOutcome> {
        let outcome = self.router.dispatch(event, &mut self.state)?;
        if outcome == DispatchOutcome::Unmapped {
            self.events.send(EngineEvent::UnmappedControl {
                controller: event.controller,
                control: event.control,
            });
        }
        Ok(outcome)
    }

    fn publish(&self, master_out: &StereoBuffer, cue_out: &StereoBuffer) {
        for (index, strip) in self.state.mix_bus.channels().iter().enumerate() {
            self.atomics.store_channel(index, strip.level());
        }
        self.atomics.store_bus(master_out.peak(), cue_out.peak());
        self.atomics.store_transport(&self.state.clock.snapshot());
    }

    /// Report a status event from the audio I/O layer
    pub(crate) fn report(&mut self, event: EngineEvent) {
        self.events.send(event);
    }

    pub(crate) fn atomics(&self) -> &Arc<EngineAtomics> {
        &self.atomics
    }

    // ── Direct operations ───────────────────────────────────────────────

    /// The sanitized configuration the engine was built with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_bpm(&mut self, bpm: f64) -> EngineResult<()> {
        self.state.clock.set_bpm(bpm)
    }

    pub fn tap_tempo(&mut self, timestamp: Duration) -> TapResult {
        self.state.clock.tap_tempo(timestamp)
    }

    pub fn set_sync_master(&mut self, master: SyncMaster) -> EngineResult<()> {
        self.state.set_sync_master(master)
    }

    pub fn transport(&self) -> TransportSnapshot {
        self.state.clock.snapshot()
    }

    pub fn insert_effect(&mut self, slot: EffectSlot, unit: Owned<EffectUnit>) -> EngineResult<()> {
        self.state.rack.insert(slot, unit)
    }

    pub fn remove_effect(&mut self, slot: EffectSlot) -> EngineResult<()> {
        self.state.rack.remove(slot)
    }

    pub fn set_effect_enabled(&mut self, slot: EffectSlot, enabled: bool) -> EngineResult<()> {
        self.state.rack.set_enabled(slot, enabled)
    }

    pub fn set_effect_param(&mut self, slot: EffectSlot, param: EffectParam, value: f32) -> EngineResult<()> {
        self.state.rack.set_param(slot, param, value)
    }

    pub fn effect(&self, slot: EffectSlot) -> Option<&EffectUnit> {
        self.state.rack.unit(slot)
    }

    pub fn effect_rack(&self) -> &EffectRack {
        &self.state.rack
    }

    pub fn channel(&self, id: ChannelId) -> Option<&ChannelStrip> {
        self.state.mix_bus.channel(id)
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut ChannelStrip> {
        self.state.mix_bus.channel_mut(id)
    }

    pub fn mix_bus(&self) -> &MixBus {
        &self.state.mix_bus
    }

    pub fn mix_bus_mut(&mut self) -> &mut MixBus {
        &mut self.state.mix_bus
    }

    /// Current value of a mappable parameter
    pub fn parameter(&self, target: ParameterTarget) -> Option<f32> {
        self.state.parameter(target)
    }

    pub fn mapping_generation(&self) -> u64 {
        self.router.generation()
    }

    /// Clear filter and effect state without touching parameters
    pub fn reset(&mut self) {
        self.state.mix_bus.reset();
        for index in 0..self.channel_buffers.len() {
            if let Some(unit) = self.state.rack.channel_unit_mut(index) {
                unit.reset();
            }
        }
        if let Some(unit) = self.state.rack.master_unit_mut() {
            unit.reset();
        }
    }
}

/// Control-side handle to a running engine
///
/// Single producer of engine commands: MIDI, UI and scripting all go
/// through the one handle owned by the control thread.
pub struct EngineHandle {
    command_tx: rtrb::Producer<EngineCommand>,
    event_rx: rtrb::Consumer<EngineEvent>,
    atomics: Arc<EngineAtomics>,
    barrier: Arc<QuiescenceBarrier>,
    mappings: MappingCell,
    sample_rate: u32,
    channel_count: usize,
    /// Commands sent since the last quiescence request
    dirty: bool,
    next_generation: u64,
}

impl EngineHandle {
    /// Queue a command for the next block boundary
    pub fn send(&mut self, command: EngineCommand) -> EngineResult<()> {
        self.command_tx
            .push(command)
            .map_err(|_| EngineError::QueueFull)?;
        self.dirty = true;
        Ok(())
    }

    pub fn set_fader(&mut self, channel: ChannelId, position: f32) -> EngineResult<()> {
        self.send(EngineCommand::SetFader { channel, position })
    }

    pub fn set_eq(&mut self, channel: ChannelId, band: EqBand, db: f32) -> EngineResult<()> {
        self.send(EngineCommand::SetEq { channel, band, db })
    }

    pub fn set_mute(&mut self, channel: ChannelId, muted: bool) -> EngineResult<()> {
        self.send(EngineCommand::SetMute { channel, muted })
    }

    pub fn set_crossfader(&mut self, position: f32) -> EngineResult<()> {
        self.send(EngineCommand::SetCrossfader { position })
    }

    /// Validated here so a bad value is reported to the caller, not just logged
    pub fn set_bpm(&mut self, bpm: f64) -> EngineResult<()> {
        crate::clock::validate_bpm(bpm)?;
        self.send(EngineCommand::SetBpm { bpm })
    }

    pub fn tap_tempo(&mut self, timestamp: Duration) -> EngineResult<()> {
        self.send(EngineCommand::TapTempo { timestamp })
    }

    pub fn set_sync_master(&mut self, master: SyncMaster) -> EngineResult<()> {
        if let SyncMaster::Channel(id) = master {
            self.check_channel(id)?;
        }
        self.send(EngineCommand::SetSyncMaster { master })
    }

    /// Build an effect unit here and move it into `slot`
    ///
    /// The unit is allocated on the calling thread. Capacity is checked on
    /// the audio thread; a rejection comes back as a `CommandRejected` event.
    pub fn insert_effect(&mut self, slot: EffectSlot, kind: EffectKind) -> EngineResult<()> {
        if let EffectSlot::Channel(id) = slot {
            self.check_channel(id)?;
        }
        let unit = Owned::new(&gc_handle(), EffectUnit::new(kind, self.sample_rate));
        self.send(EngineCommand::InsertEffect { slot, unit })
    }

    pub fn remove_effect(&mut self, slot: EffectSlot) -> EngineResult<()> {
        self.send(EngineCommand::RemoveEffect { slot })
    }

    pub fn set_effect_enabled(&mut self, slot: EffectSlot, enabled: bool) -> EngineResult<()> {
        self.send(EngineCommand::SetEffectEnabled { slot, enabled })
    }

    pub fn set_effect_param(&mut self, slot: EffectSlot, param: EffectParam, value: f32) -> EngineResult<()> {
        self.send(EngineCommand::SetEffectParam { slot, param, value })
    }

    pub fn set_effect_division(&mut self, slot: EffectSlot, division: BeatDivision) -> EngineResult<()> {
        self.send(EngineCommand::SetEffectDivision { slot, division })
    }

    /// Forward a controller event to the router on the audio thread
    pub fn control(&mut self, event: ControlEvent) -> EngineResult<()> {
        self.send(EngineCommand::Control(event))
    }

    fn check_channel(&self, id: ChannelId) -> EngineResult<()> {
        match id.index() {
            Some(index) if index < self.channel_count => Ok(()),
            _ => Err(EngineError::UnknownChannel(id)),
        }
    }

    // ── Quiescence and mapping swaps ────────────────────────────────────

    /// Ask the audio thread to confirm an idle block boundary
    pub fn request_quiescence(&mut self) -> u64 {
        self.dirty = false;
        self.barrier.request()
    }

    /// True when nothing has been sent since the last acknowledged request
    pub fn is_quiescent(&self) -> bool {
        !self.dirty && self.barrier.is_quiescent()
    }

    /// Install a new mapping table
    ///
    /// Only allowed while the engine is quiescent. With commands in flight
    /// this requests quiescence and fails with [`EngineError::Busy`]; retry
    /// once the audio thread has processed a block. The old table is freed
    /// by the collector thread after the router lets go of it.
    pub fn replace_mappings(&mut self, mut table: MappingTable) -> EngineResult<()> {
        if self.dirty {
            self.request_quiescence();
            return Err(EngineError::Busy);
        }
        if !self.barrier.is_quiescent() {
            return Err(EngineError::Busy);
        }

        table.set_generation(self.next_generation);
        self.next_generation += 1;
        log::info!(
            "control: installing mapping table (generation {}, {} mappings)",
            table.generation(),
            table.len()
        );
        self.mappings.set(Shared::new(&gc_handle(), table));
        Ok(())
    }

    // ── Observers ───────────────────────────────────────────────────────

    /// Pop every pending event, oldest first
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::with_capacity(self.event_rx.slots());
        while let Ok(event) = self.event_rx.pop() {
            events.push(event);
        }
        events
    }

    /// Drain events and log each through the `log` facade
    pub fn log_events(&mut self) -> usize {
        let events = self.drain_events();
        for event in &events {
            event.log();
        }
        events.len()
    }

    pub fn meter_snapshot(&self) -> MeterSnapshot {
        self.atomics.meters()
    }

    pub fn transport_snapshot(&self) -> TransportSnapshot {
        self.atomics.transport()
    }

    pub fn status(&self) -> EngineStatus {
        self.atomics.status()
    }

    pub fn overrun_count(&self) -> u64 {
        self.atomics.overrun_count()
    }

    pub fn atomics(&self) -> Arc<EngineAtomics> {
        Arc::clone(&self.atomics)
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ControlKey, ControlNumber, MappingEntry, Transform};
    use crate::types::StereoSample;

    const BLOCK: usize = 256;

    fn engine() -> (AudioEngine, EngineHandle) {
        AudioEngine::new(EngineConfig::default())
    }

    fn constant(value: f32) -> StereoBuffer {
        StereoBuffer::from_samples(vec![StereoSample::mono(value); BLOCK])
    }

    fn run(engine: &mut AudioEngine, inputs: &[StereoBuffer]) -> (StereoBuffer, StereoBuffer) {
        let mut master = StereoBuffer::silence(BLOCK);
        let mut cue = StereoBuffer::silence(BLOCK);
        engine.process(inputs, &mut master, &mut cue);
        (master, cue)
    }

    #[test]
    fn test_commands_apply_at_block_boundary() {
        let (mut engine, mut handle) = engine();
        handle.set_fader(ChannelId(2), 0.25).unwrap();
        assert_eq!(engine.channel(ChannelId(2)).unwrap().fader(), 1.0);

        run(&mut engine, &[]);
        assert_eq!(engine.channel(ChannelId(2)).unwrap().fader(), 0.25);
    }

    #[test]
    fn test_unknown_channel_is_reported() {
        let (mut engine, mut handle) = engine();
        handle.set_fader(ChannelId(7), 0.5).unwrap();
        run(&mut engine, &[]);

        let events = handle.drain_events();
        assert!(events.contains(&EngineEvent::CommandRejected {
            command: "SetFader",
            error: EngineError::UnknownChannel(ChannelId(7)),
        }));
    }

    #[test]
    fn test_invalid_bpm_rejected_at_handle() {
        let (mut engine, mut handle) = engine();
        assert_eq!(handle.set_bpm(0.0), Err(EngineError::InvalidBpm(0.0)));
        assert_eq!(engine.set_bpm(-5.0), Err(EngineError::InvalidBpm(-5.0)));
        assert_eq!(engine.transport().bpm, 128.0);
    }

    #[test]
    fn test_thru_channels_sum_into_master() {
        let (mut engine, _handle) = engine();
        let inputs = [constant(0.1), constant(0.2)];
        let (master, cue) = run(&mut engine, &inputs);
        assert!((master[BLOCK - 1].left - 0.3).abs() < 1e-5);
        assert!(cue.is_silent());
    }

    #[test]
    fn test_meters_published() {
        let (mut engine, handle) = engine();
        run(&mut engine, &[constant(0.5)]);
        let meters = handle.meter_snapshot();
        assert!((meters.channels()[0].peak - 0.5).abs() < 1e-5);
        assert_eq!(meters.channels()[1].peak, 0.0);
        assert!(meters.master_peak > 0.49);
        assert_eq!(handle.transport_snapshot().sample_position, BLOCK as u64);
    }

    #[test]
    fn test_control_event_routed_through_mapping() {
        let (mut engine, mut handle) = engine();
        let mut table = MappingTable::new();
        let key = ControlKey { controller: 3, control: ControlNumber::note(0, 36) };
        table
            .insert(
                key,
                MappingEntry {
                    target: ParameterTarget::parse("channel.1.mute").unwrap(),
                    transform: Transform::Toggle,
                },
                4,
            )
            .unwrap();
        handle.replace_mappings(table).unwrap();

        handle
            .control(ControlEvent {
                controller: 3,
                control: ControlNumber::note(0, 36),
                value: 127,
                timestamp: Duration::ZERO,
            })
            .unwrap();
        run(&mut engine, &[]);
        assert!(engine.channel(ChannelId(1)).unwrap().mute());
        assert_eq!(engine.mapping_generation(), 1);
    }

    #[test]
    fn test_unmapped_control_reported() {
        let (mut engine, mut handle) = engine();
        let event = ControlEvent {
            controller: 1,
            control: ControlNumber::cc(0, 99),
            value: 10,
            timestamp: Duration::ZERO,
        };
        assert_eq!(engine.dispatch_control(&event).unwrap(), DispatchOutcome::Unmapped);
        assert!(handle.drain_events().contains(&EngineEvent::UnmappedControl {
            controller: 1,
            control: ControlNumber::cc(0, 99),
        }));
    }

    #[test]
    fn test_insert_effect_through_handle() {
        let (mut engine, mut handle) = engine();
        handle.insert_effect(EffectSlot::Master, EffectKind::Reverb).unwrap();
        run(&mut engine, &[]);
        assert!(engine.effect(EffectSlot::Master).unwrap().is_enabled());
        assert_eq!(
            handle.insert_effect(EffectSlot::Channel(ChannelId(9)), EffectKind::Delay),
            Err(EngineError::UnknownChannel(ChannelId(9)))
        );
    }

    #[test]
    fn test_parameter_reads_engine_state() {
        let (mut engine, _handle) = engine();
        engine.channel_mut(ChannelId(1)).unwrap().set_fader(0.4);
        let fader = ParameterTarget::parse("channel.1.fader").unwrap();
        assert_eq!(engine.parameter(fader), Some(0.4));
        let missing = ParameterTarget::parse("effect.1.mix").unwrap();
        assert_eq!(engine.parameter(missing), None);
    }
}
