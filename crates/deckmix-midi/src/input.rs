//! MIDI input handling
//!
//! Receives raw MIDI bytes from the midir callback, parses them into
//! [`ControlEvent`]s and hands them to the control thread over a flume
//! channel. Mapping happens later, on the audio thread, in the engine's
//! control router.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use deckmix_core::control::{ControlEvent, ControlNumber};
use flume::{Sender, TrySendError};
use midir::MidiInputConnection;

use crate::connection::{MidiConnection, MidiConnectionError};

/// Raw MIDI input event (before mapping)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiInputEvent {
    /// Note On message
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Note Off message
    NoteOff { channel: u8, note: u8, velocity: u8 },
    /// Control Change message
    ControlChange { channel: u8, cc: u8, value: u8 },
}

impl MidiInputEvent {
    /// Parse raw MIDI bytes into an event
    ///
    /// MIDI message format:
    /// - Note Off: 0x8n nn vv (n=channel, nn=note, vv=velocity)
    /// - Note On: 0x9n nn vv
    /// - Control Change: 0xBn cc vv (cc=controller, vv=value)
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 3 {
            return None;
        }

        let status = data[0];
        let channel = status & 0x0F;
        // Data bytes are 7-bit; a set high bit means a malformed message
        let (number, value) = (data[1], data[2]);
        if number > 0x7F || value > 0x7F {
            return None;
        }

        match status & 0xF0 {
            0x80 => Some(Self::NoteOff { channel, note: number, velocity: value }),
            // Note On with velocity 0 is treated as Note Off
            0x90 if value == 0 => Some(Self::NoteOff { channel, note: number, velocity: 0 }),
            0x90 => Some(Self::NoteOn { channel, note: number, velocity: value }),
            0xB0 => Some(Self::ControlChange { channel, cc: number, value }),
            _ => None, // Pitch bend, aftertouch, sysex, clock
        }
    }

    /// Get the MIDI channel
    pub fn channel(&self) -> u8 {
        match self {
            Self::NoteOn { channel, .. } => *channel,
            Self::NoteOff { channel, .. } => *channel,
            Self::ControlChange { channel, .. } => *channel,
        }
    }

    /// The physical control this message came from
    pub fn control(&self) -> ControlNumber {
        match *self {
            Self::NoteOn { channel, note, .. } | Self::NoteOff { channel, note, .. } => {
                ControlNumber::note(channel, note)
            }
            Self::ControlChange { channel, cc, .. } => ControlNumber::cc(channel, cc),
        }
    }

    /// Value carried to the engine: velocity for Note On, 0 for Note Off, CC value
    pub fn value(&self) -> u8 {
        match self {
            Self::NoteOn { velocity, .. } => *velocity,
            Self::NoteOff { .. } => 0,
            Self::ControlChange { value, .. } => *value,
        }
    }

    pub fn to_control_event(&self, controller: u16, timestamp: Duration) -> ControlEvent {
        ControlEvent {
            controller,
            control: self.control(),
            value: self.value(),
            timestamp,
        }
    }
}

/// Parse bytes straight into a control event
pub fn parse_control_event(data: &[u8], controller: u16, timestamp: Duration) -> Option<ControlEvent> {
    MidiInputEvent::parse(data).map(|event| event.to_control_event(controller, timestamp))
}

/// An open MIDI input forwarding control events over flume
///
/// The connection closes when this is dropped.
pub struct MidiInputHandler {
    _connection: MidiInputConnection<()>,
    port_name: String,
    controller: u16,
    dropped: Arc<AtomicU64>,
}

impl MidiInputHandler {
    /// Connect to the first input port matching `port_match`
    ///
    /// Events are stamped relative to `epoch` so several controllers share
    /// one timeline (tap tempo compares timestamps). When the channel is
    /// full the event is dropped and counted; the midir thread never blocks.
    pub fn connect(
        port_match: &str,
        controller: u16,
        epoch: Instant,
        tx: Sender<ControlEvent>,
    ) -> Result<Self, MidiConnectionError> {
        let (midi_in, port, port_name) = MidiConnection::find_input_port(port_match)?;

        let dropped = Arc::new(AtomicU64::new(0));
        let dropped_in_callback = dropped.clone();

        let connection = midi_in
            .connect(
                &port,
                "deckmix-midi-input",
                move |_stamp, message, _| {
                    let Some(event) = parse_control_event(message, controller, epoch.elapsed()) else {
                        return;
                    };
                    match tx.try_send(event) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            dropped_in_callback.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(TrySendError::Disconnected(_)) => {}
                    }
                },
                (),
            )
            .map_err(|e| MidiConnectionError::ConnectionError(e.to_string()))?;

        log::info!("midi: controller {} connected on '{}'", controller, port_name);

        Ok(Self {
            _connection: connection,
            port_name,
            controller,
            dropped,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn controller(&self) -> u16 {
        self.controller
    }

    /// Events lost because the receiving side fell behind
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
