//! MIDI controller support for deckmix
//!
//! This crate provides:
//! - MIDI device connection and input handling via midir
//! - Raw MIDI parsing into engine control events
//! - Controller family detection from port names
//! - YAML mapping profiles compiled into engine mapping tables
//! - Background device discovery
//!
//! # Architecture
//!
//! ```text
//! MIDI Device → midir callback → flume channel → control thread → EngineHandle::control
//! ```
//!
//! The midir callback never blocks: a full channel drops the event. Mapping
//! is resolved on the audio thread by the engine's control router.

mod connection;
mod detection;
mod discovery;
mod input;
mod profile;

pub use connection::{port_matches, MidiConnection, MidiConnectionError};
pub use detection::{describe_port, detect_controller, list_midi_devices, ControllerFamily, SUPPORTED_CONTROLLERS};
pub use discovery::{
    default_devices, diff_devices, DeviceDiscovery, DeviceSource, DiscoveryCommand, DiscoveryEvent,
    DISCOVERY_INTERVAL,
};
pub use input::{parse_control_event, MidiInputEvent, MidiInputHandler};
pub use profile::{default_profile_path, load_profile, save_profile, MappingProfile, MappingRecord};

use std::path::PathBuf;
use std::time::Instant;

use deckmix_core::control::{ControlEvent, MappingTable};
use deckmix_core::MappingError;
use flume::Receiver;
use serde::{Deserialize, Serialize};

/// Capacity of the callback → control thread channel
pub const MIDI_EVENT_CAPACITY: usize = 256;

/// MIDI section of the host configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    /// Port name patterns; the first matching port of each becomes
    /// controller 1, 2, ... in order
    pub ports: Vec<String>,
    /// Mapping profile to load at startup
    pub profile: Option<PathBuf>,
}

/// Error type for MIDI controller operations
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("Failed to load mapping profile: {0}")]
    ProfileError(#[from] anyhow::Error),

    #[error("MIDI connection error: {0}")]
    ConnectionError(#[from] MidiConnectionError),

    #[error("Invalid mapping profile: {0}")]
    MappingError(#[from] MappingError),

    #[error("No MIDI device found matching config")]
    NoDeviceFound,
}

/// MIDI controller manager
///
/// Owns the input connections and the receiving end of their event
/// channel. Poll it from the control thread and forward events to the
/// engine handle.
pub struct MidiController {
    /// Loaded profile, if one was configured
    profile: Option<MappingProfile>,
    event_rx: Receiver<ControlEvent>,
    inputs: Vec<MidiInputHandler>,
}

impl MidiController {
    /// Load the profile and connect every configured port
    ///
    /// Missing devices are logged and skipped; a controller with nothing
    /// connected still works (it just never yields events). A configured
    /// profile that fails to load is an error.
    pub fn new(config: &MidiConfig) -> Result<Self, MidiError> {
        let profile = config.profile.as_deref().map(load_profile).transpose()?;

        let (event_tx, event_rx) = flume::bounded(MIDI_EVENT_CAPACITY);
        let epoch = Instant::now();
        let mut inputs = Vec::new();

        for (index, pattern) in config.ports.iter().enumerate() {
            let controller = (index + 1) as u16;
            match MidiInputHandler::connect(pattern, controller, epoch, event_tx.clone()) {
                Ok(input) => {
                    if let Some(family) = detect_controller(input.port_name()) {
                        log::info!("midi: controller {} is a {}", controller, family.name);
                    }
                    inputs.push(input);
                }
                Err(e) => {
                    log::info!("midi: no device matching '{}': {}", pattern, e);
                }
            }
        }

        if inputs.is_empty() && !config.ports.is_empty() {
            log::info!("midi: no matching devices found, running without MIDI input");
        }

        Ok(Self {
            profile,
            event_rx,
            inputs,
        })
    }

    /// Connect a single port, for hosts that only need one controller
    pub fn connect(port_match: &str) -> Result<Self, MidiError> {
        let controller = Self::new(&MidiConfig {
            ports: vec![port_match.to_string()],
            profile: None,
        })?;
        if !controller.is_connected() {
            return Err(MidiError::NoDeviceFound);
        }
        Ok(controller)
    }

    /// Check if any MIDI device is connected
    pub fn is_connected(&self) -> bool {
        !self.inputs.is_empty()
    }

    pub fn inputs(&self) -> &[MidiInputHandler] {
        &self.inputs
    }

    pub fn profile(&self) -> Option<&MappingProfile> {
        self.profile.as_ref()
    }

    /// Resolve the loaded profile for a mixer with `channel_count` channels
    pub fn compile_profile(&self, channel_count: usize) -> Result<Option<MappingTable>, MidiError> {
        Ok(self
            .profile
            .as_ref()
            .map(|profile| profile.compile(channel_count))
            .transpose()?)
    }

    /// Get the event receiver for manual polling
    pub fn event_receiver(&self) -> Receiver<ControlEvent> {
        self.event_rx.clone()
    }

    /// Try to receive a pending event (non-blocking)
    pub fn try_recv(&self) -> Option<ControlEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Drain all pending events
    pub fn drain(&self) -> impl Iterator<Item = ControlEvent> + '_ {
        std::iter::from_fn(|| self.try_recv())
    }

    /// Events lost across all inputs because polling fell behind
    pub fn dropped_events(&self) -> u64 {
        self.inputs.iter().map(MidiInputHandler::dropped_events).sum()
    }
}
