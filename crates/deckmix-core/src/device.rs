//! Device descriptors shared by audio and MIDI discovery
//!
//! Discovery runs off the audio thread (cpal host enumeration here, midir
//! port listing in `deckmix-midi`) and produces plain [`DeviceDescriptor`]
//! values. Bluetooth and network devices have no transport of their own;
//! they exist so a host can list what it sees.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What kind of device a descriptor refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Audio,
    Midi,
    Bluetooth,
    Network,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Audio => "audio",
            Self::Midi => "midi",
            Self::Bluetooth => "bluetooth",
            Self::Network => "network",
        })
    }
}

/// What a device can do, as far as discovery could tell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceCapabilities {
    pub output_channels: u16,
    pub input_channels: u16,
    /// Common rates inside the supported ranges, ascending
    pub sample_rates: Vec<u32>,
    /// System default for its host
    pub is_default: bool,
    /// Controller family recognised from the port name (MIDI only)
    pub controller: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Stable identifier, e.g. "[ALSA] hw:0,0" or a MIDI port name
    pub device_id: String,
    pub kind: DeviceKind,
    pub name: String,
    pub capabilities: DeviceCapabilities,
}

impl DeviceDescriptor {
    pub fn new(device_id: impl Into<String>, kind: DeviceKind, name: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            kind,
            name: name.into(),
            capabilities: DeviceCapabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Case-insensitive match on name or id
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.name.to_lowercase().contains(&query) || self.device_id.to_lowercase().contains(&query)
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<9} {}", self.kind, self.device_id)?;
        let caps = &self.capabilities;
        if caps.output_channels > 0 {
            write!(f, " ({} out", caps.output_channels)?;
            if let (Some(min), Some(max)) = (caps.sample_rates.first(), caps.sample_rates.last()) {
                write!(f, ", {}-{} Hz", min, max)?;
            }
            f.write_str(")")?;
        }
        if let Some(controller) = &caps.controller {
            write!(f, " [{}]", controller)?;
        }
        if caps.is_default {
            f.write_str(" *")?;
        }
        Ok(())
    }
}

/// Descriptors of one kind
pub fn of_kind(devices: &[DeviceDescriptor], kind: DeviceKind) -> impl Iterator<Item = &DeviceDescriptor> {
    devices.iter().filter(move |device| device.kind == kind)
}
