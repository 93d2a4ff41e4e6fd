//! Controller family detection
//!
//! Recognises well-known DJ hardware from its MIDI port name so hosts can
//! show what is plugged in and pick a matching mapping profile.

use deckmix_core::device::{DeviceCapabilities, DeviceDescriptor, DeviceKind};

use crate::connection::{MidiConnection, MidiConnectionError};

/// A supported controller family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerFamily {
    /// Stable identifier, used in profiles
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Lower-case port name fragments that identify the family
    keywords: &'static [&'static str],
}

impl ControllerFamily {
    pub fn matches(&self, port_name: &str) -> bool {
        let name = port_name.to_lowercase();
        self.keywords.iter().any(|keyword| name.contains(keyword))
            || name.contains(&self.name.to_lowercase())
    }
}

/// Known controller families, most specific first
///
/// "traktor" precedes "native instruments" so Traktor hardware reports as
/// such rather than as a generic NI device.
pub const SUPPORTED_CONTROLLERS: &[ControllerFamily] = &[
    ControllerFamily { id: "pioneer_ddj", name: "Pioneer DDJ Series", keywords: &["ddj", "pioneer ddj"] },
    ControllerFamily { id: "pioneer_cdj", name: "Pioneer CDJ Series", keywords: &["cdj", "xdj"] },
    ControllerFamily { id: "pioneer_djm", name: "Pioneer DJM Mixers", keywords: &["djm"] },
    ControllerFamily { id: "numark", name: "Numark Controllers", keywords: &["numark", "mixtrack"] },
    ControllerFamily { id: "reloop", name: "Reloop Controllers", keywords: &["reloop"] },
    ControllerFamily { id: "traktor", name: "Native Instruments Traktor", keywords: &["traktor", "kontrol s"] },
    ControllerFamily { id: "denon", name: "Denon DJ Controllers", keywords: &["denon", "mc7000", "prime"] },
    ControllerFamily { id: "rane", name: "Rane Seventy Series", keywords: &["rane"] },
    ControllerFamily { id: "xone", name: "Allen & Heath Xone", keywords: &["xone"] },
    ControllerFamily { id: "akai", name: "Akai Professional", keywords: &["akai", "apc", "mpk"] },
    ControllerFamily { id: "technics", name: "Technics SL-1200", keywords: &["technics", "sl-1200"] },
    ControllerFamily { id: "stanton", name: "Stanton Turntables", keywords: &["stanton"] },
    ControllerFamily { id: "vestax", name: "Vestax Controllers", keywords: &["vestax", "vci"] },
    ControllerFamily { id: "korg", name: "Korg Instruments", keywords: &["korg", "nanokontrol"] },
    ControllerFamily { id: "roland", name: "Roland Devices", keywords: &["roland", "dj-202", "dj-505"] },
    ControllerFamily { id: "yamaha", name: "Yamaha Instruments", keywords: &["yamaha"] },
    ControllerFamily {
        id: "native_instruments",
        name: "Native Instruments",
        keywords: &["native instruments", "maschine"],
    },
];

/// Identify the controller family of a port, if known
pub fn detect_controller(port_name: &str) -> Option<&'static ControllerFamily> {
    SUPPORTED_CONTROLLERS
        .iter()
        .find(|family| family.matches(port_name))
}

/// A descriptor for a MIDI input port
pub fn describe_port(port_name: &str) -> DeviceDescriptor {
    let controller = detect_controller(port_name).map(|family| family.name.to_string());
    DeviceDescriptor::new(port_name, DeviceKind::Midi, port_name).with_capabilities(DeviceCapabilities {
        input_channels: 16,
        controller,
        ..Default::default()
    })
}

/// Describe every MIDI input port currently visible
pub fn list_midi_devices() -> Result<Vec<DeviceDescriptor>, MidiConnectionError> {
    let ports = MidiConnection::list_input_ports()?;
    let devices: Vec<_> = ports.iter().map(|port| describe_port(port)).collect();

    let recognised = devices
        .iter()
        .filter(|device| device.capabilities.controller.is_some())
        .count();
    log::info!("midi: {} input port(s), {} recognised controller(s)", devices.len(), recognised);

    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_pioneer_families() {
        assert_eq!(detect_controller("DDJ-FLX4 MIDI 1").map(|f| f.id), Some("pioneer_ddj"));
        assert_eq!(detect_controller("CDJ-3000 [hw:2,0,0]").map(|f| f.id), Some("pioneer_cdj"));
        assert_eq!(detect_controller("DJM-900NXS2").map(|f| f.id), Some("pioneer_djm"));
    }

    #[test]
    fn test_traktor_before_native_instruments() {
        let family = detect_controller("Native Instruments Traktor Kontrol S4").unwrap();
        assert_eq!(family.id, "traktor");
        assert_eq!(detect_controller("Native Instruments Maschine").unwrap().id, "native_instruments");
    }

    #[test]
    fn test_unknown_port() {
        assert!(detect_controller("Midi Through Port-0").is_none());
        assert!(describe_port("Midi Through Port-0").capabilities.controller.is_none());
    }

    #[test]
    fn test_describe_port_is_midi() {
        let device = describe_port("Xone:K2 MIDI 1");
        assert_eq!(device.kind, DeviceKind::Midi);
        assert_eq!(device.capabilities.controller.as_deref(), Some("Allen & Heath Xone"));
    }

    #[test]
    fn test_every_family_matches_its_own_name() {
        for family in SUPPORTED_CONTROLLERS {
            assert!(detect_controller(family.name).is_some(), "{}", family.id);
        }
    }
}
