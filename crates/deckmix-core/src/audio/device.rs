//! Audio output enumeration through cpal
//!
//! Devices are listed from every available host so ALSA hardware devices and
//! the JACK server show up side by side. Backend names resolve onto hosts:
//! PulseAudio has no cpal host of its own and is reached through ALSA's
//! pulse/pipewire plugin.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Host, HostId};

use super::config::{AudioBackend, DeviceId};
use super::error::{AudioError, AudioResult};
use crate::device::{DeviceCapabilities, DeviceDescriptor, DeviceKind};

/// Rates reported as capabilities when inside a supported range
const COMMON_RATES: [u32; 6] = [44_100, 48_000, 88_200, 96_000, 176_400, 192_000];

/// Human-readable name for a host ID
fn host_name(host_id: HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

fn host_by_name(name: &str) -> Option<Host> {
    cpal::available_hosts()
        .into_iter()
        .find(|id| host_name(*id).eq_ignore_ascii_case(name))
        .and_then(|id| cpal::host_from_id(id).ok())
}

/// Open the cpal host for a backend, falling back to the default host
pub fn host_for_backend(backend: AudioBackend) -> Host {
    let wanted = match backend {
        AudioBackend::Default => None,
        AudioBackend::PulseAudio | AudioBackend::Alsa => Some("ALSA"),
        AudioBackend::Jack => Some("JACK"),
    };
    match wanted.and_then(host_by_name) {
        Some(host) => host,
        None => {
            if let Some(name) = wanted {
                log::warn!("audio: {} host not available, using the default host", name);
            }
            cpal::default_host()
        }
    }
}

/// Describe every output device on every host
pub fn list_output_devices() -> AudioResult<Vec<DeviceDescriptor>> {
    let mut devices = Vec::new();

    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("audio: could not initialize host {:?}: {}", host_id, e);
                continue;
            }
        };
        let host_label = host_name(host_id);
        let default_name = host
            .default_output_device()
            .and_then(|d: cpal::Device| d.name().ok());

        let outputs = match host.output_devices() {
            Ok(d) => d,
            Err(e) => {
                log::debug!("audio: could not enumerate devices for {:?}: {}", host_id, e);
                continue;
            }
        };

        for device in outputs {
            let Ok(name) = device.name() else { continue };
            let Ok(configs) = device.supported_output_configs() else { continue };

            let mut capabilities = DeviceCapabilities {
                is_default: default_name.as_ref() == Some(&name),
                ..Default::default()
            };
            for config in configs {
                capabilities.output_channels = capabilities.output_channels.max(config.channels());
                for rate in COMMON_RATES {
                    if (config.min_sample_rate().0..=config.max_sample_rate().0).contains(&rate)
                        && !capabilities.sample_rates.contains(&rate)
                    {
                        capabilities.sample_rates.push(rate);
                    }
                }
            }
            if capabilities.output_channels == 0 {
                continue;
            }
            capabilities.sample_rates.sort_unstable();

            let id = DeviceId::with_host(&name, &host_label);
            devices.push(
                DeviceDescriptor::new(id.display_label(), DeviceKind::Audio, name)
                    .with_capabilities(capabilities),
            );
        }
    }

    if devices.is_empty() {
        return Err(AudioError::NoDevices);
    }

    // Default devices first, then by id
    devices.sort_by(|a, b| {
        b.capabilities
            .is_default
            .cmp(&a.capabilities.is_default)
            .then_with(|| a.device_id.cmp(&b.device_id))
    });
    log::info!("audio: found {} output devices", devices.len());
    Ok(devices)
}

/// Output devices, or an empty list with a warning
pub fn available_output_devices() -> Vec<DeviceDescriptor> {
    list_output_devices().unwrap_or_else(|e| {
        log::warn!("audio: failed to enumerate devices: {}", e);
        Vec::new()
    })
}

/// Resolve a configured device on `host`, or that host's default output
pub fn find_output_device(host: &Host, id: Option<&DeviceId>) -> AudioResult<cpal::Device> {
    let Some(id) = id else {
        return host
            .default_output_device()
            .ok_or_else(|| AudioError::NoDefaultDevice(format!("{:?} has no default output", host.id())));
    };

    // An explicit host in the id wins over the configured backend
    let explicit = id.host.as_deref().and_then(host_by_name);
    let host = explicit.as_ref().unwrap_or(host);
    host.output_devices()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .find(|d: &cpal::Device| d.name().ok().as_ref() == Some(&id.name))
        .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()))
}
