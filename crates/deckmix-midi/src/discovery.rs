//! Device discovery - background polling for audio outputs and MIDI ports
//!
//! ```text
//! Control Thread                 Discovery Thread
//!     │ DiscoveryCommand (flume)       │
//!     │───────────────────────────────►│ poll sources every interval
//!     │                                │ diff against last snapshot
//!     │◄───────────────────────────────│
//!       DiscoveryEvent (flume)
//! ```
//!
//! Enumeration can block for a long time on some hosts (ALSA probing,
//! JACK server startup), so it never runs on the audio or control thread.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use deckmix_core::device::DeviceDescriptor;
use flume::{Receiver, RecvTimeoutError, Sender};

use crate::detection::list_midi_devices;

/// Default polling interval
pub const DISCOVERY_INTERVAL: Duration = Duration::from_secs(2);

/// Produces the current device list
pub type DeviceSource = Box<dyn Fn() -> Vec<DeviceDescriptor> + Send>;

#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryEvent {
    Added(DeviceDescriptor),
    Removed(DeviceDescriptor),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryCommand {
    /// Poll now instead of waiting for the next interval
    Refresh,
    Shutdown,
}

/// Handle to the discovery thread; shuts it down on drop
pub struct DeviceDiscovery {
    command_tx: Sender<DiscoveryCommand>,
    event_rx: Receiver<DiscoveryEvent>,
    thread_handle: Option<JoinHandle<()>>,
}

impl DeviceDiscovery {
    /// Spawn with the standard sources: cpal outputs and midir inputs
    pub fn spawn(interval: Duration) -> std::io::Result<Self> {
        Self::spawn_with_source(interval, Box::new(default_devices))
    }

    pub fn spawn_with_source(interval: Duration, source: DeviceSource) -> std::io::Result<Self> {
        let (command_tx, command_rx) = flume::unbounded();
        let (event_tx, event_rx) = flume::unbounded();

        let thread_handle = thread::Builder::new()
            .name("deckmix-discovery".to_string())
            .spawn(move || discovery_thread_main(interval, source, command_rx, event_tx))?;

        Ok(Self {
            command_tx,
            event_rx,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn refresh(&self) {
        let _ = self.command_tx.send(DiscoveryCommand::Refresh);
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv(&self) -> Option<DiscoveryEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Wait for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<DiscoveryEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    pub fn drain(&self) -> impl Iterator<Item = DiscoveryEvent> + '_ {
        self.event_rx.try_iter()
    }
}

impl Drop for DeviceDiscovery {
    fn drop(&mut self) {
        let _ = self.command_tx.send(DiscoveryCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Audio outputs followed by MIDI inputs; failures yield an empty part
pub fn default_devices() -> Vec<DeviceDescriptor> {
    let mut devices = deckmix_core::audio::available_output_devices();
    match list_midi_devices() {
        Ok(midi) => devices.extend(midi),
        Err(e) => log::warn!("discovery: MIDI enumeration failed: {}", e),
    }
    devices
}

/// Changes between two snapshots, keyed by kind and device id
pub fn diff_devices(previous: &[DeviceDescriptor], current: &[DeviceDescriptor]) -> Vec<DiscoveryEvent> {
    let same = |a: &DeviceDescriptor, b: &DeviceDescriptor| a.kind == b.kind && a.device_id == b.device_id;

    let removed = previous
        .iter()
        .filter(|old| !current.iter().any(|new| same(old, new)))
        .cloned()
        .map(DiscoveryEvent::Removed);
    let added = current
        .iter()
        .filter(|new| !previous.iter().any(|old| same(old, new)))
        .cloned()
        .map(DiscoveryEvent::Added);

    removed.chain(added).collect()
}

fn discovery_thread_main(
    interval: Duration,
    source: DeviceSource,
    command_rx: Receiver<DiscoveryCommand>,
    event_tx: Sender<DiscoveryEvent>,
) {
    log::info!("discovery: thread started ({:?} interval)", interval);
    let mut known: Vec<DeviceDescriptor> = Vec::new();

    loop {
        let current = source();
        for event in diff_devices(&known, &current) {
            match &event {
                DiscoveryEvent::Added(device) => log::info!("discovery: + {}", device),
                DiscoveryEvent::Removed(device) => log::info!("discovery: - {}", device),
            }
            if event_tx.send(event).is_err() {
                return;
            }
        }
        known = current;

        match command_rx.recv_timeout(interval) {
            Ok(DiscoveryCommand::Refresh) | Err(RecvTimeoutError::Timeout) => {}
            Ok(DiscoveryCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    log::info!("discovery: thread stopped");
}
