//! Control-thread side of a running session
//!
//! Everything here runs off the audio thread: forwarding controller events
//! into the engine queue, installing mapping tables behind the quiescence
//! barrier and turning meter snapshots into log lines.

use std::fmt::Write as _;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use deckmix_core::control::{ControlEvent, MappingTable};
use deckmix_core::engine::{EngineHandle, MeterSnapshot};
use deckmix_core::EngineError;

/// How long to keep retrying a mapping swap while the engine is busy
pub const MAPPING_SWAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Push controller events into the engine; returns how many were queued
///
/// A full queue drops the rest of the batch: stale controller positions are
/// worth less than a stalled control thread.
pub fn forward_events(events: impl IntoIterator<Item = ControlEvent>, handle: &mut EngineHandle) -> usize {
    let mut queued = 0;
    for event in events {
        match handle.control(event) {
            Ok(()) => queued += 1,
            Err(EngineError::QueueFull) => {
                log::warn!("session: command queue full, dropping controller input");
                break;
            }
            Err(e) => log::warn!("session: controller event rejected: {}", e),
        }
    }
    queued
}

/// Install a mapping table, waiting for the audio thread to go quiescent
pub fn install_mappings(handle: &mut EngineHandle, table: &MappingTable, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        match handle.replace_mappings(table.clone()) {
            Ok(()) => return Ok(()),
            Err(EngineError::Busy) if Instant::now() < deadline => {
                thread::sleep(Duration::from_millis(2));
            }
            Err(EngineError::Busy) => bail!("engine did not reach quiescence within {:?}", timeout),
            Err(e) => return Err(e.into()),
        }
    }
}

fn level_db(level: f32) -> f32 {
    if level <= 1e-5 {
        f32::NEG_INFINITY
    } else {
        20.0 * level.log10()
    }
}

fn push_level(line: &mut String, label: &str, level: f32) {
    let db = level_db(level);
    if db.is_finite() {
        let _ = write!(line, " {} {:.1}dB", label, db);
    } else {
        let _ = write!(line, " {} -inf", label);
    }
}

/// One-line summary of channel, master and cue peaks
pub fn format_meters(meters: &MeterSnapshot) -> String {
    let mut line = String::from("meters:");
    for (index, level) in meters.channels().iter().enumerate() {
        push_level(&mut line, &format!("ch{}", index + 1), level.peak);
    }
    push_level(&mut line, "master", meters.master_peak);
    push_level(&mut line, "cue", meters.cue_peak);
    line
}
