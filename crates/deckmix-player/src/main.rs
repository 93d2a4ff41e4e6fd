//! deckmix player - headless mixing host
//!
//! This is the main entry point. It:
//! 1. Opens the configured audio output and builds the engine at its rate
//! 2. Connects MIDI controllers and installs the mapping profile
//! 3. Forwards controller input and logs engine events and meters
//!
//! ## Command line flags
//!
//! - `--config <path>`: Config file (default: ~/.config/deckmix/config.yaml)
//! - `--profile <path>`: Mapping profile, overrides the config's
//! - `--list-devices`: Print audio and MIDI devices and exit
//! - `--seconds <n>`: Stop after n seconds instead of running until killed

mod config;
mod session;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use deckmix_core::audio::{open_output, AudioBridge};
use deckmix_core::config::EngineConfig;
use deckmix_core::engine::AudioEngine;
use deckmix_midi::{default_devices, DeviceDiscovery, DiscoveryEvent, MidiController, DISCOVERY_INTERVAL};

/// Control loop period
const POLL_INTERVAL: Duration = Duration::from_millis(5);
const METER_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    profile: Option<PathBuf>,
    list_devices: bool,
    seconds: Option<u64>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => parsed.config = Some(args.next().context("--config needs a path")?.into()),
            "--profile" => parsed.profile = Some(args.next().context("--profile needs a path")?.into()),
            "--list-devices" => parsed.list_devices = true,
            "--seconds" => {
                let value = args.next().context("--seconds needs a number")?;
                parsed.seconds = Some(value.parse().with_context(|| format!("invalid --seconds: {}", value))?);
            }
            other => anyhow::bail!("unknown argument: {}", other),
        }
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if args.list_devices {
        for device in default_devices() {
            println!("{}", device);
        }
        return Ok(());
    }

    log::info!("deckmix-player starting up");
    let mut config = config::load(args.config.as_deref())?;
    if let Some(profile) = args.profile {
        config.midi.profile = Some(profile);
    }

    // The engine runs at whatever rate the device settles on
    let plan = open_output(&config.audio).context("Failed to open audio output")?;
    let (engine, mut handle) = AudioEngine::new(EngineConfig {
        sample_rate: plan.sample_rate(),
        ..config.engine.clone()
    });
    let output = plan
        .start(AudioBridge::new(engine))
        .context("Failed to start audio stream")?;
    log::info!(
        "deckmix-player: {} channels at {}Hz, {:.1}ms output latency",
        handle.channel_count(),
        output.sample_rate(),
        output.latency_ms()
    );

    let midi = MidiController::new(&config.midi)?;
    if let Some(table) = midi.compile_profile(handle.channel_count())? {
        session::install_mappings(&mut handle, &table, session::MAPPING_SWAP_TIMEOUT)?;
    }

    let discovery = match DeviceDiscovery::spawn(DISCOVERY_INTERVAL) {
        Ok(discovery) => Some(discovery),
        Err(e) => {
            log::warn!("deckmix-player: device discovery unavailable: {}", e);
            None
        }
    };

    let started = Instant::now();
    let stop_after = args.seconds.map(Duration::from_secs);
    let mut last_meters = Instant::now();

    loop {
        session::forward_events(midi.drain(), &mut handle);
        handle.log_events();

        if let Some(discovery) = &discovery {
            for event in discovery.drain() {
                if let DiscoveryEvent::Removed(device) = event {
                    if midi.inputs().iter().any(|input| device.matches(input.port_name())) {
                        log::warn!("deckmix-player: controller '{}' disconnected", device.name);
                    }
                }
            }
        }

        if last_meters.elapsed() >= METER_INTERVAL {
            last_meters = Instant::now();
            let transport = handle.transport_snapshot();
            log::info!(
                "{} | {:.1} BPM beat {} ({:?}) | {:?}, {} overruns",
                session::format_meters(&handle.meter_snapshot()),
                transport.bpm,
                transport.beat_count,
                transport.sync_master,
                handle.status(),
                handle.overrun_count()
            );
            if midi.dropped_events() > 0 {
                log::warn!("deckmix-player: {} controller events dropped", midi.dropped_events());
            }
        }

        if stop_after.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    drop(output);
    log::info!("deckmix-player stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_args() {
        let parsed = args(&["--config", "a.yaml", "--seconds", "30", "--list-devices"]).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("a.yaml")));
        assert_eq!(parsed.seconds, Some(30));
        assert!(parsed.list_devices);
        assert!(parsed.profile.is_none());
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(args(&["--config"]).is_err());
        assert!(args(&["--seconds", "soon"]).is_err());
        assert!(args(&["--verbose"]).is_err());
    }
}
