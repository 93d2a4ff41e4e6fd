//! Controller routing, soft takeover and mapping swaps

use std::time::Duration;

use deckmix_core::config::EngineConfig;
use deckmix_core::control::{
    ControlEvent, ControlKey, ControlNumber, MappingEntry, MappingTable, ParameterTarget, Transform,
};
use deckmix_core::effect::{BeatDivision, EffectKind, EffectSlot};
use deckmix_core::engine::{AudioEngine, EngineEvent, EngineHandle};
use deckmix_core::{ChannelId, EngineError, MappingError, StereoBuffer};

const CONTROLLER: u16 = 1;

fn fader_table() -> MappingTable {
    let mut table = MappingTable::new();
    table
        .insert(
            ControlKey { controller: CONTROLLER, control: ControlNumber::cc(0, 7) },
            MappingEntry {
                target: ParameterTarget::parse("channel.1.fader").unwrap(),
                transform: Transform::Linear,
            },
            4,
        )
        .unwrap();
    table
}

fn cc7(value: u8) -> ControlEvent {
    ControlEvent {
        controller: CONTROLLER,
        control: ControlNumber::cc(0, 7),
        value,
        timestamp: Duration::ZERO,
    }
}

fn step(engine: &mut AudioEngine) {
    let mut master = StereoBuffer::silence(64);
    let mut cue = StereoBuffer::silence(64);
    engine.process(&[], &mut master, &mut cue);
}

fn fader(engine: &AudioEngine) -> f32 {
    engine.channel(ChannelId(1)).unwrap().fader()
}

fn engine() -> (AudioEngine, EngineHandle) {
    // RUST_LOG=debug shows the engine's own logging
    let _ = env_logger::builder().is_test(true).try_init();
    AudioEngine::new(EngineConfig::default())
}

#[test]
fn test_soft_takeover_waits_for_crossing() {
    let (mut engine, mut handle) = engine();
    handle.replace_mappings(fader_table()).unwrap();
    handle.set_fader(ChannelId(1), 0.5).unwrap();
    step(&mut engine);
    assert_eq!(fader(&engine), 0.5);

    // Physical fader at 0.20, engine at 0.50
    handle.control(cc7(25)).unwrap();
    step(&mut engine);
    assert_eq!(fader(&engine), 0.5);

    handle.control(cc7(45)).unwrap();
    step(&mut engine);
    assert_eq!(fader(&engine), 0.5);

    // Moves past 0.50: picked up
    handle.control(cc7(70)).unwrap();
    step(&mut engine);
    assert!((fader(&engine) - 70.0 / 127.0).abs() < 1e-6);

    // Follows freely afterwards
    handle.control(cc7(10)).unwrap();
    step(&mut engine);
    assert!((fader(&engine) - 10.0 / 127.0).abs() < 1e-6);
}

#[test]
fn test_replace_mappings_busy_until_quiescent() {
    let (mut engine, mut handle) = engine();
    handle.set_fader(ChannelId(2), 0.3).unwrap();

    assert_eq!(handle.replace_mappings(fader_table()), Err(EngineError::Busy));
    assert_eq!(handle.replace_mappings(fader_table()), Err(EngineError::Busy));
    assert!(!handle.is_quiescent());

    step(&mut engine);
    assert!(handle.is_quiescent());
    assert!(handle
        .drain_events()
        .iter()
        .any(|event| matches!(event, EngineEvent::QuiescenceReached { .. })));

    handle.replace_mappings(fader_table()).unwrap();
    step(&mut engine);
    assert_eq!(engine.mapping_generation(), 1);
    assert_eq!(fader(&engine), 1.0);
    assert!((engine.channel(ChannelId(2)).unwrap().fader() - 0.3).abs() < 1e-6);
}

#[test]
fn test_each_swap_gets_a_new_generation() {
    let (mut engine, mut handle) = engine();
    handle.replace_mappings(fader_table()).unwrap();
    step(&mut engine);
    handle.replace_mappings(MappingTable::new()).unwrap();
    step(&mut engine);
    assert_eq!(engine.mapping_generation(), 2);
}

#[test]
fn test_unmapped_events_are_reported_and_dropped() {
    let (mut engine, mut handle) = engine();
    handle.replace_mappings(fader_table()).unwrap();
    handle
        .control(ControlEvent {
            controller: 9,
            control: ControlNumber::note(1, 60),
            value: 127,
            timestamp: Duration::ZERO,
        })
        .unwrap();
    step(&mut engine);

    let events = handle.drain_events();
    assert!(events.contains(&EngineEvent::UnmappedControl {
        controller: 9,
        control: ControlNumber::note(1, 60),
    }));
    assert_eq!(fader(&engine), 1.0);
}

#[test]
fn test_invalid_targets_rejected() {
    assert!(matches!(
        ParameterTarget::parse("channel.9.fader"),
        Err(MappingError::InvalidTarget(_))
    ));
    assert!(matches!(
        ParameterTarget::parse("deck.1.volume"),
        Err(MappingError::InvalidTarget(_))
    ));

    // Channel 4 exists in the parser but not in a two-channel engine
    let mut table = MappingTable::new();
    let err = table
        .insert(
            ControlKey { controller: CONTROLLER, control: ControlNumber::cc(0, 1) },
            MappingEntry {
                target: ParameterTarget::parse("channel.4.mute").unwrap(),
                transform: Transform::Toggle,
            },
            2,
        )
        .unwrap_err();
    assert!(matches!(err, MappingError::ChannelOutOfRange { .. }));
}

#[test]
fn test_tap_button_drives_tempo() {
    let (mut engine, mut handle) = engine();
    let mut table = MappingTable::new();
    let tap = ControlKey { controller: CONTROLLER, control: ControlNumber::note(0, 40) };
    table
        .insert(
            tap,
            MappingEntry {
                target: ParameterTarget::parse("transport.tap").unwrap(),
                transform: Transform::Linear,
            },
            4,
        )
        .unwrap();
    handle.replace_mappings(table).unwrap();

    for ms in [0, 500, 1000, 1500] {
        let press = ControlEvent {
            controller: CONTROLLER,
            control: tap.control,
            value: 100,
            timestamp: Duration::from_millis(ms),
        };
        handle.control(press).unwrap();
        handle.control(ControlEvent { value: 0, ..press }).unwrap();
    }
    step(&mut engine);
    assert!((engine.transport().bpm - 120.0).abs() < 1.0);
}

#[test]
fn test_division_knob_reaches_every_division() {
    let (mut engine, mut handle) = engine();
    let slot = EffectSlot::Channel(ChannelId(1));
    handle.insert_effect(slot, EffectKind::Delay).unwrap();
    step(&mut engine);

    let knob = ControlKey { controller: CONTROLLER, control: ControlNumber::cc(0, 20) };
    let mut table = MappingTable::new();
    table
        .insert(
            knob,
            MappingEntry {
                target: ParameterTarget::parse("effect.1.division").unwrap(),
                transform: Transform::Linear,
            },
            4,
        )
        .unwrap();
    handle.replace_mappings(table).unwrap();
    step(&mut engine);
    handle.log_events();

    let mut seen = Vec::new();
    for value in 6..=127 {
        handle
            .control(ControlEvent { controller: CONTROLLER, control: knob.control, value, timestamp: Duration::ZERO })
            .unwrap();
        step(&mut engine);
        let division = engine.effect(slot).unwrap().division();
        if !seen.contains(&division) {
            seen.push(division);
        }
    }
    assert_eq!(seen, BeatDivision::ALL.to_vec());
    assert_eq!(engine.effect(slot).unwrap().division(), BeatDivision::FourBeats);
}
