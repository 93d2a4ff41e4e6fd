//! Transport and effect slots through the public engine API

use std::time::Duration;

use basedrop::Owned;
use deckmix_core::clock::{SyncMaster, TapResult};
use deckmix_core::config::EngineConfig;
use deckmix_core::effect::{EffectKind, EffectParam, EffectSlot, EffectUnit};
use deckmix_core::engine::{gc_handle, AudioEngine, EngineCommand, EngineEvent};
use deckmix_core::{ChannelId, EngineError, StereoBuffer, StereoSample};

const BLOCK: usize = 256;

fn render(engine: &mut AudioEngine, input: f32, frames: usize) -> StereoBuffer {
    let inputs = [StereoBuffer::from_samples(vec![StereoSample::mono(input); frames])];
    let mut master = StereoBuffer::silence(frames);
    let mut cue = StereoBuffer::silence(frames);
    engine.process(&inputs, &mut master, &mut cue);
    master
}

fn unit(kind: EffectKind) -> Owned<EffectUnit> {
    Owned::new(&gc_handle(), EffectUnit::new(kind, 48_000))
}

#[test]
fn test_tap_tempo_four_taps() {
    let (mut engine, _handle) = AudioEngine::new(EngineConfig::default());
    let mut last = TapResult::Started;
    for ms in [0, 500, 1000, 1500] {
        last = engine.tap_tempo(Duration::from_millis(ms));
    }
    match last {
        TapResult::Tempo(bpm) => assert!((bpm - 120.0).abs() < 1.0),
        other => panic!("expected a tempo, got {:?}", other),
    }
    render(&mut engine, 0.0, BLOCK);
    assert!((engine.transport().bpm - 120.0).abs() < 1.0);
}

#[test]
fn test_invalid_bpm_keeps_previous() {
    let (mut engine, mut handle) = AudioEngine::new(EngineConfig::default());
    engine.set_bpm(124.0).unwrap();
    assert_eq!(engine.set_bpm(0.0), Err(EngineError::InvalidBpm(0.0)));
    assert!(engine.set_bpm(-90.0).is_err());
    assert!(engine.set_bpm(f64::NAN).is_err());
    assert_eq!(handle.set_bpm(-1.0), Err(EngineError::InvalidBpm(-1.0)));
    assert_eq!(engine.transport().bpm, 124.0);
}

#[test]
fn test_beat_phase_advances_by_block() {
    let (mut engine, _handle) = AudioEngine::new(EngineConfig {
        initial_bpm: 120.0,
        ..Default::default()
    });
    // 3000 frames at 48 kHz and 120 BPM is exactly 1/8 beat
    for _ in 0..9 {
        render(&mut engine, 0.0, 3000);
    }
    let transport = engine.transport();
    assert_eq!(transport.beat_count, 1);
    assert!((transport.beat_phase - 0.125).abs() < 1e-9);
    assert_eq!(transport.sample_position, 27_000);
}

#[test]
fn test_sync_master_applies_at_next_block() {
    let (mut engine, mut handle) = AudioEngine::new(EngineConfig::default());
    handle
        .send(EngineCommand::SetChannelBpm { channel: ChannelId(2), bpm: Some(100.0) })
        .unwrap();
    handle.set_sync_master(SyncMaster::Channel(ChannelId(2))).unwrap();
    render(&mut engine, 0.0, BLOCK);
    assert_eq!(engine.transport().sync_master, SyncMaster::Channel(ChannelId(2)));
    assert_eq!(engine.transport().bpm, 100.0);

    assert_eq!(
        handle.set_sync_master(SyncMaster::Channel(ChannelId(7))),
        Err(EngineError::UnknownChannel(ChannelId(7)))
    );
}

#[test]
fn test_delay_reenable_has_no_stale_echo() {
    let (mut engine, _handle) = AudioEngine::new(EngineConfig::default());
    let slot = EffectSlot::Channel(ChannelId(1));
    engine.insert_effect(slot, unit(EffectKind::Delay)).unwrap();
    engine.set_effect_param(slot, EffectParam::Mix, 1.0).unwrap();
    engine.set_effect_param(slot, EffectParam::Time, 50.0).unwrap();
    engine.set_effect_param(slot, EffectParam::Feedback, 0.9).unwrap();

    // Fill the delay line, then confirm the echo outlives the input
    for _ in 0..20 {
        render(&mut engine, 0.5, BLOCK);
    }
    assert!(!render(&mut engine, 0.0, BLOCK).is_silent());

    engine.set_effect_enabled(slot, false).unwrap();
    render(&mut engine, 0.0, BLOCK);
    engine.set_effect_enabled(slot, true).unwrap();

    let first = render(&mut engine, 0.0, BLOCK);
    assert!(first.is_silent());
}

#[test]
fn test_capacity_exceeded_leaves_existing_effects() {
    let (mut engine, mut handle) = AudioEngine::new(EngineConfig {
        max_active_effects: 2,
        ..Default::default()
    });
    engine.insert_effect(EffectSlot::Channel(ChannelId(1)), unit(EffectKind::Delay)).unwrap();
    engine.insert_effect(EffectSlot::Master, unit(EffectKind::Reverb)).unwrap();

    assert_eq!(
        engine.insert_effect(EffectSlot::Channel(ChannelId(2)), unit(EffectKind::Flanger)),
        Err(EngineError::CapacityExceeded { max: 2 })
    );
    assert!(engine.effect(EffectSlot::Channel(ChannelId(1))).unwrap().is_enabled());
    assert!(engine.effect(EffectSlot::Master).unwrap().is_enabled());
    assert!(engine.effect(EffectSlot::Channel(ChannelId(2))).is_none());

    // Same through the queue: reported as an event
    handle.insert_effect(EffectSlot::Channel(ChannelId(3)), EffectKind::Chorus).unwrap();
    render(&mut engine, 0.0, BLOCK);
    assert!(handle.drain_events().contains(&EngineEvent::CommandRejected {
        command: "InsertEffect",
        error: EngineError::CapacityExceeded { max: 2 },
    }));
    assert_eq!(engine.effect_rack().active_count(), 2);
}

#[test]
fn test_distortion_output_bounded() {
    let (mut engine, _handle) = AudioEngine::new(EngineConfig::default());
    let slot = EffectSlot::Master;
    engine.insert_effect(slot, unit(EffectKind::Distortion)).unwrap();
    engine.set_effect_param(slot, EffectParam::Drive, 1.0).unwrap();
    engine.mix_bus_mut().set_booth(2.0);

    let master = render(&mut engine, 0.9, BLOCK);
    assert!(master.iter().all(|s| s.left.abs() <= 1.0 && s.right.abs() <= 1.0));
}

#[test]
fn test_effect_parameter_errors() {
    let (mut engine, _handle) = AudioEngine::new(EngineConfig::default());
    let slot = EffectSlot::Channel(ChannelId(1));
    assert_eq!(
        engine.set_effect_param(slot, EffectParam::Mix, 0.5),
        Err(EngineError::EmptySlot(slot))
    );
    engine.insert_effect(slot, unit(EffectKind::Delay)).unwrap();
    assert_eq!(
        engine.set_effect_param(slot, EffectParam::Drive, 0.5),
        Err(EngineError::UnsupportedParameter { param: EffectParam::Drive })
    );
    assert!(engine.remove_effect(slot).is_ok());
    assert!(engine.effect(slot).is_none());
}
