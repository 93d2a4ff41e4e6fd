//! Mixing behaviour through the public engine API

use deckmix_core::config::{ChannelConfig, EngineConfig};
use deckmix_core::engine::{
    crossfader_gain, crossfader_gains, fader_gain, AudioEngine, CrossfaderCurve, EngineCommand,
    EngineEvent,
};
use deckmix_core::{ChannelId, CrossfaderAssign, EngineError, StereoBuffer, StereoSample};

const BLOCK: usize = 256;
const CURVES: [CrossfaderCurve; 3] = [
    CrossfaderCurve::Smooth,
    CrossfaderCurve::Sharp,
    CrossfaderCurve::Scratch,
];

fn constant(value: f32) -> StereoBuffer {
    StereoBuffer::from_samples(vec![StereoSample::mono(value); BLOCK])
}

fn render(engine: &mut AudioEngine, inputs: &[StereoBuffer]) -> (StereoBuffer, StereoBuffer) {
    let mut master = StereoBuffer::silence(BLOCK);
    let mut cue = StereoBuffer::silence(BLOCK);
    engine.process(inputs, &mut master, &mut cue);
    (master, cue)
}

#[test]
fn test_fader_gain_monotonic() {
    let mut previous = fader_gain(0.0);
    assert_eq!(previous, 0.0);
    for step in 1..=1000 {
        let gain = fader_gain(step as f32 / 1000.0);
        assert!(gain >= previous, "gain fell at step {}", step);
        previous = gain;
    }
    assert!((fader_gain(1.0) - 1.0).abs() < 1e-6);
}

#[test]
fn test_channel_output_monotonic_in_fader() {
    let mut previous = 0.0f32;
    for step in 0..=20 {
        let position = step as f32 / 20.0;
        let (mut engine, _handle) = AudioEngine::new(EngineConfig::default());
        engine.channel_mut(ChannelId(1)).unwrap().set_fader(position);
        let input = [constant(0.5)];
        // First block ramps from the initial gain; the second is steady
        render(&mut engine, &input);
        let (master, _) = render(&mut engine, &input);

        let level = master[BLOCK - 1].left;
        assert!(level + 1e-7 >= previous, "output fell at fader {}", position);
        previous = level;
    }
    assert!((previous - 0.5).abs() < 1e-5);
}

#[test]
fn test_crossfader_extremes() {
    for curve in CURVES {
        assert_eq!(crossfader_gain(curve, -1.0, CrossfaderAssign::A), 1.0);
        assert_eq!(crossfader_gain(curve, -1.0, CrossfaderAssign::B), 0.0);
        assert_eq!(crossfader_gain(curve, 1.0, CrossfaderAssign::A), 0.0);
        assert_eq!(crossfader_gain(curve, 1.0, CrossfaderAssign::B), 1.0);
        for step in -10..=10 {
            let position = step as f32 / 10.0;
            assert_eq!(crossfader_gain(curve, position, CrossfaderAssign::Thru), 1.0);
        }
    }
}

#[test]
fn test_equal_power_center() {
    let (a, b) = crossfader_gains(CrossfaderCurve::Smooth, 0.0);
    assert!((a * a + b * b - 1.0).abs() < 1e-6);
}

#[test]
fn test_crossfader_routes_assigned_channels() {
    let config = EngineConfig {
        channels: 3,
        channel_setup: vec![
            ChannelConfig { crossfader: CrossfaderAssign::A, ..Default::default() },
            ChannelConfig { crossfader: CrossfaderAssign::B, ..Default::default() },
            ChannelConfig { crossfader: CrossfaderAssign::Thru, ..Default::default() },
        ],
        ..Default::default()
    };
    let (mut engine, mut handle) = AudioEngine::new(config);
    let inputs = [constant(0.1), constant(0.2), constant(0.4)];

    handle.set_crossfader(-1.0).unwrap();
    let (master, _) = render(&mut engine, &inputs);
    assert!((master[0].left - 0.5).abs() < 1e-5);

    handle.set_crossfader(1.0).unwrap();
    let (master, _) = render(&mut engine, &inputs);
    assert!((master[0].left - 0.6).abs() < 1e-5);
}

#[test]
fn test_mute_keeps_metering_and_silences_output() {
    let input = [constant(0.25)];

    let (mut reference, reference_handle) = AudioEngine::new(EngineConfig::default());
    render(&mut reference, &input);
    let unmuted = reference_handle.meter_snapshot().channels()[0];

    let (mut engine, mut handle) = AudioEngine::new(EngineConfig::default());
    handle.set_mute(ChannelId(1), true).unwrap();
    let (master, cue) = render(&mut engine, &input);

    let muted = handle.meter_snapshot().channels()[0];
    assert_eq!(muted, unmuted);
    assert!(muted.peak > 0.2);
    assert!(master.is_silent());
    assert!(cue.is_silent());
}

#[test]
fn test_solo_limits_master_to_soloed_channels() {
    let (mut engine, mut handle) = AudioEngine::new(EngineConfig::default());
    handle
        .send(EngineCommand::SetSolo { channel: ChannelId(2), solo: true })
        .unwrap();
    let (master, _) = render(&mut engine, &[constant(0.1), constant(0.2)]);
    assert!((master[0].left - 0.2).abs() < 1e-5);
}

#[test]
fn test_cue_bus_never_reaches_master() {
    let (mut engine, mut handle) = AudioEngine::new(EngineConfig::default());
    handle.send(EngineCommand::SetCue { channel: ChannelId(1), enabled: true }).unwrap();
    handle.set_fader(ChannelId(1), 0.0).unwrap();
    render(&mut engine, &[constant(0.5)]);
    let (master, cue) = render(&mut engine, &[constant(0.5)]);

    // Cue is pre-fader; the closed fader keeps it out of master
    assert!(master.is_silent());
    assert!(cue.peak() > 0.3);
}

#[test]
fn test_unknown_channel_rejected() {
    let (mut engine, mut handle) = AudioEngine::new(EngineConfig { channels: 2, ..Default::default() });
    assert!(engine.channel(ChannelId(3)).is_none());

    handle.set_eq(ChannelId(3), deckmix_core::engine::EqBand::Low, -6.0).unwrap();
    render(&mut engine, &[]);
    assert!(handle.drain_events().contains(&EngineEvent::CommandRejected {
        command: "SetEq",
        error: EngineError::UnknownChannel(ChannelId(3)),
    }));
}
