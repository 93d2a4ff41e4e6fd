//! Audio engine - channel strips, mix bus, effect rack and the engine context
//!
//! This module contains the real-time side of the mixer:
//! - ChannelStrip: trim, three-band EQ, filter and metering per channel
//! - MixBus: crossfader, solo/cue routing, master and headphone sums
//! - EffectRack: one insert slot per channel plus one on the master
//! - AudioEngine / EngineHandle: the audio-thread context and its control-side handle

mod channel;
mod command;
mod engine;
mod event;
mod filter;
mod gc;
mod meter;
mod mixer;
mod quiescence;
mod rack;

pub use channel::*;
pub use command::{command_channel, EngineCommand, COMMAND_QUEUE_CAPACITY};
pub use engine::*;
pub use event::*;
pub use filter::{FilterMode, FILTER_MAX_HZ, FILTER_MIN_HZ};
pub use gc::gc_handle;
pub use meter::*;
pub use mixer::*;
pub use quiescence::QuiescenceBarrier;
pub use rack::EffectRack;
