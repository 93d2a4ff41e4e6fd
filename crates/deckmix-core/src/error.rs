//! Engine error types
//!
//! [`EngineError`] is produced on the audio thread as well as at the API
//! boundary, so every payload is `Copy` and formatting only happens when a
//! non-realtime thread displays it.

use thiserror::Error;

use crate::effect::{EffectParam, EffectSlot};
use crate::types::ChannelId;

/// Errors raised while applying a parameter or structural change
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum EngineError {
    /// BPM was zero, negative, not finite or above the supported ceiling
    #[error("Invalid BPM: {0}")]
    InvalidBpm(f64),

    /// No channel strip with this id exists
    #[error("Unknown channel: {0}")]
    UnknownChannel(ChannelId),

    /// Parameter name not recognised by the effect unit
    #[error("Unknown effect parameter")]
    UnknownParameter,

    /// Parameter exists but is meaningless for this effect kind
    #[error("Parameter {param:?} is not supported by this effect")]
    UnsupportedParameter { param: EffectParam },

    /// Value outside the accepted range (NaN included)
    #[error("Value {value} out of range for {param:?}")]
    OutOfRange { param: EffectParam, value: f32 },

    /// Enabling another effect would exceed the configured maximum
    #[error("Effect capacity exceeded: at most {max} active effect units")]
    CapacityExceeded { max: usize },

    /// The slot has no effect unit inserted
    #[error("No effect inserted on {0:?}")]
    EmptySlot(EffectSlot),

    /// Structural change refused because commands are still queued
    #[error("Engine busy: structural change requires quiescence")]
    Busy,

    /// The command queue to the audio thread is full
    #[error("Command queue full")]
    QueueFull,
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while building or validating control mappings
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("Invalid parameter target: {0}")]
    InvalidTarget(String),

    #[error("Target {target} expects a channel between 1 and {max}")]
    ChannelOutOfRange { target: String, max: usize },

    #[error("Transform {transform} cannot drive {target}")]
    IncompatibleTransform { transform: &'static str, target: String },

    #[error("Duplicate mapping for controller {controller} control {control}")]
    DuplicateControl { controller: u16, control: String },
}
