//! Deckmix Core - real-time mixing, effects and control routing
//!
//! Channel strips, an effect rack, a mix bus and a sample clock, driven from
//! a single audio thread. Control reaches the engine through a lock-free
//! command queue; meters, transport and status come back through atomics and
//! an event ring.

pub mod audio;
pub mod clock;
pub mod config;
pub mod control;
pub mod device;
pub mod effect;
pub mod engine;
pub mod error;
pub mod types;

pub use error::{EngineError, EngineResult, MappingError};
pub use types::*;
