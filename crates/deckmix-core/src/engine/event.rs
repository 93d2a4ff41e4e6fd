//! Status events from the audio thread
//!
//! The audio thread cannot log (formatting allocates, loggers lock), so
//! anything worth reporting becomes an [`EngineEvent`] pushed into a
//! lock-free ring. The control thread drains and logs them.

use crate::control::ControlNumber;
use crate::error::EngineError;
use crate::types::ChannelId;

/// Something the non-realtime side should know about
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    /// A block missed its deadline and was replaced with silence
    Overrun { block: u64 },
    /// Recent overruns crossed the configured threshold
    Degraded { recent_overruns: u32 },
    /// No overruns in the recent window any more
    Recovered,
    /// A queued command could not be applied
    CommandRejected { command: &'static str, error: EngineError },
    /// Controller input with no mapping; dropped
    UnmappedControl { controller: u16, control: ControlNumber },
    /// The audio thread acknowledged a quiescence request
    QuiescenceReached { epoch: u64 },
    /// A channel source delivered fewer frames than requested
    InputUnderrun { channel: ChannelId },
    /// The output device reported an error; rendering silence
    DeviceLost,
}

impl EngineEvent {
    /// Log through the `log` facade at a level matching the severity
    pub fn log(&self) {
        match self {
            Self::Overrun { block } => log::warn!("engine: overrun at block {}, output silenced", block),
            Self::Degraded { recent_overruns } => {
                log::error!("engine: degraded, {} overruns in recent blocks", recent_overruns)
            }
            Self::Recovered => log::info!("engine: recovered from degraded state"),
            Self::CommandRejected { command, error } => {
                log::warn!("engine: {} rejected: {}", command, error)
            }
            Self::UnmappedControl { controller, control } => {
                log::debug!("control: unmapped {} on controller {}", control, controller)
            }
            Self::QuiescenceReached { epoch } => log::debug!("engine: quiescent (epoch {})", epoch),
            Self::InputUnderrun { channel } => log::debug!("engine: input underrun on channel {}", channel),
            Self::DeviceLost => log::error!("audio: output device lost, rendering silence"),
        }
    }
}

/// Capacity of the event ring; events beyond it are counted and dropped
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Audio-side end of the event ring
pub struct EventSender {
    producer: rtrb::Producer<EngineEvent>,
    dropped: u64,
}

impl EventSender {
    /// Push without blocking; a full ring drops the event
    #[inline]
    pub fn send(&mut self, event: EngineEvent) {
        if self.producer.push(event).is_err() {
            self.dropped += 1;
        }
    }

    /// Events lost to a full ring since creation
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

pub fn event_channel() -> (EventSender, rtrb::Consumer<EngineEvent>) {
    let (producer, consumer) = rtrb::RingBuffer::new(EVENT_QUEUE_CAPACITY);
    (EventSender { producer, dropped: 0 }, consumer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_ring_drops_and_counts() {
        let (mut tx, mut rx) = event_channel();
        for block in 0..(EVENT_QUEUE_CAPACITY as u64 + 5) {
            tx.send(EngineEvent::Overrun { block });
        }
        assert_eq!(tx.dropped(), 5);
        assert_eq!(rx.pop().unwrap(), EngineEvent::Overrun { block: 0 });
    }
}
