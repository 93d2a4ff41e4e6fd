//! Deferred deallocation for objects released on the audio thread
//!
//! Effect units (delay lines of several seconds) and mapping tables are
//! wrapped in `basedrop::Owned` / `Shared`. Dropping one on the audio thread
//! only enqueues a pointer; the memory is freed later on the `deckmix-gc`
//! thread, where a slow `free` cannot cause a dropout.
//!
//! ```ignore
//! let unit = Owned::new(&gc_handle(), EffectUnit::new(EffectKind::Delay, 48_000));
//! handle.send(EngineCommand::InsertEffect { slot, unit })?;
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

/// How often the collector thread reclaims queued drops
const COLLECT_INTERVAL: Duration = Duration::from_millis(50);

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    // Collector is !Sync, so it lives entirely on its own thread
    thread::Builder::new()
        .name("deckmix-gc".to_string())
        .spawn(move || {
            let mut collector = Collector::new();
            tx.send(collector.handle()).expect("GC handle receiver dropped");
            log::info!("gc: collector thread started");

            let mut live = collector.alloc_count();
            loop {
                collector.collect();
                let remaining = collector.alloc_count();
                if remaining < live {
                    log::debug!("gc: reclaimed {} allocations, {} live", live - remaining, remaining);
                }
                live = remaining;
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("Failed to spawn deckmix-gc thread");

    rx.recv().expect("GC thread exited before sending its handle")
}

/// Handle for allocating `Owned<T>` / `Shared<T>` values
///
/// The first call starts the collector thread.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::{Owned, Shared};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_handle_allocates_and_drops() {
        let owned = Owned::new(&gc_handle(), vec![0.0f32; 1024]);
        assert_eq!(owned.len(), 1024);
        drop(owned);

        let shared = Shared::new(&gc_handle(), 42u32);
        let clone = Shared::clone(&shared);
        assert_eq!(*clone, 42);
    }

    /// Records which thread ran its destructor
    struct DropRecorder(Arc<Mutex<Option<String>>>);

    impl Drop for DropRecorder {
        fn drop(&mut self) {
            let name = thread::current().name().map(str::to_string);
            *self.0.lock().unwrap() = name.or_else(|| Some(String::new()));
        }
    }

    #[test]
    fn test_drop_runs_on_collector_thread() {
        let dropped_on = Arc::new(Mutex::new(None));
        let owned = Owned::new(&gc_handle(), DropRecorder(Arc::clone(&dropped_on)));
        drop(owned);

        for _ in 0..100 {
            if dropped_on.lock().unwrap().is_some() {
                break;
            }
            thread::sleep(COLLECT_INTERVAL / 5);
        }
        assert_eq!(dropped_on.lock().unwrap().as_deref(), Some("deckmix-gc"));
    }
}
