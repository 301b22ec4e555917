//! Deferred deallocation for track buffers
//!
//! Sample buffers are handed to the render thread as `basedrop::Shared`
//! pointers. When the render thread drops the last reference (a new track
//! replaced the old one) nothing is freed there: the pointer is queued and a
//! background thread owning the `Collector` releases the memory later.
//!
//! ```ignore
//! let buffer = Shared::new(&gc_handle(), sample_buffer);
//! // ... hand `buffer` to the engine; dropping it anywhere is RT-safe
//! ```

use basedrop::{Collector, Handle};
use std::sync::{mpsc, OnceLock};
use std::thread;
use std::time::Duration;

/// How often the collector thread reclaims queued allocations
const COLLECT_INTERVAL: Duration = Duration::from_millis(50);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn start_collector() -> Handle {
    let (tx, rx) = mpsc::sync_channel(1);

    thread::Builder::new()
        .name("buffer-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it is created and kept on this thread
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::info!("Buffer GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("failed to spawn buffer GC thread");

    rx.recv().expect("buffer GC thread exited before publishing its handle")
}

/// Handle for allocating `Shared<T>` values released off the audio thread
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(start_collector).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Shared;

    #[test]
    fn test_shared_values_can_be_cloned_and_dropped() {
        let value = Shared::new(&gc_handle(), vec![0.0f32; 1024]);
        let clone = value.clone();
        assert_eq!(clone.len(), 1024);
        drop(value);
        drop(clone);
    }
}
