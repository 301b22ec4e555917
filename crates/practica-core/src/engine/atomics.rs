//! Lock-free engine state for UI polling
//!
//! The render thread publishes playhead position, loop count and transport
//! status here after every block. Readers (UI, MIDI "set loop at current
//! position", tap tempo) load them with relaxed ordering: only visibility is
//! needed, not synchronization with other memory.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use crate::state::TransportStatus;

pub struct EngineAtomics {
    /// Read cursor in milliseconds (f64 bits)
    position_ms: AtomicU64,
    /// Completed loop passes since startup
    loop_count: AtomicU64,
    /// 0=Stopped, 1=Playing, 2=Paused
    transport: AtomicU8,
    /// Whether a track is loaded
    loaded: AtomicBool,
    /// Generation of the loaded track (0 when none has been loaded)
    generation: AtomicU64,
}

impl EngineAtomics {
    pub fn new() -> Self {
        Self {
            position_ms: AtomicU64::new(0f64.to_bits()),
            loop_count: AtomicU64::new(0),
            transport: AtomicU8::new(TransportStatus::Stopped.to_u8()),
            loaded: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    /// Current read position in milliseconds (lock-free)
    #[inline]
    pub fn position_ms(&self) -> f64 {
        f64::from_bits(self.position_ms.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn loop_count(&self) -> u64 {
        self.loop_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn transport(&self) -> TransportStatus {
        TransportStatus::from_u8(self.transport.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.transport() == TransportStatus::Playing
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    // Writers (render thread only)

    #[inline]
    pub(crate) fn set_position_ms(&self, ms: f64) {
        self.position_ms.store(ms.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn set_loop_count(&self, count: u64) {
        self.loop_count.store(count, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn set_transport(&self, status: TransportStatus) {
        self.transport.store(status.to_u8(), Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn set_loaded(&self, loaded: bool, generation: u64) {
        self.loaded.store(loaded, Ordering::Relaxed);
        self.generation.store(generation, Ordering::Relaxed);
    }
}

impl Default for EngineAtomics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_round_trips_through_bits() {
        let atomics = EngineAtomics::new();
        assert_eq!(atomics.position_ms(), 0.0);
        atomics.set_position_ms(1234.5678);
        assert_eq!(atomics.position_ms(), 1234.5678);
    }

    #[test]
    fn test_transport_and_load_flags() {
        let atomics = EngineAtomics::new();
        assert!(!atomics.is_playing());
        atomics.set_transport(TransportStatus::Playing);
        assert!(atomics.is_playing());

        atomics.set_loaded(true, 3);
        assert!(atomics.is_loaded());
        assert_eq!(atomics.generation(), 3);
    }
}
