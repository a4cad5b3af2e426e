use std::time::{Duration, Instant};

use gstreamer as gst;
use parking_lot::Mutex;

use super::counters::Counters;

struct Entry {
    buffer: gst::Buffer,
    seq: u64,
    written_at: Instant,
}

/// Single-slot latest-only frame buffer. The ingress side (appsink callback
/// on the selector's output) always overwrites whatever is here; the egress
/// side (render loop) reads it on its own clock and never blocks on ingress.
/// This is the sole point of contact between the two pipelines' threads.
pub struct FrameSlot {
    entry: Mutex<Option<Entry>>,
    next_seq: Mutex<u64>,
    counters: std::sync::Arc<Counters>,
}

impl FrameSlot {
    pub fn new(counters: std::sync::Arc<Counters>) -> Self {
        FrameSlot {
            entry: Mutex::new(None),
            next_seq: Mutex::new(0),
            counters,
        }
    }

    /// Overwrite the slot with a new frame. Called from the appsink's
    /// `new_sample` callback, on the ingest pipeline's streaming thread.
    pub fn write(&self, buffer: gst::Buffer) {
        let seq = {
            let mut next_seq = self.next_seq.lock();
            let seq = *next_seq;
            *next_seq += 1;
            seq
        };
        *self.entry.lock() = Some(Entry {
            buffer,
            seq,
            written_at: Instant::now(),
        });
        self.counters.record_in();
    }

    /// Read whatever is currently in the slot, if anything has ever been
    /// written. Returns the buffer (cheap refcount clone) and its sequence
    /// number, which the render loop uses to detect repeats.
    pub fn read(&self) -> Option<(gst::Buffer, u64)> {
        self.entry.lock().as_ref().map(|e| (e.buffer.clone(), e.seq))
    }

    /// Read the slot only if it was updated within `no_signal_timeout`.
    /// Distinct from a plain repeat: a cached frame older than this is no
    /// longer trusted even though routing is nominally on ingest, and the
    /// caller (the render loop) falls back to the pre-allocated fallback
    /// frame instead of endlessly repeating a stale one.
    pub fn read_fresh(&self, no_signal_timeout: Duration) -> Option<(gst::Buffer, u64)> {
        let guard = self.entry.lock();
        let entry = guard.as_ref()?;
        if entry.written_at.elapsed() < no_signal_timeout {
            Some((entry.buffer.clone(), entry.seq))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn dummy_buffer() -> gst::Buffer {
        gst::Buffer::with_size(4).unwrap()
    }

    #[test]
    fn test_empty_slot_reads_none() {
        let slot = FrameSlot::new(Arc::new(Counters::new()));
        assert!(slot.read().is_none());
    }

    #[test]
    fn test_write_then_read_latest_only() {
        let counters = Arc::new(Counters::new());
        let slot = FrameSlot::new(Arc::clone(&counters));
        slot.write(dummy_buffer());
        slot.write(dummy_buffer());
        let (_, seq) = slot.read().unwrap();
        assert_eq!(seq, 1, "second write must win and bump the sequence");
        assert_eq!(counters.snapshot().0, 2);
    }

    #[test]
    fn test_repeated_reads_return_same_sequence() {
        let slot = FrameSlot::new(Arc::new(Counters::new()));
        slot.write(dummy_buffer());
        let (_, seq_a) = slot.read().unwrap();
        let (_, seq_b) = slot.read().unwrap();
        assert_eq!(seq_a, seq_b, "reading without an intervening write must not advance seq");
    }

    #[test]
    fn test_read_fresh_returns_none_before_any_write() {
        let slot = FrameSlot::new(Arc::new(Counters::new()));
        assert!(slot.read_fresh(std::time::Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_read_fresh_within_timeout() {
        let slot = FrameSlot::new(Arc::new(Counters::new()));
        slot.write(dummy_buffer());
        assert!(slot.read_fresh(std::time::Duration::from_secs(5)).is_some());
    }

    #[test]
    fn test_read_fresh_expires_after_no_signal_timeout() {
        let slot = FrameSlot::new(Arc::new(Counters::new()));
        slot.write(dummy_buffer());
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(
            slot.read_fresh(std::time::Duration::from_millis(10)).is_none(),
            "a frame older than no_signal_timeout must not be trusted even though it is still cached"
        );
        // a plain read() still sees it -- it's a different policy, not a deletion
        assert!(slot.read().is_some());
    }
}
