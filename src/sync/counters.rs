use std::sync::atomic::{AtomicU64, Ordering};

/// Shared frame accounting: written by the frame-slot ingress (frames_in) and
/// the render loop (frames_out, frames_repeated), read by the stats timer and
/// by tests asserting on observable relay behaviour.
#[derive(Default)]
pub struct Counters {
    pub frames_in: AtomicU64,
    pub frames_out: AtomicU64,
    pub frames_repeated: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_in(&self) {
        self.frames_in.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_out(&self) {
        self.frames_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_repeated(&self) {
        self.frames_repeated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.frames_in.load(Ordering::Relaxed),
            self.frames_out.load(Ordering::Relaxed),
            self.frames_repeated.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let counters = Counters::new();
        assert_eq!(counters.snapshot(), (0, 0, 0));
    }

    #[test]
    fn test_counters_accumulate() {
        let counters = Counters::new();
        counters.record_in();
        counters.record_in();
        counters.record_out();
        counters.record_repeated();
        assert_eq!(counters.snapshot(), (2, 1, 1));
    }
}
