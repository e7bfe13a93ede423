//! Progress sink shared between batch workers and an observer thread.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// A fraction in `[0.0, 1.0]` that only moves forward during a batch.
///
/// Workers publish from any thread; a UI thread polls [`get`](Self::get).
/// The value is stored as `f64` bits: for non-negative floats the bit
/// patterns order the same way as the numbers, so `fetch_max` keeps updates
/// monotonic even when completions arrive out of order.
#[derive(Debug, Default)]
pub struct Progress {
    bits: AtomicU64,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Raises the value to `fraction` (clamped to `[0, 1]`); lower values
    /// are ignored.
    pub fn advance_to(&self, fraction: f64) {
        // `-0.0` has the sign bit set and would win every later `fetch_max`.
        let clamped = if fraction.is_nan() || fraction <= 0.0 {
            0.0
        } else {
            fraction.min(1.0)
        };
        self.bits.fetch_max(clamped.to_bits(), Ordering::AcqRel);
    }

    /// Starts a new batch at 0.
    pub(crate) fn reset(&self) {
        self.bits.store(0.0f64.to_bits(), Ordering::Release);
    }
}

/// Counts finished items of one batch and forwards the fraction.
#[derive(Debug)]
pub(crate) struct ProgressTracker<'a> {
    progress: &'a Progress,
    total: usize,
    done: AtomicUsize,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn start(progress: &'a Progress, total: usize) -> Self {
        progress.reset();
        Self {
            progress,
            total,
            done: AtomicUsize::new(0),
        }
    }

    pub(crate) fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if self.total > 0 {
            self.progress.advance_to(done as f64 / self.total as f64);
        }
    }

    pub(crate) fn finish(&self) {
        self.progress.advance_to(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn progress_never_goes_backwards() {
        let progress = Progress::new();
        progress.advance_to(0.5);
        progress.advance_to(0.25);
        assert_eq!(progress.get(), 0.5);
        progress.advance_to(7.0);
        assert_eq!(progress.get(), 1.0);
        progress.advance_to(f64::NAN);
        assert_eq!(progress.get(), 1.0);
    }

    #[test]
    fn tracker_reaches_one_from_many_threads() {
        let progress = Progress::new();
        progress.advance_to(0.9);

        let tracker = ProgressTracker::start(&progress, 200);
        assert_eq!(progress.get(), 0.0);

        (0..200).into_par_iter().for_each(|_| tracker.tick());
        assert_eq!(progress.get(), 1.0);
    }

    #[test]
    fn empty_batch_completes_on_finish() {
        let progress = Progress::new();
        let tracker = ProgressTracker::start(&progress, 0);
        tracker.tick();
        assert_eq!(progress.get(), 0.0);
        tracker.finish();
        assert_eq!(progress.get(), 1.0);
    }
}
