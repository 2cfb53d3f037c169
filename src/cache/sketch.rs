//! Frequency Sketch Module
//!
//! Approximate access counting used by the admission policy.

use cmsketch::CMSketchU16;

// == Frequency Sketch ==
/// Count-min sketch with periodic halving.
///
/// After `decay_after` recorded events every counter is halved, so keys that
/// were hot a long time ago gradually lose their advantage. By default the
/// period is the sketch width.
pub(crate) struct FrequencySketch {
    counters: CMSketchU16,
    step: usize,
    decay_after: usize,
}

impl std::fmt::Debug for FrequencySketch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrequencySketch")
            .field("width", &self.counters.width())
            .field("step", &self.step)
            .field("decay_after", &self.decay_after)
            .finish()
    }
}

impl FrequencySketch {
    /// Creates a sketch with error bound `eps` at the given `confidence`.
    pub fn new(eps: f64, confidence: f64) -> Self {
        let counters = CMSketchU16::new(eps, confidence);
        let decay_after = counters.width().max(1);
        Self {
            counters,
            step: 0,
            decay_after,
        }
    }

    /// Overrides the halving period. Zero keeps the default.
    pub fn with_decay_after(mut self, decay_after: usize) -> Self {
        if decay_after > 0 {
            self.decay_after = decay_after;
        }
        self
    }

    /// Records one access for `hash`.
    pub fn record(&mut self, hash: u64) {
        self.counters.inc(hash);
        self.step += 1;
        if self.step >= self.decay_after {
            self.step = 0;
            self.counters.halve();
        }
    }

    /// Estimated access count for `hash`. Never underestimates between decays.
    pub fn estimate(&self, hash: u64) -> u16 {
        self.counters.estimate(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_counts_records() {
        let mut sketch = FrequencySketch::new(0.01, 0.9).with_decay_after(10_000);
        for _ in 0..5 {
            sketch.record(42);
        }
        sketch.record(7);

        assert!(sketch.estimate(42) >= 5);
        assert!(sketch.estimate(7) >= 1);
    }

    #[test]
    fn test_decay_halves_counters() {
        let mut sketch = FrequencySketch::new(0.01, 0.9).with_decay_after(8);
        for _ in 0..7 {
            sketch.record(42);
        }
        let before = sketch.estimate(42);
        assert!(before >= 7);

        // Eighth record triggers the halving.
        sketch.record(42);
        let after = sketch.estimate(42);
        assert!(after <= 4, "counter should be halved, got {after}");
    }

    #[test]
    fn test_zero_decay_keeps_default() {
        let sketch = FrequencySketch::new(0.01, 0.9).with_decay_after(0);
        assert_eq!(sketch.decay_after, sketch.counters.width());
    }
}
