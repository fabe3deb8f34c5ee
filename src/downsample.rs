//! Deterministic downsampling stride.
//!
//! Live preview and final archival must agree on which logical samples
//! survive downsampling, so the stride is a pure function of the sample
//! count and the requested target cardinality. A fixed-point accumulator
//! keeps sample `i` exactly when `i * threshold` crosses a multiple of
//! `scale` between positions `i` and `i + 1`, which spreads roughly
//! `target` kept samples evenly across the whole buffer for any buffer
//! size.

/// Fixed-point denominator for fractional strides.
pub const STRIDE_SCALE: u64 = 1 << 20;

/// A `(threshold, scale)` pair describing which logical samples to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stride {
    threshold: u64,
    scale: u64,
}

impl Stride {
    /// Stride that keeps every sample.
    pub const IDENTITY: Stride = Stride { threshold: 1, scale: 1 };

    /// Stride emitting roughly `target` samples out of `sample_count`.
    ///
    /// With no target every sample is kept. A target at or above the
    /// sample count also keeps every sample.
    pub fn for_target(sample_count: u64, target: Option<u64>) -> Stride {
        let Some(target) = target else {
            return Stride::IDENTITY;
        };
        let effective = sample_count.max(target);
        if effective == 0 {
            return Stride::IDENTITY;
        }
        Stride {
            threshold: STRIDE_SCALE * target / effective,
            scale: STRIDE_SCALE,
        }
    }

    /// Whether the sample at logical position `index` is kept.
    #[inline]
    pub fn keeps(&self, index: u64) -> bool {
        (index + 1) * self.threshold / self.scale > index * self.threshold / self.scale
    }

    /// Number of samples kept out of `sample_count`.
    pub fn kept_count(&self, sample_count: u64) -> u64 {
        sample_count * self.threshold / self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kept_indices(stride: Stride, count: u64) -> Vec<u64> {
        (0..count).filter(|&i| stride.keeps(i)).collect()
    }

    #[test]
    fn identity_keeps_every_sample() {
        let stride = Stride::for_target(1000, None);
        assert_eq!(stride, Stride::IDENTITY);
        assert_eq!(kept_indices(stride, 1000).len(), 1000);
        assert_eq!(stride.kept_count(1000), 1000);
    }

    #[test]
    fn target_at_or_above_count_keeps_every_sample() {
        let stride = Stride::for_target(100, Some(1000));
        assert_eq!(kept_indices(stride, 100).len(), 100);
    }

    #[test]
    fn spreads_target_across_large_buffer() {
        let count = 10_000;
        let stride = Stride::for_target(count, Some(1000));
        let kept = kept_indices(stride, count);

        let emitted = kept.len() as i64;
        assert!((emitted - 1000).abs() <= 1, "emitted {emitted}");
        assert!(kept.windows(2).all(|w| w[0] < w[1]));
        assert!(kept[0] < 20, "first kept index {}", kept[0]);
        assert!(*kept.last().unwrap() > count - 20);
    }

    #[test]
    fn stride_is_reproducible() {
        let a = Stride::for_target(54_321, Some(777));
        let b = Stride::for_target(54_321, Some(777));
        assert_eq!(kept_indices(a, 54_321), kept_indices(b, 54_321));
    }

    #[test]
    fn zero_target_keeps_nothing() {
        let stride = Stride::for_target(500, Some(0));
        assert!(kept_indices(stride, 500).is_empty());
        assert_eq!(stride.kept_count(500), 0);
    }
}
