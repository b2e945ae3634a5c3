//! Per-frame acquisition timestamps.
//!
//! The header stores one raw microsecond counter per frame. The counter is
//! 32 bits wide on the camera side and wraps, so a continuous time axis has
//! to be rebuilt by the consumer.

use log::trace;

/// Counter period in microseconds.
pub const WRAP_PERIOD_US: u64 = 1 << 32;

pub const SECONDS_PER_US: f64 = 1.0e-6;

/// Converts raw timestamps to seconds, undoing 32-bit wraparound.
///
/// Every decrease relative to the previous frame counts as one wrap, and
/// each wrap adds `2^32 * 1e-6` seconds to all following frames.
pub fn timestamps_to_seconds(raw: &[u64]) -> Vec<f64> {
    let mut wraps = 0u64;
    let mut prev: Option<u64> = None;

    raw.iter()
        .enumerate()
        .map(|(frame, &ts)| {
            if let Some(prev) = prev {
                if ts < prev {
                    wraps += 1;
                    trace!("Timestamp wrap #{wraps} at frame {frame}: {prev} -> {ts}");
                }
            }
            prev = Some(ts);

            ts as f64 * SECONDS_PER_US + (wraps * WRAP_PERIOD_US) as f64 * SECONDS_PER_US
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_sequence_is_scaled() {
        let seconds = timestamps_to_seconds(&[0, 500_000, 1_000_000]);

        for (actual, expected) in seconds.iter().zip([0.0, 0.5, 1.0]) {
            assert!((actual - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_wraparound_is_corrected() {
        let raw = [WRAP_PERIOD_US - 1_000_000, WRAP_PERIOD_US - 1, 999_999, 5_000_000];
        let seconds = timestamps_to_seconds(&raw);

        let period = WRAP_PERIOD_US as f64 * SECONDS_PER_US;
        assert!((seconds[0] - (period - 1.0)).abs() < 1e-9);
        assert!((seconds[2] - (period + 0.999_999)).abs() < 1e-9);
        assert!((seconds[3] - (period + 5.0)).abs() < 1e-9);
        assert!(seconds.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_multiple_wraps() {
        let seconds = timestamps_to_seconds(&[10, 5, 1]);
        let period = WRAP_PERIOD_US as f64 * SECONDS_PER_US;

        assert!((seconds[1] - (period + 5e-6)).abs() < 1e-9);
        assert!((seconds[2] - (2.0 * period + 1e-6)).abs() < 1e-9);
    }

    #[test]
    fn test_empty_sequence() {
        assert!(timestamps_to_seconds(&[]).is_empty());
    }
}
