//! Delay computation for retries and poll scheduling, with centered jitter.

/// Exponential retry delay in milliseconds: `base * 2^attempts`, clamped to
/// `max_secs`, with jitter of up to `jitter_fraction` in either direction.
/// `rand01` must be uniform in `[0, 1)`.
pub fn retry_backoff_ms(
    base_secs: u64,
    attempts: u32,
    max_secs: u64,
    jitter_fraction: f64,
    rand01: f64,
) -> i64 {
    let raw = base_secs.saturating_mul(2u64.saturating_pow(attempts));
    let clamped = raw.min(max_secs);
    jittered_ms(clamped * 1000, jitter_fraction, rand01)
}

/// Applies centered jitter to a base duration: result is within
/// `base * (1 ± fraction)` and never negative.
pub fn jittered_ms(base_ms: u64, jitter_fraction: f64, rand01: f64) -> i64 {
    let centered = (rand01 * 2.0 - 1.0) * jitter_fraction * base_ms as f64;
    (base_ms as i64 + centered.round() as i64).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        // rand01 = 0.5 centers the jitter at zero.
        assert_eq!(retry_backoff_ms(10, 1, 1800, 0.25, 0.5), 20_000);
        assert_eq!(retry_backoff_ms(10, 2, 1800, 0.25, 0.5), 40_000);
        assert_eq!(retry_backoff_ms(10, 3, 1800, 0.25, 0.5), 80_000);
    }

    #[test]
    fn backoff_is_clamped() {
        assert_eq!(retry_backoff_ms(10, 20, 1800, 0.25, 0.5), 1_800_000);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for r in [0.0, 0.1, 0.5, 0.9, 0.999] {
            let d = retry_backoff_ms(10, 1, 1800, 0.25, r);
            assert!(d >= 15_000, "jitter below -25%: {d}");
            assert!(d <= 25_000, "jitter above +25%: {d}");
        }
    }

    #[test]
    fn interval_jitter_stays_within_bounds() {
        for r in [0.0, 0.25, 0.5, 0.75, 0.999] {
            let d = jittered_ms(600_000, 0.1, r);
            assert!((540_000..=660_000).contains(&d));
        }
    }
}
