use std::time::Duration;

use rand::Rng;

/// Exponential backoff with jitter, capped at `max`.
///
/// `attempt` is 1-indexed (the first retry after a failure passes `1`).
/// `jitter` is a fraction in `[0, 1]` applied symmetrically around the
/// computed delay: the final delay is drawn uniformly from
/// `[delay * (1 - jitter), delay * (1 + jitter)]`, then clamped to `max`.
pub fn compute_backoff(attempt: u32, base: Duration, max: Duration, jitter: f64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(32);
    let multiplier = 2u64.saturating_pow(exponent);
    let raw = base.saturating_mul(multiplier as u32).min(max);

    if jitter <= 0.0 {
        return raw;
    }

    let jitter = jitter.clamp(0.0, 1.0);
    let raw_millis = raw.as_millis() as f64;
    let low = raw_millis * (1.0 - jitter);
    let high = raw_millis * (1.0 + jitter);

    let mut rng = rand::rng();
    let chosen = if high > low {
        rng.random_range(low..=high)
    } else {
        raw_millis
    };

    Duration::from_millis(chosen.max(0.0) as u64).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_without_jitter() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(300);
        assert_eq!(compute_backoff(1, base, max, 0.0), Duration::from_secs(1));
        assert_eq!(compute_backoff(2, base, max, 0.0), Duration::from_secs(2));
        assert_eq!(compute_backoff(3, base, max, 0.0), Duration::from_secs(4));
    }

    #[test]
    fn backoff_is_capped() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(10);
        assert_eq!(compute_backoff(10, base, max, 0.0), max);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(300);
        for attempt in 1..6 {
            let delay = compute_backoff(attempt, base, max, 0.3);
            assert!(delay <= max);
        }
    }
}
