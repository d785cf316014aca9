use rand::Rng;

/// Worker-side backoff policy. The engine itself never schedules retries;
/// whoever nacks owns the `scheduled_at` it passes along.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_seconds: i64,
    pub max_seconds: i64,
    pub jitter_pct: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_seconds: 2,
            max_seconds: 15 * 60,
            jitter_pct: 0.20,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt_no` (1-based): base * 2^(attempt_no-1),
    /// capped, with jitter in [-jitter_pct, +jitter_pct].
    pub fn next_delay_seconds(&self, attempt_no: i32, rng: &mut impl Rng) -> i64 {
        let exp = (attempt_no.max(1) as u32).saturating_sub(1);

        // 2^exp without overflow; the cap absorbs saturation.
        let pow2 = 1_i64.checked_shl(exp).unwrap_or(i64::MAX);
        let mut delay = self.base_seconds.saturating_mul(pow2);

        if delay > self.max_seconds {
            delay = self.max_seconds;
        }

        let jitter_range = (delay as f64) * self.jitter_pct;
        let jitter = if jitter_range > 0.0 {
            rng.gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };

        let jittered = (delay as f64 + jitter).round() as i64;
        jittered.clamp(0, self.max_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn delay_doubles_until_cap() {
        let policy = RetryPolicy {
            base_seconds: 2,
            max_seconds: 10,
            jitter_pct: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(policy.next_delay_seconds(1, &mut rng), 2);
        assert_eq!(policy.next_delay_seconds(2, &mut rng), 4);
        assert_eq!(policy.next_delay_seconds(3, &mut rng), 8);
        assert_eq!(policy.next_delay_seconds(4, &mut rng), 10);
        assert_eq!(policy.next_delay_seconds(60, &mut rng), 10);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            base_seconds: 10,
            max_seconds: 100,
            jitter_pct: 0.5,
        };
        let mut rng = StdRng::seed_from_u64(42);

        for attempt in 1..=6 {
            let d = policy.next_delay_seconds(attempt, &mut rng);
            assert!((0..=100).contains(&d), "delay {d} out of bounds");
        }
    }
}
