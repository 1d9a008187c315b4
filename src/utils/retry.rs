use rand::Rng;
use std::time::Duration;

/// Jitter applied on either side of the computed wait (±25%).
const JITTER_RATIO: f64 = 0.25;

/// 計算指數退避等待時間（秒）
///
/// `base * 2^attempt`, doubled for rate-limit responses, then perturbed by a uniform jitter of
/// up to ±25%. The result is never negative.
pub fn calculate_backoff<R: Rng + ?Sized>(
    attempt: u32,
    initial_backoff: f64,
    is_rate_limit: bool,
    rng: &mut R,
) -> f64 {
    if !initial_backoff.is_finite() || initial_backoff <= 0.0 {
        return 0.0;
    }

    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let mut base_wait = initial_backoff * 2f64.powi(exponent);
    if is_rate_limit {
        base_wait *= 2.0;
    }

    let jitter = base_wait * JITTER_RATIO * rng.gen_range(-1.0..=1.0);
    (base_wait + jitter).max(0.0)
}

/// Converts a wait in seconds into a sleepable duration, saturating on overflow.
pub fn backoff_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}
