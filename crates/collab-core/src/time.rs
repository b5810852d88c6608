//! Wall-clock timestamps in milliseconds since the Unix epoch.
//!
//! The store records `updated_at` / `created_at` as f64 milliseconds,
//! matching what every client writes. Timestamps are only compared for
//! recency, never required to be globally monotonic across clients.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_is_nonzero_and_nondecreasing() {
        let a = now_ms();
        let b = now_ms();
        assert!(a > 0.0);
        assert!(b >= a);
    }
}
