//! Monotonic-clock helpers for the `*_updated_at` timestamps in the config store.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in whole seconds since the UNIX epoch.
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Current time in milliseconds since the UNIX epoch.
pub fn now_unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_unix_is_monotonic_across_calls() {
        let a = now_unix_millis();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = now_unix_millis();
        assert!(b >= a);
    }

    #[test]
    fn now_unix_is_a_reasonable_timestamp() {
        assert!(now_unix() > 1_700_000_000);
    }
}
