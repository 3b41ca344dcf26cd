//! Process-wide monotonic timestamp source.
//!
//! Stored timestamps order the log and the resend cursor. Wall clocks
//! can step backwards (NTP adjustment, suspend/resume), which would
//! break timestamp-ascending iteration, so every stamp is forced to be
//! strictly greater than the previous one issued by this process.

use std::sync::{Mutex, PoisonError};

use dlcsync_types::Timestamp;

/// Strictly increasing millisecond clock.
///
/// Returns wall-clock time while it moves forward; when the wall clock
/// stalls or steps back, returns the previous stamp plus one.
pub struct MonotonicClock {
    last_millis: Mutex<i64>,
}

impl MonotonicClock {
    /// Creates a clock that has issued no stamps yet.
    pub fn new() -> Self {
        Self {
            last_millis: Mutex::new(0),
        }
    }

    /// Returns the next timestamp in epoch milliseconds.
    pub fn now_millis(&self) -> i64 {
        let wall = Timestamp::now().as_millis();

        // A panic elsewhere cannot corrupt a plain i64; recover the
        // inner value instead of propagating poisoning.
        let mut last = self
            .last_millis
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let next = if wall > *last { wall } else { *last + 1 };
        *last = next;
        next
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_strictly_increase() {
        let clock = MonotonicClock::new();
        let mut prev = clock.now_millis();
        for _ in 0..1000 {
            let next = clock.now_millis();
            assert!(next > prev, "stamps must strictly increase");
            prev = next;
        }
    }

    #[test]
    fn stamps_unique_across_threads() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let clock = Arc::new(MonotonicClock::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let c = Arc::clone(&clock);
            handles.push(std::thread::spawn(move || {
                (0..250).map(|_| c.now_millis()).collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for h in handles {
            for stamp in h.join().unwrap() {
                assert!(seen.insert(stamp), "duplicate stamp issued: {stamp}");
            }
        }
    }
}
