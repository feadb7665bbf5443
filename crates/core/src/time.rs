use chrono::{DateTime, Duration, Utc};

/// Wall-clock source for session timestamps.
///
/// The countdown itself is tick-driven; this clock only answers "what time is it"
/// when a session starts and when it is submitted.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    /// Whole seconds elapsed since `since`, clamped at zero.
    ///
    /// A `since` in the future (clock skew, a fixed clock rewound in tests)
    /// yields `0` rather than a negative duration.
    #[must_use]
    pub fn seconds_since(&self, since: DateTime<Utc>) -> u64 {
        let elapsed = self.now().signed_duration_since(since).num_seconds();
        u64::try_from(elapsed).unwrap_or(0)
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_since_counts_fixed_advance() {
        let mut clock = fixed_clock();
        let started = clock.now();
        clock.advance(Duration::seconds(95));
        assert_eq!(clock.seconds_since(started), 95);
    }

    #[test]
    fn seconds_since_clamps_future_start() {
        let clock = fixed_clock();
        let later = fixed_now() + Duration::seconds(30);
        assert_eq!(clock.seconds_since(later), 0);
    }
}
