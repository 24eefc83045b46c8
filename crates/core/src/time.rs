use chrono::{DateTime, Duration, Utc};

/// Wall-clock source for the lesson services.
///
/// Video time never comes from here; this only paces side effects such as
/// durable writes, and lets tests pin "now".
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

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Time elapsed since `earlier`, never negative.
    #[must_use]
    pub fn since(&self, earlier: DateTime<Utc>) -> Duration {
        (self.now() - earlier).max(Duration::zero())
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Deterministic timestamp for tests (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0).unwrap_or_default()
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
    fn fixed_clock_advances() {
        let mut clock = fixed_clock();
        let start = clock.now();
        clock.advance(Duration::seconds(3));
        assert_eq!(clock.since(start), Duration::seconds(3));
        assert_eq!(clock.now().timestamp(), FIXED_TEST_TIMESTAMP + 3);
    }

    #[test]
    fn since_is_never_negative() {
        let clock = fixed_clock();
        let later = clock.now() + Duration::seconds(10);
        assert_eq!(clock.since(later), Duration::zero());
    }
}
