//! Wall-clock abstraction.
//!
//! Every piece of timer arithmetic asks a [`Clock`] for "now" so tests can swap in
//! [`FakeClock`] and step time deterministically.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

pub trait Clock: Send + Sync {
    /// Current instant in UTC. Never goes backwards for a given clock.
    fn now(&self) -> DateTime<Utc>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// System clock clamped so that a backwards wall-clock step is never observed.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let mut last = lock(&self.last);
        let now = match *last {
            Some(previous) => previous.max(Utc::now()),
            None => Utc::now(),
        };
        *last = Some(now);
        now
    }
}

/// Steppable clock for tests. Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct FakeClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut current = lock(&self.current);
        *current += by;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *lock(&self.current) = instant;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default())
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_steps_are_shared_between_clones() {
        let clock = FakeClock::default();
        let other = clock.clone();
        let t0 = clock.now();

        other.advance_secs(90);

        assert_eq!(clock.now() - t0, Duration::seconds(90));
    }

    #[test]
    fn fake_clock_can_be_pinned() {
        let clock = FakeClock::default();
        let pinned = DateTime::<Utc>::default() + Duration::days(1);
        clock.set(pinned);
        assert_eq!(clock.now(), pinned);
        assert_eq!(clock.now(), pinned);
    }

    #[test]
    fn system_clock_is_non_decreasing() {
        let clock = SystemClock::new();
        let mut previous = clock.now();
        for _ in 0..1_000 {
            let next = clock.now();
            assert!(next >= previous);
            previous = next;
        }
    }
}
