use chrono::{DateTime, Duration, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::cmp;
use std::fmt;

use crate::db::models::{HistoryEntry, SessionType};

/// Stable identifier of the user a timer belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coarse lifecycle phase of a timer as seen by callers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimerPhase {
    Absent,
    Running,
    Paused,
}

impl TimerPhase {
    pub fn of(record: Option<&TimerRecord>) -> Self {
        match record {
            None => TimerPhase::Absent,
            Some(record) if record.paused => TimerPhase::Paused,
            Some(_) => TimerPhase::Running,
        }
    }
}

/// The single live timer of one owner.
///
/// `start_time` is not the creation instant: resume shifts it forward by the time spent
/// paused, which keeps the remaining-time formula a plain subtraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimerRecord {
    #[serde(rename = "user_id")]
    pub owner: OwnerId,
    pub start_time: DateTime<Utc>,
    #[serde(rename = "duration")]
    pub duration_secs: i64,
    pub is_work_session: bool,
    pub current_interval: i64,
    pub total_intervals: i64,
    pub paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Result of [`TimerRecord::remaining`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining {
    pub remaining_secs: i64,
    pub is_complete: bool,
}

/// Outcome of a transition. Rejections carry no record; nothing is raised.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Applied(TimerRecord),
    AlreadyPaused,
    NotPaused,
}

/// Inputs for a fresh timer, already validated by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSpec {
    pub duration_minutes: i64,
    pub is_work_session: bool,
    pub current_interval: i64,
    pub total_intervals: i64,
}

fn non_negative(duration: Duration) -> Duration {
    cmp::max(duration, Duration::zero())
}

impl TimerRecord {
    /// Builds a running timer starting at `now`. Replacement of an existing record is
    /// the store's concern; this never looks at prior state.
    pub fn start(owner: OwnerId, spec: TimerSpec, now: DateTime<Utc>) -> Self {
        Self {
            owner,
            start_time: now,
            duration_secs: spec.duration_minutes.saturating_mul(60),
            is_work_session: spec.is_work_session,
            current_interval: spec.current_interval,
            total_intervals: spec.total_intervals,
            paused: false,
            paused_at: None,
            created_at: now,
        }
    }

    pub fn phase(&self) -> TimerPhase {
        TimerPhase::of(Some(self))
    }

    fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let reference = match (self.paused, self.paused_at) {
            (true, Some(paused_at)) => paused_at,
            _ => now,
        };
        non_negative(reference - self.start_time)
    }

    /// Elapsed whole seconds, truncated toward zero and never negative.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        self.elapsed(now).num_seconds()
    }

    /// Remaining time is computed at millisecond precision and only then truncated to
    /// whole seconds, so a poll mid-second reports the lower value.
    pub fn remaining(&self, now: DateTime<Utc>) -> Remaining {
        let remaining_ms = cmp::max(
            self.duration_secs
                .saturating_mul(1000)
                .saturating_sub(self.elapsed(now).num_milliseconds()),
            0,
        );
        let remaining_secs = remaining_ms / 1000;
        Remaining {
            remaining_secs,
            is_complete: remaining_secs <= 0,
        }
    }

    pub fn pause(&self, now: DateTime<Utc>) -> Transition {
        if self.paused {
            return Transition::AlreadyPaused;
        }
        Transition::Applied(Self {
            paused: true,
            paused_at: Some(now),
            ..self.clone()
        })
    }

    pub fn resume(&self, now: DateTime<Utc>) -> Transition {
        let paused_at = match (self.paused, self.paused_at) {
            (true, Some(paused_at)) => paused_at,
            (true, None) => {
                warn!(
                    "Timer for {} is paused without a pause instant; resuming without shift",
                    self.owner
                );
                now
            }
            (false, _) => return Transition::NotPaused,
        };
        let paused_for = non_negative(now - paused_at);
        Transition::Applied(Self {
            start_time: self.start_time + paused_for,
            paused: false,
            paused_at: None,
            ..self.clone()
        })
    }

    /// History entry recorded when this timer is completed at `now`. Completion is
    /// allowed whether or not the countdown has reached zero.
    pub fn complete(&self, now: DateTime<Utc>) -> HistoryEntry {
        let session_type = if self.is_work_session {
            SessionType::Work
        } else {
            SessionType::Break
        };
        let minutes = self.duration_secs / 60;
        HistoryEntry::new(
            self.owner.clone(),
            session_type.title().to_string(),
            now.date_naive(),
            minutes,
            session_type,
            format!("Completed {minutes} minute session"),
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn spec(minutes: i64) -> TimerSpec {
        TimerSpec {
            duration_minutes: minutes,
            is_work_session: true,
            current_interval: 0,
            total_intervals: 4,
        }
    }

    fn applied(transition: Transition) -> TimerRecord {
        match transition {
            Transition::Applied(record) => record,
            other => panic!("expected applied transition, got {other:?}"),
        }
    }

    #[test]
    fn fresh_timer_has_full_duration_remaining() {
        let record = TimerRecord::start(OwnerId::new("u1"), spec(25), t0());
        assert_eq!(record.duration_secs, 1500);
        assert_eq!(
            record.remaining(t0()),
            Remaining {
                remaining_secs: 1500,
                is_complete: false
            }
        );
        assert_eq!(record.phase(), TimerPhase::Running);
    }

    #[test]
    fn fractional_seconds_round_remaining_down() {
        let record = TimerRecord::start(OwnerId::new("u1"), spec(1), t0());
        let now = t0() + Duration::milliseconds(10_999);
        assert_eq!(record.elapsed_secs(now), 10);
        assert_eq!(record.remaining(now).remaining_secs, 49);
    }

    #[test]
    fn last_partial_second_reports_zero_and_complete() {
        let record = TimerRecord::start(OwnerId::new("u1"), spec(1), t0());
        let nearly = record.remaining(t0() + Duration::milliseconds(59_500));
        assert_eq!(
            nearly,
            Remaining {
                remaining_secs: 0,
                is_complete: true
            }
        );

        let earlier = record.remaining(t0() + Duration::milliseconds(58_500));
        assert_eq!(earlier.remaining_secs, 1);
        assert!(!earlier.is_complete);
    }

    #[test]
    fn paused_remaining_rounds_down_at_pause_instant() {
        let record = TimerRecord::start(OwnerId::new("u1"), spec(1), t0());
        let paused = applied(record.pause(t0() + Duration::milliseconds(30_250)));
        assert_eq!(
            paused.remaining(t0() + Duration::hours(1)).remaining_secs,
            29
        );
    }

    #[test]
    fn resume_without_pause_instant_does_not_shift_start() {
        let mut record = TimerRecord::start(OwnerId::new("u1"), spec(5), t0());
        record.paused = true;
        record.paused_at = None;

        let resumed = applied(record.resume(t0() + Duration::minutes(3)));
        assert!(!resumed.paused);
        assert_eq!(resumed.start_time, t0());
        assert_eq!(
            resumed.remaining(t0() + Duration::minutes(3)).remaining_secs,
            120
        );
    }

    #[test]
    fn remaining_floors_at_zero() {
        let record = TimerRecord::start(OwnerId::new("u1"), spec(1), t0());
        let done = record.remaining(t0() + Duration::hours(3));
        assert_eq!(done.remaining_secs, 0);
        assert!(done.is_complete);
    }

    #[test]
    fn clock_behind_start_does_not_add_time() {
        let record = TimerRecord::start(OwnerId::new("u1"), spec(5), t0());
        assert_eq!(
            record.remaining(t0() - Duration::seconds(30)).remaining_secs,
            300
        );
    }

    #[test]
    fn pause_then_resume_preserves_remaining() {
        let record = TimerRecord::start(OwnerId::new("u1"), spec(25), t0());
        let pause_at = t0() + Duration::minutes(10);
        let paused = applied(record.pause(pause_at));
        assert_eq!(paused.phase(), TimerPhase::Paused);
        assert_eq!(paused.remaining(pause_at + Duration::hours(2)).remaining_secs, 900);

        let resume_at = pause_at + Duration::minutes(5);
        let resumed = applied(paused.resume(resume_at));
        assert!(!resumed.paused);
        assert_eq!(resumed.paused_at, None);
        assert_eq!(resumed.start_time, t0() + Duration::minutes(5));
        assert_eq!(resumed.remaining(resume_at).remaining_secs, 900);

        let end = resumed.remaining(resume_at + Duration::seconds(900));
        assert_eq!(end.remaining_secs, 0);
        assert!(end.is_complete);
    }

    #[test]
    fn pausing_twice_is_rejected() {
        let record = TimerRecord::start(OwnerId::new("u1"), spec(25), t0());
        let paused = applied(record.pause(t0()));
        assert_eq!(paused.pause(t0() + Duration::seconds(5)), Transition::AlreadyPaused);
    }

    #[test]
    fn resuming_a_running_timer_is_rejected() {
        let record = TimerRecord::start(OwnerId::new("u1"), spec(25), t0());
        assert_eq!(record.resume(t0()), Transition::NotPaused);
    }

    #[test]
    fn completion_derives_history_entry() {
        let mut record = TimerRecord::start(OwnerId::new("u1"), spec(25), t0());
        record.duration_secs = 1519;
        let entry = record.complete(t0());
        assert_eq!(entry.duration_minutes, 25);
        assert_eq!(entry.session_type, SessionType::Work);
        assert_eq!(entry.title, "Study Session");
        assert_eq!(entry.notes, "Completed 25 minute session");
        assert_eq!(entry.date, t0().date_naive());

        record.is_work_session = false;
        let entry = record.complete(t0());
        assert_eq!(entry.session_type, SessionType::Break);
        assert_eq!(entry.title, "Break Session");
    }

    #[test]
    fn record_serializes_with_wire_field_names() {
        let record = TimerRecord::start(OwnerId::new("u1"), spec(25), t0());
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["user_id"], "u1");
        assert_eq!(value["duration"], 1500);
        assert_eq!(value["paused"], false);
        assert!(value.get("paused_at").is_none());
    }

    proptest! {
        #[test]
        fn pausing_is_transparent_to_remaining_time(
            minutes in 1i64..600,
            before_pause in 0i64..40_000,
            pause_len in 0i64..100_000,
            after in 0i64..40_000,
        ) {
            let record = TimerRecord::start(OwnerId::new("p"), spec(minutes), t0());
            let pause_at = t0() + Duration::seconds(before_pause);
            let paused = applied(record.pause(pause_at));
            let resume_at = pause_at + Duration::seconds(pause_len);
            let resumed = applied(paused.resume(resume_at));

            let shifted = resumed.remaining(resume_at + Duration::seconds(after));
            let unpaused = record.remaining(pause_at + Duration::seconds(after));
            prop_assert_eq!(shifted, unpaused);
        }
    }
}
