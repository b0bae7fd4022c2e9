use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    clock::Clock,
    db::HistoryEntry,
    log_debug, log_error, log_info,
    settings::{SettingsStore, TimerSettings},
};

use super::{
    history::HistorySink, locks::OwnerLocks, store::TimerStore, OwnerId, TimerError,
    TimerRecord, TimerSpec, Transition,
};

const ENABLE_LOGS: bool = true;

/// Start parameters as they arrive from a client. Missing fields take the configured
/// defaults; `duration` is in minutes.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct StartTimerRequest {
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub is_work_session: Option<bool>,
    #[serde(default)]
    pub current_interval: Option<i64>,
    #[serde(default)]
    pub total_intervals: Option<i64>,
}

/// What a polling client needs to render the countdown.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub remaining_time: i64,
    pub is_work_session: bool,
    pub current_interval: i64,
    pub total_intervals: i64,
    pub is_complete: bool,
    pub is_paused: bool,
}

/// Entry point for every timer operation. Cheap to clone; clones share the store,
/// the lock table, the clock and the live settings.
#[derive(Clone)]
pub struct TimerController {
    store: Arc<dyn TimerStore>,
    history: Arc<dyn HistorySink>,
    clock: Arc<dyn Clock>,
    locks: Arc<OwnerLocks>,
    settings: Arc<SettingsStore>,
}

impl TimerController {
    pub fn new(
        store: Arc<dyn TimerStore>,
        history: Arc<dyn HistorySink>,
        clock: Arc<dyn Clock>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            store,
            history,
            clock,
            locks: Arc::new(OwnerLocks::new()),
            settings,
        }
    }

    fn validate(
        defaults: &TimerSettings,
        request: &StartTimerRequest,
    ) -> Result<TimerSpec, TimerError> {
        let spec = TimerSpec {
            duration_minutes: request.duration.unwrap_or(defaults.duration_minutes),
            is_work_session: request.is_work_session.unwrap_or(defaults.is_work_session),
            current_interval: request.current_interval.unwrap_or(defaults.current_interval),
            total_intervals: request.total_intervals.unwrap_or(defaults.total_intervals),
        };

        if spec.duration_minutes < 1 {
            return Err(TimerError::invalid("duration must be at least 1 minute"));
        }
        if spec.duration_minutes > defaults.max_duration_minutes {
            return Err(TimerError::invalid(format!(
                "duration must not exceed {} minutes",
                defaults.max_duration_minutes
            )));
        }
        if spec.current_interval < 0 {
            return Err(TimerError::invalid("current_interval must not be negative"));
        }
        if spec.total_intervals < 1 {
            return Err(TimerError::invalid("total_intervals must be at least 1"));
        }
        Ok(spec)
    }

    /// Starts a fresh timer, discarding any timer the owner already has.
    pub async fn start_timer(
        &self,
        owner: &OwnerId,
        request: StartTimerRequest,
    ) -> Result<TimerRecord, TimerError> {
        // Read per call so settings updates apply to the next start.
        let spec = Self::validate(&self.settings.timer(), &request)?;

        let _guard = self.locks.lock(owner).await;
        let record = TimerRecord::start(owner.clone(), spec, self.clock.now());
        self.store
            .upsert(owner, record.clone())
            .await
            .map_err(|err| self.storage_failure(owner, "start", err))?;

        log_info!(
            "Timer started for {}: {}s ({} session, interval {}/{})",
            owner,
            record.duration_secs,
            if record.is_work_session { "work" } else { "break" },
            record.current_interval,
            record.total_intervals
        );
        Ok(record)
    }

    pub async fn get_status(&self, owner: &OwnerId) -> Result<TimerSnapshot, TimerError> {
        let record = self.load(owner, "status").await?.ok_or(TimerError::NoActiveTimer)?;
        let remaining = record.remaining(self.clock.now());
        log_debug!(
            "Status for {}: {}s left ({:?})",
            owner,
            remaining.remaining_secs,
            record.phase()
        );

        Ok(TimerSnapshot {
            remaining_time: remaining.remaining_secs,
            is_work_session: record.is_work_session,
            current_interval: record.current_interval,
            total_intervals: record.total_intervals,
            is_complete: remaining.is_complete,
            is_paused: record.paused,
        })
    }

    pub async fn pause_timer(&self, owner: &OwnerId) -> Result<(), TimerError> {
        let _guard = self.locks.lock(owner).await;
        let record = self.load(owner, "pause").await?.ok_or(TimerError::NoActiveTimer)?;

        match record.pause(self.clock.now()) {
            Transition::Applied(paused) => {
                self.save(owner, paused, "pause").await?;
                log_info!("Timer paused for {}", owner);
                Ok(())
            }
            // An already paused timer is not an active one from the caller's view.
            Transition::AlreadyPaused | Transition::NotPaused => Err(TimerError::NoActiveTimer),
        }
    }

    pub async fn resume_timer(&self, owner: &OwnerId) -> Result<(), TimerError> {
        let _guard = self.locks.lock(owner).await;
        let record = self.load(owner, "resume").await?.ok_or(TimerError::NoPausedTimer)?;

        match record.resume(self.clock.now()) {
            Transition::Applied(resumed) => {
                let start_time = resumed.start_time;
                self.save(owner, resumed, "resume").await?;
                log_info!("Timer resumed for {}; start shifted to {}", owner, start_time);
                Ok(())
            }
            Transition::NotPaused | Transition::AlreadyPaused => Err(TimerError::NoPausedTimer),
        }
    }

    /// Discards the owner's timer without recording history.
    pub async fn stop_timer(&self, owner: &OwnerId) -> Result<(), TimerError> {
        let _guard = self.locks.lock(owner).await;
        let deleted = self
            .store
            .delete(owner)
            .await
            .map_err(|err| self.storage_failure(owner, "stop", err))?;

        if !deleted {
            return Err(TimerError::NoActiveTimer);
        }
        log_info!("Timer stopped for {}", owner);
        Ok(())
    }

    /// Records the timer in history and removes it, whether or not it has run out.
    ///
    /// History is appended before the record is deleted, so a failed append leaves the
    /// timer in place. Not safe to retry blindly: a retry after a failed delete would
    /// append a second entry.
    pub async fn complete_timer(&self, owner: &OwnerId) -> Result<HistoryEntry, TimerError> {
        let _guard = self.locks.lock(owner).await;
        let record = self.load(owner, "complete").await?.ok_or(TimerError::NoActiveTimer)?;

        let now = self.clock.now();
        let finished_early = !record.remaining(now).is_complete;
        let entry = record.complete(now);

        self.history
            .append(entry.clone())
            .await
            .map_err(|err| self.storage_failure(owner, "complete", err))?;
        self.store
            .delete(owner)
            .await
            .map_err(|err| self.storage_failure(owner, "complete", err))?;

        log_info!(
            "Timer completed for {}: {} minute {} session{}",
            owner,
            entry.duration_minutes,
            entry.session_type.as_str(),
            if finished_early { " (ended early)" } else { "" }
        );
        Ok(entry)
    }

    async fn load(
        &self,
        owner: &OwnerId,
        operation: &str,
    ) -> Result<Option<TimerRecord>, TimerError> {
        self.store
            .get(owner)
            .await
            .map_err(|err| self.storage_failure(owner, operation, err))
    }

    async fn save(
        &self,
        owner: &OwnerId,
        record: TimerRecord,
        operation: &str,
    ) -> Result<(), TimerError> {
        self.store
            .upsert(owner, record)
            .await
            .map_err(|err| self.storage_failure(owner, operation, err))
    }

    fn storage_failure(&self, owner: &OwnerId, operation: &str, err: anyhow::Error) -> TimerError {
        log_error!("Timer {} failed for {}: {:#}", operation, owner, err);
        TimerError::Storage(err)
    }
}
