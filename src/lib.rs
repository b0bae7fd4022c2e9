//! Server-authoritative Pomodoro timers.
//!
//! Each owner has at most one live timer. All time arithmetic happens here against an
//! injected [`clock::Clock`], so clients only ever poll for status.

pub mod clock;
pub mod db;
pub mod identity;
pub mod settings;
pub mod timer;
mod utils;

use std::{path::Path, sync::Arc};

use anyhow::Result;
use clock::{Clock, SystemClock};
use db::Database;
use identity::{IdentityProvider, TokenIdentity};
use settings::SettingsStore;
use timer::TimerController;

/// Everything a request handler needs, shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub timer: TimerController,
    pub identity: Arc<dyn IdentityProvider>,
    pub settings: Arc<SettingsStore>,
}

impl AppState {
    /// The database doubles as timer store and history sink. The controller shares
    /// `settings`, so timer updates made through it apply to the next start.
    pub fn new(
        db: Database,
        settings: Arc<SettingsStore>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(db.clone());
        let history = Arc::new(db.clone());
        Self {
            timer: TimerController::new(store, history, clock, settings.clone()),
            db,
            identity,
            settings,
        }
    }

    /// Loads settings from `settings_path` (defaults if the file is absent), opens the
    /// database and wires the timer controller to the system clock.
    pub fn bootstrap(settings_path: &Path) -> Result<Self> {
        let store = Arc::new(SettingsStore::new(settings_path.to_path_buf())?);
        let settings = store.snapshot();
        let database = Database::new(settings.database_path.clone())?;
        let identity = TokenIdentity::new(settings.api_tokens.clone());

        if settings.api_tokens.is_empty() {
            log::warn!("No API tokens configured; every request will be unauthenticated");
        }

        Ok(Self::new(
            database,
            store,
            Arc::new(identity),
            Arc::new(SystemClock::new()),
        ))
    }
}

/// Installs the `env_logger` backend. Reads `RUST_LOG`, defaulting to `info`, or
/// `debug` when `POMODORO_DEBUG` is set. Safe to call more than once.
pub fn init_logging() {
    let debug_mode = std::env::var("POMODORO_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let default_level = if debug_mode { "debug" } else { "info" };

    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level),
    )
    .try_init();
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::*;
    use crate::{identity::Credentials, timer::commands};

    #[tokio::test]
    async fn bootstrap_wires_settings_database_and_identity() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let settings_path = dir.path().join("settings.json");
        let db_path = dir.path().join("data").join("timers.sqlite3");
        fs::write(
            &settings_path,
            json!({
                "database_path": db_path,
                "timer": { "duration_minutes": 50 },
                "api_tokens": { "tok": "alice" },
            })
            .to_string(),
        )
        .unwrap();

        let state = AppState::bootstrap(&settings_path).unwrap();
        assert_eq!(state.db.path(), db_path.as_path());

        let started = commands::start_timer(&state, Credentials::bearer("tok"), &json!({}))
            .await
            .unwrap();
        assert_eq!(started.timer.duration_secs, 50 * 60);

        let status = commands::get_timer_status(&state, Credentials::bearer("tok"))
            .await
            .unwrap();
        assert!(status.remaining_time <= 3000 && status.remaining_time >= 2990);
    }

    #[tokio::test]
    async fn settings_updates_reach_running_state_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let settings_path = dir.path().join("settings.json");
        fs::write(
            &settings_path,
            json!({
                "database_path": dir.path().join("timers.sqlite3"),
                "api_tokens": { "tok": "alice" },
            })
            .to_string(),
        )
        .unwrap();

        let state = AppState::bootstrap(&settings_path).unwrap();
        let mut timer = state.settings.timer();
        timer.duration_minutes = 15;
        timer.total_intervals = 8;
        state.settings.update_timer(timer.clone()).unwrap();

        let started = commands::start_timer(&state, Credentials::bearer("tok"), &json!({}))
            .await
            .unwrap();
        assert_eq!(started.timer.duration_secs, 15 * 60);
        assert_eq!(started.timer.total_intervals, 8);

        let reloaded = SettingsStore::new(settings_path).unwrap();
        assert_eq!(reloaded.timer(), timer);
    }

    #[tokio::test]
    async fn timers_survive_a_new_state_over_the_same_database() {
        let dir = tempfile::tempdir().unwrap();
        let settings_path = dir.path().join("settings.json");
        fs::write(
            &settings_path,
            json!({
                "database_path": dir.path().join("timers.sqlite3"),
                "api_tokens": { "tok": "alice" },
            })
            .to_string(),
        )
        .unwrap();

        {
            let state = AppState::bootstrap(&settings_path).unwrap();
            commands::start_timer(&state, Credentials::bearer("tok"), &json!({ "duration": 10 }))
                .await
                .unwrap();
            commands::pause_timer(&state, Credentials::bearer("tok"))
                .await
                .unwrap();
        }

        let state = AppState::bootstrap(&settings_path).unwrap();
        let status = commands::get_timer_status(&state, Credentials::bearer("tok"))
            .await
            .unwrap();
        assert!(status.is_paused);
        assert!(status.remaining_time >= 595);
    }
}
