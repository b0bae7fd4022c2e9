use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// Values applied to a start request that leaves fields out, plus the duration cap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimerSettings {
    pub duration_minutes: i64,
    pub is_work_session: bool,
    pub current_interval: i64,
    pub total_intervals: i64,
    pub max_duration_minutes: i64,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            duration_minutes: 25,
            is_work_session: true,
            current_interval: 0,
            total_intervals: 4,
            max_duration_minutes: 24 * 60,
        }
    }
}

/// Largest cap whose duration still fits in whole milliseconds as an `i64`.
pub const MAX_DURATION_MINUTES_LIMIT: i64 = i64::MAX / 60_000;

impl TimerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_duration_minutes < 1 || self.max_duration_minutes > MAX_DURATION_MINUTES_LIMIT
        {
            bail!(
                "max_duration_minutes must be between 1 and {}",
                MAX_DURATION_MINUTES_LIMIT
            );
        }
        if self.duration_minutes < 1 || self.duration_minutes > self.max_duration_minutes {
            bail!(
                "default duration_minutes must be between 1 and {}",
                self.max_duration_minutes
            );
        }
        if self.current_interval < 0 {
            bail!("default current_interval must not be negative");
        }
        if self.total_intervals < 1 {
            bail!("default total_intervals must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub database_path: PathBuf,
    pub timer: TimerSettings,
    /// Bearer token -> owner id, consumed by the built-in token identity provider.
    pub api_tokens: HashMap<String, String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("pomodoro.sqlite3"),
            timer: TimerSettings::default(),
            api_tokens: HashMap::new(),
        }
    }
}

/// Shared, live settings. Readers see updates immediately; updates are written back
/// to the file the store was loaded from, if any.
pub struct SettingsStore {
    path: Option<PathBuf>,
    data: RwLock<ServerSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        } else {
            ServerSettings::default()
        };

        data.timer
            .validate()
            .with_context(|| format!("Invalid timer settings in {}", path.display()))?;

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    /// Store with no backing file; updates only live in memory.
    pub fn ephemeral(data: ServerSettings) -> Result<Self> {
        data.timer.validate()?;
        Ok(Self {
            path: None,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, ServerSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, ServerSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn snapshot(&self) -> ServerSettings {
        self.read().clone()
    }

    pub fn timer(&self) -> TimerSettings {
        self.read().timer.clone()
    }

    /// Validates and persists first; the live value only changes once the write lands.
    pub fn update_timer(&self, settings: TimerSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write();
        let mut updated = guard.clone();
        updated.timer = settings;
        self.persist(&updated)?;
        *guard = updated;
        Ok(())
    }

    fn persist(&self, data: &ServerSettings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }
}
