//! Transport-neutral request handlers. A web layer only needs to pull the bearer token
//! and JSON body out of its request, call one of these, and serialize the result with
//! the returned status code.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    db::{HistoryEntry, LeaderboardRow},
    identity::Credentials,
    log_warn,
    timer::{OwnerId, StartTimerRequest, TimerError, TimerRecord, TimerSnapshot},
    AppState,
};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ApiError {
    #[serde(skip)]
    pub status: u16,
    pub error: String,
}

impl ApiError {
    fn new(status: u16, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(401, "unauthorized")
    }
}

impl From<TimerError> for ApiError {
    fn from(err: TimerError) -> Self {
        match err {
            TimerError::NoActiveTimer | TimerError::NoPausedTimer => {
                ApiError::new(404, err.to_string())
            }
            TimerError::InvalidParameters(message) => ApiError::new(400, message),
            TimerError::Storage(inner) => {
                log_warn!("Responding 500 after storage failure: {:#}", inner);
                ApiError::new(500, "internal error")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Ack {
    pub message: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimerStarted {
    pub message: &'static str,
    pub timer: TimerRecord,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WorkTotal {
    #[serde(rename = "totalMinutes")]
    pub total_minutes: i64,
}

pub type CommandResult<T> = Result<T, ApiError>;

const DEFAULT_PAGE_SIZE: i64 = 50;
const LEADERBOARD_SIZE: u64 = 50;

fn storage_error(err: anyhow::Error) -> ApiError {
    TimerError::Storage(err).into()
}

fn authenticate(state: &AppState, credentials: &Credentials<'_>) -> CommandResult<OwnerId> {
    state
        .identity
        .authenticate(credentials)
        .ok_or_else(ApiError::unauthenticated)
}

fn int_field(payload: &Map<String, Value>, name: &str) -> Result<Option<i64>, TimerError> {
    match payload.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_i64()
            .map(Some)
            .ok_or_else(|| TimerError::invalid(format!("{name} must be an integer"))),
        Some(Value::String(raw)) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| TimerError::invalid(format!("{name} must be an integer"))),
        Some(_) => Err(TimerError::invalid(format!("{name} must be an integer"))),
    }
}

fn bool_field(payload: &Map<String, Value>, name: &str) -> Result<Option<bool>, TimerError> {
    match payload.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(*flag)),
        Some(Value::String(raw)) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            _ => Err(TimerError::invalid(format!("{name} must be a boolean"))),
        },
        Some(_) => Err(TimerError::invalid(format!("{name} must be a boolean"))),
    }
}

/// Accepts JSON numbers or form-style strings for each field; anything unparsable is
/// rejected instead of silently defaulted.
pub fn parse_start_request(payload: &Value) -> Result<StartTimerRequest, TimerError> {
    let empty = Map::new();
    let fields = match payload {
        Value::Null => &empty,
        Value::Object(fields) => fields,
        _ => return Err(TimerError::invalid("request body must be an object")),
    };

    Ok(StartTimerRequest {
        duration: int_field(fields, "duration")?,
        is_work_session: bool_field(fields, "is_work_session")?,
        current_interval: int_field(fields, "current_interval")?,
        total_intervals: int_field(fields, "total_intervals")?,
    })
}

pub async fn start_timer(
    state: &AppState,
    credentials: Credentials<'_>,
    payload: &Value,
) -> CommandResult<TimerStarted> {
    let owner = authenticate(state, &credentials)?;
    let request = parse_start_request(payload)?;
    let timer = state.timer.start_timer(&owner, request).await?;
    Ok(TimerStarted {
        message: "Timer started",
        timer,
    })
}

pub async fn get_timer_status(
    state: &AppState,
    credentials: Credentials<'_>,
) -> CommandResult<TimerSnapshot> {
    let owner = authenticate(state, &credentials)?;
    Ok(state.timer.get_status(&owner).await?)
}

pub async fn pause_timer(state: &AppState, credentials: Credentials<'_>) -> CommandResult<Ack> {
    let owner = authenticate(state, &credentials)?;
    state.timer.pause_timer(&owner).await?;
    Ok(Ack {
        message: "Timer paused",
    })
}

pub async fn resume_timer(state: &AppState, credentials: Credentials<'_>) -> CommandResult<Ack> {
    let owner = authenticate(state, &credentials)?;
    state.timer.resume_timer(&owner).await?;
    Ok(Ack {
        message: "Timer resumed",
    })
}

pub async fn stop_timer(state: &AppState, credentials: Credentials<'_>) -> CommandResult<Ack> {
    let owner = authenticate(state, &credentials)?;
    state.timer.stop_timer(&owner).await?;
    Ok(Ack {
        message: "Timer stopped",
    })
}

pub async fn complete_timer(state: &AppState, credentials: Credentials<'_>) -> CommandResult<Ack> {
    let owner = authenticate(state, &credentials)?;
    state.timer.complete_timer(&owner).await?;
    Ok(Ack {
        message: "Timer completed and saved",
    })
}

pub async fn list_sessions(
    state: &AppState,
    credentials: Credentials<'_>,
) -> CommandResult<Vec<HistoryEntry>> {
    let owner = authenticate(state, &credentials)?;
    state.db.list_sessions(&owner).await.map_err(storage_error)
}

/// `limit` defaults to 50 and `offset` to 0; both accept numbers or numeric strings.
pub async fn list_sessions_paginated(
    state: &AppState,
    credentials: Credentials<'_>,
    query: &Value,
) -> CommandResult<Vec<HistoryEntry>> {
    let owner = authenticate(state, &credentials)?;
    let empty = Map::new();
    let fields = match query {
        Value::Null => &empty,
        Value::Object(fields) => fields,
        _ => return Err(TimerError::invalid("query must be an object").into()),
    };

    let limit = int_field(fields, "limit")?.unwrap_or(DEFAULT_PAGE_SIZE);
    let offset = int_field(fields, "offset")?.unwrap_or(0);
    let (Ok(limit), Ok(offset)) = (u64::try_from(limit), u64::try_from(offset)) else {
        return Err(TimerError::invalid("limit and offset must not be negative").into());
    };

    state
        .db
        .list_sessions_paginated(&owner, limit, offset)
        .await
        .map_err(storage_error)
}

pub async fn delete_session(
    state: &AppState,
    credentials: Credentials<'_>,
    session_id: &str,
) -> CommandResult<Ack> {
    let owner = authenticate(state, &credentials)?;
    let deleted = state
        .db
        .delete_session(&owner, session_id)
        .await
        .map_err(storage_error)?;

    if !deleted {
        return Err(ApiError::new(404, "Session not found"));
    }
    Ok(Ack {
        message: "Session deleted",
    })
}

pub async fn total_work_minutes(
    state: &AppState,
    credentials: Credentials<'_>,
) -> CommandResult<WorkTotal> {
    let owner = authenticate(state, &credentials)?;
    let total_minutes = state
        .db
        .total_work_minutes(&owner)
        .await
        .map_err(storage_error)?;
    Ok(WorkTotal { total_minutes })
}

/// Top 50 owners by work minutes. Any authenticated caller may read it.
pub async fn leaderboard(
    state: &AppState,
    credentials: Credentials<'_>,
) -> CommandResult<Vec<LeaderboardRow>> {
    authenticate(state, &credentials)?;
    state
        .db
        .leaderboard(LEADERBOARD_SIZE)
        .await
        .map_err(storage_error)
}
