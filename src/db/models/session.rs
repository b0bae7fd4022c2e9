//! History entries appended when a timer is completed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timer::OwnerId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Work,
    Break,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Work => "work",
            SessionType::Break => "break",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            SessionType::Work => "Study Session",
            SessionType::Break => "Break Session",
        }
    }
}

/// One owner's standing: summed work minutes across their history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardRow {
    #[serde(rename = "_id")]
    pub owner: OwnerId,
    #[serde(rename = "totalMinutes")]
    pub total_minutes: i64,
}

/// An immutable record of one finished interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "user_id")]
    pub owner: OwnerId,
    pub title: String,
    pub date: NaiveDate,
    #[serde(rename = "duration")]
    pub duration_minutes: i64,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        owner: OwnerId,
        title: String,
        date: NaiveDate,
        duration_minutes: i64,
        session_type: SessionType,
        notes: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner,
            title,
            date,
            duration_minutes,
            session_type,
            notes,
            created_at,
        }
    }
}
