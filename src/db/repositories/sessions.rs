use anyhow::Result;
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_date, parse_datetime, parse_session_type, to_i64, DATE_FORMAT},
    models::{HistoryEntry, LeaderboardRow, SessionType},
};
use crate::timer::OwnerId;

fn row_to_session(row: &Row) -> Result<HistoryEntry> {
    let owner: String = row.get("owner")?;
    let date: String = row.get("date")?;
    let session_type: String = row.get("type")?;
    let created_at: String = row.get("created_at")?;

    Ok(HistoryEntry {
        id: row.get("id")?,
        owner: OwnerId::new(owner),
        title: row.get("title")?,
        date: parse_date(&date, "date")?,
        duration_minutes: row.get("duration_minutes")?,
        session_type: parse_session_type(&session_type)?,
        notes: row.get("notes")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    pub async fn insert_session(&self, entry: &HistoryEntry) -> Result<()> {
        let record = entry.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, owner, title, date, duration_minutes, type, notes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.owner.as_str(),
                    record.title,
                    record.date.format(DATE_FORMAT).to_string(),
                    record.duration_minutes,
                    record.session_type.as_str(),
                    record.notes,
                    record.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// All history entries of `owner`, newest first.
    pub async fn list_sessions(&self, owner: &OwnerId) -> Result<Vec<HistoryEntry>> {
        let owner = owner.clone();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner, title, date, duration_minutes, type, notes, created_at
                 FROM sessions
                 WHERE owner = ?1
                 ORDER BY created_at DESC",
            )?;

            let mut rows = stmt.query(params![owner.as_str()])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }

            Ok(sessions)
        })
        .await
    }

    pub async fn list_sessions_paginated(
        &self,
        owner: &OwnerId,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<HistoryEntry>> {
        let owner = owner.clone();
        let limit = to_i64(limit)?;
        let offset = to_i64(offset)?;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner, title, date, duration_minutes, type, notes, created_at
                 FROM sessions
                 WHERE owner = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2 OFFSET ?3",
            )?;

            let mut rows = stmt.query(params![owner.as_str(), limit, offset])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }

            Ok(sessions)
        })
        .await
    }

    /// Deletes one of `owner`'s entries. Entries of other owners are never touched.
    pub async fn delete_session(&self, owner: &OwnerId, session_id: &str) -> Result<bool> {
        let owner = owner.clone();
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "DELETE FROM sessions WHERE id = ?1 AND owner = ?2",
                params![session_id, owner.as_str()],
            )?;
            Ok(rows_affected > 0)
        })
        .await
    }

    /// Sum of completed work minutes, the figure shown on leaderboards.
    pub async fn total_work_minutes(&self, owner: &OwnerId) -> Result<i64> {
        let owner = owner.clone();
        self.execute(move |conn| {
            let total: i64 = conn.query_row(
                "SELECT COALESCE(SUM(duration_minutes), 0) FROM sessions
                 WHERE owner = ?1 AND type = ?2",
                params![owner.as_str(), SessionType::Work.as_str()],
                |row| row.get(0),
            )?;
            Ok(total)
        })
        .await
    }

    /// Owners with any history, ranked by work minutes. Ties break on owner id.
    pub async fn leaderboard(&self, limit: u64) -> Result<Vec<LeaderboardRow>> {
        let limit = to_i64(limit)?;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT owner,
                        COALESCE(SUM(CASE WHEN type = ?1 THEN duration_minutes ELSE 0 END), 0)
                            AS total_minutes
                 FROM sessions
                 GROUP BY owner
                 ORDER BY total_minutes DESC, owner ASC
                 LIMIT ?2",
            )?;

            let mut rows = stmt.query(params![SessionType::Work.as_str(), limit])?;
            let mut board = Vec::new();
            while let Some(row) = rows.next()? {
                let owner: String = row.get("owner")?;
                board.push(LeaderboardRow {
                    owner: OwnerId::new(owner),
                    total_minutes: row.get("total_minutes")?,
                });
            }

            Ok(board)
        })
        .await
    }
}
