use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_optional_datetime},
};
use crate::timer::{OwnerId, TimerRecord};

fn row_to_timer(row: &Row) -> Result<TimerRecord> {
    let owner: String = row.get("owner")?;
    let start_time: String = row.get("start_time")?;
    let paused_at: Option<String> = row.get("paused_at")?;
    let created_at: String = row.get("created_at")?;

    Ok(TimerRecord {
        owner: OwnerId::new(owner),
        start_time: parse_datetime(&start_time, "start_time")?,
        duration_secs: row.get("duration_secs")?,
        is_work_session: row.get("is_work_session")?,
        current_interval: row.get("current_interval")?,
        total_intervals: row.get("total_intervals")?,
        paused: row.get("paused")?,
        paused_at: parse_optional_datetime(paused_at, "paused_at")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Insert or fully replace the owner's timer row.
    pub async fn upsert_timer(&self, record: &TimerRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO active_timers (owner, start_time, duration_secs, is_work_session, current_interval, total_intervals, paused, paused_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(owner) DO UPDATE SET
                     start_time = excluded.start_time,
                     duration_secs = excluded.duration_secs,
                     is_work_session = excluded.is_work_session,
                     current_interval = excluded.current_interval,
                     total_intervals = excluded.total_intervals,
                     paused = excluded.paused,
                     paused_at = excluded.paused_at,
                     created_at = excluded.created_at",
                params![
                    record.owner.as_str(),
                    record.start_time.to_rfc3339(),
                    record.duration_secs,
                    record.is_work_session,
                    record.current_interval,
                    record.total_intervals,
                    record.paused,
                    record.paused_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_timer(&self, owner: &OwnerId) -> Result<Option<TimerRecord>> {
        let owner = owner.clone();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT owner, start_time, duration_secs, is_work_session, current_interval, total_intervals, paused, paused_at, created_at
                 FROM active_timers
                 WHERE owner = ?1",
            )?;

            let timer = stmt
                .query_row(params![owner.as_str()], |row| Ok(row_to_timer(row)))
                .optional()?
                .transpose()?;

            Ok(timer)
        })
        .await
    }

    /// Returns whether a row was removed.
    pub async fn delete_timer(&self, owner: &OwnerId) -> Result<bool> {
        let owner = owner.clone();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "DELETE FROM active_timers WHERE owner = ?1",
                params![owner.as_str()],
            )?;
            Ok(rows_affected > 0)
        })
        .await
    }
}
