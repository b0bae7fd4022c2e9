use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

/// A closure bound for the worker. It owns its reply channel, so the worker never
/// needs to know the caller's result type.
type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum WorkerMessage {
    Run(Job),
    Stop,
}

/// Shared by every `Database` clone. Dropping the last clone stops the worker and
/// waits for it, so queued jobs finish before the connection closes.
struct Worker {
    sender: mpsc::Sender<WorkerMessage>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let mut guard = match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            // `Stop` queues behind pending jobs; the channel is FIFO.
            if let Err(err) = self.sender.send(WorkerMessage::Stop) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

/// Handle to the SQLite database.
///
/// The connection lives on one dedicated thread for its whole life and is never
/// shared. Jobs run there one at a time in the order they were submitted, so a single
/// `execute` call is atomic with respect to every other; a sequence of calls is not.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let path_for_thread = db_path.clone();
        Self::spawn(db_path, move || Connection::open(&path_for_thread))
    }

    /// Private, non-durable database. Contents vanish when the last handle drops.
    pub fn in_memory() -> Result<Self> {
        Self::spawn(PathBuf::from(":memory:"), Connection::open_in_memory)
    }

    fn spawn<F>(db_path: PathBuf, open: F) -> Result<Self>
    where
        F: FnOnce() -> rusqlite::Result<Connection> + Send + 'static,
    {
        let (job_tx, job_rx) = mpsc::channel::<WorkerMessage>();
        let (ready_tx, ready_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("pomodoro-db".into())
            .spawn(move || {
                let mut conn = match open() {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                // A closed channel means every handle is gone; treat it like `Stop`.
                while let Ok(WorkerMessage::Run(job)) = job_rx.recv() {
                    job(&mut conn);
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        // Block until migrations ran so callers never see a half-initialized schema.
        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            worker: Arc::new(Worker {
                sender: job_tx,
                handle: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    /// Runs `task` on the worker and awaits its result. The task must not block on
    /// another `execute`; the worker would wait on itself.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let job = WorkerMessage::Run(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        self.worker
            .sender
            .send(job)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_parent_directories_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pomodoro.sqlite3");

        {
            let db = Database::new(path.clone()).unwrap();
            assert_eq!(db.path(), path.as_path());
        }

        let db = Database::new(path).unwrap();
        let version: i32 = db
            .execute(|conn| {
                Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn jobs_run_in_submission_order_across_clones() {
        let db = Database::in_memory().unwrap();
        db.execute(|conn| {
            conn.execute_batch("CREATE TABLE seen (n INTEGER NOT NULL)")?;
            Ok(())
        })
        .await
        .unwrap();

        let other = db.clone();
        // `join!` polls in argument order, so the slow insert is queued first.
        let (inserted, seen) = tokio::join!(
            db.execute(|conn| {
                std::thread::sleep(std::time::Duration::from_millis(50));
                conn.execute("INSERT INTO seen (n) VALUES (1)", [])?;
                Ok(())
            }),
            other.execute(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM seen", [], |row| row.get::<_, i64>(0))?)
            }),
        );
        inserted.unwrap();
        assert_eq!(seen.unwrap(), 1);
    }

    #[tokio::test]
    async fn last_clone_dropped_releases_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pomodoro.sqlite3");

        let db = Database::new(path.clone()).unwrap();
        let clone = db.clone();
        drop(db);
        clone
            .execute(|conn| {
                conn.execute_batch("CREATE TABLE kept (id INTEGER)")?;
                Ok(())
            })
            .await
            .unwrap();
        drop(clone);

        let reopened = Database::new(path).unwrap();
        let tables: i64 = reopened
            .execute(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE name = 'kept'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[tokio::test]
    async fn execute_propagates_task_errors() {
        let db = Database::in_memory().unwrap();
        let result: Result<()> = db.execute(|_| Err(anyhow!("boom"))).await;
        assert_eq!(result.unwrap_err().to_string(), "boom");
    }
}
