//! Run session tracking.
//!
//! One session is "current" at a time. Starting a new one cancels the
//! previous session and moves it into a bounded ring of recent sessions.

use crate::runner::{RunError, RunReport};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default number of finished sessions retained.
pub const DEFAULT_SESSION_CAPACITY: usize = 16;

// ── Cancellation ─────────────────────────────────────────────────────────

/// Cooperative cancellation flag, checked by the run loop between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ── Progress ─────────────────────────────────────────────────────────────

/// Iteration counters shared between the run loop and status readers.
#[derive(Debug, Default)]
pub struct RunProgress {
    completed: AtomicU64,
    total: AtomicU64,
}

impl RunProgress {
    pub fn new(total: u64) -> Self {
        Self {
            completed: AtomicU64::new(0),
            total: AtomicU64::new(total),
        }
    }

    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Release);
    }

    /// Publish the number of finished iterations. Called after every other
    /// per-iteration update so a reader never sees a count ahead of the data.
    pub fn advance(&self, completed: u64) {
        self.completed.store(completed, Ordering::Release);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }
}

// ── Session State ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub id: Uuid,
    pub state: SessionState,
    pub completed: u64,
    pub total: u64,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug)]
enum Outcome {
    Completed(PathBuf),
    Failed(String),
    Cancelled,
}

struct Session {
    id: Uuid,
    token: CancellationToken,
    progress: Arc<RunProgress>,
    started: Instant,
    finished: OnceLock<(Outcome, Duration)>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    fn status(&self) -> SessionStatus {
        let (state, elapsed, artifact, error) = match self.finished.get() {
            None => (SessionState::Running, self.started.elapsed(), None, None),
            Some((Outcome::Completed(path), took)) => {
                (SessionState::Completed, *took, Some(path.clone()), None)
            }
            Some((Outcome::Failed(message), took)) => {
                (SessionState::Failed, *took, None, Some(message.clone()))
            }
            Some((Outcome::Cancelled, took)) => (SessionState::Cancelled, *took, None, None),
        };
        SessionStatus {
            id: self.id,
            state,
            completed: self.progress.completed(),
            total: self.progress.total(),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            artifact,
            error,
        }
    }

    fn is_running(&self) -> bool {
        self.finished.get().is_none()
    }
}

// ── Registry ─────────────────────────────────────────────────────────────

/// Owns the current session and a ring of earlier ones.
pub struct SessionRegistry {
    current: RwLock<Option<Arc<Session>>>,
    history: RwLock<VecDeque<Arc<Session>>>,
    capacity: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_CAPACITY)
    }
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            current: RwLock::new(None),
            history: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Start `job` on its own thread and make it the current session.
    ///
    /// A still-running previous session is cancelled before it is replaced.
    pub fn start<F>(&self, total: u64, job: F) -> io::Result<Uuid>
    where
        F: FnOnce(&CancellationToken, &RunProgress) -> Result<RunReport, RunError> + Send + 'static,
    {
        let session = Arc::new(Session {
            id: Uuid::new_v4(),
            token: CancellationToken::new(),
            progress: Arc::new(RunProgress::new(total)),
            started: Instant::now(),
            finished: OnceLock::new(),
            thread: Mutex::new(None),
        });

        // Cancel the previous run before the new one is spawned or published.
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        let previous = current.take();
        if let Some(previous) = previous.as_ref().filter(|s| s.is_running()) {
            debug!(id = %previous.id, "cancelling previous session");
            previous.token.cancel();
        }

        let worker = Arc::clone(&session);
        let spawned = std::thread::Builder::new()
            .name(format!("agentperf-run-{}", session.id.simple()))
            .spawn(move || {
                let result = job(&worker.token, &worker.progress);
                let outcome = match result {
                    Ok(report) => Outcome::Completed(report.artifact_path),
                    Err(RunError::Cancelled { completed }) => {
                        info!(id = %worker.id, completed, "session cancelled");
                        Outcome::Cancelled
                    }
                    Err(error) => {
                        warn!(id = %worker.id, %error, "session failed");
                        Outcome::Failed(error.to_string())
                    }
                };
                let _ = worker.finished.set((outcome, worker.started.elapsed()));
            });
        let spawned = spawned.map(|handle| {
            *session.thread.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
            *current = Some(Arc::clone(&session));
        });
        drop(current);

        if let Some(previous) = previous {
            self.retire(previous);
        }
        spawned?;

        info!(id = %session.id, total, "session started");
        Ok(session.id)
    }

    /// Status of session `id`, or of the current session when `id` is `None`.
    pub fn status(&self, id: Option<Uuid>) -> Option<SessionStatus> {
        self.find(id).map(|s| s.status())
    }

    /// Cancel the current session. Returns false when nothing is running.
    pub fn stop(&self) -> bool {
        let current = self.current.read().unwrap_or_else(|e| e.into_inner());
        match current.as_ref() {
            Some(session) if session.is_running() => {
                session.token.cancel();
                info!(id = %session.id, "stop requested");
                true
            }
            _ => false,
        }
    }

    /// Block until session `id` finishes and return its final status.
    pub fn wait(&self, id: Uuid) -> Option<SessionStatus> {
        let session = self.find(Some(id))?;
        let handle = session
            .thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                let _ = session.finished.set((
                    Outcome::Failed("run thread panicked".to_string()),
                    session.started.elapsed(),
                ));
            }
        }
        Some(session.status())
    }

    /// Number of retained earlier sessions.
    pub fn history_len(&self) -> usize {
        self.history.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn find(&self, id: Option<Uuid>) -> Option<Arc<Session>> {
        let current = self.current.read().unwrap_or_else(|e| e.into_inner());
        let Some(id) = id else {
            return current.clone();
        };
        if let Some(session) = current.as_ref().filter(|s| s.id == id) {
            return Some(Arc::clone(session));
        }
        drop(current);
        let history = self.history.read().unwrap_or_else(|e| e.into_inner());
        history.iter().find(|s| s.id == id).cloned()
    }

    fn retire(&self, session: Arc<Session>) {
        if self.capacity == 0 {
            return;
        }
        let mut history = self.history.write().unwrap_or_else(|e| e.into_inner());
        while history.len() >= self.capacity {
            if let Some(evicted) = history.pop_front() {
                debug!(id = %evicted.id, "evicting oldest session");
            }
        }
        history.push_back(session);
    }
}
