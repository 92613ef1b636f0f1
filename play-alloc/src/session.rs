//! Per-session allocation state
//!
//! [`SessionContext`] is owned by the request layer and passed into every
//! allocator call; the allocator keeps no session state of its own.
//! [`SessionRegistry`] is how the HTTP layer keeps contexts between requests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::pool::SurveyId;

/// Session identifier used when the collaborator supplies none
pub const DEFAULT_SESSION_ID: &str = "default";

/// State of one respondent's run through one survey
#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: String,
    /// Files already presented in this session
    selected: HashSet<PathBuf>,
    /// This session has already advanced the survey's subfolder counter
    counter_advanced: bool,
}

impl SessionContext {
    /// Create an empty context; a missing or blank id becomes [`DEFAULT_SESSION_ID`]
    pub fn new(session_id: Option<&str>) -> Self {
        let session_id = session_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_SESSION_ID);
        Self {
            session_id: session_id.to_string(),
            selected: HashSet::new(),
            counter_advanced: false,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn selected(&self) -> &HashSet<PathBuf> {
        &self.selected
    }

    pub fn is_selected(&self, path: &Path) -> bool {
        self.selected.contains(path)
    }

    pub fn mark_selected(&mut self, path: PathBuf) {
        self.selected.insert(path);
    }

    /// Forget every presented file (pool exhausted, start a replay cycle)
    pub fn reset_selection(&mut self) {
        self.selected.clear();
    }

    pub fn counter_advanced(&self) -> bool {
        self.counter_advanced
    }

    pub fn mark_counter_advanced(&mut self) {
        self.counter_advanced = true;
    }
}

type SessionKey = (SurveyId, String);

/// Sessions idle this long are dropped from memory
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Dropped sessions that took their counter step are remembered this long
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on the time between two sweeps
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct LiveSession {
    context: Arc<AsyncMutex<SessionContext>>,
    last_touched: Instant,
}

#[derive(Debug)]
struct Sessions {
    live: HashMap<SessionKey, LiveSession>,
    /// Sessions no longer in memory that already advanced the counter
    retired: HashMap<SessionKey, Instant>,
    last_sweep: Instant,
}

/// Live session contexts keyed by survey and session id
///
/// Each context sits behind its own async mutex so two concurrent requests of
/// the same session run one after the other, while different sessions never
/// wait on each other.
///
/// Contexts leave memory on completion or after `idle_timeout` without a
/// request. The counter-step marker outlives them for `retention`: a session
/// coming back within that window (late render, retried completion) is
/// recreated as already advanced.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Mutex<Sessions>,
    idle_timeout: Duration,
    retention: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_timeouts(DEFAULT_IDLE_TIMEOUT, DEFAULT_RETENTION)
    }
}

fn session_key(survey: &SurveyId, session_id: &str) -> SessionKey {
    let session_id = SessionContext::new(Some(session_id)).session_id;
    (survey.clone(), session_id)
}

/// Marker state of a context that is leaving memory
///
/// A context locked by an in-flight request is counted as advanced; that
/// request is about to take the step if it has not yet.
fn has_advanced(context: &AsyncMutex<SessionContext>) -> bool {
    context
        .try_lock()
        .map(|ctx| ctx.counter_advanced())
        .unwrap_or(true)
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeouts(idle_timeout: Duration, retention: Duration) -> Self {
        Self {
            sessions: Mutex::new(Sessions {
                live: HashMap::new(),
                retired: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            idle_timeout,
            retention,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Sessions> {
        self.sessions.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Exclusive access to a session's context, creating it on first use
    pub async fn acquire(&self, survey: &SurveyId, session_id: &str) -> OwnedMutexGuard<SessionContext> {
        let now = Instant::now();
        let key = session_key(survey, session_id);

        let slot = {
            let mut sessions = self.lock();
            if now.duration_since(sessions.last_sweep) >= self.idle_timeout.min(MAX_SWEEP_INTERVAL) {
                self.sweep_locked(&mut sessions, now);
            }

            let Sessions { live, retired, .. } = &mut *sessions;
            let entry = live.entry(key).or_insert_with_key(|key| {
                let mut context = SessionContext::new(Some(key.1.as_str()));
                if retired.remove(key).is_some() {
                    context.mark_counter_advanced();
                }
                LiveSession {
                    context: Arc::new(AsyncMutex::new(context)),
                    last_touched: now,
                }
            });
            entry.last_touched = now;
            entry.context.clone()
        };

        slot.lock_owned().await
    }

    /// Drop a finished session's context, keeping its counter-step marker
    ///
    /// Returns whether the session was in memory.
    pub fn finish(&self, survey: &SurveyId, session_id: &str) -> bool {
        let key = session_key(survey, session_id);
        let now = Instant::now();
        let mut sessions = self.lock();
        match sessions.live.remove(&key) {
            Some(session) => {
                if has_advanced(&session.context) {
                    sessions.retired.insert(key, now);
                }
                true
            }
            None => false,
        }
    }

    /// Drop idle contexts and expired markers as of `now`
    ///
    /// Returns the number of contexts dropped. Contexts held by a request are
    /// never dropped.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut sessions = self.lock();
        self.sweep_locked(&mut sessions, now)
    }

    fn sweep_locked(&self, sessions: &mut Sessions, now: Instant) -> usize {
        let idle: Vec<SessionKey> = sessions
            .live
            .iter()
            .filter(|(_, session)| {
                Arc::strong_count(&session.context) == 1
                    && now.duration_since(session.last_touched) >= self.idle_timeout
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in &idle {
            if let Some(session) = sessions.live.remove(key) {
                if has_advanced(&session.context) {
                    sessions.retired.insert(key.clone(), session.last_touched);
                }
            }
        }

        let retention = self.retention;
        sessions
            .retired
            .retain(|_, since| now.duration_since(*since) < retention);
        sessions.last_sweep = now;

        if !idle.is_empty() {
            debug!(
                dropped = idle.len(),
                live = sessions.live.len(),
                remembered = sessions.retired.len(),
                "Idle sessions dropped"
            );
        }
        idle.len()
    }

    /// Contexts currently in memory
    pub fn len(&self) -> usize {
        self.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dropped sessions still remembered as advanced
    pub fn remembered(&self) -> usize {
        self.lock().retired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn survey(id: &str) -> SurveyId {
        SurveyId::parse(id).unwrap()
    }

    #[test]
    fn test_default_session_id() {
        assert_eq!(SessionContext::new(None).session_id(), DEFAULT_SESSION_ID);
        assert_eq!(SessionContext::new(Some("  ")).session_id(), DEFAULT_SESSION_ID);
        assert_eq!(SessionContext::new(Some("S1")).session_id(), "S1");
    }

    #[test]
    fn test_selection_and_reset() {
        let mut ctx = SessionContext::new(Some("S1"));
        ctx.mark_selected(PathBuf::from("/p/01/01.mp3"));
        ctx.mark_selected(PathBuf::from("/p/01/01.mp3"));
        assert_eq!(ctx.selected().len(), 1);
        assert!(ctx.is_selected(Path::new("/p/01/01.mp3")));

        ctx.reset_selection();
        assert!(ctx.selected().is_empty());
        assert!(!ctx.counter_advanced());
    }

    #[tokio::test]
    async fn test_registry_keeps_state_between_requests() {
        let registry = SessionRegistry::new();
        {
            let mut ctx = registry.acquire(&survey("42"), "S1").await;
            ctx.mark_counter_advanced();
            ctx.mark_selected(PathBuf::from("/p/01/01.mp3"));
        }

        let ctx = registry.acquire(&survey("42"), "S1").await;
        assert!(ctx.counter_advanced());
        assert_eq!(ctx.selected().len(), 1);
    }

    #[tokio::test]
    async fn test_registry_isolates_sessions_and_surveys() {
        let registry = SessionRegistry::new();
        registry.acquire(&survey("42"), "S1").await.mark_counter_advanced();

        assert!(!registry.acquire(&survey("42"), "S2").await.counter_advanced());
        assert!(!registry.acquire(&survey("43"), "S1").await.counter_advanced());
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn test_finish_remembers_advanced_sessions() {
        let registry = SessionRegistry::new();
        registry.acquire(&survey("42"), "").await.mark_counter_advanced();
        drop(registry.acquire(&survey("42"), "S2").await);

        assert!(registry.finish(&survey("42"), DEFAULT_SESSION_ID));
        assert!(!registry.finish(&survey("42"), DEFAULT_SESSION_ID));
        assert!(registry.finish(&survey("42"), "S2"));
        assert!(registry.is_empty());
        // S2 never took a counter step, nothing to remember
        assert_eq!(registry.remembered(), 1);

        // Coming back after completion does not start over
        let ctx = registry.acquire(&survey("42"), DEFAULT_SESSION_ID).await;
        assert!(ctx.counter_advanced());
        assert!(ctx.selected().is_empty());
        drop(ctx);
        assert!(!registry.acquire(&survey("42"), "S2").await.counter_advanced());
        assert_eq!(registry.remembered(), 0);
    }

    #[tokio::test]
    async fn test_sweep_drops_abandoned_sessions() {
        let registry = SessionRegistry::with_timeouts(Duration::from_secs(60), Duration::from_secs(3600));
        for i in 0..500 {
            let mut ctx = registry.acquire(&survey("42"), &format!("S{}", i)).await;
            if i % 2 == 0 {
                ctx.mark_counter_advanced();
            }
        }
        assert_eq!(registry.len(), 500);

        assert_eq!(registry.sweep(Instant::now()), 0);
        assert_eq!(registry.sweep(Instant::now() + Duration::from_secs(61)), 500);
        assert!(registry.is_empty());
        assert_eq!(registry.remembered(), 250);

        assert!(registry.acquire(&survey("42"), "S0").await.counter_advanced());
        assert!(!registry.acquire(&survey("42"), "S1").await.counter_advanced());

        // Markers expire after the retention window
        registry.sweep(Instant::now() + Duration::from_secs(3700));
        assert_eq!(registry.remembered(), 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_keeps_sessions_in_use() {
        let registry = SessionRegistry::with_timeouts(Duration::ZERO, Duration::from_secs(3600));
        let held = registry.acquire(&survey("42"), "S1").await;
        drop(registry.acquire(&survey("42"), "S2").await);

        assert_eq!(registry.sweep(Instant::now()), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(held.session_id(), "S1");
    }

    #[tokio::test]
    async fn test_acquire_sweeps_idle_sessions() {
        let registry = SessionRegistry::with_timeouts(Duration::ZERO, Duration::from_secs(3600));
        for i in 0..50 {
            registry
                .acquire(&survey("42"), &format!("S{}", i))
                .await
                .mark_counter_advanced();
        }

        // Only the most recent session is still in memory
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.remembered(), 49);
    }
}
