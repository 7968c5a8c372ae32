//! Per-subject session storage with coalesced initialization.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{Notify, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::types::{InitOutcome, Session};
use crate::error::{Result, ScrapeError};
use crate::http::cookies::{self, CookieMap};

/// Initialization shared by every caller of one burst.
struct InFlightState {
    result: OnceCell<Arc<InitOutcome>>,
    notify: Notify,
}

impl InFlightState {
    fn new() -> Self {
        Self {
            result: OnceCell::new(),
            notify: Notify::new(),
        }
    }

    fn set_result(&self, result: Arc<InitOutcome>) {
        let _ = self.result.set(result);
        self.notify.notify_waiters();
    }

    async fn wait(&self) -> Arc<InitOutcome> {
        loop {
            if let Some(result) = self.result.get() {
                return result.clone();
            }

            let notified = self.notify.notified();
            if let Some(result) = self.result.get() {
                return result.clone();
            }

            notified.await;
        }
    }
}

type InFlightRequest = Arc<InFlightState>;

/// Holds at most one [`Session`] per subject.
///
/// All mutation of stored sessions goes through this type. Readers get clones.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    in_flight: DashMap<String, InFlightRequest>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored session.
    pub fn get(&self, subject: &str) -> Option<Session> {
        self.sessions.get(subject).map(|entry| entry.value().clone())
    }

    /// Store `session`, replacing any existing one for its subject.
    pub fn insert(&self, session: Session) {
        self.sessions.insert(session.subject.clone(), session);
    }

    /// Drop the stored session so the next initialization starts from scratch.
    ///
    /// An initialization already in flight is left alone: it is fetching fresh
    /// state and will store it when done.
    pub fn invalidate(&self, subject: &str) {
        if self.sessions.remove(subject).is_some() {
            debug!(subject, "session invalidated");
        }
    }

    /// Merge `updates` into the stored session's cookies. Returns `false` when
    /// there is no session for `subject`.
    pub fn merge_cookies(&self, subject: &str, updates: &CookieMap) -> bool {
        if updates.is_empty() {
            return self.sessions.contains_key(subject);
        }
        match self.sessions.get_mut(subject) {
            Some(mut entry) => {
                cookies::merge(&mut entry.cookies, updates);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn has_in_flight(&self, subject: &str) -> bool {
        self.in_flight.contains_key(subject)
    }

    /// Run `init` for `subject`, or join the run already in progress.
    ///
    /// Concurrent callers share a single execution of `init` and receive the
    /// same outcome. A captured session is stored before waiters are woken.
    /// The in-flight marker is cleared on completion either way, so the next
    /// burst initializes again.
    ///
    /// Resolves to [`ScrapeError::Cancelled`] when `cancel` fires. When the
    /// leading caller is cancelled instead, the remaining callers elect a new
    /// leader and start over.
    pub async fn initialize<F, Fut>(
        &self,
        subject: &str,
        cancel: &CancellationToken,
        init: F,
    ) -> Result<Arc<InitOutcome>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = InitOutcome>,
    {
        loop {
            let (request, is_new) = self.get_or_create_in_flight(subject);

            let outcome = if is_new {
                trace!(subject, "leading initialization");
                let guard = InFlightGuard {
                    store: self,
                    subject,
                    request: request.clone(),
                    armed: true,
                };
                let outcome = Arc::new(init().await);
                guard.complete(outcome.clone());
                outcome
            } else {
                trace!(subject, "joining in-flight initialization");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                    outcome = request.wait() => outcome,
                }
            };

            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }
            if outcome.is_cancelled() && !is_new {
                // The leader gave up; this caller is still interested.
                continue;
            }
            return Ok(outcome);
        }
    }

    fn get_or_create_in_flight(&self, subject: &str) -> (InFlightRequest, bool) {
        if let Some(existing) = self.in_flight.get(subject) {
            return (existing.clone(), false);
        }

        let request = Arc::new(InFlightState::new());

        match self.in_flight.entry(subject.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                entry.insert(request.clone());
                (request, true)
            }
        }
    }

    fn finish_in_flight(&self, subject: &str, request: &InFlightRequest, outcome: Arc<InitOutcome>) {
        if let Some(session) = outcome.session.as_ref() {
            self.insert(session.clone());
        }
        self.in_flight
            .remove_if(subject, |_, current| Arc::ptr_eq(current, request));
        request.set_result(outcome);
    }
}

/// Clears the in-flight marker with a cancelled outcome if the leader is
/// dropped before finishing.
struct InFlightGuard<'a> {
    store: &'a SessionStore,
    subject: &'a str,
    request: InFlightRequest,
    armed: bool,
}

impl InFlightGuard<'_> {
    fn complete(mut self, outcome: Arc<InitOutcome>) {
        self.armed = false;
        self.store.finish_in_flight(self.subject, &self.request, outcome);
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.store.finish_in_flight(
                self.subject,
                &self.request,
                Arc::new(InitOutcome::failed(ScrapeError::Cancelled)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaRecord;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn session(subject: &str) -> Session {
        Session::new(
            subject,
            "csrf",
            cookies::parse_set_cookies(["a=1"]),
            json!({"name": "user-videos"}),
            json!({"data": {"page": 1}}),
            "user-videos",
        )
    }

    #[test]
    fn test_insert_get_invalidate() {
        let store = SessionStore::new();
        assert!(store.get("bob").is_none());
        store.insert(session("bob"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("bob").unwrap().csrf_token, "csrf");
        store.invalidate("bob");
        assert!(store.get("bob").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_merge_cookies() {
        let store = SessionStore::new();
        assert!(!store.merge_cookies("bob", &cookies::parse_set_cookies(["b=2"])));
        store.insert(session("bob"));
        assert!(store.merge_cookies("bob", &cookies::parse_set_cookies(["b=2"])));
        let cookies = store.get("bob").unwrap().cookies;
        assert_eq!(cookies["a"], "1");
        assert_eq!(cookies["b"], "2");
    }

    #[tokio::test]
    async fn test_concurrent_initialize_runs_once() {
        let store = Arc::new(SessionStore::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let runs = runs.clone();
            handles.push(tokio::spawn(async move {
                let cancel = CancellationToken::new();
                store
                    .initialize("alice", &cancel, || {
                        let runs = runs.clone();
                        async move {
                            runs.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            InitOutcome {
                                session: Some(session("alice")),
                                ..Default::default()
                            }
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            assert!(outcome.success());
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!store.has_in_flight("alice"));
        assert!(store.get("alice").is_some());
    }

    #[tokio::test]
    async fn test_failed_initialize_clears_marker_and_stores_nothing() {
        let store = SessionStore::new();
        let cancel = CancellationToken::new();
        let outcome = store
            .initialize("alice", &cancel, || async {
                InitOutcome::failed(ScrapeError::Status {
                    status: 500,
                    url: "https://v.test/alice".into(),
                })
            })
            .await
            .unwrap();
        assert!(!outcome.success());
        assert!(!store.has_in_flight("alice"));
        assert!(store.get("alice").is_none());

        // Records without protocol state are not a session.
        let outcome = store
            .initialize("alice", &cancel, || async {
                InitOutcome {
                    initial_records: vec![MediaRecord::new("a", "A", "https://v.test/watch/a")],
                    ..Default::default()
                }
            })
            .await
            .unwrap();
        assert!(outcome.success());
        assert!(store.get("alice").is_none());
    }

    #[tokio::test]
    async fn test_waiter_cancellation() {
        let store = Arc::new(SessionStore::new());
        let leader_store = store.clone();
        let leader = tokio::spawn(async move {
            let cancel = CancellationToken::new();
            leader_store
                .initialize("alice", &cancel, || async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    InitOutcome::default()
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.has_in_flight("alice"));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = store
            .initialize("alice", &cancel, || async { InitOutcome::default() })
            .await
            .unwrap_err();
        assert!(err.is_cancelled());

        assert!(leader.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_dropped_leader_hands_over() {
        let store = Arc::new(SessionStore::new());
        let leader_store = store.clone();
        let leader = tokio::spawn(async move {
            let cancel = CancellationToken::new();
            leader_store
                .initialize("alice", &cancel, || async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    InitOutcome::default()
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let waiter_store = store.clone();
        let waiter = tokio::spawn(async move {
            let cancel = CancellationToken::new();
            waiter_store
                .initialize("alice", &cancel, || async {
                    InitOutcome {
                        session: Some(session("alice")),
                        ..Default::default()
                    }
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();

        let outcome = waiter.await.unwrap().unwrap();
        assert!(outcome.success());
        assert!(store.get("alice").is_some());
        assert!(!store.has_in_flight("alice"));
    }
}
