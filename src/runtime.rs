//! Runtime for live chat sessions
//!
//! Owns every connected client's session and the controller that runs
//! turns against the model.

mod accumulate;
mod turn;

pub use turn::{TurnController, TurnError};

use crate::session::{Message, SessionEvent, SessionState, SessionStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, OwnedMutexGuard, RwLock};

/// One client's session: the store plus its event channel and turn slot
pub struct Session {
    id: String,
    store: Mutex<SessionStore>,
    events: broadcast::Sender<SessionEvent>,
    /// Held for the duration of a turn
    turn_slot: Arc<tokio::sync::Mutex<()>>,
    last_active: Mutex<Instant>,
}

impl Session {
    pub fn new(id: impl Into<String>, default_instruction: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            id: id.into(),
            store: Mutex::new(SessionStore::new(default_instruction, events.clone())),
            events,
            turn_slot: Arc::new(tokio::sync::Mutex::new(())),
            last_active: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn store(&self) -> MutexGuard<'_, SessionStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state
    pub fn state(&self) -> SessionState {
        self.store().get_state().clone()
    }

    pub fn apply_new_instruction(&self, text: impl Into<String>) {
        self.store().apply_new_instruction(text);
    }

    #[cfg(test)]
    pub fn append(&self, message: Message) {
        self.store().append(message);
    }

    /// Append the user message and capture what the turn runs against.
    ///
    /// Returns the generation and instruction read under the same lock as the
    /// append, so a concurrent reset lands either wholly before or wholly
    /// after the turn starts.
    pub fn begin_turn(&self, prompt: &str) -> (u64, String) {
        let mut store = self.store();
        let generation = store.generation();
        let instruction = store.get_state().instruction.clone();
        store.append(Message::user(prompt));
        (generation, instruction)
    }

    pub fn append_if_current(&self, generation: u64, message: Message) -> bool {
        self.store().append_if_current(generation, message)
    }

    pub fn generation(&self) -> u64 {
        self.store().generation()
    }

    pub fn publish(&self, event: SessionEvent) {
        self.store().notify(event);
    }

    #[cfg(test)]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Subscribe and copy the state under one lock, so the subscriber sees
    /// every change after the copy and none before it
    pub fn subscribe_with_state(&self) -> (SessionState, broadcast::Receiver<SessionEvent>) {
        let mut store = self.store();
        let state = store.get_state().clone();
        (state, self.events.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn is_turn_pending(&self) -> bool {
        self.turn_slot.try_lock().is_err()
    }

    /// Nobody is watching and nothing is running
    fn is_unobserved(&self) -> bool {
        self.subscriber_count() == 0 && !self.is_turn_pending()
    }

    fn touch(&self) {
        *self.last_active.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    fn try_claim_turn(&self) -> Result<OwnedMutexGuard<()>, TurnError> {
        Arc::clone(&self.turn_slot)
            .try_lock_owned()
            .map_err(|_| TurnError::Busy)
    }
}

/// How long sessions outlive their clients
#[derive(Debug, Clone, Copy)]
pub struct SessionLifetimes {
    /// Delay between the last subscriber disconnecting and the release, so
    /// an `EventSource` reconnect finds its session again
    pub disconnect_grace: Duration,
    /// Unobserved sessions untouched for this long are evicted
    pub idle_timeout: Duration,
}

impl Default for SessionLifetimes {
    fn default() -> Self {
        Self {
            disconnect_grace: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// Registry of live sessions
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    default_instruction: String,
    lifetimes: SessionLifetimes,
}

impl SessionManager {
    pub fn new(default_instruction: impl Into<String>, lifetimes: SessionLifetimes) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            default_instruction: default_instruction.into(),
            lifetimes,
        }
    }

    pub fn disconnect_grace(&self) -> Duration {
        self.lifetimes.disconnect_grace
    }

    /// Create a session with a fresh id, evicting idle ones first
    pub async fn create(&self) -> Arc<Session> {
        self.evict_idle().await;

        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(id.clone(), self.default_instruction.clone()));
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::clone(&session));
        tracing::info!(session_id = %id, "Session created");
        session
    }

    /// Look a session up and mark it active
    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.read().await.get(id).cloned()?;
        session.touch();
        Some(session)
    }

    /// Tear a session down. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!(session_id = %id, "Session closed");
        }
        removed
    }

    /// Tear a session down if nobody watches it and no turn is running
    pub async fn release_if_unobserved(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let unobserved = sessions.get(id).is_some_and(|s| s.is_unobserved());
        if unobserved {
            sessions.remove(id);
            tracing::info!(session_id = %id, "Client disconnected, session released");
        }
        unobserved
    }

    /// Drop unobserved sessions idle for longer than the idle timeout.
    /// Returns how many were evicted.
    pub async fn evict_idle(&self) -> usize {
        let idle_timeout = self.lifetimes.idle_timeout;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| {
            let expired = session.is_unobserved() && session.idle_for() >= idle_timeout;
            if expired {
                tracing::info!(session_id = %id, "Idle session evicted");
            }
            !expired
        });
        before - sessions.len()
    }

    #[cfg(test)]
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::DEFAULT_INSTRUCTION;

    fn manager(idle_timeout: Duration) -> SessionManager {
        SessionManager::new(
            DEFAULT_INSTRUCTION,
            SessionLifetimes {
                disconnect_grace: Duration::ZERO,
                idle_timeout,
            },
        )
    }

    #[tokio::test]
    async fn test_get_returns_same_session() {
        let manager = manager(Duration::from_secs(600));
        let session = manager.create().await;
        let found = manager.get(session.id()).await.unwrap();
        assert!(Arc::ptr_eq(&session, &found));
        assert_eq!(manager.count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_created() {
        let manager = manager(Duration::from_secs(600));
        let id = uuid::Uuid::new_v4().to_string();
        assert!(manager.get(&id).await.is_none());
        assert_eq!(manager.count().await, 0);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let manager = manager(Duration::from_secs(600));
        let a = manager.create().await;
        let b = manager.create().await;
        assert_ne!(a.id(), b.id());

        a.append(Message::user("only in a"));
        assert_eq!(a.state().transcript.len(), 1);
        assert!(b.state().transcript.is_empty());
    }

    #[tokio::test]
    async fn test_configured_default_instruction() {
        let manager = SessionManager::new("Answer in French.", SessionLifetimes::default());
        let session = manager.create().await;
        assert_eq!(session.state().instruction, "Answer in French.");
    }

    #[tokio::test]
    async fn test_release_waits_for_last_subscriber() {
        let manager = manager(Duration::from_secs(600));
        let session = manager.create().await;
        let id = session.id().to_string();

        let rx1 = session.subscribe();
        let rx2 = session.subscribe();
        drop(rx1);
        assert!(!manager.release_if_unobserved(&id).await);
        assert!(manager.get(&id).await.is_some());

        drop(rx2);
        assert!(manager.release_if_unobserved(&id).await);
        assert!(manager.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_release_skipped_while_turn_pending() {
        let manager = manager(Duration::from_secs(600));
        let session = manager.create().await;
        let id = session.id().to_string();

        let permit = session.try_claim_turn().unwrap();
        assert!(!manager.release_if_unobserved(&id).await);

        drop(permit);
        assert!(manager.release_if_unobserved(&id).await);
    }

    #[tokio::test]
    async fn test_idle_unobserved_sessions_are_evicted_on_create() {
        let manager = manager(Duration::ZERO);
        let abandoned = manager.create().await;
        let watched = manager.create().await;
        let _rx = watched.subscribe();
        let busy = manager.create().await;
        let _permit = busy.try_claim_turn().unwrap();

        let fresh = manager.create().await;

        assert!(manager.get(abandoned.id()).await.is_none());
        assert!(manager.get(watched.id()).await.is_some());
        assert!(manager.get(busy.id()).await.is_some());
        assert!(manager.get(fresh.id()).await.is_some());
    }

    #[tokio::test]
    async fn test_recently_active_sessions_survive_eviction() {
        let manager = manager(Duration::from_secs(600));
        for _ in 0..5 {
            manager.create().await;
        }
        assert_eq!(manager.evict_idle().await, 0);
        assert_eq!(manager.count().await, 5);
    }

    #[tokio::test]
    async fn test_begin_turn_pairs_instruction_with_generation() {
        let manager = manager(Duration::from_secs(600));
        let session = manager.create().await;
        session.apply_new_instruction("You are a pirate.");

        let (generation, instruction) = session.begin_turn("ahoy?");
        assert_eq!(generation, session.generation());
        assert_eq!(instruction, "You are a pirate.");
        assert_eq!(session.state().transcript.len(), 1);

        session.apply_new_instruction("You are a poet.");
        assert!(!session.append_if_current(generation, Message::assistant("arr")));
        assert!(session.state().transcript.is_empty());
    }

    #[tokio::test]
    async fn test_remove() {
        let manager = manager(Duration::from_secs(600));
        let session = manager.create().await;
        assert!(manager.remove(session.id()).await);
        assert!(!manager.remove(session.id()).await);
        assert_eq!(manager.count().await, 0);
    }
}
