use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use super::ChatSession;

const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);

pub type SessionHandle = Arc<SessionSlot>;

/// One live session: its state plus a separate turn lock that only sends
/// take, so short reads of the state never look like an in-flight send.
pub struct SessionSlot {
    state: Arc<Mutex<ChatSession>>,
    turn: Arc<Mutex<()>>,
    last_seen: StdMutex<Instant>,
}

impl SessionSlot {
    fn new(session: ChatSession) -> Self {
        Self {
            state: Arc::new(Mutex::new(session)),
            turn: Arc::new(Mutex::new(())),
            last_seen: StdMutex::new(Instant::now()),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, ChatSession> {
        self.state.lock().await
    }

    pub async fn lock_owned(&self) -> OwnedMutexGuard<ChatSession> {
        self.state.clone().lock_owned().await
    }

    /// Claims the session for one send. `None` while another send is running.
    pub fn try_begin_turn(&self) -> Option<OwnedMutexGuard<()>> {
        self.turn.clone().try_lock_owned().ok()
    }

    fn is_turn_running(&self) -> bool {
        self.turn.try_lock().is_err()
    }

    fn touch(&self) {
        if let Ok(mut last_seen) = self.last_seen.lock() {
            *last_seen = Instant::now();
        }
    }

    fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .map(|last_seen| last_seen.elapsed())
            .unwrap_or_default()
    }
}

/// In-memory store of live sessions. Each session sits behind its own mutex
/// so a slow completion in one session never blocks another.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an initialized session and returns its id.
    pub async fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let mut session = ChatSession::new(id.clone());
        session.initialize();

        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(SessionSlot::new(session)));
        debug!("Created session {id}");
        id
    }

    /// Looks up a session and marks it as recently used.
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        let handle = self.sessions.read().await.get(id).cloned()?;
        handle.touch();
        Some(handle)
    }

    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            debug!("Ended session {id}");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops sessions unused for longer than `ttl`. Sessions with a send in
    /// flight are kept. Returns how many were removed.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| slot.is_turn_running() || slot.idle_for() <= ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("Evicted {evicted} idle sessions, {} live", sessions.len());
        }
        evicted
    }

    /// Background task sweeping idle sessions every quarter of `ttl`.
    pub fn spawn_reaper(&self, ttl: Duration) -> JoinHandle<()> {
        let store = self.clone();
        let period = (ttl / 4).max(MIN_SWEEP_PERIOD);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                store.evict_idle(ttl).await;
            }
        })
    }
}
