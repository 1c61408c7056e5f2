//! Session lifecycle manager
//!
//! Owns the session list and its persistence. The active session is tracked
//! by id; at most one record has `is_active` set.

use crate::core::config::SessionConfig;
use crate::core::record::{SessionPatch, SessionRecord};
use crate::core::store::{JsonFileStore, MemoryStore};
use crate::error::{Result, SessionError};
use crate::traits::SessionStore;
use parking_lot::Mutex;
use pulsesocket::{Clock, EventEmitter, SessionSource, SubscriptionId};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct State {
    sessions: Vec<SessionRecord>,
    active: Option<String>,
}

impl State {
    fn active_record(&self) -> Option<&SessionRecord> {
        let id = self.active.as_deref()?;
        self.sessions.iter().find(|s| s.id == id)
    }
}

pub struct SessionManager {
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SessionStore>,
    state: Mutex<State>,
    on_change: EventEmitter<Option<SessionRecord>>,
    on_expired: EventEmitter<SessionRecord>,
}

fn generate_id(now_ms: i64) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!("session_{}_{}", now_ms, suffix.to_lowercase())
}

impl SessionManager {
    /// Load persisted sessions and pick up the active one
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let mut sessions = store.load()?;

        // Latest active record wins if storage holds several
        let active = sessions
            .iter()
            .filter(|s| s.is_active)
            .max_by_key(|s| s.start_time)
            .map(|s| s.id.clone());
        for session in sessions.iter_mut() {
            session.is_active = active.as_deref() == Some(session.id.as_str());
        }

        info!(
            "Loaded {} sessions (active: {})",
            sessions.len(),
            active.as_deref().unwrap_or("none")
        );

        Ok(Self {
            config,
            clock,
            store,
            state: Mutex::new(State { sessions, active }),
            on_change: EventEmitter::new("session change"),
            on_expired: EventEmitter::new("session expired"),
        })
    }

    /// Build with the store named by the config
    pub fn from_config(config: SessionConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let store: Arc<dyn SessionStore> = match config.storage_path {
            Some(ref path) => Arc::new(JsonFileStore::new(path)),
            None => Arc::new(MemoryStore::new()),
        };
        Self::new(config, store, clock)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Persist `sessions`, then make them current
    ///
    /// Nothing in memory changes unless the store accepted the new list.
    fn commit(
        &self,
        state: &mut State,
        sessions: Vec<SessionRecord>,
        active: Option<String>,
    ) -> Result<()> {
        self.store.save(&sessions)?;
        state.sessions = sessions;
        state.active = active;
        Ok(())
    }

    /// Start a fresh session, deactivating the current one
    pub fn create_session(&self) -> Result<SessionRecord> {
        let now = self.clock.now_ms();
        let record = SessionRecord {
            id: generate_id(now),
            start_time: now,
            is_active: true,
            auto_delete_at: now.saturating_add(self.config.lifetime_ms()),
            generated_music_count: 0,
        };

        {
            let mut state = self.state.lock();
            let mut sessions = state.sessions.clone();
            for session in sessions.iter_mut() {
                session.is_active = false;
            }
            sessions.push(record.clone());
            self.commit(&mut state, sessions, Some(record.id.clone()))?;
        }

        info!(
            "Created session {} (expires in {}h)",
            record.id, self.config.auto_delete_hours
        );
        self.on_change.emit(&Some(record.clone()));
        Ok(record)
    }

    /// Merge `patch` into session `id`
    ///
    /// Activating a session deactivates every other one. Subscribers hear
    /// about changes that touch the active session.
    pub fn update_session(&self, id: &str, patch: SessionPatch) -> Result<SessionRecord> {
        let (updated, notify) = {
            let mut state = self.state.lock();
            let was_active = state.active.as_deref() == Some(id);

            let mut sessions = state.sessions.clone();
            let index = sessions
                .iter()
                .position(|s| s.id == id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
            sessions[index].merge(&patch);
            let updated = sessions[index].clone();

            let active = if updated.is_active {
                for (i, session) in sessions.iter_mut().enumerate() {
                    session.is_active = i == index;
                }
                Some(updated.id.clone())
            } else if was_active {
                None
            } else {
                state.active.clone()
            };

            self.commit(&mut state, sessions, active)?;
            (updated, was_active || patch.is_active == Some(true))
        };

        debug!("Updated session {}", id);
        if notify {
            let current = Some(updated.clone()).filter(|s| s.is_active);
            self.on_change.emit(&current);
        }
        Ok(updated)
    }

    /// Remove session `id`; returns false if it did not exist
    pub fn delete_session(&self, id: &str) -> Result<bool> {
        let was_active = {
            let mut state = self.state.lock();
            if !state.sessions.iter().any(|s| s.id == id) {
                return Ok(false);
            }

            let sessions = state
                .sessions
                .iter()
                .filter(|s| s.id != id)
                .cloned()
                .collect();
            let was_active = state.active.as_deref() == Some(id);
            let active = if was_active { None } else { state.active.clone() };
            self.commit(&mut state, sessions, active)?;
            was_active
        };

        info!("Deleted session {}", id);
        if was_active {
            self.on_change.emit(&None);
        }
        Ok(true)
    }

    /// Deactivate the active session, keeping its record
    pub fn end_session(&self) -> Result<Option<SessionRecord>> {
        let ended = {
            let mut state = self.state.lock();
            let Some(id) = state.active.clone() else {
                return Ok(None);
            };

            let mut sessions = state.sessions.clone();
            let Some(record) = sessions.iter_mut().find(|s| s.id == id) else {
                return Ok(None);
            };
            record.is_active = false;
            let ended = record.clone();
            self.commit(&mut state, sessions, None)?;
            ended
        };

        info!("Ended session {}", ended.id);
        self.on_change.emit(&None);
        Ok(Some(ended))
    }

    /// Count one generated piece against the active session
    pub fn record_generated_music(&self) -> Result<Option<SessionRecord>> {
        let updated = {
            let mut state = self.state.lock();
            let Some(id) = state.active.clone() else {
                return Ok(None);
            };

            let mut sessions = state.sessions.clone();
            let Some(record) = sessions.iter_mut().find(|s| s.id == id) else {
                return Ok(None);
            };
            record.generated_music_count += 1;
            let updated = record.clone();
            self.commit(&mut state, sessions, Some(id))?;
            updated
        };

        self.on_change.emit(&Some(updated.clone()));
        Ok(Some(updated))
    }

    pub fn active_session(&self) -> Option<SessionRecord> {
        self.state.lock().active_record().cloned()
    }

    /// True if there is an active session and it has not reached its expiry
    pub fn is_session_active(&self) -> bool {
        let now = self.clock.now_ms();
        self.state
            .lock()
            .active_record()
            .is_some_and(|s| !s.is_expired(now))
    }

    pub fn sessions(&self) -> Vec<SessionRecord> {
        self.state.lock().sessions.clone()
    }

    /// Milliseconds until the active session expires, never negative
    pub fn time_until_expiry(&self) -> Option<i64> {
        let now = self.clock.now_ms();
        self.state
            .lock()
            .active_record()
            .map(|s| s.time_until_expiry(now))
    }

    /// Called with the new active session (or `None`) after every change to it
    pub fn on_change<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Option<SessionRecord>) + Send + Sync + 'static,
    {
        self.on_change.subscribe(listener)
    }

    /// Called once with the record of an active session that expired
    pub fn on_expired<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SessionRecord) + Send + Sync + 'static,
    {
        self.on_expired.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.on_change.unsubscribe(id) || self.on_expired.unsubscribe(id)
    }

    /// Expire the active session once it reaches `auto_delete_at`
    ///
    /// The record is deactivated and removed from storage. Returns it the one
    /// time this happens. The expiry stands even if the store rejects it.
    pub fn tick(&self) -> Option<SessionRecord> {
        let now = self.clock.now_ms();
        let expired = {
            let mut state = self.state.lock();
            let id = state.active.clone()?;

            let Some(index) = state.sessions.iter().position(|s| s.id == id) else {
                warn!("Active session {} has no record, clearing", id);
                state.active = None;
                return None;
            };
            if !state.sessions[index].is_expired(now) {
                return None;
            }

            let mut record = state.sessions.remove(index);
            record.is_active = false;
            state.active = None;
            if let Err(e) = self.store.save(&state.sessions) {
                warn!("Failed to persist expiry of session {}: {}", record.id, e);
            }
            record
        };

        info!("Session {} expired", expired.id);
        self.on_expired.emit(&expired);
        self.on_change.emit(&None);
        Some(expired)
    }

    /// Purge expired records other than the active one; returns how many
    ///
    /// If the store rejects the purge the records stay and the next sweep
    /// tries again.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();

        let active = state.active.clone();
        let kept: Vec<_> = state
            .sessions
            .iter()
            .filter(|s| Some(&s.id) == active.as_ref() || !s.is_expired(now))
            .cloned()
            .collect();
        let purged = state.sessions.len() - kept.len();
        if purged == 0 {
            return 0;
        }

        match self.commit(&mut state, kept, active) {
            Ok(()) => {
                info!("Purged {} expired sessions", purged);
                purged
            }
            Err(e) => {
                warn!("Failed to persist session sweep: {}", e);
                0
            }
        }
    }
}

impl SessionSource for SessionManager {
    fn current_session_id(&self) -> Option<String> {
        self.state.lock().active.clone()
    }
}
