//! Live-session bookkeeping.
//!
//! The registry is the single map of running sessions, indexed by session
//! id and by SIP Call-ID so the dispatcher can route in-dialog requests.
//! Session tasks remove themselves as the last step of their teardown, so
//! a registered session always has a task behind it.

use std::sync::Arc;

use dashmap::DashMap;

use crate::session::{ImsSession, SessionId};

#[derive(Debug, Default)]
pub struct SessionRegistry {
    by_id: DashMap<SessionId, Arc<ImsSession>>,
    by_call_id: DashMap<String, SessionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<ImsSession>) {
        self.by_call_id
            .insert(session.call_id().to_string(), session.id().clone());
        self.by_id.insert(session.id().clone(), session);
    }

    pub fn remove(&self, id: &SessionId) -> Option<Arc<ImsSession>> {
        let (_, session) = self.by_id.remove(id)?;
        // Only drop the call-id index if it still points at this session.
        self.by_call_id
            .remove_if(session.call_id(), |_, owner| owner == id);
        Some(session)
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<ImsSession>> {
        self.by_id.get(id).map(|entry| entry.value().clone())
    }

    pub fn find_by_call_id(&self, call_id: &str) -> Option<Arc<ImsSession>> {
        let id = self.by_call_id.get(call_id)?.value().clone();
        self.get(&id)
    }

    /// First live session toward `remote_party`, if any.
    pub fn find_by_remote(&self, remote_party: &str) -> Option<Arc<ImsSession>> {
        self.by_id
            .iter()
            .find(|entry| entry.value().remote_party() == remote_party)
            .map(|entry| entry.value().clone())
    }

    pub fn all(&self) -> Vec<Arc<ImsSession>> {
        self.by_id.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
