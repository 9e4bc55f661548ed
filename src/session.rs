use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Role;

/// Per-caller state: who they are, what they've favorited, and any
/// unfinished story draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub id: String,
    pub user_id: Option<String>,
    pub role: Role,
    pub display_name: String,
    pub favorites: Vec<String>,
    pub draft: Option<Draft>,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub title: String,
    pub transcript: String,
    pub category: Option<crate::types::Category>,
}

impl SessionContext {
    pub fn favorite(&mut self, story_id: &str) -> bool {
        if self.favorites.iter().any(|f| f == story_id) {
            return false;
        }
        self.favorites.push(story_id.to_string());
        true
    }
}

pub struct SessionRegistry {
    sessions: HashMap<String, SessionContext>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl_minutes: i64) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl: Duration::minutes(ttl_minutes.max(1)),
        }
    }

    /// New sessions start as a guest seeker unless a profile is supplied.
    pub fn create(
        &mut self,
        user_id: Option<&str>,
        role: Option<Role>,
        display_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> SessionContext {
        let session = SessionContext {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.map(str::to_string),
            role: role.unwrap_or(Role::Seeker),
            display_name: display_name.unwrap_or("Guest").to_string(),
            favorites: Vec::new(),
            draft: None,
            created_at: now,
            last_seen: now,
        };
        self.sessions.insert(session.id.clone(), session.clone());
        tracing::debug!("session {} started as {}", session.id, session.role.as_str());
        session
    }

    /// Returns the live session and refreshes `last_seen`. Expired
    /// sessions are dropped and never returned.
    pub fn get(&mut self, id: &str, now: DateTime<Utc>) -> Option<SessionContext> {
        let expired = self.is_expired(self.sessions.get(id)?, now);
        if expired {
            self.sessions.remove(id);
            tracing::debug!("session {} expired", id);
            return None;
        }
        let session = self.sessions.get_mut(id)?;
        session.last_seen = now;
        Some(session.clone())
    }

    /// Applies `change` to a live session and returns the updated copy.
    pub fn update<F>(&mut self, id: &str, now: DateTime<Utc>, change: F) -> Option<SessionContext>
    where
        F: FnOnce(&mut SessionContext),
    {
        self.get(id, now)?;
        let session = self.sessions.get_mut(id)?;
        change(session);
        Some(session.clone())
    }

    pub fn expire(&mut self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        let ttl = self.ttl;
        self.sessions.retain(|_, s| now - s.last_seen <= ttl);
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    fn is_expired(&self, session: &SessionContext, now: DateTime<Utc>) -> bool {
        now - session.last_seen > self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_defaults_and_refresh() {
        let mut registry = SessionRegistry::new(30);
        let t0 = Utc::now();
        let session = registry.create(None, None, None, t0);
        assert_eq!(session.role, Role::Seeker);
        assert_eq!(session.display_name, "Guest");

        let later = t0 + Duration::minutes(20);
        assert_eq!(registry.get(&session.id, later).unwrap().last_seen, later);
        // refreshed, so still alive 20 minutes after the last read
        assert!(registry.get(&session.id, later + Duration::minutes(20)).is_some());
    }

    #[test]
    fn expired_sessions_are_not_returned() {
        let mut registry = SessionRegistry::new(30);
        let t0 = Utc::now();
        let session = registry.create(Some("u1"), Some(Role::Elder), Some("Rose"), t0);

        assert!(registry.get(&session.id, t0 + Duration::minutes(31)).is_none());
        assert_eq!(registry.len(), 0);
        assert!(registry
            .update(&session.id, t0 + Duration::minutes(31), |s| s.display_name = "x".into())
            .is_none());
    }

    #[test]
    fn update_favorites_and_expire() {
        let mut registry = SessionRegistry::new(30);
        let t0 = Utc::now();
        let id = registry.create(None, None, None, t0).id;

        let updated = registry
            .update(&id, t0, |s| {
                s.favorite("story-1");
                s.favorite("story-1");
            })
            .unwrap();
        assert_eq!(updated.favorites, vec!["story-1"]);

        assert!(registry.expire(&id));
        assert!(!registry.expire(&id));
    }

    #[test]
    fn purge_drops_only_stale_sessions() {
        let mut registry = SessionRegistry::new(10);
        let t0 = Utc::now();
        registry.create(None, None, None, t0);
        let fresh = registry.create(None, None, None, t0 + Duration::minutes(8)).id;

        assert_eq!(registry.purge_expired(t0 + Duration::minutes(12)), 1);
        assert!(registry.get(&fresh, t0 + Duration::minutes(12)).is_some());
    }
}
