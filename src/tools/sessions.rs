use anyhow::Result;
use chrono::Utc;

use crate::server::StoryServer;
use crate::session::{Draft, SessionContext};
use crate::types::InteractionKind;

use super::{invalid, non_blank};

impl StoryServer {
    /// A known profile id takes its role and name; anything else is a guest.
    pub async fn do_start_session(&self, user_id: Option<&str>) -> Result<SessionContext> {
        let profile = match non_blank(user_id) {
            Some(id) => Some(
                self.store
                    .lock()
                    .await
                    .get_profile(id)?
                    .ok_or_else(|| invalid(format!("Unknown profile '{}'", id)))?,
            ),
            None => None,
        };

        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        let purged = sessions.purge_expired(now);
        if purged > 0 {
            tracing::debug!("purged {} expired sessions, {} live", purged, sessions.len());
        }
        Ok(sessions.create(
            profile.as_ref().map(|p| p.id.as_str()),
            profile.as_ref().map(|p| p.role),
            profile.as_ref().map(|p| p.name.as_str()),
            now,
        ))
    }

    pub async fn do_get_session(&self, id: &str) -> Result<Option<SessionContext>> {
        Ok(self.sessions.lock().await.get(id, Utc::now()))
    }

    /// Adds to favorites and records a save for the story.
    pub async fn do_favorite_story(&self, session_id: &str, story_id: &str) -> Result<Option<SessionContext>> {
        let store = self.store.lock().await;
        if store.get_story(story_id)?.is_none() {
            return Err(invalid(format!("Unknown story '{}'", story_id)));
        }

        let mut added = false;
        let session = self.sessions.lock().await.update(session_id, Utc::now(), |s| {
            added = s.favorite(story_id);
        });
        let Some(session) = session else {
            return Ok(None);
        };
        if added {
            let user = session.user_id.as_deref().unwrap_or(&session.id);
            store.record_interaction(story_id, user, InteractionKind::Save, None)?;
        }
        Ok(Some(session))
    }

    pub async fn do_save_draft(&self, session_id: &str, draft: Draft) -> Result<Option<SessionContext>> {
        Ok(self
            .sessions
            .lock()
            .await
            .update(session_id, Utc::now(), |s| s.draft = Some(draft)))
    }

    pub async fn do_end_session(&self, session_id: &str) -> bool {
        self.sessions.lock().await.expire(session_id)
    }
}
