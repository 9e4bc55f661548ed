pub mod json;
pub mod media;
pub mod sqlite;
pub mod transcript;

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::config::{BackendKind, Config};
use crate::error::StoreError;
use crate::query;
use crate::types::{
    Connection, ConnectionStatus, Engagement, Interaction, InteractionKind, NewConnection,
    NewQuestion, PlatformStats, Question, QuestionFilter, QuestionStatus, Role, SortOrder, Story,
    StoryFilter, UserActivity, UserProfile,
};

/// Persistence seam. Implementations only move whole records; ids,
/// timestamps and status rules are applied by [`Store`].
pub trait Backend: Send {
    fn put_story(&self, story: &Story) -> Result<()>;
    fn get_story(&self, id: &str) -> Result<Option<Story>>;
    /// Every readable story. Unreadable records are logged and skipped.
    fn scan_stories(&self) -> Result<Vec<Story>>;

    fn put_profile(&self, profile: &UserProfile) -> Result<()>;
    fn get_profile(&self, id: &str) -> Result<Option<UserProfile>>;
    fn scan_profiles(&self) -> Result<Vec<UserProfile>>;

    fn insert_connection(&self, connection: &Connection) -> Result<()>;
    fn scan_connections(&self) -> Result<Vec<Connection>>;
    /// Returns false when no connection has this id.
    fn replace_connection(&self, connection: &Connection) -> Result<bool>;

    fn insert_question(&self, question: &Question) -> Result<()>;
    fn scan_questions(&self) -> Result<Vec<Question>>;
    fn replace_question(&self, question: &Question) -> Result<bool>;

    fn insert_interaction(&self, interaction: &Interaction) -> Result<()>;
    fn scan_interactions(&self) -> Result<Vec<Interaction>>;
}

pub struct Store {
    pub path: PathBuf,
    pub media: media::MediaStore,
    backend: Box<dyn Backend>,
}

impl Store {
    pub fn init(config: &Config) -> Result<Self> {
        let path = config.data_dir.as_path();
        std::fs::create_dir_all(path.join("transcripts"))?;

        let backend: Box<dyn Backend> = match &config.backend {
            BackendKind::Json => {
                tracing::info!("using json flat-file store at {}", path.display());
                Box::new(json::JsonStore::open(path)?)
            }
            BackendKind::Sqlite(db_path) => {
                tracing::info!("using sqlite store at {}", db_path.display());
                Box::new(sqlite::SqliteStore::open(db_path)?)
            }
        };

        Self::with_backend(path, backend, config.max_upload_bytes())
    }

    pub fn with_backend(path: &Path, backend: Box<dyn Backend>, max_upload_bytes: u64) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            media: media::MediaStore::open(path, max_upload_bytes)?,
            backend,
        })
    }

    // Stories

    /// Assigns an id to new stories, keeps `created_at` of existing ones,
    /// stamps `updated_at`, and writes the record plus its transcript copy.
    pub fn save_story(&self, mut story: Story) -> Result<String> {
        let now = Utc::now();
        if story.id.is_empty() {
            story.id = uuid::Uuid::new_v4().to_string();
            story.created_at = now;
        } else if let Some(existing) = self.backend.get_story(&story.id)? {
            story.created_at = existing.created_at;
        } else {
            story.created_at = now;
        }
        story.updated_at = now;

        self.backend.put_story(&story)?;
        if let Err(e) = transcript::write_transcript(&self.path, &story) {
            tracing::warn!("transcript copy for {} failed: {}", story.id, e);
        }
        tracing::debug!("saved story {} ({})", story.id, story.category.as_str());
        Ok(story.id)
    }

    pub fn get_story(&self, id: &str) -> Result<Option<Story>> {
        self.backend.get_story(id)
    }

    pub fn list_stories(&self, filter: &StoryFilter) -> Result<Vec<Story>> {
        Ok(query::filter_stories(self.backend.scan_stories()?, filter))
    }

    pub fn search_stories(
        &self,
        text: &str,
        category: Option<crate::types::Category>,
        order: SortOrder,
    ) -> Result<Vec<Story>> {
        let listed = self.list_stories(&StoryFilter { category, contributor: None })?;
        let mut hits = query::search(listed, text);
        if order != SortOrder::Newest {
            query::apply_order(&mut hits, text, order);
        }
        Ok(hits)
    }

    /// Writes the uploads named after the story id, then the record. Uploads
    /// already on disk are removed again if the record write fails.
    pub fn save_story_with_media(
        &self,
        mut story: Story,
        cover: Option<&media::Upload>,
        audio: Option<&media::Upload>,
    ) -> Result<String> {
        if story.id.is_empty() {
            story.id = uuid::Uuid::new_v4().to_string();
        }
        let mut written = Vec::new();
        let result = self.write_media_then_story(&mut story, cover, audio, &mut written);
        if result.is_err() {
            for path in &written {
                self.media.discard(path);
            }
        }
        result
    }

    fn write_media_then_story(
        &self,
        story: &mut Story,
        cover: Option<&media::Upload>,
        audio: Option<&media::Upload>,
        written: &mut Vec<PathBuf>,
    ) -> Result<String> {
        if let Some(upload) = cover {
            let path = self.media.write(media::MediaKind::Image, &story.id, upload)?;
            story.cover_image = Some(self.relative(&path));
            written.push(path);
        }
        if let Some(upload) = audio {
            let path = self.media.write(media::MediaKind::Audio, &story.id, upload)?;
            story.audio_file = Some(self.relative(&path));
            written.push(path);
        }
        self.save_story(story.clone())
    }

    /// Attaches audio to an existing story. None when the id is unknown.
    pub fn attach_audio(&self, id: &str, upload: &media::Upload) -> Result<Option<Story>> {
        let Some(story) = self.backend.get_story(id)? else {
            return Ok(None);
        };
        self.save_story_with_media(story, None, Some(upload))?;
        self.backend.get_story(id)
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.path)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    pub fn featured_stories(&self, limit: usize) -> Result<Vec<Story>> {
        let mut stories = self.list_stories(&StoryFilter::default())?;
        stories.truncate(limit);
        Ok(stories)
    }

    // Profiles

    pub fn save_profile(&self, mut profile: UserProfile) -> Result<String> {
        let now = Utc::now();
        if profile.id.is_empty() {
            profile.id = uuid::Uuid::new_v4().to_string();
            profile.created_at = now;
        } else if let Some(existing) = self.backend.get_profile(&profile.id)? {
            profile.created_at = existing.created_at;
        } else {
            profile.created_at = now;
        }
        profile.updated_at = now;
        self.backend.put_profile(&profile)?;
        Ok(profile.id)
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<UserProfile>> {
        self.backend.get_profile(id)
    }

    pub fn list_profiles(&self, role: Option<Role>) -> Result<Vec<UserProfile>> {
        let mut profiles: Vec<UserProfile> = self
            .backend
            .scan_profiles()?
            .into_iter()
            .filter(|p| role.map_or(true, |r| p.role == r))
            .collect();
        profiles.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(profiles)
    }

    // Connections

    pub fn save_connection(&self, new: NewConnection) -> Result<String> {
        let now = Utc::now();
        let connection = Connection {
            id: uuid::Uuid::new_v4().to_string(),
            elder_id: new.elder_id,
            seeker_id: new.seeker_id,
            seeker_name: new.seeker_name,
            story_id: new.story_id,
            story_title: new.story_title,
            message: new.message,
            topics: new.topics,
            preferred_contact: new.preferred_contact,
            status: ConnectionStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.backend.insert_connection(&connection)?;
        Ok(connection.id)
    }

    pub fn get_connection(&self, id: &str) -> Result<Option<Connection>> {
        Ok(self.backend.scan_connections()?.into_iter().find(|c| c.id == id))
    }

    pub fn connections_for(&self, user_id: &str, role: Role) -> Result<Vec<Connection>> {
        Ok(query::connections_for(self.backend.scan_connections()?, user_id, role))
    }

    /// None when the id is unknown. Only `status` and `updated_at` change.
    pub fn update_connection_status(
        &self,
        id: &str,
        status: ConnectionStatus,
    ) -> Result<Option<Connection>> {
        let Some(mut connection) = self.get_connection(id)? else {
            return Ok(None);
        };
        if !connection.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                kind: "connection",
                id: id.to_string(),
                from: connection.status.as_str(),
                to: status.as_str(),
            }
            .into());
        }
        connection.status = status;
        connection.updated_at = Utc::now().max(connection.created_at);
        if !self.backend.replace_connection(&connection)? {
            return Ok(None);
        }
        tracing::info!("connection {} is now {}", id, status.as_str());
        Ok(Some(connection))
    }

    // Questions

    pub fn save_question(&self, new: NewQuestion) -> Result<String> {
        let question = Question {
            id: uuid::Uuid::new_v4().to_string(),
            question: new.question,
            category: new.category,
            urgency: new.urgency,
            seeker_id: new.seeker_id,
            seeker_name: new.seeker_name,
            elder_id: new.elder_id,
            connection_id: new.connection_id,
            status: QuestionStatus::Open,
            answer: None,
            answered_by: None,
            answered_at: None,
            created_at: Utc::now(),
        };
        self.backend.insert_question(&question)?;
        Ok(question.id)
    }

    pub fn get_question(&self, id: &str) -> Result<Option<Question>> {
        Ok(self.backend.scan_questions()?.into_iter().find(|q| q.id == id))
    }

    pub fn questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>> {
        Ok(query::filter_questions(self.backend.scan_questions()?, filter))
    }

    pub fn questions_for(
        &self,
        elder_id: Option<&str>,
        category: Option<crate::types::Category>,
    ) -> Result<Vec<Question>> {
        self.questions(&QuestionFilter {
            elder_id: elder_id.map(str::to_string),
            category,
            ..Default::default()
        })
    }

    /// Moves an open question to answered and records who answered it.
    pub fn answer_question(
        &self,
        id: &str,
        answer: &str,
        answered_by: &str,
    ) -> Result<Option<Question>> {
        let Some(mut question) = self.get_question(id)? else {
            return Ok(None);
        };
        if question.status != QuestionStatus::Open {
            return Err(StoreError::InvalidTransition {
                kind: "question",
                id: id.to_string(),
                from: question.status.as_str(),
                to: QuestionStatus::Answered.as_str(),
            }
            .into());
        }
        question.status = QuestionStatus::Answered;
        question.answer = Some(answer.to_string());
        question.answered_by = Some(answered_by.to_string());
        question.answered_at = Some(Utc::now());
        if !self.backend.replace_question(&question)? {
            return Ok(None);
        }
        Ok(Some(question))
    }

    // Interactions

    pub fn record_interaction(
        &self,
        story_id: &str,
        user_id: &str,
        kind: InteractionKind,
        comment: Option<&str>,
    ) -> Result<()> {
        self.backend.insert_interaction(&Interaction {
            story_id: story_id.to_string(),
            user_id: user_id.to_string(),
            kind,
            comment: comment.map(str::to_string),
            created_at: Utc::now(),
        })
    }

    pub fn story_engagement(&self, story_id: &str) -> Result<Engagement> {
        Ok(query::engagement(story_id, &self.backend.scan_interactions()?))
    }

    // Aggregates

    pub fn platform_stats(&self, now: DateTime<Utc>) -> Result<PlatformStats> {
        let stories = self.backend.scan_stories()?;
        let profiles = self.backend.scan_profiles()?;
        let connections = self.backend.scan_connections()?;
        let questions = self.backend.scan_questions()?;
        Ok(query::platform_stats(&stories, profiles.len(), &connections, &questions, now))
    }

    pub fn user_activity(&self, user_id: &str, role: Role) -> Result<UserActivity> {
        Ok(query::user_activity(
            user_id,
            role,
            &self.backend.scan_stories()?,
            &self.backend.scan_connections()?,
            &self.backend.scan_questions()?,
            &self.backend.scan_interactions()?,
        ))
    }

    pub fn export_data(&self, now: DateTime<Utc>) -> Result<serde_json::Value> {
        let stories = self.list_stories(&StoryFilter::default())?;
        Ok(serde_json::json!({
            "stories": stories,
            "profiles": self.backend.scan_profiles()?,
            "connections": self.backend.scan_connections()?,
            "questions": self.backend.scan_questions()?,
            "stats": self.platform_stats(now)?,
            "export_date": now.to_rfc3339(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use tempfile::TempDir;

    fn stores(dir: &TempDir) -> Vec<Store> {
        let json_root = dir.path().join("json");
        let sql_root = dir.path().join("sql");
        vec![
            Store::with_backend(&json_root, Box::new(json::JsonStore::open(&json_root).unwrap()), 1 << 20)
                .unwrap(),
            Store::with_backend(
                &sql_root,
                Box::new(sqlite::SqliteStore::open(&sql_root.join("db.sqlite")).unwrap()),
                1 << 20,
            )
            .unwrap(),
        ]
    }

    fn new_connection(elder: &str, seeker: &str) -> NewConnection {
        NewConnection {
            elder_id: elder.into(),
            seeker_id: seeker.into(),
            seeker_name: "Alex".into(),
            message: "I'd love to learn".into(),
            topics: vec!["Career advice".into()],
            ..Default::default()
        }
    }

    #[test]
    fn save_then_get_returns_input_plus_identity() {
        let dir = TempDir::new().unwrap();
        for store in stores(&dir) {
            let mut story = Story::new("Bread", Category::Cooking, "knead and wait");
            story.tags = vec!["baking".into()];
            story.duration = 1.5;
            let id = store.save_story(story.clone()).unwrap();

            let loaded = store.get_story(&id).unwrap().unwrap();
            assert_eq!(loaded.id, id);
            assert_eq!(loaded.title, story.title);
            assert_eq!(loaded.tags, story.tags);
            assert_eq!(loaded.duration, story.duration);
            assert!(loaded.created_at <= loaded.updated_at);
            assert!(store.get_story("does-not-exist").unwrap().is_none());
        }
    }

    #[test]
    fn resave_keeps_created_at() {
        let dir = TempDir::new().unwrap();
        for store in stores(&dir) {
            let id = store.save_story(Story::new("A", Category::Travel, "x")).unwrap();
            let first = store.get_story(&id).unwrap().unwrap();

            std::thread::sleep(std::time::Duration::from_millis(5));
            let mut updated = first.clone();
            updated.audio_file = Some("audio/a.wav".into());
            store.save_story(updated).unwrap();

            let second = store.get_story(&id).unwrap().unwrap();
            assert_eq!(second.created_at, first.created_at);
            assert!(second.updated_at > first.updated_at);
            assert_eq!(second.audio_file.as_deref(), Some("audio/a.wav"));
            assert!(store.path.join("transcripts").join(format!("{}.md", id)).exists());
        }
    }

    #[test]
    fn media_is_written_beside_the_story() {
        let dir = TempDir::new().unwrap();
        for store in stores(&dir) {
            let cover = media::Upload::new(vec![1, 2, 3], "png");
            let id = store
                .save_story_with_media(Story::new("Quilt", Category::Crafts, "stitch"), Some(&cover), None)
                .unwrap();
            let saved = store.get_story(&id).unwrap().unwrap();
            assert_eq!(saved.cover_image, Some(format!("images/{}.png", id)));
            assert!(store.path.join("images").join(format!("{}.png", id)).exists());

            let audio = media::Upload::new(vec![4; 8], "wav");
            let updated = store.attach_audio(&id, &audio).unwrap().unwrap();
            assert_eq!(updated.audio_file, Some(format!("audio/{}.wav", id)));
            assert_eq!(updated.cover_image, saved.cover_image);
            assert_eq!(updated.created_at, saved.created_at);
            assert!(store.attach_audio("missing", &audio).unwrap().is_none());
        }
    }

    #[test]
    fn rejected_upload_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        for store in stores(&dir) {
            let cover = media::Upload::new(vec![1, 2, 3], "png");
            let bad_audio = media::Upload::new(vec![1], "exe");
            let mut story = Story::new("Quilt", Category::Crafts, "stitch");
            story.id = "fixed-id".into();

            let err = store
                .save_story_with_media(story, Some(&cover), Some(&bad_audio))
                .unwrap_err();
            assert!(matches!(err.downcast_ref::<StoreError>(), Some(StoreError::Upload(_))));
            assert!(!store.path.join("images/fixed-id.png").exists());
            assert!(store.get_story("fixed-id").unwrap().is_none());
        }
    }

    #[test]
    fn listing_is_newest_first_and_filtered() {
        let dir = TempDir::new().unwrap();
        for store in stores(&dir) {
            let old = store.save_story(Story::new("Soup", Category::Cooking, "broth")).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
            let new = store.save_story(Story::new("Stew", Category::Cooking, "broth")).unwrap();
            store.save_story(Story::new("Scarf", Category::Crafts, "wool")).unwrap();

            let cooking = store
                .list_stories(&StoryFilter { category: Some(Category::Cooking), contributor: None })
                .unwrap();
            let ids: Vec<_> = cooking.iter().map(|s| s.id.clone()).collect();
            assert_eq!(ids, vec![new, old]);

            let hits = store.search_stories("BROTH", Some(Category::Crafts), SortOrder::Newest).unwrap();
            assert!(hits.is_empty());
            let again = store.search_stories("broth", None, SortOrder::Newest).unwrap();
            assert_eq!(again, store.search_stories("broth", None, SortOrder::Newest).unwrap());
            assert_eq!(store.featured_stories(1).unwrap().len(), 1);
        }
    }

    #[test]
    fn connection_status_changes_only_target() {
        let dir = TempDir::new().unwrap();
        for store in stores(&dir) {
            let a = store.save_connection(new_connection("elder", "s1")).unwrap();
            let b = store.save_connection(new_connection("elder", "s2")).unwrap();
            let before_b = store.get_connection(&b).unwrap().unwrap();
            let before_a = store.get_connection(&a).unwrap().unwrap();

            let updated = store
                .update_connection_status(&a, ConnectionStatus::Accepted)
                .unwrap()
                .unwrap();
            assert_eq!(updated.status, ConnectionStatus::Accepted);

            let after_a = store.get_connection(&a).unwrap().unwrap();
            assert_eq!(after_a.status, ConnectionStatus::Accepted);
            assert_eq!(after_a.message, before_a.message);
            assert_eq!(after_a.topics, before_a.topics);
            assert_eq!(after_a.created_at, before_a.created_at);
            assert_eq!(store.get_connection(&b).unwrap().unwrap(), before_b);

            let mine = store.connections_for("elder", Role::Elder).unwrap();
            assert_eq!(mine.len(), 2);
            let accepted: Vec<_> = mine
                .iter()
                .filter(|c| c.status == ConnectionStatus::Accepted)
                .collect();
            assert_eq!(accepted.len(), 1);
            assert_eq!(accepted[0].id, a);
            assert_eq!(store.connections_for("s2", Role::Seeker).unwrap().len(), 1);
        }
    }

    #[test]
    fn terminal_connection_states_reject_changes() {
        let dir = TempDir::new().unwrap();
        for store in stores(&dir) {
            let id = store.save_connection(new_connection("e", "s")).unwrap();
            store.update_connection_status(&id, ConnectionStatus::Declined).unwrap();

            let err = store
                .update_connection_status(&id, ConnectionStatus::Accepted)
                .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<StoreError>(),
                Some(StoreError::InvalidTransition { .. })
            ));
            assert_eq!(
                store.get_connection(&id).unwrap().unwrap().status,
                ConnectionStatus::Declined
            );
            assert!(store
                .update_connection_status("unknown", ConnectionStatus::Accepted)
                .unwrap()
                .is_none());
        }
    }

    #[test]
    fn answering_a_question_fills_answer_fields() {
        let dir = TempDir::new().unwrap();
        for store in stores(&dir) {
            let id = store
                .save_question(NewQuestion {
                    question: "How do I budget?".into(),
                    category: Category::Finance,
                    seeker_id: "s1".into(),
                    elder_id: Some("e1".into()),
                    ..Default::default()
                })
                .unwrap();

            let open = store.questions_for(Some("e1"), None).unwrap();
            assert_eq!(open.len(), 1);
            assert_eq!(open[0].status, QuestionStatus::Open);
            assert!(open[0].answer.is_none() && open[0].answered_at.is_none());

            let answered = store.answer_question(&id, "Envelopes.", "Margaret").unwrap().unwrap();
            assert_eq!(answered.status, QuestionStatus::Answered);
            assert_eq!(answered.answered_by.as_deref(), Some("Margaret"));
            assert!(answered.answered_at.is_some());

            assert!(store.answer_question(&id, "again", "x").is_err());
            assert!(store.questions_for(None, Some(Category::Cooking)).unwrap().is_empty());
            assert_eq!(store.user_activity("e1", Role::Elder).unwrap().questions_answered, 1);
            assert_eq!(store.user_activity("s1", Role::Seeker).unwrap().questions_asked, 1);
        }
    }

    #[test]
    fn profile_resubmission_updates_in_place() {
        let dir = TempDir::new().unwrap();
        for store in stores(&dir) {
            let id = store.save_profile(UserProfile::new("Margaret", Role::Elder)).unwrap();
            let first = store.get_profile(&id).unwrap().unwrap();

            let mut edited = first.clone();
            edited.bio = "Retired baker".into();
            assert_eq!(store.save_profile(edited).unwrap(), id);

            let second = store.get_profile(&id).unwrap().unwrap();
            assert_eq!(second.bio, "Retired baker");
            assert_eq!(second.created_at, first.created_at);
            assert_eq!(store.list_profiles(Some(Role::Elder)).unwrap().len(), 1);
            assert!(store.list_profiles(Some(Role::Seeker)).unwrap().is_empty());
        }
    }

    #[test]
    fn stats_and_export() {
        let dir = TempDir::new().unwrap();
        for store in stores(&dir) {
            let id = store.save_story(Story::new("Soup", Category::Cooking, "broth")).unwrap();
            store.save_story(Story::new("Scarf", Category::Crafts, "wool")).unwrap();
            store.save_profile(UserProfile::new("Rose", Role::Elder)).unwrap();
            store.record_interaction(&id, "s1", InteractionKind::Like, None).unwrap();

            let now = Utc::now();
            let stats = store.platform_stats(now).unwrap();
            assert_eq!(stats.total_stories, 2);
            assert_eq!(stats.stories_by_category.values().sum::<usize>(), 2);
            assert_eq!(stats.recent_activity_count, 2);
            assert_eq!(stats.active_contributors, 1);
            assert_eq!(store.story_engagement(&id).unwrap().likes, 1);

            let export = store.export_data(now).unwrap();
            assert_eq!(export["stories"].as_array().unwrap().len(), 2);
            assert_eq!(export["stats"]["total_stories"], 2);
        }
    }
}
