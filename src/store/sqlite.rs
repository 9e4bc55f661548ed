use std::path::Path;

use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{Connection as SqlConnection, OptionalExtension, Row};
use serde::de::DeserializeOwned;

use super::Backend;
use crate::types::{
    Category, Connection, ConnectionStatus, EmotionalTone, Interaction, InteractionKind,
    PrivacyLevel, Question, QuestionStatus, Role, Story, UserProfile,
};

const STORY_COLUMNS: &str = "id, title, category, transcript, summary, contributor_name, \
     author_id, created_at, updated_at, audio_file_path, thumbnail_image_path, tags, topics, \
     skills, emotional_tone, follow_up_questions, duration";

const USER_COLUMNS: &str = "id, full_name, user_type, age, location, bio, expertise_areas, \
     interests, learning_goals, privacy_level, created_at, updated_at";

const CONNECTION_COLUMNS: &str = "id, elder_id, seeker_id, seeker_name, story_id, story_title, \
     initial_message, topics, preferred_contact, status, requested_at, responded_at";

const QUESTION_COLUMNS: &str = "id, question, category, urgency, seeker_id, seeker_name, \
     elder_id, connection_id, status, answer, answered_by, answered_at, created_at";

/// Relational variant: users, stories, story_interactions and connections
/// (plus questions). List-valued attributes live in JSON text columns.
pub struct SqliteStore {
    conn: SqlConnection,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(SqlConnection::open(db_path)?)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(SqlConnection::open_in_memory()?)
    }

    fn init(conn: SqlConnection) -> Result<Self> {
        // References are documentation only; records link by id without integrity checks.
        conn.execute_batch("
            PRAGMA foreign_keys = OFF;

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                full_name TEXT NOT NULL,
                user_type TEXT NOT NULL,
                age INTEGER,
                location TEXT,
                bio TEXT NOT NULL DEFAULT '',
                expertise_areas TEXT NOT NULL DEFAULT '[]',
                interests TEXT NOT NULL DEFAULT '[]',
                learning_goals TEXT,
                privacy_level TEXT NOT NULL DEFAULT 'community',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS stories (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                category TEXT NOT NULL,
                transcript TEXT NOT NULL,
                summary TEXT NOT NULL DEFAULT '',
                contributor_name TEXT NOT NULL DEFAULT '',
                author_id TEXT REFERENCES users(id),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                audio_file_path TEXT,
                thumbnail_image_path TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                topics TEXT NOT NULL DEFAULT '[]',
                skills TEXT NOT NULL DEFAULT '[]',
                emotional_tone TEXT,
                follow_up_questions TEXT NOT NULL DEFAULT '[]',
                duration REAL NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS story_interactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                story_id TEXT NOT NULL REFERENCES stories(id),
                interaction_type TEXT NOT NULL,
                comment_text TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS connections (
                id TEXT PRIMARY KEY,
                elder_id TEXT NOT NULL REFERENCES users(id),
                seeker_id TEXT NOT NULL REFERENCES users(id),
                seeker_name TEXT NOT NULL DEFAULT '',
                story_id TEXT,
                story_title TEXT,
                initial_message TEXT NOT NULL DEFAULT '',
                topics TEXT NOT NULL DEFAULT '[]',
                preferred_contact TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                requested_at TEXT NOT NULL,
                responded_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS questions (
                id TEXT PRIMARY KEY,
                question TEXT NOT NULL,
                category TEXT NOT NULL,
                urgency TEXT,
                seeker_id TEXT NOT NULL,
                seeker_name TEXT NOT NULL DEFAULT '',
                elder_id TEXT,
                connection_id TEXT,
                status TEXT NOT NULL DEFAULT 'open',
                answer TEXT,
                answered_by TEXT,
                answered_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_stories_category ON stories(category);
            CREATE INDEX IF NOT EXISTS idx_connections_elder ON connections(elder_id);
            CREATE INDEX IF NOT EXISTS idx_connections_seeker ON connections(seeker_id);
        ")?;

        Ok(Self { conn })
    }

    fn scan<T, F>(&self, sql: &str, map: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], map)?;

        let mut results = Vec::new();
        for row in rows {
            match row {
                Ok(item) => results.push(item),
                Err(e) => tracing::warn!("skipping malformed row: {}", e),
            }
        }
        Ok(results)
    }
}

impl Backend for SqliteStore {
    fn put_story(&self, story: &Story) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO stories ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                STORY_COLUMNS
            ),
            rusqlite::params![
                story.id,
                story.title,
                story.category.as_str(),
                story.transcript,
                story.summary,
                story.contributor_name,
                Some(story.contributor_id.as_str()).filter(|id| !id.is_empty()),
                story.created_at.to_rfc3339(),
                story.updated_at.to_rfc3339(),
                story.audio_file,
                story.cover_image,
                serde_json::to_string(&story.tags)?,
                serde_json::to_string(&story.topics)?,
                serde_json::to_string(&story.skills)?,
                serde_json::to_string(&story.emotional_tone)?,
                serde_json::to_string(&story.follow_up_questions)?,
                story.duration,
            ],
        )?;
        Ok(())
    }

    fn get_story(&self, id: &str) -> Result<Option<Story>> {
        let story = self
            .conn
            .query_row(
                &format!("SELECT {} FROM stories WHERE id = ?1", STORY_COLUMNS),
                rusqlite::params![id],
                story_from_row,
            )
            .optional()?;
        Ok(story)
    }

    fn scan_stories(&self) -> Result<Vec<Story>> {
        self.scan(&format!("SELECT {} FROM stories", STORY_COLUMNS), story_from_row)
    }

    fn put_profile(&self, profile: &UserProfile) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO users ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                USER_COLUMNS
            ),
            rusqlite::params![
                profile.id,
                profile.name,
                profile.role.as_str(),
                profile.age,
                profile.location,
                profile.bio,
                serde_json::to_string(&profile.expertise_areas)?,
                serde_json::to_string(&profile.interests)?,
                profile.goals,
                profile.privacy_level.as_str(),
                profile.created_at.to_rfc3339(),
                profile.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_profile(&self, id: &str) -> Result<Option<UserProfile>> {
        let profile = self
            .conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                rusqlite::params![id],
                profile_from_row,
            )
            .optional()?;
        Ok(profile)
    }

    fn scan_profiles(&self) -> Result<Vec<UserProfile>> {
        self.scan(&format!("SELECT {} FROM users", USER_COLUMNS), profile_from_row)
    }

    fn insert_connection(&self, connection: &Connection) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO connections ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                CONNECTION_COLUMNS
            ),
            rusqlite::params![
                connection.id,
                connection.elder_id,
                connection.seeker_id,
                connection.seeker_name,
                connection.story_id,
                connection.story_title,
                connection.message,
                serde_json::to_string(&connection.topics)?,
                connection.preferred_contact,
                connection.status.as_str(),
                connection.created_at.to_rfc3339(),
                connection.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn scan_connections(&self) -> Result<Vec<Connection>> {
        self.scan(
            &format!("SELECT {} FROM connections", CONNECTION_COLUMNS),
            connection_from_row,
        )
    }

    fn replace_connection(&self, connection: &Connection) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE connections SET status = ?1, responded_at = ?2 WHERE id = ?3",
            rusqlite::params![
                connection.status.as_str(),
                connection.updated_at.to_rfc3339(),
                connection.id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn insert_question(&self, question: &Question) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO questions ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                QUESTION_COLUMNS
            ),
            rusqlite::params![
                question.id,
                question.question,
                question.category.as_str(),
                question.urgency,
                question.seeker_id,
                question.seeker_name,
                question.elder_id,
                question.connection_id,
                question.status.as_str(),
                question.answer,
                question.answered_by,
                question.answered_at.map(|t| t.to_rfc3339()),
                question.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn scan_questions(&self) -> Result<Vec<Question>> {
        self.scan(
            &format!("SELECT {} FROM questions", QUESTION_COLUMNS),
            question_from_row,
        )
    }

    fn replace_question(&self, question: &Question) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE questions SET status = ?1, answer = ?2, answered_by = ?3, answered_at = ?4 \
             WHERE id = ?5",
            rusqlite::params![
                question.status.as_str(),
                question.answer,
                question.answered_by,
                question.answered_at.map(|t| t.to_rfc3339()),
                question.id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn insert_interaction(&self, interaction: &Interaction) -> Result<()> {
        self.conn.execute(
            "INSERT INTO story_interactions \
             (user_id, story_id, interaction_type, comment_text, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                interaction.user_id,
                interaction.story_id,
                interaction.kind.as_str(),
                interaction.comment,
                interaction.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn scan_interactions(&self) -> Result<Vec<Interaction>> {
        self.scan(
            "SELECT story_id, user_id, interaction_type, comment_text, created_at \
             FROM story_interactions ORDER BY id",
            |row| {
                Ok(Interaction {
                    story_id: row.get(0)?,
                    user_id: row.get(1)?,
                    kind: parse_enum(row, 2, InteractionKind::from_str)?,
                    comment: row.get(3)?,
                    created_at: parse_dt(row, 4)?,
                })
            },
        )
    }
}

fn story_from_row(row: &Row<'_>) -> rusqlite::Result<Story> {
    Ok(Story {
        id: row.get(0)?,
        title: row.get(1)?,
        category: parse_enum(row, 2, Category::from_str)?,
        transcript: row.get(3)?,
        summary: row.get(4)?,
        contributor_name: row.get(5)?,
        contributor_id: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        created_at: parse_dt(row, 7)?,
        updated_at: parse_dt(row, 8)?,
        audio_file: row.get(9)?,
        cover_image: row.get(10)?,
        tags: parse_json(row, 11)?,
        topics: parse_json(row, 12)?,
        skills: parse_json(row, 13)?,
        emotional_tone: match row.get::<_, Option<String>>(14)? {
            Some(_) => parse_json::<EmotionalTone>(row, 14)?,
            None => EmotionalTone::default(),
        },
        follow_up_questions: parse_json(row, 15)?,
        duration: row.get(16)?,
    })
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        id: row.get(0)?,
        name: row.get(1)?,
        role: parse_enum(row, 2, Role::from_str)?,
        age: row.get(3)?,
        location: row.get(4)?,
        bio: row.get(5)?,
        expertise_areas: parse_json(row, 6)?,
        interests: parse_json(row, 7)?,
        goals: row.get(8)?,
        privacy_level: parse_enum(row, 9, PrivacyLevel::from_str)?,
        created_at: parse_dt(row, 10)?,
        updated_at: parse_dt(row, 11)?,
    })
}

fn connection_from_row(row: &Row<'_>) -> rusqlite::Result<Connection> {
    Ok(Connection {
        id: row.get(0)?,
        elder_id: row.get(1)?,
        seeker_id: row.get(2)?,
        seeker_name: row.get(3)?,
        story_id: row.get(4)?,
        story_title: row.get(5)?,
        message: row.get(6)?,
        topics: parse_json(row, 7)?,
        preferred_contact: row.get(8)?,
        status: parse_enum(row, 9, ConnectionStatus::from_str)?,
        created_at: parse_dt(row, 10)?,
        updated_at: parse_dt(row, 11)?,
    })
}

fn question_from_row(row: &Row<'_>) -> rusqlite::Result<Question> {
    Ok(Question {
        id: row.get(0)?,
        question: row.get(1)?,
        category: parse_enum(row, 2, Category::from_str)?,
        urgency: row.get(3)?,
        seeker_id: row.get(4)?,
        seeker_name: row.get(5)?,
        elder_id: row.get(6)?,
        connection_id: row.get(7)?,
        status: parse_enum(row, 8, QuestionStatus::from_str)?,
        answer: row.get(9)?,
        answered_by: row.get(10)?,
        answered_at: match row.get::<_, Option<String>>(11)? {
            Some(_) => Some(parse_dt(row, 11)?),
            None => None,
        },
        created_at: parse_dt(row, 12)?,
    })
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn parse_dt(row: &Row<'_>, idx: usize) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    let raw: String = row.get(idx)?;
    chrono::DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| conversion_error(idx, format!("bad timestamp '{}': {}", raw, e)))
}

fn parse_json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e.to_string()))
}

fn parse_enum<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| conversion_error(idx, format!("unknown value '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_columns_round_trip_through_json_text() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut story = Story::new("Quilting", Category::Crafts, "stitch by stitch");
        story.id = "s1".into();
        story.tags = vec!["quilt".into(), "patience".into()];
        story.emotional_tone.emotions = vec!["calm".into()];
        store.put_story(&story).unwrap();

        let loaded = store.get_story("s1").unwrap().unwrap();
        assert_eq!(loaded.tags, story.tags);
        assert_eq!(loaded.emotional_tone.emotions, vec!["calm".to_string()]);
        assert_eq!(loaded.created_at.timestamp(), story.created_at.timestamp());
        assert!(store.get_story("missing").unwrap().is_none());
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut story = Story::new("Fine", Category::Travel, "went places");
        story.id = "ok".into();
        store.put_story(&story).unwrap();
        store
            .conn
            .execute(
                "INSERT INTO stories (id, title, category, transcript, created_at, updated_at) \
                 VALUES ('bad', 't', 'astrology', 'x', 'yesterday', 'yesterday')",
                [],
            )
            .unwrap();

        let stories = store.scan_stories().unwrap();
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].id, "ok");
    }

    #[test]
    fn records_may_reference_unknown_users() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut story = Story::new("Harvest", Category::Cultural, "we sang in the fields");
        story.id = "owned".into();
        story.contributor_id = "elder-1".into();
        store.put_story(&story).unwrap();

        let mut anonymous = Story::new("Untold", Category::Historical, "long ago");
        anonymous.id = "anon".into();
        store.put_story(&anonymous).unwrap();

        let author: Option<String> = store
            .conn
            .query_row("SELECT author_id FROM stories WHERE id = 'anon'", [], |r| r.get(0))
            .unwrap();
        assert!(author.is_none());
        assert_eq!(store.get_story("anon").unwrap().unwrap().contributor_id, "");
        assert_eq!(store.get_story("owned").unwrap().unwrap().contributor_id, "elder-1");

        let now = chrono::Utc::now();
        store
            .insert_connection(&Connection {
                id: "c1".into(),
                elder_id: "e".into(),
                seeker_id: "s".into(),
                seeker_name: String::new(),
                story_id: Some("owned".into()),
                story_title: None,
                message: "hi".into(),
                topics: Vec::new(),
                preferred_contact: None,
                status: ConnectionStatus::Pending,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        store
            .insert_interaction(&Interaction {
                story_id: "gone".into(),
                user_id: "u".into(),
                kind: InteractionKind::View,
                comment: None,
                created_at: now,
            })
            .unwrap();
        assert_eq!(store.scan_connections().unwrap().len(), 1);
        assert_eq!(store.scan_interactions().unwrap().len(), 1);
    }
}
