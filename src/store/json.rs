use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Backend;
use crate::types::{Connection, Interaction, Question, Story, UserProfile};

const CONNECTIONS_FILE: &str = "connections.json";
const QUESTIONS_FILE: &str = "questions.json";
const INTERACTIONS_FILE: &str = "interactions.json";

/// One JSON document per story and per profile, one JSON array per
/// connection/question/interaction collection.
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn open(root: &Path) -> Result<Self> {
        for dir in ["stories", "users"] {
            std::fs::create_dir_all(root.join(dir))?;
        }
        Ok(Self { root: root.to_path_buf() })
    }

    fn stories_dir(&self) -> PathBuf {
        self.root.join("stories")
    }

    fn users_dir(&self) -> PathBuf {
        self.root.join("users")
    }

    fn append<T: Serialize + DeserializeOwned>(&self, file: &str, item: &T) -> Result<()> {
        let path = self.root.join(file);
        let mut items: Vec<serde_json::Value> = read_collection(&path)?;
        items.push(serde_json::to_value(item)?);
        write_json(&path, &items)
    }

    /// Full read-modify-write of a collection file, matched on the `id`
    /// field. Sibling entries are kept as raw JSON. Last writer wins.
    fn replace<T: Serialize>(&self, file: &str, id: &str, item: &T) -> Result<bool> {
        let path = self.root.join(file);
        let mut items: Vec<serde_json::Value> = read_collection(&path)?;
        let Some(slot) = items.iter_mut().find(|existing| existing["id"].as_str() == Some(id)) else {
            return Ok(false);
        };
        *slot = serde_json::to_value(item)?;
        write_json(&path, &items)?;
        Ok(true)
    }

    fn scan_collection<T: DeserializeOwned>(&self, file: &str) -> Vec<T> {
        let path = self.root.join(file);
        match read_collection::<serde_json::Value>(&path) {
            Ok(values) => values
                .into_iter()
                .filter_map(|v| match serde_json::from_value(v) {
                    Ok(item) => Some(item),
                    Err(e) => {
                        tracing::warn!("skipping malformed entry in {}: {}", path.display(), e);
                        None
                    }
                })
                .collect(),
            Err(e) => {
                tracing::warn!("could not read {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }
}

impl Backend for JsonStore {
    fn put_story(&self, story: &Story) -> Result<()> {
        let path = record_path(&self.stories_dir(), &story.id)
            .ok_or_else(|| anyhow::anyhow!("invalid story id '{}'", story.id))?;
        write_json(&path, story)
    }

    fn get_story(&self, id: &str) -> Result<Option<Story>> {
        read_record(&self.stories_dir(), id)
    }

    fn scan_stories(&self) -> Result<Vec<Story>> {
        scan_records(&self.stories_dir())
    }

    fn put_profile(&self, profile: &UserProfile) -> Result<()> {
        let path = record_path(&self.users_dir(), &profile.id)
            .ok_or_else(|| anyhow::anyhow!("invalid profile id '{}'", profile.id))?;
        write_json(&path, profile)
    }

    fn get_profile(&self, id: &str) -> Result<Option<UserProfile>> {
        read_record(&self.users_dir(), id)
    }

    fn scan_profiles(&self) -> Result<Vec<UserProfile>> {
        scan_records(&self.users_dir())
    }

    fn insert_connection(&self, connection: &Connection) -> Result<()> {
        self.append(CONNECTIONS_FILE, connection)
    }

    fn scan_connections(&self) -> Result<Vec<Connection>> {
        Ok(self.scan_collection(CONNECTIONS_FILE))
    }

    fn replace_connection(&self, connection: &Connection) -> Result<bool> {
        self.replace(CONNECTIONS_FILE, &connection.id, connection)
    }

    fn insert_question(&self, question: &Question) -> Result<()> {
        self.append(QUESTIONS_FILE, question)
    }

    fn scan_questions(&self) -> Result<Vec<Question>> {
        Ok(self.scan_collection(QUESTIONS_FILE))
    }

    fn replace_question(&self, question: &Question) -> Result<bool> {
        self.replace(QUESTIONS_FILE, &question.id, question)
    }

    fn insert_interaction(&self, interaction: &Interaction) -> Result<()> {
        self.append(INTERACTIONS_FILE, interaction)
    }

    fn scan_interactions(&self) -> Result<Vec<Interaction>> {
        Ok(self.scan_collection(INTERACTIONS_FILE))
    }
}

/// Ids become file names, so only uuid-like ids are accepted.
fn record_path(dir: &Path, id: &str) -> Option<PathBuf> {
    let safe = !id.is_empty()
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    safe.then(|| dir.join(format!("{}.json", id)))
}

fn read_record<T: DeserializeOwned>(dir: &Path, id: &str) -> Result<Option<T>> {
    let Some(path) = record_path(dir, id) else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path)?;
    let record = serde_json::from_str(&raw)
        .with_context(|| format!("malformed record {}", path.display()))?;
    Ok(Some(record))
}

fn scan_records<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut records = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let parsed = std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| serde_json::from_str(&raw).map_err(anyhow::Error::from));
        match parsed {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!("error loading {}: {}", path.display(), e),
        }
    }
    Ok(records)
}

/// A missing file is an empty collection; a corrupt one is an error so a
/// subsequent write never clobbers it.
fn read_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw).with_context(|| format!("malformed collection {}", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
