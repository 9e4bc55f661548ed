use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{Category, Story};

#[derive(Serialize)]
struct Frontmatter<'a> {
    id: &'a str,
    title: &'a str,
    category: Category,
    contributor: &'a str,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    duration_seconds: f64,
    #[serde(skip_serializing_if = "no_tags")]
    tags: &'a [String],
}

fn no_tags(tags: &&[String]) -> bool {
    tags.is_empty()
}

pub fn transcript_path(root: &Path, story_id: &str) -> PathBuf {
    root.join("transcripts").join(format!("{}.md", slugify(story_id)))
}

/// Write a readable copy of the story: YAML frontmatter, title heading, transcript.
pub fn write_transcript(root: &Path, story: &Story) -> Result<()> {
    let file = transcript_path(root, &story.id);
    if let Some(dir) = file.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let frontmatter = serde_yaml::to_string(&Frontmatter {
        id: &story.id,
        title: &story.title,
        category: story.category,
        contributor: &story.contributor_name,
        created_at: story.created_at,
        updated_at: story.updated_at,
        duration_seconds: story.duration,
        tags: &story.tags,
    })?;
    let content = format!(
        "---\n{}---\n\n# {}\n\n{}\n",
        frontmatter, story.title, story.transcript
    );
    std::fs::write(&file, content)?;
    Ok(())
}

#[cfg(test)]
pub fn read_transcript(root: &Path, story_id: &str) -> Result<Option<String>> {
    let file = transcript_path(root, story_id);
    if file.exists() {
        Ok(Some(std::fs::read_to_string(&file)?))
    } else {
        Ok(None)
    }
}

fn slugify(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn transcript_has_frontmatter_and_body() {
        let dir = TempDir::new().unwrap();
        let mut story = Story::new("First Job", Category::Professional, "I swept floors.");
        story.id = "abc-123".into();
        story.contributor_name = "Margaret".into();
        write_transcript(dir.path(), &story).unwrap();

        let text = read_transcript(dir.path(), "abc-123").unwrap().unwrap();
        assert!(text.starts_with("---\n"));
        assert!(text.contains("category: professional"));
        assert!(text.contains("contributor: Margaret"));
        assert!(text.contains("# First Job\n\nI swept floors."));
        assert!(!text.contains("tags:"));
    }

    #[test]
    fn unknown_transcript_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_transcript(dir.path(), "nope").unwrap().is_none());
    }

    #[test]
    fn ids_cannot_escape_the_transcripts_dir() {
        let path = transcript_path(Path::new("/data"), "../../etc/passwd");
        assert_eq!(path, PathBuf::from("/data/transcripts/______etc_passwd.md"));
    }
}
