use anyhow::Result;
use serde::Serialize;

use crate::enrich::{fallback, SUMMARY_MAX_LEN};
use crate::error::StoreError;
use crate::server::StoryServer;
use crate::speech::Transcription;
use crate::store::media::{MediaKind, Upload};
use crate::types::{Category, Engagement, InteractionKind, SortOrder, Story, StoryFilter};

use super::non_blank;

#[derive(Debug, Clone, Serialize)]
pub struct CategoryPrompts {
    pub category: Category,
    pub label: &'static str,
    pub prompts: &'static [&'static str],
}

/// A story as submitted, before transcription and enrichment.
#[derive(Debug, Default)]
pub struct Submission {
    pub title: String,
    pub category: Option<Category>,
    pub transcript: Option<String>,
    pub audio: Option<Upload>,
    pub cover_image: Option<Upload>,
    pub contributor_name: String,
    pub contributor_id: String,
}

impl StoryServer {
    /// Validate, transcribe, enrich, then write once.
    pub async fn do_share_story(&self, submission: Submission) -> Result<Story> {
        self.validate(&submission).await?;

        let title = submission.title.trim().to_string();
        let transcript = match non_blank(submission.transcript.as_deref()) {
            Some(text) => text.to_string(),
            // validate() guarantees audio when there is no typed text
            None => match &submission.audio {
                Some(audio) => self.transcribe(audio).await?,
                None => return Err(StoreError::Validation(vec!["Story content is required".into()]).into()),
            },
        };

        let category = match submission.category {
            Some(c) => c,
            None => self.enricher.categorize(&transcript, &title).await,
        };
        let meta = self.enricher.enrich(&transcript, &title, category).await;

        let mut story = Story::new(&title, category, &transcript);
        story.summary = if meta.summary.is_empty() {
            fallback::truncate(&transcript, SUMMARY_MAX_LEN)
        } else {
            meta.summary
        };
        story.tags = meta.tags.tags;
        story.topics = meta.tags.topics;
        story.skills = meta.tags.skills;
        story.emotional_tone = meta.emotional_tone;
        story.follow_up_questions = meta.follow_up_questions;
        story.duration = fallback::estimate_duration(&transcript);
        story.contributor_name = submission.contributor_name.trim().to_string();
        story.contributor_id = submission.contributor_id.trim().to_string();

        let store = self.store.lock().await;
        let id = store.save_story_with_media(
            story,
            submission.cover_image.as_ref(),
            submission.audio.as_ref(),
        )?;
        tracing::info!("story {} shared in {}", id, category.as_str());
        store
            .get_story(&id)?
            .ok_or_else(|| anyhow::anyhow!("story {} vanished after save", id))
    }

    /// Every problem with the submission, reported together before anything is written.
    async fn validate(&self, submission: &Submission) -> Result<()> {
        let mut problems = Vec::new();
        if submission.title.trim().is_empty() {
            problems.push("Story title is required".to_string());
        }
        let typed = non_blank(submission.transcript.as_deref()).is_some();
        if !typed && submission.audio.is_none() {
            problems.push("Story content is required".to_string());
        }
        if !typed && submission.audio.is_some() && self.transcriber.is_none() {
            problems.push(
                "Speech transcription is not available. Please type your story instead.".to_string(),
            );
        }
        if self.config.require_cover_image && submission.cover_image.is_none() {
            problems.push("Cover photo is required".to_string());
        }

        let store = self.store.lock().await;
        if let Some(audio) = &submission.audio {
            problems.extend(store.media.check(MediaKind::Audio, audio));
        }
        if let Some(cover) = &submission.cover_image {
            problems.extend(store.media.check(MediaKind::Image, cover));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation(problems).into())
        }
    }

    async fn transcribe(&self, audio: &Upload) -> Result<String> {
        let Some(transcriber) = &self.transcriber else {
            return Err(StoreError::Transcription("no speech service configured".into()).into());
        };
        match transcriber.transcribe(&audio.bytes).await {
            Ok(Transcription::Text(text)) if self.enricher.is_ready() => {
                Ok(self.enricher.clean_transcript(&text).await)
            }
            Ok(Transcription::Text(text)) => Ok(text),
            Ok(Transcription::NotUnderstood) => Err(StoreError::Validation(vec![
                "Could not understand the audio clearly. Please try recording again or type your story instead."
                    .into(),
            ])
            .into()),
            Err(e) => {
                tracing::warn!("transcription failed: {}", e);
                Err(StoreError::Transcription(e.to_string()).into())
            }
        }
    }

    /// Story starters for one category, or for all of them.
    pub fn do_category_prompts(&self, category: Option<&str>) -> Result<Vec<CategoryPrompts>> {
        let selected: Vec<Category> = match super::parse_category(category)? {
            Some(c) => vec![c],
            None => Category::ALL.to_vec(),
        };
        Ok(selected
            .into_iter()
            .map(|category| CategoryPrompts {
                category,
                label: category.label(),
                prompts: category.prompts(),
            })
            .collect())
    }

    pub async fn do_attach_audio(&self, story_id: &str, audio: &Upload) -> Result<Option<Story>> {
        let store = self.store.lock().await;
        store.attach_audio(story_id, audio)
    }

    /// Fetches a story; a known viewer also counts as a listen.
    pub async fn do_get_story(&self, story_id: &str, viewer_id: Option<&str>) -> Result<Option<Story>> {
        let store = self.store.lock().await;
        let story = store.get_story(story_id)?;
        if let (Some(_), Some(viewer)) = (&story, non_blank(viewer_id)) {
            if let Err(e) = store.record_interaction(story_id, viewer, InteractionKind::View, None) {
                tracing::warn!("could not record view of {}: {}", story_id, e);
            }
        }
        Ok(story)
    }

    pub async fn do_list_stories(
        &self,
        category: Option<&str>,
        contributor: Option<&str>,
    ) -> Result<Vec<Story>> {
        let filter = StoryFilter {
            category: super::parse_category(category)?,
            contributor: non_blank(contributor).map(str::to_string),
        };
        self.store.lock().await.list_stories(&filter)
    }

    pub async fn do_search_stories(
        &self,
        query: &str,
        category: Option<&str>,
        order: SortOrder,
    ) -> Result<Vec<Story>> {
        let category = super::parse_category(category)?;
        self.store.lock().await.search_stories(query, category, order)
    }

    pub async fn do_featured_stories(&self, limit: usize) -> Result<Vec<Story>> {
        self.store.lock().await.featured_stories(limit)
    }

    pub async fn do_record_interaction(
        &self,
        story_id: &str,
        user_id: &str,
        kind: InteractionKind,
        comment: Option<&str>,
    ) -> Result<Engagement> {
        let store = self.store.lock().await;
        if store.get_story(story_id)?.is_none() {
            return Err(super::invalid(format!("Unknown story '{}'", story_id)));
        }
        if kind == InteractionKind::Comment && non_blank(comment).is_none() {
            return Err(super::invalid("Please enter a comment."));
        }
        store.record_interaction(story_id, user_id, kind, non_blank(comment))?;
        store.story_engagement(story_id)
    }

    pub async fn do_story_engagement(&self, story_id: &str) -> Result<Engagement> {
        self.store.lock().await.story_engagement(story_id)
    }
}
