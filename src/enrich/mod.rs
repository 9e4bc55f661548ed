pub mod fallback;
pub mod gemini;

use std::sync::OnceLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::types::{Category, EmotionalTone, TagSet};

pub const SUMMARY_MAX_LEN: usize = 150;

/// A generative text service. Anything that turns a prompt into text.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Metadata derived from a transcript before the story is written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryMetadata {
    pub summary: String,
    pub tags: TagSet,
    pub emotional_tone: EmotionalTone,
    pub follow_up_questions: Vec<String>,
}

/// AI enrichment with a deterministic fallback for every call. Nothing here
/// returns an error: service failures are logged and replaced.
pub struct Enricher {
    model: Option<Box<dyn TextModel>>,
}

#[derive(Deserialize)]
struct TagResponse {
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    skills: Vec<String>,
}

#[derive(Deserialize)]
struct ToneResponse {
    #[serde(default = "neutral")]
    tone: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    emotions: Vec<String>,
    #[serde(default)]
    mood_description: String,
}

fn neutral() -> String {
    "neutral".into()
}

impl Enricher {
    pub fn new(model: Option<Box<dyn TextModel>>) -> Self {
        Self { model }
    }

    pub fn disabled() -> Self {
        Self { model: None }
    }

    pub fn from_config(config: &Config) -> Self {
        match config.gemini_api_key.as_deref() {
            Some(key) => {
                tracing::info!("ai enrichment enabled ({})", config.gemini_model);
                Self::new(Some(Box::new(gemini::GeminiModel::new(key, &config.gemini_model))))
            }
            None => {
                tracing::warn!("GEMINI_API_KEY not set, using keyword fallbacks");
                Self::disabled()
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    /// None when unconfigured or when the call fails.
    async fn ask(&self, task: &str, prompt: String) -> Option<String> {
        let model = self.model.as_ref()?;
        match model.generate(&prompt).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!("{} failed, using fallback: {}", task, e);
                None
            }
        }
    }

    async fn ask_json<T: DeserializeOwned>(&self, task: &str, prompt: String) -> Option<T> {
        let text = self.ask(task, prompt).await?;
        match parse_json_reply(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("{} returned unparseable output, using fallback: {}", task, e);
                None
            }
        }
    }

    /// Tidy up raw speech-to-text output. Returns the input unchanged on failure.
    pub async fn clean_transcript(&self, raw: &str) -> String {
        let prompt = format!(
            "Please clean up and improve the following transcribed text from an elderly \
             person's story. Fix any obvious transcription errors, add appropriate punctuation, \
             and make it more readable while preserving the original meaning and tone. Keep \
             the personal, conversational style.\n\nOriginal text: {}\n\nImproved text:",
            raw
        );
        match self.ask("transcript cleanup", prompt).await {
            Some(text) if !text.is_empty() => text,
            _ => raw.to_string(),
        }
    }

    pub async fn summarize(&self, transcript: &str, max_len: usize) -> String {
        let prompt = format!(
            "Create a brief, engaging summary of this elderly person's story in {} characters \
             or less. Capture the key wisdom or lesson shared. Make it compelling for younger \
             readers.\n\nStory: {}\n\nSummary:",
            max_len, transcript
        );
        match self.ask("summary", prompt).await {
            Some(text) if !text.is_empty() => fallback::truncate(&text, max_len),
            _ => fallback::truncate(transcript, max_len),
        }
    }

    pub async fn extract_tags(&self, transcript: &str, title: &str) -> TagSet {
        let prompt = format!(
            "Analyze this elderly person's story and extract relevant information.\n\n\
             Title: {}\nStory: {}\n\n\
             Provide 5-8 specific tags, 3-5 broader topics and 3-5 skills or knowledge areas. \
             Respond with JSON only: {{\"tags\": [...], \"topics\": [...], \"skills\": [...]}}",
            title, transcript
        );
        match self.ask_json::<TagResponse>("tag extraction", prompt).await {
            Some(mut reply) => {
                reply.tags.truncate(8);
                reply.topics.truncate(5);
                reply.skills.truncate(5);
                TagSet { tags: reply.tags, topics: reply.topics, skills: reply.skills }
            }
            None => fallback::tags(transcript, title),
        }
    }

    pub async fn classify_tone(&self, transcript: &str) -> EmotionalTone {
        let prompt = format!(
            "Analyze the emotional tone of this elderly person's story.\n\nStory: {}\n\n\
             Respond with JSON only: {{\"tone\": \"inspiring|cautionary|humorous|nostalgic|\
             educational|bittersweet\", \"confidence\": 0.8, \"emotions\": [\"hopeful\"], \
             \"mood_description\": \"...\"}}. Confidence must be between 0 and 1.",
            transcript
        );
        match self.ask_json::<ToneResponse>("tone analysis", prompt).await {
            Some(reply) => EmotionalTone {
                tone: reply.tone,
                confidence: reply.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
                emotions: reply.emotions,
                mood_description: reply.mood_description,
            },
            None => fallback::tone(),
        }
    }

    pub async fn suggest_follow_ups(&self, transcript: &str, category: Category) -> Vec<String> {
        let prompt = format!(
            "Based on this elderly person's story, suggest 3-5 thoughtful follow-up questions \
             that young people might want to ask to learn more.\n\nStory: {}\nCategory: {}\n\n\
             Respond with a JSON list of strings only.",
            transcript,
            category.label()
        );
        match self.ask_json::<Vec<String>>("follow-up questions", prompt).await {
            Some(mut questions) if !questions.is_empty() => {
                questions.truncate(5);
                questions
            }
            _ => fallback::follow_ups(category),
        }
    }

    pub async fn categorize(&self, transcript: &str, title: &str) -> Category {
        let choices: Vec<String> = Category::ALL
            .iter()
            .map(|c| format!("- {}: {}", c.as_str(), c.label()))
            .collect();
        let prompt = format!(
            "Categorize this elderly person's story into one of the following categories:\n{}\n\n\
             Title: {}\nStory: {}\n\nRespond with the category key only (e.g. \"life_skills\").",
            choices.join("\n"),
            title,
            transcript
        );
        self.ask("categorization", prompt)
            .await
            .and_then(|reply| Category::from_str(reply.trim().trim_matches('"')))
            .unwrap_or_else(|| fallback::categorize(transcript, title))
    }

    /// Compatibility between a seeker's interests and an elder's expertise, in [0, 1].
    pub async fn match_score(&self, interests: &[String], expertise: &[String], goals: &str) -> f64 {
        if interests.is_empty() || expertise.is_empty() {
            return 0.0;
        }
        let prompt = format!(
            "Calculate how well this elder and young person would match as mentor/mentee.\n\n\
             Seeker interests: {:?}\nElder expertise: {:?}\nSeeker goals: {}\n\n\
             Respond with a single number between 0 and 1 only.",
            interests, expertise, goals
        );
        self.ask("mentor matching", prompt)
            .await
            .and_then(|reply| reply.trim().parse::<f64>().ok())
            .filter(|score| score.is_finite())
            .map(|score| score.clamp(0.0, 1.0))
            .unwrap_or_else(|| fallback::match_score(interests, expertise))
    }

    /// Summary, tags, tone and follow-ups for one story.
    pub async fn enrich(&self, transcript: &str, title: &str, category: Category) -> StoryMetadata {
        StoryMetadata {
            summary: self.summarize(transcript, SUMMARY_MAX_LEN).await,
            tags: self.extract_tags(transcript, title).await,
            emotional_tone: self.classify_tone(transcript).await,
            follow_up_questions: self.suggest_follow_ups(transcript, category).await,
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").ok())
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map_or(text, |m| m.as_str())
}

/// Models often wrap JSON in a markdown fence or surround it with prose.
fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Result<T> {
    let body = strip_code_fence(text).trim();

    if let Ok(value) = serde_json::from_str(body) {
        return Ok(value);
    }
    let start = body.find(|c: char| c == '{' || c == '[');
    let end = body.rfind(|c: char| c == '}' || c == ']');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(serde_json::from_str(&body[start..=end])?),
        _ => anyhow::bail!("no JSON found in model reply"),
    }
}
