use std::sync::Arc;

use anyhow::Result;
use base64::Engine;
use rmcp::{
    ServerHandler,
    model::{ServerCapabilities, ServerInfo},
    tool,
    schemars,
};
use serde::Serialize;

use crate::config::Config;
use crate::enrich::Enricher;
use crate::session::{Draft, SessionRegistry};
use crate::speech::Transcriber;
use crate::store::media::Upload;
use crate::store::Store;
use crate::tools::{self, stories::Submission};
use crate::types::{InteractionKind, NewConnection, NewQuestion, QuestionFilter, QuestionStatus, SortOrder};

#[derive(Clone)]
pub struct StoryServer {
    pub config: Arc<Config>,
    pub store: Arc<tokio::sync::Mutex<Store>>,
    pub enricher: Arc<Enricher>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub sessions: Arc<tokio::sync::Mutex<SessionRegistry>>,
}

impl StoryServer {
    pub fn new(
        config: Config,
        store: Store,
        enricher: Enricher,
        transcriber: Option<Arc<dyn Transcriber>>,
    ) -> Self {
        let sessions = SessionRegistry::new(config.session_ttl_minutes);
        Self {
            config: Arc::new(config),
            store: Arc::new(tokio::sync::Mutex::new(store)),
            enricher: Arc::new(enricher),
            transcriber,
            sessions: Arc::new(tokio::sync::Mutex::new(sessions)),
        }
    }
}

fn render<T: Serialize>(result: Result<T>) -> String {
    match result.and_then(|value| Ok(serde_json::to_string_pretty(&value)?)) {
        Ok(json) => json,
        Err(e) => format!("Error: {}", e),
    }
}

fn not_found(kind: &str, id: &str) -> anyhow::Error {
    anyhow::anyhow!("no {} with id {}", kind, id)
}

// MCP request types

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct UploadInput {
    #[schemars(description = "File contents, base64 encoded")]
    pub data_base64: String,
    #[schemars(description = "File extension, e.g. wav, mp3, png, jpg")]
    pub extension: String,
}

impl UploadInput {
    fn decode(&self) -> Result<Upload> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(self.data_base64.trim())
            .map_err(|e| tools::invalid(format!("Uploaded file is not valid base64: {}", e)))?;
        Ok(Upload::new(bytes, &self.extension))
    }
}

fn decode_optional(input: Option<&UploadInput>) -> Result<Option<Upload>> {
    input.map(UploadInput::decode).transpose()
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ShareStoryRequest {
    #[schemars(description = "Story title")]
    pub title: String,
    #[schemars(description = "Category key or label (optional, inferred from the story when missing)")]
    pub category: Option<String>,
    #[schemars(description = "Typed story text. Required unless audio is supplied")]
    pub transcript: Option<String>,
    #[schemars(description = "Recorded story audio (optional)")]
    pub audio: Option<UploadInput>,
    #[schemars(description = "Cover image (optional unless the server requires one)")]
    pub cover_image: Option<UploadInput>,
    #[schemars(description = "Contributor display name")]
    pub contributor_name: Option<String>,
    #[schemars(description = "Contributor profile id")]
    pub contributor_id: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct AttachAudioRequest {
    pub story_id: String,
    pub audio: UploadInput,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct GetStoryRequest {
    pub story_id: String,
    #[schemars(description = "Listener's user id; records a view when given")]
    pub viewer_id: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ListStoriesRequest {
    pub category: Option<String>,
    #[schemars(description = "Contributor id or name")]
    pub contributor: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct SearchStoriesRequest {
    pub query: String,
    pub category: Option<String>,
    #[schemars(description = "newest (default), oldest, relevance, or alphabetical")]
    pub order: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct PromptsRequest {
    #[schemars(description = "Category key or label (optional, all categories when missing)")]
    pub category: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct FeaturedStoriesRequest {
    pub limit: Option<usize>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct InteractionRequest {
    pub story_id: String,
    pub user_id: String,
    #[schemars(description = "view, like, save, or comment")]
    pub kind: String,
    pub comment: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct StoryIdRequest {
    pub story_id: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct SaveProfileRequest {
    #[schemars(description = "Existing profile id to update (optional)")]
    pub id: Option<String>,
    pub name: String,
    #[schemars(description = "elder or seeker")]
    pub role: String,
    pub age: Option<u32>,
    pub location: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub expertise_areas: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub goals: Option<String>,
    #[schemars(description = "public, community (default), or connections")]
    pub privacy_level: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ProfileIdRequest {
    pub profile_id: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ListProfilesRequest {
    #[schemars(description = "elder or seeker (optional)")]
    pub role: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct SuggestMentorsRequest {
    pub seeker_id: String,
    pub limit: Option<usize>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct RequestConnectionRequest {
    pub elder_id: String,
    pub seeker_id: String,
    pub seeker_name: Option<String>,
    pub story_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub topics: Vec<String>,
    pub preferred_contact: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct RespondConnectionRequest {
    pub connection_id: String,
    #[schemars(description = "true to accept, false to decline")]
    pub accept: bool,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct UserRoleRequest {
    pub user_id: String,
    #[schemars(description = "elder or seeker")]
    pub role: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct AskQuestionRequest {
    pub question: String,
    pub category: Option<String>,
    pub urgency: Option<String>,
    pub seeker_id: String,
    pub seeker_name: Option<String>,
    #[schemars(description = "Elder to ask; omit to ask the whole community")]
    pub elder_id: Option<String>,
    pub connection_id: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct AnswerQuestionRequest {
    pub question_id: String,
    pub answer: String,
    #[schemars(description = "Name of the elder answering")]
    pub answered_by: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ListQuestionsRequest {
    pub elder_id: Option<String>,
    pub seeker_id: Option<String>,
    pub category: Option<String>,
    #[schemars(description = "open or answered")]
    pub status: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct StatsRequest {
    #[schemars(description = "How many trending categories to include (default 5)")]
    pub trending: Option<usize>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ExportRequest {}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct StartSessionRequest {
    #[schemars(description = "Profile id to act as; omit for a guest seeker")]
    pub user_id: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct SessionRequest {
    pub session_id: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct FavoriteRequest {
    pub session_id: String,
    pub story_id: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct SaveDraftRequest {
    pub session_id: String,
    pub title: String,
    pub transcript: String,
    pub category: Option<String>,
}

#[tool(tool_box)]
impl StoryServer {
    #[tool(description = "Submit a story. Typed text or recorded audio (transcribed). The story is summarized, tagged and categorized, then saved with its cover image and audio.")]
    async fn share_story(&self, #[tool(aggr)] req: ShareStoryRequest) -> String {
        let submission = (|| -> Result<Submission> {
            Ok(Submission {
                title: req.title,
                category: tools::parse_category(req.category.as_deref())?,
                transcript: req.transcript,
                audio: decode_optional(req.audio.as_ref())?,
                cover_image: decode_optional(req.cover_image.as_ref())?,
                contributor_name: req.contributor_name.unwrap_or_default(),
                contributor_id: req.contributor_id.unwrap_or_default(),
            })
        })();
        match submission {
            Ok(submission) => render(self.do_share_story(submission).await),
            Err(e) => render::<()>(Err(e)),
        }
    }

    #[tool(description = "Attach recorded audio to an existing story.")]
    async fn attach_audio(&self, #[tool(aggr)] req: AttachAudioRequest) -> String {
        let result = async {
            let upload = req.audio.decode()?;
            self.do_attach_audio(&req.story_id, &upload)
                .await?
                .ok_or_else(|| not_found("story", &req.story_id))
        };
        render(result.await)
    }

    #[tool(description = "Fetch one story by id. Pass viewer_id to count a listen.")]
    async fn get_story(&self, #[tool(aggr)] req: GetStoryRequest) -> String {
        let result = self.do_get_story(&req.story_id, req.viewer_id.as_deref()).await;
        render(result.and_then(|s| s.ok_or_else(|| not_found("story", &req.story_id))))
    }

    #[tool(description = "List stories, newest first, optionally filtered by category and contributor.")]
    async fn list_stories(&self, #[tool(aggr)] req: ListStoriesRequest) -> String {
        render(self.do_list_stories(req.category.as_deref(), req.contributor.as_deref()).await)
    }

    #[tool(description = "Case-insensitive search over title, transcript, summary and tags.")]
    async fn search_stories(&self, #[tool(aggr)] req: SearchStoriesRequest) -> String {
        let order = match tools::non_blank(req.order.as_deref()) {
            None => Ok(SortOrder::Newest),
            Some(o) => SortOrder::from_str(o)
                .ok_or_else(|| tools::invalid(format!("Unknown sort order '{}'", o))),
        };
        match order {
            Ok(order) => render(
                self.do_search_stories(&req.query, req.category.as_deref(), order).await,
            ),
            Err(e) => render::<()>(Err(e)),
        }
    }

    #[tool(description = "The newest stories for the home page.")]
    async fn featured_stories(&self, #[tool(aggr)] req: FeaturedStoriesRequest) -> String {
        render(self.do_featured_stories(req.limit.unwrap_or(6)).await)
    }

    #[tool(description = "Story starter prompts for each category.")]
    async fn category_prompts(&self, #[tool(aggr)] req: PromptsRequest) -> String {
        render(self.do_category_prompts(req.category.as_deref()))
    }

    #[tool(description = "Record a view, like, save, or comment on a story.")]
    async fn record_interaction(&self, #[tool(aggr)] req: InteractionRequest) -> String {
        let result = async {
            let kind = InteractionKind::from_str(&req.kind).ok_or_else(|| {
                tools::invalid(format!("Unknown interaction '{}'. use: view, like, save, comment", req.kind))
            })?;
            self.do_record_interaction(&req.story_id, &req.user_id, kind, req.comment.as_deref())
                .await
        };
        render(result.await)
    }

    #[tool(description = "View, like, save and comment counts for a story.")]
    async fn story_engagement(&self, #[tool(aggr)] req: StoryIdRequest) -> String {
        render(self.do_story_engagement(&req.story_id).await)
    }

    #[tool(description = "Create or update a user profile. Resubmitting with the same id updates it in place.")]
    async fn save_profile(&self, #[tool(aggr)] req: SaveProfileRequest) -> String {
        render(self.do_save_profile(req).await)
    }

    #[tool(description = "Fetch one profile by id.")]
    async fn get_profile(&self, #[tool(aggr)] req: ProfileIdRequest) -> String {
        let result = self.do_get_profile(&req.profile_id).await;
        render(result.and_then(|p| p.ok_or_else(|| not_found("profile", &req.profile_id))))
    }

    #[tool(description = "List profiles by name, optionally only elders or seekers.")]
    async fn list_profiles(&self, #[tool(aggr)] req: ListProfilesRequest) -> String {
        render(self.do_list_profiles(req.role.as_deref()).await)
    }

    #[tool(description = "Rank elders by how well their expertise fits a seeker's interests.")]
    async fn suggest_mentors(&self, #[tool(aggr)] req: SuggestMentorsRequest) -> String {
        let result = self.do_suggest_mentors(&req.seeker_id, req.limit.unwrap_or(5)).await;
        render(result.and_then(|m| m.ok_or_else(|| not_found("profile", &req.seeker_id))))
    }

    #[tool(description = "Ask an elder to connect. Starts as pending.")]
    async fn request_connection(&self, #[tool(aggr)] req: RequestConnectionRequest) -> String {
        let new = NewConnection {
            elder_id: req.elder_id,
            seeker_id: req.seeker_id,
            seeker_name: req.seeker_name.unwrap_or_default(),
            story_id: req.story_id,
            story_title: None,
            message: req.message,
            topics: req.topics,
            preferred_contact: req.preferred_contact,
        };
        render(self.do_request_connection(new).await)
    }

    #[tool(description = "Accept or decline a pending connection request.")]
    async fn respond_to_connection(&self, #[tool(aggr)] req: RespondConnectionRequest) -> String {
        let result = self.do_respond_to_connection(&req.connection_id, req.accept).await;
        render(result.and_then(|c| c.ok_or_else(|| not_found("connection", &req.connection_id))))
    }

    #[tool(description = "Connections where the user is the elder or the seeker, newest first.")]
    async fn list_connections(&self, #[tool(aggr)] req: UserRoleRequest) -> String {
        render(self.do_list_connections(&req.user_id, &req.role).await)
    }

    #[tool(description = "Ask a question of one elder or of the whole community.")]
    async fn ask_question(&self, #[tool(aggr)] req: AskQuestionRequest) -> String {
        let result = async {
            let new = NewQuestion {
                question: req.question,
                category: tools::parse_category(req.category.as_deref())?.unwrap_or_default(),
                urgency: req.urgency,
                seeker_id: req.seeker_id,
                seeker_name: req.seeker_name.unwrap_or_default(),
                elder_id: req.elder_id,
                connection_id: req.connection_id,
            };
            self.do_ask_question(new).await
        };
        render(result.await)
    }

    #[tool(description = "Answer an open question.")]
    async fn answer_question(&self, #[tool(aggr)] req: AnswerQuestionRequest) -> String {
        let result = self
            .do_answer_question(&req.question_id, &req.answer, &req.answered_by)
            .await;
        render(result.and_then(|q| q.ok_or_else(|| not_found("question", &req.question_id))))
    }

    #[tool(description = "List questions, newest first, filtered by elder, seeker, category or status.")]
    async fn list_questions(&self, #[tool(aggr)] req: ListQuestionsRequest) -> String {
        let result = async {
            let status = match tools::non_blank(req.status.as_deref()) {
                None => None,
                Some(s) => Some(QuestionStatus::from_str(s).ok_or_else(|| {
                    tools::invalid(format!("Unknown question status '{}'. use: open, answered", s))
                })?),
            };
            let filter = QuestionFilter {
                elder_id: req.elder_id,
                seeker_id: req.seeker_id,
                category: tools::parse_category(req.category.as_deref())?,
                status,
            };
            self.do_list_questions(&filter).await
        };
        render(result.await)
    }

    #[tool(description = "Platform-wide totals: stories, contributors, connections, answers, listening time, recent activity, trending categories.")]
    async fn platform_stats(&self, #[tool(aggr)] req: StatsRequest) -> String {
        render(self.do_platform_stats(req.trending.unwrap_or(5)).await)
    }

    #[tool(description = "Activity counts for one user in their role.")]
    async fn user_activity(&self, #[tool(aggr)] req: UserRoleRequest) -> String {
        render(self.do_user_activity(&req.user_id, &req.role).await)
    }

    #[tool(description = "Export every story, profile, connection and question with current stats as one JSON document.")]
    async fn export_data(&self, #[tool(aggr)] _req: ExportRequest) -> String {
        render(self.do_export_data().await)
    }

    #[tool(description = "Start a session, as a known profile or as a guest seeker.")]
    async fn start_session(&self, #[tool(aggr)] req: StartSessionRequest) -> String {
        render(self.do_start_session(req.user_id.as_deref()).await)
    }

    #[tool(description = "Read a live session. Expired sessions are gone.")]
    async fn get_session(&self, #[tool(aggr)] req: SessionRequest) -> String {
        let result = self.do_get_session(&req.session_id).await;
        render(result.and_then(|s| s.ok_or_else(|| not_found("session", &req.session_id))))
    }

    #[tool(description = "Add a story to the session's favorites.")]
    async fn favorite_story(&self, #[tool(aggr)] req: FavoriteRequest) -> String {
        let result = self.do_favorite_story(&req.session_id, &req.story_id).await;
        render(result.and_then(|s| s.ok_or_else(|| not_found("session", &req.session_id))))
    }

    #[tool(description = "Keep an unfinished story on the session.")]
    async fn save_draft(&self, #[tool(aggr)] req: SaveDraftRequest) -> String {
        let result = async {
            let draft = Draft {
                title: req.title,
                transcript: req.transcript,
                category: tools::parse_category(req.category.as_deref())?,
            };
            self.do_save_draft(&req.session_id, draft)
                .await?
                .ok_or_else(|| not_found("session", &req.session_id))
        };
        render(result.await)
    }

    #[tool(description = "End a session.")]
    async fn end_session(&self, #[tool(aggr)] req: SessionRequest) -> String {
        render(Ok(self.do_end_session(&req.session_id).await))
    }
}

#[tool(tool_box)]
impl ServerHandler for StoryServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "StoryShare: elders record life stories, seekers discover them and ask for guidance. \
                 Stories: share_story, attach_audio, get_story, list_stories, search_stories, \
                 featured_stories, category_prompts, record_interaction, story_engagement. \
                 People: save_profile, get_profile, list_profiles, suggest_mentors. \
                 Community: request_connection, respond_to_connection, list_connections, \
                 ask_question, answer_question, list_questions. \
                 Reporting: platform_stats, user_activity, export_data. \
                 Sessions: start_session, get_session, favorite_story, save_draft, end_session. \
                 Every tool returns JSON, or a line starting with 'Error:'."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
