use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    LifeSkills,
    Professional,
    Cultural,
    Historical,
    Relationships,
    Parenting,
    Cooking,
    Crafts,
    Travel,
    Health,
    Technology,
    Finance,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::LifeSkills,
        Category::Professional,
        Category::Cultural,
        Category::Historical,
        Category::Relationships,
        Category::Parenting,
        Category::Cooking,
        Category::Crafts,
        Category::Travel,
        Category::Health,
        Category::Technology,
        Category::Finance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::LifeSkills => "life_skills",
            Category::Professional => "professional",
            Category::Cultural => "cultural",
            Category::Historical => "historical",
            Category::Relationships => "relationships",
            Category::Parenting => "parenting",
            Category::Cooking => "cooking",
            Category::Crafts => "crafts",
            Category::Travel => "travel",
            Category::Health => "health",
            Category::Technology => "technology",
            Category::Finance => "finance",
        }
    }

    /// Display label. This is the only place labels are defined.
    pub fn label(&self) -> &'static str {
        match self {
            Category::LifeSkills => "Life Skills & Practical Wisdom",
            Category::Professional => "Professional & Career Advice",
            Category::Cultural => "Cultural Traditions & Heritage",
            Category::Historical => "Historical Perspectives & Events",
            Category::Relationships => "Relationships & Family",
            Category::Parenting => "Parenting & Child-rearing",
            Category::Cooking => "Cooking & Recipes",
            Category::Crafts => "Crafts & Hobbies",
            Category::Travel => "Travel & Adventure",
            Category::Health => "Health & Wellness",
            Category::Technology => "Technology & Digital Life",
            Category::Finance => "Finance & Money Management",
        }
    }

    /// Accepts either the key ("life_skills", "Life Skills") or the display label.
    pub fn from_str(s: &str) -> Option<Self> {
        let key = s.trim().to_lowercase().replace(' ', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == key || c.label().to_lowercase() == s.trim().to_lowercase())
    }

    pub fn prompts(&self) -> &'static [&'static str] {
        match self {
            Category::LifeSkills => &[
                "Share a time when you learned an important life lesson the hard way",
                "What's the most valuable skill you wish you'd learned earlier?",
                "Tell about a challenge that taught you resilience",
            ],
            Category::Professional => &[
                "Describe your first job and what it taught you",
                "Share advice about changing careers or finding purpose in work",
                "What's the biggest mistake you made in your career and what you learned?",
            ],
            Category::Cultural => &[
                "What cultural traditions were important in your family?",
                "How did your heritage influence your values and beliefs?",
                "Share a story about a cultural celebration or event",
            ],
            Category::Historical => &[
                "What historical events had the most impact on your life?",
                "How did you experience major historical events as a young person?",
                "What lessons from history do you think are most important today?",
            ],
            Category::Relationships => &[
                "How did your parents or guardians show love and support?",
                "What was the best piece of relationship advice you received?",
                "Describe a friendship that significantly impacted your life",
            ],
            Category::Parenting => &[
                "What was your approach to discipline and setting boundaries?",
                "How did you handle conflicts or challenges with your children?",
                "What are you most proud of teaching your children?",
            ],
            Category::Cooking => &[
                "What role did cooking play in your family life?",
                "How did you learn to cook the dishes you love?",
                "Share a memorable cooking experience or disaster",
            ],
            Category::Crafts => &[
                "What crafts or hobbies have you enjoyed throughout your life?",
                "How did you learn the skills for your favorite craft?",
                "Describe a project that you are particularly proud of",
            ],
            Category::Travel => &[
                "What inspired your love of travel?",
                "Share a travel experience that changed your perspective",
                "How did you prepare for trips in the past compared to now?",
            ],
            Category::Health => &[
                "What were common health practices in your family?",
                "How did you stay active and healthy without modern conveniences?",
                "What advice would you give about maintaining health and wellness?",
            ],
            Category::Technology => &[
                "How has technology changed during your lifetime?",
                "What was life like before smartphones and the internet?",
                "How did you adapt to new technologies over the years?",
            ],
            Category::Finance => &[
                "What financial lessons did you learn from your parents?",
                "How did you handle money differently in your younger years?",
                "What's the best financial advice you can give?",
            ],
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::LifeSkills
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalTone {
    pub tone: String,
    pub confidence: f64,
    #[serde(default)]
    pub emotions: Vec<String>,
    #[serde(default)]
    pub mood_description: String,
}

impl Default for EmotionalTone {
    fn default() -> Self {
        Self {
            tone: "neutral".into(),
            confidence: 0.5,
            emotions: Vec::new(),
            mood_description: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub transcript: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub contributor_name: String,
    #[serde(default)]
    pub contributor_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub audio_file: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub emotional_tone: EmotionalTone,
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
    #[serde(default)]
    pub duration: f64,
}

impl Story {
    /// A not-yet-saved story. The store assigns id and timestamps.
    pub fn new(title: &str, category: Category, transcript: &str) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            title: title.to_string(),
            category,
            transcript: transcript.to_string(),
            summary: String::new(),
            contributor_name: String::new(),
            contributor_id: String::new(),
            created_at: now,
            updated_at: now,
            audio_file: None,
            cover_image: None,
            tags: Vec::new(),
            topics: Vec::new(),
            skills: Vec::new(),
            emotional_tone: EmotionalTone::default(),
            follow_up_questions: Vec::new(),
            duration: 0.0,
        }
    }

    pub fn searchable_text(&self) -> String {
        [
            self.title.as_str(),
            self.transcript.as_str(),
            self.summary.as_str(),
            &self.tags.join(" "),
        ]
        .join(" ")
        .to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Elder,
    Seeker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Elder => "elder",
            Role::Seeker => "seeker",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "elder" => Some(Role::Elder),
            "seeker" => Some(Role::Seeker),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    Declined,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Accepted => "accepted",
            ConnectionStatus::Declined => "declined",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(ConnectionStatus::Pending),
            "accepted" | "accept" => Some(ConnectionStatus::Accepted),
            "declined" | "decline" => Some(ConnectionStatus::Declined),
            _ => None,
        }
    }

    /// Only a pending request can be answered; accepted and declined are terminal.
    pub fn can_transition_to(&self, next: ConnectionStatus) -> bool {
        matches!(
            (self, next),
            (ConnectionStatus::Pending, ConnectionStatus::Accepted)
                | (ConnectionStatus::Pending, ConnectionStatus::Declined)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub elder_id: String,
    pub seeker_id: String,
    #[serde(default)]
    pub seeker_name: String,
    #[serde(default)]
    pub story_id: Option<String>,
    #[serde(default)]
    pub story_title: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub preferred_contact: Option<String>,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewConnection {
    pub elder_id: String,
    pub seeker_id: String,
    pub seeker_name: String,
    pub story_id: Option<String>,
    pub story_title: Option<String>,
    pub message: String,
    pub topics: Vec<String>,
    pub preferred_contact: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Open,
    Answered,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Open => "open",
            QuestionStatus::Answered => "answered",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "open" => Some(QuestionStatus::Open),
            "answered" => Some(QuestionStatus::Answered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub question: String,
    pub category: Category,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub seeker_id: String,
    #[serde(default)]
    pub seeker_name: String,
    #[serde(default)]
    pub elder_id: Option<String>,
    #[serde(default)]
    pub connection_id: Option<String>,
    pub status: QuestionStatus,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub answered_by: Option<String>,
    #[serde(default)]
    pub answered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewQuestion {
    pub question: String,
    pub category: Category,
    pub urgency: Option<String>,
    pub seeker_id: String,
    pub seeker_name: String,
    pub elder_id: Option<String>,
    pub connection_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyLevel {
    Public,
    #[default]
    Community,
    Connections,
}

impl PrivacyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::Public => "public",
            PrivacyLevel::Community => "community",
            PrivacyLevel::Connections => "connections",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "public" => Some(PrivacyLevel::Public),
            "community" => Some(PrivacyLevel::Community),
            "connections" => Some(PrivacyLevel::Connections),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub expertise_areas: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub goals: Option<String>,
    #[serde(default)]
    pub privacy_level: PrivacyLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(name: &str, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            name: name.to_string(),
            role,
            age: None,
            location: None,
            bio: String::new(),
            expertise_areas: Vec::new(),
            interests: Vec::new(),
            goals: None,
            privacy_level: PrivacyLevel::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    View,
    Like,
    Save,
    Comment,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::View => "view",
            InteractionKind::Like => "like",
            InteractionKind::Save => "save",
            InteractionKind::Comment => "comment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "view" => Some(InteractionKind::View),
            "like" => Some(InteractionKind::Like),
            "save" => Some(InteractionKind::Save),
            "comment" => Some(InteractionKind::Comment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub story_id: String,
    pub user_id: String,
    pub kind: InteractionKind,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoryFilter {
    pub category: Option<Category>,
    /// Matches either the contributor id or the contributor name.
    pub contributor: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionFilter {
    pub elder_id: Option<String>,
    pub category: Option<Category>,
    pub seeker_id: Option<String>,
    pub status: Option<QuestionStatus>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Relevance,
    Alphabetical,
}

impl SortOrder {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(' ', "_").as_str() {
            "newest" | "newest_first" => Some(SortOrder::Newest),
            "oldest" | "oldest_first" => Some(SortOrder::Oldest),
            "relevance" | "most_relevant" => Some(SortOrder::Relevance),
            "alphabetical" | "title" => Some(SortOrder::Alphabetical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagSet {
    pub tags: Vec<String>,
    pub topics: Vec<String>,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformStats {
    pub total_stories: usize,
    pub active_contributors: usize,
    pub connections_made: usize,
    pub questions_answered: usize,
    pub categories_covered: usize,
    pub total_listening_time_hours: f64,
    pub stories_by_category: std::collections::BTreeMap<Category, usize>,
    pub recent_activity_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserActivity {
    pub stories_contributed: usize,
    pub stories_listened: usize,
    pub connections_made: usize,
    pub questions_asked: usize,
    pub questions_answered: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    pub views: usize,
    pub likes: usize,
    pub saves: usize,
    pub comments: usize,
}
