use std::path::PathBuf;

use anyhow::Result;

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendKind {
    Json,
    Sqlite(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub backend: BackendKind,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub speech_api_key: Option<String>,
    pub max_upload_mb: u64,
    pub session_ttl_minutes: i64,
    pub require_cover_image: bool,
}

impl Config {
    /// Defaults rooted at `data_dir`: JSON backend, no external services.
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            backend: BackendKind::Json,
            gemini_api_key: None,
            gemini_model: "gemini-pro".into(),
            speech_api_key: None,
            max_upload_mb: 50,
            session_ttl_minutes: 120,
            require_cover_image: false,
        }
    }

    pub fn from_env() -> Result<Self> {
        let data_dir = resolve_data_dir();
        let mut config = Self::local(&data_dir);

        config.backend = match std::env::var("DATABASE_URL") {
            Ok(url) if !url.is_empty() => parse_database_url(&url)?,
            _ => match std::env::var("STORYSHARE_BACKEND").as_deref() {
                Ok("sqlite") => BackendKind::Sqlite(data_dir.join("storyshare.db")),
                _ => BackendKind::Json,
            },
        };

        config.gemini_api_key = non_empty_var("GEMINI_API_KEY");
        if let Some(model) = non_empty_var("GEMINI_MODEL") {
            config.gemini_model = model;
        }
        config.speech_api_key = non_empty_var("GOOGLE_SPEECH_API_KEY");

        if let Some(mb) = non_empty_var("MAX_UPLOAD_SIZE_MB") {
            config.max_upload_mb = mb.parse()?;
        }
        if let Some(ttl) = non_empty_var("STORYSHARE_SESSION_TTL_MINUTES") {
            config.session_ttl_minutes = ttl.parse()?;
        }
        config.require_cover_image = matches!(
            non_empty_var("STORYSHARE_REQUIRE_COVER").as_deref(),
            Some("1") | Some("true")
        );

        Ok(config)
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}

pub fn parse_database_url(url: &str) -> Result<BackendKind> {
    if let Some(path) = url
        .strip_prefix("sqlite:///")
        .map(|p| format!("/{}", p))
        .or_else(|| url.strip_prefix("sqlite://").map(str::to_string))
    {
        if path.is_empty() || path == "/" {
            return Err(StoreError::UnsupportedDatabase(url.to_string()).into());
        }
        return Ok(BackendKind::Sqlite(PathBuf::from(path)));
    }
    Err(StoreError::UnsupportedDatabase(url.to_string()).into())
}

fn resolve_data_dir() -> PathBuf {
    PathBuf::from(
        std::env::var("STORYSHARE_DATA_DIR").unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            format!("{}/.storyshare/data", home)
        })
    )
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
