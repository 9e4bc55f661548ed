pub mod community;
pub mod profiles;
pub mod sessions;
pub mod stats;
pub mod stories;

use anyhow::Result;

use crate::error::StoreError;
use crate::types::{Category, Role};

pub(crate) fn invalid(problem: impl Into<String>) -> anyhow::Error {
    StoreError::Validation(vec![problem.into()]).into()
}

pub(crate) fn parse_category(value: Option<&str>) -> Result<Option<Category>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => Category::from_str(v)
            .map(Some)
            .ok_or_else(|| invalid(format!("Unknown category '{}'", v))),
    }
}

pub(crate) fn parse_role(value: &str) -> Result<Role> {
    Role::from_str(value).ok_or_else(|| invalid(format!("Unknown role '{}'. use: elder, seeker", value)))
}

/// Trimmed, or None when blank.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::config::Config;
    use crate::enrich::{Enricher, TextModel};
    use crate::server::StoryServer;
    use crate::speech::{Transcriber, Transcription};
    use crate::store::Store;

    pub struct FixedTranscriber(pub Option<&'static str>);

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _audio: &[u8]) -> anyhow::Result<Transcription> {
            Ok(match self.0 {
                Some(text) => Transcription::Text(text.to_string()),
                None => Transcription::NotUnderstood,
            })
        }
    }

    pub struct BrokenTranscriber;

    #[async_trait]
    impl Transcriber for BrokenTranscriber {
        async fn transcribe(&self, _audio: &[u8]) -> anyhow::Result<Transcription> {
            anyhow::bail!("connection reset")
        }
    }

    /// A text model whose every call errors, as during a service outage.
    pub struct DownModel;

    #[async_trait]
    impl TextModel for DownModel {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            anyhow::bail!("503 service unavailable")
        }
    }

    pub fn server_with(
        dir: &TempDir,
        config: impl FnOnce(&mut Config),
        enricher: Enricher,
        transcriber: Option<Arc<dyn Transcriber>>,
    ) -> StoryServer {
        let mut cfg = Config::local(dir.path());
        config(&mut cfg);
        let store = Store::init(&cfg).unwrap();
        StoryServer::new(cfg, store, enricher, transcriber)
    }

    pub fn server(dir: &TempDir) -> StoryServer {
        server_with(dir, |_| {}, Enricher::disabled(), None)
    }
}
