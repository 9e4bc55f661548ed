use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;

const RECOGNIZE_URL: &str = "https://speech.googleapis.com/v1/speech:recognize";

#[derive(Debug, Clone, PartialEq)]
pub enum Transcription {
    Text(String),
    /// The service answered but found no intelligible speech.
    NotUnderstood,
}

/// Speech-to-text. Service failures are `Err`; unintelligible audio is not.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcription>;
}

pub struct GoogleSpeech {
    client: reqwest::Client,
    api_key: String,
    language: String,
}

impl GoogleSpeech {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            language: "en-US".into(),
        }
    }
}

#[async_trait]
impl Transcriber for GoogleSpeech {
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcription> {
        let body = serde_json::json!({
            "config": {
                "languageCode": self.language,
                "enableAutomaticPunctuation": true
            },
            "audio": {
                "content": base64::engine::general_purpose::STANDARD.encode(audio)
            }
        });

        let resp = self
            .client
            .post(RECOGNIZE_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("speech request failed ({}): {}", status, text);
        }

        let data: serde_json::Value = resp.json().await?;
        Ok(transcription_from_response(&data))
    }
}

/// Joins the top alternative of every result segment.
fn transcription_from_response(data: &serde_json::Value) -> Transcription {
    let text = data["results"]
        .as_array()
        .map(|results| {
            results
                .iter()
                .filter_map(|r| r["alternatives"][0]["transcript"].as_str())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    if text.is_empty() {
        Transcription::NotUnderstood
    } else {
        Transcription::Text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn joins_result_segments() {
        let data = json!({
            "results": [
                {"alternatives": [{"transcript": "When I was young ", "confidence": 0.9}]},
                {"alternatives": [{"transcript": "we baked bread."}]}
            ]
        });
        assert_eq!(
            transcription_from_response(&data),
            Transcription::Text("When I was young we baked bread.".into())
        );
    }

    #[test]
    fn empty_response_is_not_understood() {
        assert_eq!(transcription_from_response(&json!({})), Transcription::NotUnderstood);
        assert_eq!(
            transcription_from_response(&json!({"results": [{"alternatives": [{"transcript": "  "}]}]})),
            Transcription::NotUnderstood
        );
    }
}
