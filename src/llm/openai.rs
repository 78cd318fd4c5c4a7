use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{ExposurePreferences, OpenAiConfig, ReferenceImage};
use crate::error::{PipelineError, Result};
use crate::llm::media::image_mime_or_default;
use crate::llm::prompt::VisionPrompt;
use crate::llm::{AssessmentInput, ExposureAssessor};
use crate::utils::http::{summarize_error_body, truncate_for_log};
use crate::utils::timing::log_upstream_timing;

const ERROR_BODY_LOG_LIMIT: usize = 2000;

/// Vision assessor backed by an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiAssessor {
    client: Client,
    config: OpenAiConfig,
    references: Vec<ReferenceImage>,
    preferences: ExposurePreferences,
}

impl OpenAiAssessor {
    pub fn new(
        client: Client,
        config: OpenAiConfig,
        references: Vec<ReferenceImage>,
        preferences: ExposurePreferences,
    ) -> Self {
        OpenAiAssessor {
            client,
            config,
            references,
            preferences,
        }
    }

    fn build_payload(&self, prompt: &VisionPrompt) -> Value {
        json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "user",
                    "content": prompt.to_content()
                }
            ],
            "max_tokens": self.config.max_tokens
        })
    }

    async fn call_chat_completion(&self, payload: &Value) -> Result<Value> {
        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(self.config.api_key.expose())
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body, ERROR_BODY_LOG_LIMIT);
            warn!(
                "Vision API error: status={}, body={}",
                status, body_summary
            );
            return Err(PipelineError::VisionStatus {
                status: status.as_u16(),
                detail: message.unwrap_or(body_summary),
            });
        }

        let value = response.json::<Value>().await?;
        debug!("Vision response received for model={}", self.config.model);
        Ok(value)
    }
}

fn summarize_prompt(model: &str, prompt: &VisionPrompt, max_tokens: u32) -> String {
    format!(
        "model={}, parts={}, images={}, max_tokens={}",
        model,
        prompt.parts().len(),
        prompt.image_count(),
        max_tokens
    )
}

/// Text of the first choice. Some compatible servers return content as an
/// array of typed parts rather than a plain string.
fn extract_first_choice_text(response: &Value) -> Option<String> {
    let content = response.pointer("/choices/0/message/content")?;
    let text = match content {
        Value::String(text) => text.trim().to_string(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
            .collect::<Vec<_>>()
            .join("")
            .trim()
            .to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl ExposureAssessor for OpenAiAssessor {
    async fn assess(&self, input: &AssessmentInput<'_>) -> Result<String> {
        let image = tokio::fs::read(input.image_path).await?;
        let mime_type = image_mime_or_default(&image);
        let prompt = VisionPrompt::build(
            &self.references,
            &self.preferences,
            input.metadata,
            input.previous_settings,
            &mime_type,
            image,
        );
        debug!(
            "Vision request: {}",
            summarize_prompt(&self.config.model, &prompt, self.config.max_tokens)
        );
        let payload = self.build_payload(&prompt);

        let response = log_upstream_timing("openai", &self.config.model, "assess_exposure", || {
            self.call_chat_completion(&payload)
        })
        .await?;

        extract_first_choice_text(&response).ok_or_else(|| {
            warn!(
                "Vision response had no text content: {}",
                truncate_for_log(&response.to_string(), ERROR_BODY_LOG_LIMIT)
            );
            PipelineError::InvalidResponse("vision model returned no suggestion".to_string())
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::ApiKey;
    use crate::scratch::ScratchDir;

    const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

    fn assessor(base_url: String, references: Vec<ReferenceImage>) -> OpenAiAssessor {
        OpenAiAssessor::new(
            Client::new(),
            OpenAiConfig {
                api_key: ApiKey::new("sk-test"),
                base_url,
                model: "gpt-4-turbo".to_string(),
                max_tokens: 200,
            },
            references,
            ExposurePreferences::default(),
        )
    }

    fn input(path: &Path) -> AssessmentInput<'_> {
        AssessmentInput {
            image_path: path,
            metadata: "ISO 800, f/7.1, 1/125s",
            previous_settings: None,
        }
    }

    fn chat_response(content: Value) -> Value {
        json!({
            "id": "chatcmpl-123",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    #[tokio::test]
    async fn returns_first_choice_text() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4-turbo",
                "max_tokens": 200
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(json!(
                "  ✅ Exposure looks good, keep these settings.  "
            ))))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let shot = ScratchDir::new(dir.path()).write("shot-", ".jpg", JPEG_BYTES).unwrap();

        let suggestion = assessor(mock_server.uri(), Vec::new())
            .assess(&input(shot.path()))
            .await
            .unwrap();
        assert_eq!(suggestion, "✅ Exposure looks good, keep these settings.");
    }

    #[tokio::test]
    async fn sends_references_before_inline_test_shot() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(chat_response(json!("⚠️ Open up one stop."))),
            )
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let shot = ScratchDir::new(dir.path()).write("shot-", ".jpg", JPEG_BYTES).unwrap();
        let references = vec![ReferenceImage {
            url: "https://example.com/reference.jpg".to_string(),
            note: None,
        }];

        assessor(mock_server.uri(), references)
            .assess(&input(shot.path()))
            .await
            .unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 4);
        assert_eq!(content[0]["image_url"]["url"], "https://example.com/reference.jpg");
        assert_eq!(content[1]["type"], "text");
        assert!(content[2]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
        assert_eq!(content[3]["type"], "text");
    }

    #[tokio::test]
    async fn accepts_content_part_arrays() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(json!([
                { "type": "text", "text": "❌ Much too dark, " },
                { "type": "text", "text": "raise ISO to 1600." }
            ]))))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let shot = ScratchDir::new(dir.path()).write("shot-", ".jpg", JPEG_BYTES).unwrap();
        let suggestion = assessor(mock_server.uri(), Vec::new())
            .assess(&input(shot.path()))
            .await
            .unwrap();
        assert_eq!(suggestion, "❌ Much too dark, raise ISO to 1600.");
    }

    #[tokio::test]
    async fn surfaces_upstream_error_message() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
            })))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let shot = ScratchDir::new(dir.path()).write("shot-", ".jpg", JPEG_BYTES).unwrap();
        let err = assessor(mock_server.uri(), Vec::new())
            .assess(&input(shot.path()))
            .await
            .unwrap_err();

        match err {
            PipelineError::VisionStatus { status, detail } => {
                assert_eq!(status, 401);
                assert_eq!(detail, "Incorrect API key provided");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_are_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let shot = ScratchDir::new(dir.path()).write("shot-", ".jpg", JPEG_BYTES).unwrap();
        let err = assessor(mock_server.uri(), Vec::new())
            .assess(&input(shot.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn missing_image_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.jpg");
        let err = assessor("http://127.0.0.1:9".to_string(), Vec::new())
            .assess(&input(&missing))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn payload_carries_model_and_token_cap() {
        let assessor = assessor("http://localhost".to_string(), Vec::new());
        let prompt = VisionPrompt::build(
            &[],
            &ExposurePreferences::default(),
            "ISO 100",
            None,
            "image/jpeg",
            JPEG_BYTES.to_vec(),
        );
        let payload = assessor.build_payload(&prompt);
        assert_eq!(payload["model"], "gpt-4-turbo");
        assert_eq!(payload["max_tokens"], 200);
        assert_eq!(payload["messages"][0]["role"], "user");
        assert_eq!(payload["messages"][0]["content"].as_array().unwrap().len(), 3);
    }
}
