use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, warn};

use crate::background::BackgroundReplacer;
use crate::config::BackgroundRemovalConfig;
use crate::error::{PipelineError, Result};
use crate::llm::media::{extension_for_mime, image_mime_or_default};
use crate::scratch::{ScratchDir, ScratchFile};
use crate::utils::http::summarize_error_body;
use crate::utils::timing::log_upstream_timing;

const ERROR_BODY_LIMIT: usize = 800;

/// Client for the remove.bg foreground-extraction API.
pub struct RemoveBgClient {
    client: Client,
    config: BackgroundRemovalConfig,
}

impl RemoveBgClient {
    pub fn new(client: Client, config: BackgroundRemovalConfig) -> Self {
        RemoveBgClient { client, config }
    }

    async fn request_removal(&self, image: Vec<u8>) -> Result<Vec<u8>> {
        let mime_type = image_mime_or_default(&image);
        let file_name = format!("test-shot{}", extension_for_mime(&mime_type));
        let part = Part::bytes(image)
            .file_name(file_name)
            .mime_str(&mime_type)?;
        let form = Form::new()
            .part("image_file", part)
            .text("size", "auto")
            .text("bg_color", self.config.background_color.clone());

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("X-Api-Key", self.config.api_key.expose())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body, ERROR_BODY_LIMIT);
            warn!(
                "Background removal API error: status={}, body={}",
                status, body_summary
            );
            return Err(PipelineError::BackgroundRemoval {
                status: status.as_u16(),
                body: message.unwrap_or(body_summary),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(PipelineError::InvalidResponse(
                "background removal returned an empty image".to_string(),
            ));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl BackgroundReplacer for RemoveBgClient {
    async fn replace_background(
        &self,
        image_path: &Path,
        scratch: &ScratchDir,
    ) -> Result<ScratchFile> {
        let image = tokio::fs::read(image_path).await?;
        let processed = log_upstream_timing("remove.bg", "removebg", "replace_background", || {
            self.request_removal(image)
        })
        .await?;

        let mime_type = image_mime_or_default(&processed);
        debug!(
            "Background replaced with #{} ({} bytes, {})",
            self.config.background_color,
            processed.len(),
            mime_type
        );
        let file = scratch
            .persist("background-", extension_for_mime(&mime_type), processed)
            .await?;
        Ok(file)
    }

    fn provider_name(&self) -> &str {
        "remove.bg"
    }
}
