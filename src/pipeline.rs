use std::sync::Arc;

use tracing::{debug, info};

use crate::background::BackgroundReplacer;
use crate::error::Result;
use crate::llm::media::{extension_for_mime, image_mime_or_default};
use crate::llm::{AssessmentInput, ExposureAssessor};
use crate::scratch::ScratchDir;

#[derive(Debug, Clone)]
pub struct ExposureRequest {
    pub image: Vec<u8>,
    pub metadata: String,
    pub previous_settings: Option<String>,
}

/// Upload → optional background replacement → vision assessment.
///
/// Every scratch file created along the way is owned by this call and is
/// removed before it returns, whatever the outcome.
#[derive(Clone)]
pub struct AssessmentPipeline {
    assessor: Arc<dyn ExposureAssessor>,
    background: Option<Arc<dyn BackgroundReplacer>>,
    scratch: ScratchDir,
}

impl AssessmentPipeline {
    pub fn new(assessor: Arc<dyn ExposureAssessor>, scratch: ScratchDir) -> Self {
        AssessmentPipeline {
            assessor,
            background: None,
            scratch,
        }
    }

    pub fn with_background_replacer(mut self, replacer: Arc<dyn BackgroundReplacer>) -> Self {
        self.background = Some(replacer);
        self
    }

    pub fn model_name(&self) -> &str {
        self.assessor.model_name()
    }

    pub fn background_provider(&self) -> Option<&str> {
        self.background
            .as_ref()
            .map(|replacer| replacer.provider_name())
    }

    pub async fn run(&self, request: ExposureRequest) -> Result<String> {
        let mime_type = image_mime_or_default(&request.image);
        let upload = self
            .scratch
            .persist("upload-", extension_for_mime(&mime_type), request.image)
            .await?;
        debug!(
            "Stored test shot at {} ({})",
            upload.path().display(),
            mime_type
        );

        let cleaned = match &self.background {
            Some(replacer) => Some(
                replacer
                    .replace_background(upload.path(), &self.scratch)
                    .await?,
            ),
            None => None,
        };
        let image_path = cleaned
            .as_ref()
            .map(|file| file.path())
            .unwrap_or_else(|| upload.path());

        let suggestion = self
            .assessor
            .assess(&AssessmentInput {
                image_path,
                metadata: &request.metadata,
                previous_settings: request.previous_settings.as_deref(),
            })
            .await?;

        info!(
            "Exposure suggestion ready (model={}, background_removed={}, chars={})",
            self.assessor.model_name(),
            cleaned.is_some(),
            suggestion.chars().count()
        );
        Ok(suggestion)
    }
}
