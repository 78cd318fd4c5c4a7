pub mod media;
pub mod openai;
pub mod prompt;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

pub use openai::OpenAiAssessor;

/// What the assessor needs to judge one test shot.
#[derive(Debug, Clone, Copy)]
pub struct AssessmentInput<'a> {
    pub image_path: &'a Path,
    pub metadata: &'a str,
    pub previous_settings: Option<&'a str>,
}

/// Image-to-text capability that turns a test shot into an exposure suggestion.
#[async_trait]
pub trait ExposureAssessor: Send + Sync {
    async fn assess(&self, input: &AssessmentInput<'_>) -> Result<String>;

    fn model_name(&self) -> &str;
}
