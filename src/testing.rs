//! Deterministic stand-ins for the outbound capabilities.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::background::BackgroundReplacer;
use crate::error::{PipelineError, Result};
use crate::llm::{AssessmentInput, ExposureAssessor};
use crate::scratch::{ScratchDir, ScratchFile};

pub const JPEG_BYTES: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0xFF, 0xD9,
];

#[derive(Debug, Clone)]
pub struct SeenAssessment {
    pub image_existed: bool,
    pub image_bytes: Vec<u8>,
    pub metadata: String,
    pub previous_settings: Option<String>,
}

pub struct FakeAssessor {
    reply: std::result::Result<String, String>,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<SeenAssessment>>,
}

impl FakeAssessor {
    pub fn replying(text: &str) -> Self {
        Self::with_reply(Ok(text.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_reply(Err(message.to_string()))
    }

    fn with_reply(reply: std::result::Result<String, String>) -> Self {
        FakeAssessor {
            reply,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ExposureAssessor for FakeAssessor {
    async fn assess(&self, input: &AssessmentInput<'_>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let image_bytes = std::fs::read(input.image_path).unwrap_or_default();
        self.seen.lock().unwrap().push(SeenAssessment {
            image_existed: input.image_path.exists(),
            image_bytes,
            metadata: input.metadata.to_string(),
            previous_settings: input.previous_settings.map(str::to_string),
        });
        self.reply
            .clone()
            .map_err(|detail| PipelineError::VisionStatus {
                status: 500,
                detail,
            })
    }

    fn model_name(&self) -> &str {
        "fake-vision"
    }
}

pub struct FakeReplacer {
    outcome: std::result::Result<Vec<u8>, u16>,
    pub calls: AtomicUsize,
}

impl FakeReplacer {
    pub fn succeeding(bytes: &[u8]) -> Self {
        FakeReplacer {
            outcome: Ok(bytes.to_vec()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(status: u16) -> Self {
        FakeReplacer {
            outcome: Err(status),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BackgroundReplacer for FakeReplacer {
    async fn replace_background(
        &self,
        image_path: &Path,
        scratch: &ScratchDir,
    ) -> Result<ScratchFile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(image_path.exists(), "upload must exist during replacement");
        match &self.outcome {
            Ok(bytes) => Ok(scratch.write("background-", ".png", bytes)?),
            Err(status) => Err(PipelineError::BackgroundRemoval {
                status: *status,
                body: "upstream unavailable".to_string(),
            }),
        }
    }

    fn provider_name(&self) -> &str {
        "fake-background"
    }
}
