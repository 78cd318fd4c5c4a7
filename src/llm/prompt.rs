use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};

use crate::config::{
    ExposurePreferences, ReferenceImage, EVALUATION_PROMPT, FORMAT_PROMPT,
    PREVIOUS_SETTINGS_PROMPT, REFERENCE_PROMPT,
};

#[derive(Debug, Clone, PartialEq)]
pub enum PromptPart {
    ImageUrl(String),
    InlineImage { mime_type: String, data: Vec<u8> },
    Text(String),
}

impl PromptPart {
    pub fn to_content_json(&self) -> Value {
        match self {
            PromptPart::ImageUrl(url) => json!({
                "type": "image_url",
                "image_url": { "url": url }
            }),
            PromptPart::InlineImage { mime_type, data } => {
                let encoded = general_purpose::STANDARD.encode(data);
                json!({
                    "type": "image_url",
                    "image_url": { "url": format!("data:{};base64,{}", mime_type, encoded) }
                })
            }
            PromptPart::Text(text) => json!({
                "type": "text",
                "text": text
            }),
        }
    }
}

/// Ordered content of the single user message sent to the vision model.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionPrompt {
    parts: Vec<PromptPart>,
}

impl VisionPrompt {
    /// Reference images first, then the evaluation brief, the test shot, and
    /// finally the response-format instructions.
    pub fn build(
        references: &[ReferenceImage],
        preferences: &ExposurePreferences,
        metadata: &str,
        previous_settings: Option<&str>,
        mime_type: &str,
        image: Vec<u8>,
    ) -> Self {
        let mut parts = Vec::with_capacity(references.len() + 3);
        parts.extend(
            references
                .iter()
                .map(|reference| PromptPart::ImageUrl(reference.url.clone())),
        );
        parts.push(PromptPart::Text(evaluation_instruction(
            references,
            preferences,
            metadata,
            previous_settings,
        )));
        parts.push(PromptPart::InlineImage {
            mime_type: mime_type.to_string(),
            data: image,
        });
        parts.push(PromptPart::Text(format_instruction(preferences)));
        VisionPrompt { parts }
    }

    pub fn parts(&self) -> &[PromptPart] {
        &self.parts
    }

    pub fn image_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|part| !matches!(part, PromptPart::Text(_)))
            .count()
    }

    pub fn to_content(&self) -> Value {
        Value::Array(self.parts.iter().map(PromptPart::to_content_json).collect())
    }
}

pub fn evaluation_instruction(
    references: &[ReferenceImage],
    preferences: &ExposurePreferences,
    metadata: &str,
    previous_settings: Option<&str>,
) -> String {
    let flash_sentence = if preferences.flash {
        "The test shot was taken with flash."
    } else {
        "The test shot was taken without flash, using continuous light."
    };

    let mut text = EVALUATION_PROMPT
        .replace("{metadata}", metadata.trim())
        .replace("{flash_sentence}", flash_sentence)
        .replace("{target_iso}", &preferences.target_iso.to_string())
        .replace("{baseline_aperture}", &preferences.baseline_aperture)
        .replace("{fixed_shutter}", &preferences.fixed_shutter);

    if !references.is_empty() {
        text.push(' ');
        text.push_str(&REFERENCE_PROMPT.replace("{count}", &references.len().to_string()));
        let notes: Vec<String> = references
            .iter()
            .enumerate()
            .filter_map(|(index, reference)| {
                reference
                    .note
                    .as_deref()
                    .map(|note| format!("Reference {}: {}.", index + 1, note))
            })
            .collect();
        if !notes.is_empty() {
            text.push(' ');
            text.push_str(&notes.join(" "));
        }
    }

    if let Some(previous) = previous_settings.map(str::trim).filter(|p| !p.is_empty()) {
        text.push(' ');
        text.push_str(&PREVIOUS_SETTINGS_PROMPT.replace("{previous_settings}", previous));
    }

    text
}

pub fn format_instruction(preferences: &ExposurePreferences) -> String {
    FORMAT_PROMPT.replace("{max_sentences}", &preferences.max_sentences.to_string())
}
