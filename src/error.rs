use thiserror::Error;

/// Failures raised while assessing a test shot.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Scratch file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Background removal failed with status {status}: {body}")]
    BackgroundRemoval { status: u16, body: String },

    #[error("Vision request failed with status {status}: {detail}")]
    VisionStatus { status: u16, detail: String },

    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_error_mentions_status_and_body() {
        let err = PipelineError::BackgroundRemoval {
            status: 402,
            body: "Insufficient credits".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("402"));
        assert!(message.contains("Insufficient credits"));
    }

    #[test]
    fn io_errors_convert() {
        let err: PipelineError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, PipelineError::Io(_)));
        assert_eq!(err.to_string(), "Scratch file error: gone");
    }
}
