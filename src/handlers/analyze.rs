//! `POST /analyze`: exposure suggestion for an uploaded test shot.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use crate::handlers::ApiError;
use crate::pipeline::ExposureRequest;
use crate::state::AppState;
use crate::utils::timing::{complete_request_timer, start_request_timer, RequestTimer};

pub const MISSING_INPUT_MESSAGE: &str = "Missing image or metadata";

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub suggestion: String,
}

#[derive(Debug, Default)]
struct AnalyzeForm {
    image: Option<Vec<u8>>,
    metadata: Option<String>,
    previous_settings: Option<String>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::PayloadTooLarge(err.body_text());
    }
    ApiError::BadRequest(format!("Multipart error: {}", err.body_text()))
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

async fn read_form(multipart: &mut Multipart) -> Result<AnalyzeForm, ApiError> {
    let mut form = AnalyzeForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(|n| n.to_string());
        match field_name.as_deref() {
            Some("file") => {
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.image = Some(bytes.to_vec()).filter(|b| !b.is_empty());
            }
            Some("metadata") => {
                form.metadata = non_blank(field.text().await.map_err(multipart_error)?);
            }
            Some("previous_settings") => {
                form.previous_settings = non_blank(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn run_analysis(
    state: &AppState,
    multipart: &mut Multipart,
    timer: &mut RequestTimer,
) -> Result<AnalyzeResponse, ApiError> {
    let form = read_form(multipart).await?;

    let (Some(image), Some(metadata)) = (form.image, form.metadata) else {
        return Err(ApiError::BadRequest(MISSING_INPUT_MESSAGE.to_string()));
    };
    timer.set_metadata(&metadata);

    let suggestion = state
        .pipeline
        .run(ExposureRequest {
            image,
            metadata,
            previous_settings: form.previous_settings,
        })
        .await
        .map_err(|err| {
            error!("Exposure analysis failed: {err}");
            ApiError::from(err)
        })?;

    Ok(AnalyzeResponse { suggestion })
}

pub async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let mut timer = start_request_timer("/analyze");
    let result = run_analysis(&state, &mut multipart, &mut timer).await;

    match &result {
        Ok(_) => complete_request_timer(&mut timer, "success", None),
        Err(err) => {
            if err.status().is_client_error() {
                warn!("Rejected analyze request: {}", err.message());
            }
            complete_request_timer(
                &mut timer,
                "error",
                Some(format!("{} {}", err.status().as_u16(), err.message())),
            );
        }
    }

    result.map(Json)
}
