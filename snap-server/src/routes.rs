//! API route handlers.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use snap_core::{
    friendly_error, validate_upload, EditorDocument, EditorError, HasErrorKind, ImageRef,
    RenderSnapshot, UploadError, UploadInfo,
};
use snap_renderer::{
    DataUri, ExportAction, ExportError, ExportOutcome, ExportRequest, ImageFormat, SourceImage,
    Tier,
};

use crate::metrics;
use crate::AppState;

/// Body of `POST /api/export`.
#[derive(Debug, Deserialize)]
pub struct ExportBody {
    /// Base64 image, raw or as a `data:` URI.
    #[serde(default)]
    pub image: Option<String>,
    /// URL to fetch the image from when `image` is absent.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Styling to apply.
    #[serde(default)]
    pub document: EditorDocument,
    /// What to do with the result.
    #[serde(default)]
    pub action: ExportAction,
    /// User whose subscription decides the tier.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Build an error response carrying the friendly description of `error`.
pub fn error_response<E: HasErrorKind + Display>(status: StatusCode, error: &E) -> Response {
    let kind = error.error_kind();
    let friendly = friendly_error(error);
    (
        status,
        Json(json!({
            "error": error.to_string(),
            "kind": kind,
            "title": friendly.title,
            "action": friendly.action,
        })),
    )
        .into_response()
}

/// HTTP status for an export failure.
#[must_use]
pub fn export_status(error: &ExportError) -> StatusCode {
    match error {
        ExportError::Busy => StatusCode::SERVICE_UNAVAILABLE,
        ExportError::NoImage => StatusCode::BAD_REQUEST,
        ExportError::FormatNotAllowed { .. } | ExportError::ScaleNotAllowed { .. } => {
            StatusCode::FORBIDDEN
        }
        ExportError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
        ExportError::Render(_)
        | ExportError::Encode { .. }
        | ExportError::Delivery(_)
        | ExportError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Canonical MIME for a known image type; anything else passes through.
fn normalize_mime(declared: &str) -> String {
    ImageFormat::from_mime(declared)
        .mime()
        .map_or_else(|| declared.to_string(), str::to_string)
}

/// Source bytes plus the MIME type they were declared with.
async fn load_source(
    state: &AppState,
    body: &ExportBody,
) -> Result<(Vec<u8>, Option<String>), Response> {
    if let Some(image) = &body.image {
        if DataUri::is_data_uri(image) {
            let uri = DataUri::parse(image).map_err(|e| {
                error_response(
                    StatusCode::BAD_REQUEST,
                    &EditorError::InvalidValue(e.to_string()),
                )
            })?;
            return Ok((uri.bytes, uri.mime));
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(image.trim())
            .map_err(|e| {
                error_response(
                    StatusCode::BAD_REQUEST,
                    &EditorError::InvalidValue(format!("image is not base64: {e}")),
                )
            })?;
        return Ok((bytes, None));
    }
    if let Some(url) = &body.image_url {
        let fetched = state.fetcher.fetch(url).await.map_err(|e| {
            let status = if e.error_kind().is_retryable() {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::BAD_REQUEST
            };
            error_response(status, &e)
        })?;
        return Ok((fetched.bytes, fetched.content_type));
    }
    Err(error_response(StatusCode::BAD_REQUEST, &EditorError::NoImage))
}

/// `POST /api/export`: render a document and return the encoded image.
#[tracing::instrument(name = "export", skip_all)]
pub async fn export_handler(State(state): State<AppState>, Json(body): Json<ExportBody>) -> Response {
    let started = Instant::now();
    match run_export(&state, body, started).await {
        Ok(response) => response,
        Err((outcome, response)) => {
            metrics::record_export_outcome(outcome, started.elapsed().as_secs_f64());
            response
        }
    }
}

async fn run_export(
    state: &AppState,
    body: ExportBody,
    started: Instant,
) -> Result<Response, (&'static str, Response)> {
    let (bytes, declared) = load_source(state, &body)
        .await
        .map_err(|r| ("invalid_input", r))?;

    let mime = declared
        .map(|m| normalize_mime(&m))
        .or_else(|| ImageFormat::from_magic_bytes(&bytes).mime().map(str::to_string))
        .unwrap_or_else(|| "application/octet-stream".to_string());
    if let Err(e) = validate_upload(&UploadInfo::new(mime, bytes.len() as u64)) {
        metrics::record_validation_failure(e.code());
        let status = match &e {
            UploadError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::InvalidFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        };
        return Err(("invalid_input", error_response(status, &e)));
    }

    let source = SourceImage::decode(&bytes)
        .map_err(|e| ("invalid_input", error_response(StatusCode::UNPROCESSABLE_ENTITY, &e)))?;

    let mut document = body
        .document
        .validated()
        .map_err(|e| ("invalid_input", error_response(StatusCode::BAD_REQUEST, &e)))?;
    let fresh = source.image_ref();
    document.image = match document.image {
        // Keep a committed crop made against the same source.
        Some(image) if (image.width, image.height) == (fresh.width, fresh.height) => Some(image),
        _ => Some(ImageRef::new(fresh.width, fresh.height)),
    };
    let snapshot = RenderSnapshot::from_document(document).ok_or_else(|| {
        (
            "invalid_input",
            error_response(StatusCode::BAD_REQUEST, &EditorError::NoImage),
        )
    })?;

    let tier = body
        .user_id
        .as_deref()
        .map_or(Tier::Free, |user| state.ledger.tier_for(user));
    let request = ExportRequest::from_settings(snapshot.document().export, body.action, tier);
    metrics::record_export_attempt(request.format, request.scale);

    let outcome = state
        .exports
        .export(&snapshot, Arc::new(source), request)
        .await
        .map_err(|e| {
            let status = export_status(&e);
            let mut response = error_response(status, &e);
            if matches!(e, ExportError::Busy) {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
            }
            ("failed", response)
        })?;

    match outcome {
        ExportOutcome::Delivered(report) => {
            if report.downgraded() {
                metrics::record_export_downgrade(report.requested_scale, report.artifact.scale);
            }
            metrics::record_export_outcome("delivered", started.elapsed().as_secs_f64());
            let artifact = report.artifact;
            let file_name = report
                .receipt
                .location
                .as_deref()
                .and_then(|p| std::path::Path::new(p).file_name())
                .map_or_else(|| artifact.file_name(), |n| n.to_string_lossy().into_owned());
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, artifact.format.mime().to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{file_name}\""),
                    ),
                    (
                        header::HeaderName::from_static("x-export-scale"),
                        artifact.scale.to_string(),
                    ),
                ],
                artifact.bytes,
            )
                .into_response())
        }
        ExportOutcome::Cancelled { scale } => Err((
            "cancelled",
            (
                StatusCode::CONFLICT,
                Json(json!({ "error": "export cancelled", "scale": scale.to_string() })),
            )
                .into_response(),
        )),
    }
}
