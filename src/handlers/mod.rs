use crate::engines::ConvertOptions;
use crate::error::{AppError, Result};
use crate::formats::{ConvertFormat, INPUT_EXTENSIONS};
use crate::orchestrator::{Orchestrator, Upload};
use axum::{
    extract::{multipart::Field, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Convert a single uploaded document to `format`
pub async fn convert_handler(
    State(state): State<Arc<AppState>>,
    Path(format): Path<String>,
    mut multipart: Multipart,
) -> Result<Response> {
    let format: ConvertFormat = format.parse()?;
    let mut upload: Option<Upload> = None;
    let mut options = ConvertOptions::default();

    while let Some(field) = next_field(&mut multipart).await? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => upload = Some(read_upload(field).await?),
            "options" => {
                let text = field.text().await.map_err(|e| {
                    AppError::InvalidRequest(format!("Failed to read options: {}", e))
                })?;
                if !text.trim().is_empty() {
                    options = serde_json::from_str(&text).map_err(|e| {
                        AppError::InvalidRequest(format!("options must be a JSON object: {}", e))
                    })?;
                }
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let upload = upload.ok_or(AppError::NoFileProvided)?;
    let result = state
        .orchestrator
        .handle_convert(upload, format, options)
        .await?;

    Ok(Json(result).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchQuery {
    pub format: Option<String>,
}

/// Convert several documents; one result per file, in upload order
pub async fn batch_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BatchQuery>,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut uploads = Vec::new();
    let mut format_name = query.format;

    while let Some(field) = next_field(&mut multipart).await? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "files" | "file" => uploads.push(read_upload(field).await?),
            "format" => {
                let value = field.text().await.map_err(|e| {
                    AppError::InvalidRequest(format!("Failed to read format: {}", e))
                })?;
                format_name = Some(value);
            }
            _ => {}
        }
    }

    if uploads.is_empty() {
        return Err(AppError::NoFileProvided);
    }

    let format = format_name
        .as_deref()
        .map(ConvertFormat::from_name_or_default)
        .unwrap_or_default();
    info!("Batch of {} files to {}", uploads.len(), format);

    let results = state.orchestrator.handle_batch(uploads, format).await;
    Ok(Json(results).into_response())
}

/// Send back a converted file
pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Response> {
    let file = state.orchestrator.open_download(&file_id).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.data,
    )
        .into_response())
}

/// Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(session_status(&state))
}

/// Quit and relaunch the office application, e.g. after it was restarted
/// or replaced on the host
pub async fn reinitialize_handler(State(state): State<Arc<AppState>>) -> Result<Response> {
    let session = state.orchestrator.session();
    info!(backend = session.backend_name(), "office session restart requested");
    session.reinitialize().await?;
    Ok(Json(session_status(&state)).into_response())
}

fn session_status(state: &AppState) -> serde_json::Value {
    let session = state.orchestrator.session();
    json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service_available": session.is_available(),
        "backend": session.backend_name(),
        "phase": session.phase(),
    })
}

pub async fn supported_formats_handler() -> impl IntoResponse {
    let targets: Vec<&str> = ConvertFormat::ALL.iter().map(|f| f.extension()).collect();
    let inputs: Vec<String> = INPUT_EXTENSIONS.iter().map(|e| format!(".{}", e)).collect();

    Json(json!({
        "supported_formats": targets,
        "input_formats": inputs,
        "default_format": ConvertFormat::default(),
    }))
}

/// Information endpoint - lists endpoints and formats
pub async fn info_handler() -> impl IntoResponse {
    Json(json!({
        "service": "officemill",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "convert": {
                "path": "/convert/{format}",
                "method": "POST",
                "description": "Convert one office document. The format is one of pdf, doc, docx, txt, html, rtf.",
                "content_type": "multipart/form-data",
                "fields": {
                    "file": "The document to convert (required)",
                    "options": "JSON object passed to the office backend (optional, currently without effect)"
                }
            },
            "convert_batch": {
                "path": "/convert-batch?format={format}",
                "method": "POST",
                "description": "Convert several documents; returns one result per file in upload order",
                "content_type": "multipart/form-data",
                "fields": {
                    "files": "Documents to convert (repeat the field)",
                    "format": "Target format (optional, defaults to pdf)"
                }
            },
            "download": {
                "path": "/download/{file_id}",
                "method": "GET",
                "description": "Fetch a converted file by the reference returned from a conversion"
            },
            "reinitialize": {
                "path": "/session/reinitialize",
                "method": "POST",
                "description": "Quit and relaunch the office application; 503 if it does not come back"
            },
            "supported_formats": {
                "path": "/supported-formats",
                "method": "GET",
                "description": "Target and input formats"
            },
            "health": {
                "path": "/",
                "method": "GET",
                "description": "Health check, including whether the office application is running"
            }
        }
    }))
}

async fn next_field(multipart: &mut Multipart) -> Result<Option<Field<'_>>> {
    multipart.next_field().await.map_err(|e| {
        AppError::InvalidRequest(format!("Failed to parse multipart data: {}", e))
    })
}

async fn read_upload(field: Field<'_>) -> Result<Upload> {
    let filename = field
        .file_name()
        .ok_or_else(|| AppError::InvalidRequest("No filename provided".to_string()))?
        .to_string();

    let data = field.bytes().await.map_err(|e| {
        AppError::InvalidRequest(format!("Failed to read file data: {}", e))
    })?;

    info!("Received file: {} ({} bytes)", filename, data.len());
    Ok(Upload { filename, data })
}
