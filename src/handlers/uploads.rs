// src/handlers/uploads.rs

use axum::{
    Json,
    extract::{Multipart, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path as FsPath;
use uuid::Uuid;

use crate::{error::AppError, state::AppState, utils::jwt::CurrentUser};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt",
];

/// One entry of the upload-directory listing.
#[derive(Debug, Serialize)]
pub struct UploadEntry {
    pub filename: String,
    pub filepath: String,
    pub size: u64,
    #[serde(rename = "uploadTime")]
    pub upload_time: String,
    pub mimetype: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct FilenameQuery {
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub oldname: String,
    pub newname: String,
}

fn classify(extension: &str) -> &'static str {
    let ext = extension.to_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        "image"
    } else if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
        "document"
    } else {
        "other"
    }
}

/// Rejects names that could escape the upload directory.
fn check_filename(name: &str) -> Result<(), AppError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(AppError::BadRequest("Invalid filename".to_string()));
    }
    Ok(())
}

/// Stores uploaded bytes under a random UUID filename, keeping the original
/// extension, and returns the generated filename.
pub(crate) async fn store_upload(
    dir: &FsPath,
    original_name: &str,
    data: &[u8],
) -> Result<String, AppError> {
    let extension = FsPath::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let filename = format!("{}{}", Uuid::new_v4(), extension);

    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(&filename), data).await?;

    Ok(filename)
}

/// Upload a file. Authenticated; the stored filename is randomly generated to
/// avoid collisions.
pub async fn upload_file(
    State(state): State<AppState>,
    _user: CurrentUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
        .ok_or_else(|| AppError::BadRequest("Missing file field".to_string()))?;

    let original_name = field.file_name().unwrap_or("upload").to_string();
    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let filename = store_upload(&state.config.upload_dir, &original_name, &data).await?;

    Ok(Json(json!({
        "filename": filename,
        "filepath": format!("/uploads/{}", filename),
    })))
}

/// List all files in the upload directory.
pub async fn list_files(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let mut files = Vec::new();

    let mut dir = match tokio::fs::read_dir(&state.config.upload_dir).await {
        Ok(dir) => dir,
        // Nothing uploaded yet.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Json(files)),
        Err(e) => return Err(AppError::from(e)),
    };

    while let Some(entry) = dir.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }

        let filename = entry.file_name().to_string_lossy().to_string();
        let modified: DateTime<Utc> = metadata.modified()?.into();
        let extension = FsPath::new(&filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        files.push(UploadEntry {
            filepath: format!("/uploads/{}", filename),
            size: metadata.len(),
            upload_time: modified.format("%Y-%m-%d %H:%M:%S").to_string(),
            mimetype: classify(extension),
            filename,
        });
    }

    Ok(Json(files))
}

/// Delete a file from the upload directory.
pub async fn delete_file(
    State(state): State<AppState>,
    Query(params): Query<FilenameQuery>,
) -> Result<impl IntoResponse, AppError> {
    check_filename(&params.filename)?;

    let path = state.config.upload_dir.join(&params.filename);
    if !path.is_file() {
        return Err(AppError::NotFound("File not found".to_string()));
    }

    tokio::fs::remove_file(&path).await?;

    Ok(Json(json!({ "message": "File deleted" })))
}

/// Rename a file inside the upload directory.
pub async fn rename_file(
    State(state): State<AppState>,
    Json(payload): Json<RenameRequest>,
) -> Result<impl IntoResponse, AppError> {
    check_filename(&payload.oldname)?;
    check_filename(&payload.newname)?;

    let old_path = state.config.upload_dir.join(&payload.oldname);
    let new_path = state.config.upload_dir.join(&payload.newname);

    if !old_path.is_file() {
        return Err(AppError::NotFound("File not found".to_string()));
    }
    if new_path.exists() {
        return Err(AppError::BadRequest("Target file already exists".to_string()));
    }

    tokio::fs::rename(&old_path, &new_path).await?;

    Ok(Json(json!({ "message": "File renamed" })))
}
