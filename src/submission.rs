//! Decodes `multipart/form-data` admin submissions into a typed payload
//! plus buffered file attachments. Nothing is persisted here; the
//! reconciliation service decides what happens to the bytes.

use axum::body::Bytes;
use axum::extract::multipart::{Field, Multipart};

use crate::error::AppError;
use crate::models::featured::FeaturedPayload;
use crate::models::trip::ProgramPayload;

pub const PROGRAM_DATA_FIELD: &str = "programData";
pub const GALLERY_FIELD: &str = "program_images";
pub const TIMELINE_FIELD_PREFIX: &str = "timeline_image_";
pub const FEATURED_DATA_FIELD: &str = "featuredData";
pub const BANNER_FIELD: &str = "banner_image";

pub const MAX_GALLERY_FILES: usize = 10;
pub const MAX_TIMELINE_FILES: usize = 50;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug)]
pub struct ProgramSubmission {
    pub payload: ProgramPayload,
    /// Gallery files in submission order.
    pub gallery: Vec<UploadedFile>,
    /// Timeline files keyed by 0-based index into the payload's timeline.
    pub timeline_images: Vec<(usize, UploadedFile)>,
}

#[derive(Debug)]
pub struct FeaturedSubmission {
    pub payload: FeaturedPayload,
    pub banner: Option<UploadedFile>,
}

pub async fn parse_program(
    mut multipart: Multipart,
    max_file_bytes: usize,
) -> Result<ProgramSubmission, AppError> {
    let mut payload: Option<ProgramPayload> = None;
    let mut gallery = Vec::new();
    let mut timeline_images = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(normalize_field_name) else {
            continue;
        };

        if name == PROGRAM_DATA_FIELD {
            let raw = field.text().await?;
            let parsed = serde_json::from_str(&raw).map_err(|_| {
                AppError::Validation("program payload is not valid JSON".into())
            })?;
            payload = Some(parsed);
        } else if name == GALLERY_FIELD {
            if gallery.len() >= MAX_GALLERY_FILES {
                return Err(AppError::PayloadTooLarge(format!(
                    "at most {MAX_GALLERY_FILES} gallery images per submission"
                )));
            }
            gallery.push(read_file(field, max_file_bytes).await?);
        } else if let Some(index) = timeline_index(&name) {
            if timeline_images.len() >= MAX_TIMELINE_FILES {
                return Err(AppError::PayloadTooLarge(format!(
                    "at most {MAX_TIMELINE_FILES} timeline images per submission"
                )));
            }
            timeline_images.push((index, read_file(field, max_file_bytes).await?));
        }
    }

    let payload = payload.ok_or_else(|| {
        AppError::Validation(format!("missing {PROGRAM_DATA_FIELD} field"))
    })?;

    Ok(ProgramSubmission {
        payload,
        gallery,
        timeline_images,
    })
}

pub async fn parse_featured(
    mut multipart: Multipart,
    max_file_bytes: usize,
) -> Result<FeaturedSubmission, AppError> {
    let mut payload: Option<FeaturedPayload> = None;
    let mut banner = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(normalize_field_name) else {
            continue;
        };

        if name == FEATURED_DATA_FIELD {
            let raw = field.text().await?;
            let parsed = serde_json::from_str(&raw).map_err(|_| {
                AppError::Validation("featured payload is not valid JSON".into())
            })?;
            payload = Some(parsed);
        } else if name == BANNER_FIELD {
            banner = Some(read_file(field, max_file_bytes).await?);
        }
    }

    let payload = payload.ok_or_else(|| {
        AppError::Validation(format!("missing {FEATURED_DATA_FIELD} field"))
    })?;

    Ok(FeaturedSubmission { payload, banner })
}

// Browsers building FormData by hand sometimes post `program_images[]`.
fn normalize_field_name(name: &str) -> String {
    name.trim_end_matches("[]").to_string()
}

fn timeline_index(name: &str) -> Option<usize> {
    name.strip_prefix(TIMELINE_FIELD_PREFIX)?.parse().ok()
}

async fn read_file(field: Field<'_>, max_file_bytes: usize) -> Result<UploadedFile, AppError> {
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field.content_type().map(str::to_owned);

    if let Some(kind) = &content_type {
        if !kind.starts_with("image/") {
            return Err(AppError::UnsupportedMediaType(format!(
                "{file_name}: only image uploads are accepted"
            )));
        }
    }

    let bytes = field.bytes().await?;
    if bytes.len() > max_file_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "{file_name} exceeds the {max_file_bytes} byte upload limit"
        )));
    }

    Ok(UploadedFile {
        file_name,
        content_type,
        bytes,
    })
}
