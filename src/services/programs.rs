//! Reconciles an admin submission — payload, gallery files, timeline files —
//! into a persisted trip with externally stored images. Uploads run before
//! the database write; a failed write deletes everything uploaded for the
//! submission, and a successful update sweeps out storage objects the new
//! version no longer references.

use std::collections::{HashMap, HashSet};

use tokio::task::JoinSet;
use tracing::debug;

use crate::{
    error::AppError,
    models::trip::{NewProgram, Trip},
    services::media::{self, MediaStore},
    state::AppState,
    submission::{ProgramSubmission, UploadedFile},
};

pub async fn create_program(
    state: &AppState,
    submission: ProgramSubmission,
) -> Result<Trip, AppError> {
    let ProgramSubmission {
        payload,
        gallery,
        timeline_images,
    } = submission;

    let mut program = payload.validate()?;
    check_timeline_indices(&timeline_images, program.timeline.len())?;

    let uploads = upload_submission_files(&state.media, gallery, timeline_images).await?;
    apply_timeline_images(&mut program, &uploads.timeline);

    match state.trips.create(&program, &uploads.gallery).await {
        Ok(trip) => Ok(trip),
        Err(err) => {
            discard_uploads(&state.media, &uploads).await;
            Err(err)
        }
    }
}

pub async fn update_program(
    state: &AppState,
    id: &str,
    submission: ProgramSubmission,
) -> Result<Trip, AppError> {
    let ProgramSubmission {
        payload,
        gallery,
        timeline_images,
    } = submission;

    let mut program = payload.validate()?;
    check_timeline_indices(&timeline_images, program.timeline.len())?;

    let existing = state.trips.get(id).await?.ok_or(AppError::NotFound)?;

    let uploads = upload_submission_files(&state.media, gallery, timeline_images).await?;
    apply_timeline_images(&mut program, &uploads.timeline);

    // Gallery contract: an explicit kept list merges (kept first, new
    // uploads appended); uploads without a kept list replace the whole
    // gallery; neither leaves it untouched.
    let images: Vec<String> = match payload.kept_images {
        Some(kept) => kept.into_iter().chain(uploads.gallery.clone()).collect(),
        None if !uploads.gallery.is_empty() => uploads.gallery.clone(),
        None => existing.images.clone(),
    };

    let updated = match state.trips.update(id, &program, &images).await {
        Ok(trip) => trip,
        Err(err) => {
            discard_uploads(&state.media, &uploads).await;
            return Err(err);
        }
    };

    // Orphan sweep happens off the request path; the response never waits
    // on it and a failed delete only leaks an unreferenced object.
    let old_urls = collect_image_urls(&existing);
    let current: HashSet<String> = collect_image_urls(&updated).into_iter().collect();
    let sweeper = state.media.clone();
    tokio::spawn(async move {
        for url in old_urls {
            if !current.contains(&url) {
                sweeper.remove(&url).await;
            }
        }
    });

    Ok(updated)
}

pub async fn delete_program(state: &AppState, id: &str) -> Result<(), AppError> {
    let trip = state.trips.get(id).await?.ok_or(AppError::NotFound)?;

    for url in collect_image_urls(&trip) {
        state.media.remove(&url).await;
    }

    // Banners pointing at this trip disappear with the cascade; their
    // stored objects have to go explicitly.
    let banner_urls: Vec<String> =
        sqlx::query_scalar("SELECT image FROM featured WHERE trip_id = ?1")
            .bind(id)
            .fetch_all(&state.db)
            .await?;
    for url in banner_urls {
        state.media.remove(&url).await;
    }

    if !state.trips.delete(id).await? {
        return Err(AppError::NotFound);
    }
    debug!("deleted trip {id}");
    Ok(())
}

struct SubmissionUploads {
    gallery: Vec<String>,
    timeline: HashMap<usize, String>,
}

enum Slot {
    Gallery(usize),
    Timeline(usize),
}

/// All files of a submission upload concurrently; submission order is
/// restored afterwards from the slot tags. If any upload fails, the ones
/// that finished are deleted and the first error wins.
async fn upload_submission_files(
    media: &MediaStore,
    gallery: Vec<UploadedFile>,
    timeline_images: Vec<(usize, UploadedFile)>,
) -> Result<SubmissionUploads, AppError> {
    let mut tasks = JoinSet::new();
    for (position, file) in gallery.into_iter().enumerate() {
        let media = media.clone();
        tasks.spawn(async move {
            (
                Slot::Gallery(position),
                media.store(&file, media::PROGRAM_IMAGES).await,
            )
        });
    }
    for (day, file) in timeline_images {
        let media = media.clone();
        tasks.spawn(async move {
            (
                Slot::Timeline(day),
                media.store(&file, media::TIMELINE_IMAGES).await,
            )
        });
    }

    let mut gallery_urls: Vec<(usize, String)> = Vec::new();
    let mut timeline_urls = HashMap::new();
    let mut failure: Option<AppError> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((Slot::Gallery(position), Ok(url))) => gallery_urls.push((position, url)),
            Ok((Slot::Timeline(day), Ok(url))) => {
                timeline_urls.insert(day, url);
            }
            Ok((_, Err(err))) => failure = Some(err),
            Err(err) => failure = Some(AppError::Other(err.into())),
        }
    }

    gallery_urls.sort_by_key(|(position, _)| *position);
    let uploads = SubmissionUploads {
        gallery: gallery_urls.into_iter().map(|(_, url)| url).collect(),
        timeline: timeline_urls,
    };

    if let Some(err) = failure {
        discard_uploads(media, &uploads).await;
        return Err(err);
    }
    Ok(uploads)
}

async fn discard_uploads(media: &MediaStore, uploads: &SubmissionUploads) {
    for url in uploads.gallery.iter().chain(uploads.timeline.values()) {
        media.remove(url).await;
    }
}

fn apply_timeline_images(program: &mut NewProgram, uploaded: &HashMap<usize, String>) {
    for (idx, day) in program.timeline.iter_mut().enumerate() {
        if let Some(url) = uploaded.get(&idx) {
            day.image = Some(url.clone());
        }
    }
}

fn check_timeline_indices(
    timeline_images: &[(usize, UploadedFile)],
    day_count: usize,
) -> Result<(), AppError> {
    for (day, _) in timeline_images {
        if *day >= day_count {
            return Err(AppError::Validation(format!(
                "timeline image index {day} has no matching timeline entry"
            )));
        }
    }
    Ok(())
}

fn collect_image_urls(trip: &Trip) -> Vec<String> {
    trip.images
        .iter()
        .cloned()
        .chain(trip.timeline.iter().filter_map(|entry| entry.image.clone()))
        .collect()
}
