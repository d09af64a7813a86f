use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::featured::Featured,
    services::media,
    state::AppState,
    submission::FeaturedSubmission,
};

pub async fn list_banners(state: &AppState) -> Result<Vec<Featured>, AppError> {
    let banners = sqlx::query_as::<_, Featured>(
        "SELECT id, trip_id, image, cta_label, created_at FROM featured ORDER BY created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(banners)
}

pub async fn create_banner(
    state: &AppState,
    submission: FeaturedSubmission,
) -> Result<Featured, AppError> {
    let banner = submission.payload.validate()?;
    let file = submission
        .banner
        .ok_or_else(|| AppError::Validation("missing banner_image file".into()))?;
    ensure_trip_exists(state, &banner.trip_id).await?;

    let image = state.media.store(&file, media::BANNERS).await?;
    let id = Uuid::new_v4().to_string();
    let created_at = Utc::now();

    let inserted = sqlx::query(
        "INSERT INTO featured (id, trip_id, image, cta_label, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&id)
    .bind(&banner.trip_id)
    .bind(&image)
    .bind(&banner.cta_label)
    .bind(created_at)
    .execute(&state.db)
    .await;

    if let Err(err) = inserted {
        state.media.remove(&image).await;
        return Err(err.into());
    }

    Ok(Featured {
        id,
        trip_id: banner.trip_id,
        image,
        cta_label: banner.cta_label,
        created_at,
    })
}

pub async fn update_banner(
    state: &AppState,
    id: &str,
    submission: FeaturedSubmission,
) -> Result<Featured, AppError> {
    let banner = submission.payload.validate()?;
    let existing = get_banner(state, id).await?.ok_or(AppError::NotFound)?;
    ensure_trip_exists(state, &banner.trip_id).await?;

    let new_image = match &submission.banner {
        Some(file) => Some(state.media.store(file, media::BANNERS).await?),
        None => None,
    };
    let image = new_image.clone().unwrap_or_else(|| existing.image.clone());

    let updated = sqlx::query(
        "UPDATE featured SET trip_id = ?1, image = ?2, cta_label = ?3 WHERE id = ?4",
    )
    .bind(&banner.trip_id)
    .bind(&image)
    .bind(&banner.cta_label)
    .bind(id)
    .execute(&state.db)
    .await;

    if let Err(err) = updated {
        if let Some(url) = new_image {
            state.media.remove(&url).await;
        }
        return Err(err.into());
    }

    if new_image.is_some() {
        state.media.remove(&existing.image).await;
    }

    Ok(Featured {
        id: id.to_string(),
        trip_id: banner.trip_id,
        image,
        cta_label: banner.cta_label,
        created_at: existing.created_at,
    })
}

pub async fn delete_banner(state: &AppState, id: &str) -> Result<(), AppError> {
    let existing = get_banner(state, id).await?.ok_or(AppError::NotFound)?;
    state.media.remove(&existing.image).await;
    sqlx::query("DELETE FROM featured WHERE id = ?1")
        .bind(id)
        .execute(&state.db)
        .await?;
    Ok(())
}

pub async fn get_banner(state: &AppState, id: &str) -> Result<Option<Featured>, AppError> {
    let banner = sqlx::query_as::<_, Featured>(
        "SELECT id, trip_id, image, cta_label, created_at FROM featured WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?;
    Ok(banner)
}

async fn ensure_trip_exists(state: &AppState, trip_id: &str) -> Result<(), AppError> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM trips WHERE id = ?1")
        .bind(trip_id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(AppError::Validation("referenced trip does not exist".into()));
    }
    Ok(())
}
