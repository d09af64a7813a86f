use chrono::{Days, Utc};
use sqlx::{sqlite::SqliteRow, Row, Sqlite, Transaction};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::trip::{NewProgram, TimelineEntry, Trip},
};

/// Persistence boundary for trips and their timelines. Timeline rows are
/// never patched in place: every write replaces the full set for the trip,
/// with `sort_order` equal to the 1-based position in the submitted array.
#[derive(Clone)]
pub struct TripStore {
    db: DbPool,
}

impl TripStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, program: &NewProgram, images: &[String]) -> Result<Trip, AppError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"INSERT INTO trips
                (id, title, meta, description, images, origin, destination, days,
                 base_price, single_supplement, from_date, to_date, display,
                 price_includes, conditions, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"#,
        )
        .bind(&id)
        .bind(&program.title)
        .bind(&program.meta)
        .bind(&program.description)
        .bind(encode_images(images)?)
        .bind(&program.origin)
        .bind(&program.destination)
        .bind(program.days)
        .bind(program.base_price)
        .bind(program.single_supplement)
        .bind(program.from_date)
        .bind(program.to_date)
        .bind(program.display)
        .bind(&program.price_includes)
        .bind(&program.conditions)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        insert_timeline(&mut tx, &id, program).await?;
        tx.commit().await?;

        self.get(&id).await?.ok_or(AppError::NotFound)
    }

    pub async fn update(
        &self,
        id: &str,
        program: &NewProgram,
        images: &[String],
    ) -> Result<Trip, AppError> {
        let now = Utc::now();

        let mut tx = self.db.begin().await?;
        let result = sqlx::query(
            r#"UPDATE trips SET
                title = ?1, meta = ?2, description = ?3, images = ?4, origin = ?5,
                destination = ?6, days = ?7, base_price = ?8, single_supplement = ?9,
                from_date = ?10, to_date = ?11, display = ?12, price_includes = ?13,
                conditions = ?14, updated_at = ?15
               WHERE id = ?16"#,
        )
        .bind(&program.title)
        .bind(&program.meta)
        .bind(&program.description)
        .bind(encode_images(images)?)
        .bind(&program.origin)
        .bind(&program.destination)
        .bind(program.days)
        .bind(program.base_price)
        .bind(program.single_supplement)
        .bind(program.from_date)
        .bind(program.to_date)
        .bind(program.display)
        .bind(&program.price_includes)
        .bind(&program.conditions)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        sqlx::query("DELETE FROM timeline_entries WHERE trip_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_timeline(&mut tx, id, program).await?;
        tx.commit().await?;

        self.get(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM trips WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Trip>, AppError> {
        let row = sqlx::query("SELECT * FROM trips WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut trip = trip_from_row(&row)?;
        trip.timeline = self.timeline_for(id).await?;
        Ok(Some(trip))
    }

    pub async fn list(&self, include_hidden: bool) -> Result<Vec<Trip>, AppError> {
        let query = if include_hidden {
            "SELECT * FROM trips ORDER BY created_at DESC"
        } else {
            "SELECT * FROM trips WHERE display = 1 ORDER BY created_at DESC"
        };
        let rows = sqlx::query(query).fetch_all(&self.db).await?;

        let mut trips = Vec::with_capacity(rows.len());
        for row in rows {
            let mut trip = trip_from_row(&row)?;
            trip.timeline = self.timeline_for(&trip.id).await?;
            trips.push(trip);
        }
        Ok(trips)
    }

    async fn timeline_for(&self, trip_id: &str) -> Result<Vec<TimelineEntry>, AppError> {
        let rows = sqlx::query(
            "SELECT * FROM timeline_entries WHERE trip_id = ?1 ORDER BY sort_order ASC",
        )
        .bind(trip_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(TimelineEntry {
                    id: row.try_get("id")?,
                    trip_id: row.try_get("trip_id")?,
                    title: row.try_get("title")?,
                    description: row.try_get("description")?,
                    image: row.try_get("image")?,
                    entry_date: row.try_get("entry_date")?,
                    sort_order: row.try_get("sort_order")?,
                })
            })
            .collect()
    }
}

async fn insert_timeline(
    tx: &mut Transaction<'_, Sqlite>,
    trip_id: &str,
    program: &NewProgram,
) -> Result<(), AppError> {
    for (idx, day) in program.timeline.iter().enumerate() {
        let entry_date = program
            .from_date
            .checked_add_days(Days::new(idx as u64))
            .ok_or_else(|| AppError::Validation("timeline day out of calendar bounds".into()))?;
        sqlx::query(
            r#"INSERT INTO timeline_entries
                (id, trip_id, title, description, image, entry_date, sort_order)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(trip_id)
        .bind(&day.title)
        .bind(&day.description)
        .bind(&day.image)
        .bind(entry_date)
        .bind((idx + 1) as i64)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn encode_images(images: &[String]) -> Result<String, AppError> {
    serde_json::to_string(images).map_err(|err| AppError::Other(err.into()))
}

fn trip_from_row(row: &SqliteRow) -> Result<Trip, AppError> {
    let raw_images: String = row.try_get("images")?;
    let images = serde_json::from_str(&raw_images)
        .map_err(|err| AppError::Other(anyhow::anyhow!("corrupt images column: {err}")))?;

    Ok(Trip {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        meta: row.try_get("meta")?,
        description: row.try_get("description")?,
        images,
        origin: row.try_get("origin")?,
        destination: row.try_get("destination")?,
        days: row.try_get("days")?,
        base_price: row.try_get("base_price")?,
        single_supplement: row.try_get("single_supplement")?,
        from_date: row.try_get("from_date")?,
        to_date: row.try_get("to_date")?,
        display: row.try_get("display")?,
        price_includes: row.try_get("price_includes")?,
        conditions: row.try_get("conditions")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        timeline: Vec::new(),
    })
}
