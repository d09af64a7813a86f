use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString};

use crate::error::AppError;
use crate::models::required_text;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub title: String,
    pub meta: Option<String>,
    pub description: String,
    pub images: Vec<String>,
    pub origin: String,
    pub destination: String,
    pub days: i64,
    pub base_price: f64,
    pub single_supplement: Option<f64>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub display: bool,
    pub price_includes: String,
    pub conditions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub timeline: Vec<TimelineEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub id: String,
    pub trip_id: String,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub entry_date: NaiveDate,
    pub sort_order: i64,
}

/// The JSON half of an admin submission, as sent in the `programData`
/// multipart field. Everything is optional at this level; `validate`
/// decides what is actually required so missing fields surface as
/// field-level validation errors instead of deserialization failures.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub meta: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub days: Option<i64>,
    #[serde(default)]
    pub base_price: Option<f64>,
    #[serde(default)]
    pub single_supplement: Option<f64>,
    #[serde(default)]
    pub from_date: Option<String>,
    // Admin forms post an empty string when the field is left blank.
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub to_date: Option<String>,
    #[serde(default = "display_default")]
    pub display: bool,
    #[serde(default)]
    pub price_includes: String,
    #[serde(default)]
    pub conditions: String,
    #[serde(default)]
    pub kept_images: Option<Vec<String>>,
    #[serde(default)]
    pub timeline: Vec<TimelineDayPayload>,
}

fn display_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineDayPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// A validated program ready to persist. Timeline images may still be
/// rewritten by the reconciliation step before the write happens.
#[derive(Debug, Clone)]
pub struct NewProgram {
    pub title: String,
    pub meta: Option<String>,
    pub description: String,
    pub origin: String,
    pub destination: String,
    pub days: i64,
    pub base_price: f64,
    pub single_supplement: Option<f64>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub display: bool,
    pub price_includes: String,
    pub conditions: String,
    pub timeline: Vec<NewTimelineDay>,
}

#[derive(Debug, Clone)]
pub struct NewTimelineDay {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
}

impl ProgramPayload {
    pub fn validate(&self) -> Result<NewProgram, AppError> {
        let title = required_text(self.title.as_deref(), "title")?;
        let description = required_text(self.description.as_deref(), "description")?;
        let origin = required_text(self.origin.as_deref(), "origin")?;
        let destination = required_text(self.destination.as_deref(), "destination")?;

        let days = match self.days {
            Some(days) if days >= 1 => days,
            Some(_) => {
                return Err(AppError::Validation("days must be at least 1".into()));
            }
            None => {
                return Err(AppError::Validation("missing required field: days".into()));
            }
        };

        let from_raw = required_text(self.from_date.as_deref(), "fromDate")?;
        let from_date = parse_date(&from_raw)?;

        let to_date = match self.to_date.as_deref() {
            Some(raw) => {
                let parsed = parse_date(raw.trim())?;
                if parsed < from_date {
                    return Err(AppError::Validation(
                        "toDate must be on or after fromDate".into(),
                    ));
                }
                parsed
            }
            None => derive_to_date(from_date, days)?,
        };

        let timeline = self
            .timeline
            .iter()
            .enumerate()
            .map(|(idx, day)| {
                let title = required_text(day.title.as_deref(), &format!("timeline[{idx}].title"))?;
                Ok(NewTimelineDay {
                    title,
                    description: day.description.clone(),
                    image: day.image.clone(),
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(NewProgram {
            title,
            meta: self.meta.clone(),
            description,
            origin,
            destination,
            days,
            base_price: self.base_price.unwrap_or(0.0),
            single_supplement: self.single_supplement,
            from_date,
            to_date,
            display: self.display,
            price_includes: self.price_includes.clone(),
            conditions: self.conditions.clone(),
            timeline,
        })
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| AppError::Validation("invalid date format".into()))
}

// The end date mirrors what the booking office has always published:
// start date plus the advertised number of days, no inclusive adjustment.
pub fn derive_to_date(from_date: NaiveDate, days: i64) -> Result<NaiveDate, AppError> {
    from_date
        .checked_add_days(Days::new(days as u64))
        .ok_or_else(|| AppError::Validation("date range out of calendar bounds".into()))
}
