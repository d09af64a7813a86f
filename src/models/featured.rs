use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;
use crate::models::required_text;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Featured {
    pub id: String,
    pub trip_id: String,
    pub image: String,
    pub cta_label: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedPayload {
    #[serde(default)]
    pub trip_id: Option<String>,
    #[serde(default)]
    pub cta_label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewFeatured {
    pub trip_id: String,
    pub cta_label: String,
}

impl FeaturedPayload {
    pub fn validate(&self) -> Result<NewFeatured, AppError> {
        let trip_id = required_text(self.trip_id.as_deref(), "tripId")?;
        let cta_label = required_text(self.cta_label.as_deref(), "ctaLabel")?;
        Ok(NewFeatured { trip_id, cta_label })
    }
}
