use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Moods offered by the check-in form.
pub const MOODS: &[&str] = &["Great", "Good", "Neutral", "Low", "Struggling"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CheckIn {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mood: String,
    pub craving_level: i16,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCheckinRequest {
    #[validate(length(min = 1))]
    pub mood: String,
    #[validate(range(min = 0, max = 10))]
    pub craving_level: i16,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

/// One point of the craving trend chart, oldest first.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub level: i16,
}

#[derive(Debug, Serialize)]
pub struct CheckinSummary {
    pub latest_mood: Option<String>,
    pub streak_days: u32,
    pub craving_trend: Vec<TrendPoint>,
}
