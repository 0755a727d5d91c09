use crate::error::{AppError, Result};
use crate::models::checkin::MOODS;
use crate::models::{CheckIn, CheckinSummary, CreateCheckinRequest, TrendPoint};
use chrono::{Duration, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// How far back the history and trend views look.
const HISTORY_LIMIT: i64 = 30;

pub struct CheckinService {
    db: PgPool,
}

impl CheckinService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, user_id: Uuid, req: CreateCheckinRequest) -> Result<CheckIn> {
        if !MOODS.contains(&req.mood.as_str()) {
            return Err(AppError::Validation(format!("Unknown mood: {}", req.mood)));
        }

        let checkin = sqlx::query_as::<_, CheckIn>(
            r#"
            INSERT INTO daily_checkins (user_id, mood, craving_level, note)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&req.mood)
        .bind(req.craving_level)
        .bind(&req.note)
        .fetch_one(&self.db)
        .await?;

        tracing::info!("Check-in recorded for user {}", user_id);

        Ok(checkin)
    }

    pub async fn history(&self, user_id: Uuid) -> Result<Vec<CheckIn>> {
        let checkins = sqlx::query_as::<_, CheckIn>(
            r#"
            SELECT * FROM daily_checkins
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(HISTORY_LIMIT)
        .fetch_all(&self.db)
        .await?;

        Ok(checkins)
    }

    pub async fn summary(&self, user_id: Uuid) -> Result<CheckinSummary> {
        let checkins = self.history(user_id).await?;

        let latest_mood = checkins.first().map(|c| c.mood.clone());

        // Chart runs oldest to newest.
        let craving_trend = checkins
            .iter()
            .rev()
            .map(|c| TrendPoint {
                date: c.created_at.date_naive(),
                level: c.craving_level,
            })
            .collect();

        let dates: Vec<NaiveDate> = checkins.iter().map(|c| c.created_at.date_naive()).collect();
        let streak_days = streak_days(&dates, Utc::now().date_naive());

        Ok(CheckinSummary {
            latest_mood,
            streak_days,
            craving_trend,
        })
    }
}

/// Consecutive check-in days counted backwards from `today`. `dates` is
/// newest-first and may contain several entries for the same day.
fn streak_days(dates: &[NaiveDate], today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut expected = today;

    for &date in dates {
        if date == expected {
            streak += 1;
            expected = expected - Duration::days(1);
        } else if date < expected {
            break;
        }
        // date == expected + 1 day means another check-in on an already
        // counted day; skip it.
    }

    streak
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn empty_history_has_no_streak() {
        assert_eq!(streak_days(&[], d("2026-08-07")), 0);
    }

    #[test]
    fn consecutive_days_count_back_from_today() {
        let dates = [d("2026-08-07"), d("2026-08-06"), d("2026-08-05")];
        assert_eq!(streak_days(&dates, d("2026-08-07")), 3);
    }

    #[test]
    fn a_gap_stops_the_count() {
        let dates = [d("2026-08-07"), d("2026-08-06"), d("2026-08-04")];
        assert_eq!(streak_days(&dates, d("2026-08-07")), 2);
    }

    #[test]
    fn missing_today_means_zero() {
        let dates = [d("2026-08-05"), d("2026-08-04")];
        assert_eq!(streak_days(&dates, d("2026-08-07")), 0);
    }

    #[test]
    fn duplicate_same_day_entries_count_once() {
        let dates = [
            d("2026-08-07"),
            d("2026-08-07"),
            d("2026-08-06"),
        ];
        assert_eq!(streak_days(&dates, d("2026-08-07")), 2);
    }
}
