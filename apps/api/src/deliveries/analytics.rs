use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::deliveries::jst::parse_date;
use crate::deliveries::repository::{self, AnalyticsRow};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsParams {
    #[serde(default, alias = "sendDateFrom")]
    pub send_date_from: Option<String>,
    #[serde(default, alias = "sendDateTo")]
    pub send_date_to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub rows: Vec<AnalyticsRow>,
}

fn required_date(value: &Option<String>, name: &str) -> Result<NaiveDate, AppError> {
    let raw = value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))?;
    parse_date(raw).ok_or_else(|| {
        AppError::Validation(format!("{name} must be a YYYY-MM-DD date (got '{raw}')"))
    })
}

impl AnalyticsParams {
    /// Both bounds are mandatory and inclusive.
    pub fn date_range(&self) -> Result<(NaiveDate, NaiveDate), AppError> {
        let from = required_date(&self.send_date_from, "send_date_from")?;
        let to = required_date(&self.send_date_to, "send_date_to")?;
        if from > to {
            return Err(AppError::Validation(
                "send_date_from must not be after send_date_to".to_string(),
            ));
        }
        Ok((from, to))
    }
}

/// GET /api/v1/analytics/deliveries
///
/// Delivery counts grouped by send date, time slot and template.
pub async fn handle_delivery_analytics(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<AnalyticsResponse>, AppError> {
    let (from, to) = params.date_range()?;
    let rows = repository::analytics_counts(&state.db, from, to).await?;
    Ok(Json(AnalyticsResponse { rows }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(from: Option<&str>, to: Option<&str>) -> AnalyticsParams {
        AnalyticsParams {
            send_date_from: from.map(str::to_string),
            send_date_to: to.map(str::to_string),
        }
    }

    #[test]
    fn test_both_dates_required() {
        assert!(matches!(
            params(None, Some("2026-02-28")).date_range(),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            params(Some("2026-02-01"), Some(" ")).date_range(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_range_parses_and_orders() {
        let (from, to) = params(Some("2026-02-01"), Some("2026-02-28"))
            .date_range()
            .unwrap();
        assert_eq!(from.to_string(), "2026-02-01");
        assert_eq!(to.to_string(), "2026-02-28");
        assert!(params(Some("2026-03-01"), Some("2026-02-01")).date_range().is_err());
        assert!(params(Some("20260201"), Some("2026-02-28")).date_range().is_err());
    }

    #[test]
    fn test_row_serialization() {
        let row = AnalyticsRow {
            send_date: NaiveDate::from_ymd_opt(2026, 2, 24).unwrap(),
            time_slot: "12-17".to_string(),
            template_type: "A".to_string(),
            count: 3,
        };
        let json = serde_json::to_value(AnalyticsResponse { rows: vec![row] }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"rows": [{
                "send_date": "2026-02-24", "time_slot": "12-17", "template_type": "A", "count": 3
            }]})
        );
    }
}
