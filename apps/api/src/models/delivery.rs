use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::deliveries::jst::{send_date, TimeSlot};
use crate::deliveries::status::{OfferStatus, StatusTimestamps};
use crate::extraction::fields::{extract_fields, Gender};
use crate::extraction::Pattern;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeliveryRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub sent_at: DateTime<Utc>,
    pub send_date: NaiveDate,
    pub time_slot: String,
    pub template_type: String,
    pub final_message: String,
    pub source_text: Option<String>,
    pub student_id7: Option<String>,
    pub university_name: Option<String>,
    pub gender: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub offer_status: String,
    pub approved_at: Option<DateTime<Utc>>,
    pub on_hold_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Serialized `DeliveryNotes`.
    pub notes: Option<String>,
}

impl DeliveryRow {
    pub fn status(&self) -> OfferStatus {
        OfferStatus::from_column(&self.offer_status)
    }

    pub fn status_timestamps(&self) -> StatusTimestamps {
        StatusTimestamps {
            approved_at: self.approved_at,
            on_hold_at: self.on_hold_at,
            cancelled_at: self.cancelled_at,
        }
    }

    /// Date of the current status; `None` for unprocessed records.
    pub fn status_date(&self) -> Option<DateTime<Utc>> {
        self.status_timestamps().date_for(self.status())
    }

    pub fn parsed_notes(&self) -> DeliveryNotes {
        DeliveryNotes::from_column(self.notes.as_deref())
    }
}

/// Supplementary fields kept in the `notes` column as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryNotes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faculty_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graduation_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl DeliveryNotes {
    /// Free text that is not a JSON object is kept as the memo.
    pub fn from_column(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|r| !r.is_empty()) {
            None => Self::default(),
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|_| Self {
                memo: Some(raw.to_string()),
                ..Self::default()
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// `None` when every field is empty, so the column stays NULL.
    pub fn to_column(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        serde_json::to_string(self).ok()
    }
}

/// A record ready for INSERT.
#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub sent_at: DateTime<Utc>,
    pub send_date: NaiveDate,
    pub time_slot: TimeSlot,
    pub template_type: Pattern,
    pub final_message: String,
    pub source_text: Option<String>,
    pub student_id7: Option<String>,
    pub university_name: Option<String>,
    pub gender: Option<Gender>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub offer_status: OfferStatus,
    pub status_timestamps: StatusTimestamps,
    pub notes: DeliveryNotes,
}

impl NewDelivery {
    /// Buckets `sent_at` in JST and fills every extractable field from
    /// `source_text`. Callers override with explicitly provided values.
    pub fn new(
        sent_at: DateTime<Utc>,
        template_type: Pattern,
        final_message: String,
        source_text: Option<String>,
    ) -> Self {
        let source_text = source_text.filter(|s| !s.trim().is_empty());
        let fields = source_text.as_deref().map(extract_fields).unwrap_or_default();

        Self {
            sent_at,
            send_date: send_date(sent_at),
            time_slot: TimeSlot::from_instant(sent_at),
            template_type,
            final_message,
            student_id7: fields.student_id7,
            university_name: fields.university_name,
            gender: Some(fields.gender).filter(|g| *g != Gender::Unknown),
            last_login_at: fields.last_login_at,
            offer_status: OfferStatus::None,
            status_timestamps: StatusTimestamps::default(),
            notes: DeliveryNotes {
                faculty_name: fields.faculty_name,
                department_name: fields.department_name,
                prefecture: fields.prefecture,
                graduation_year: fields.graduation_year,
                major: None,
                memo: None,
            },
            source_text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "ID: 1234567\n最終ログイン: 2026/02/24 15:30\n大学名：早稲田大学\n学部：政治経済学部\n性別：女性";

    fn sent_at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-24T06:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_new_delivery_fills_from_source_text() {
        let d = NewDelivery::new(sent_at(), Pattern::A, "本文".to_string(), Some(SOURCE.to_string()));
        assert_eq!(d.student_id7.as_deref(), Some("1234567"));
        assert_eq!(d.university_name.as_deref(), Some("早稲田大学"));
        assert_eq!(d.gender, Some(Gender::Female));
        assert_eq!(d.notes.faculty_name.as_deref(), Some("政治経済学部"));
        assert_eq!(
            d.last_login_at,
            Some(
                DateTime::parse_from_rfc3339("2026-02-24T15:30:00+09:00")
                    .unwrap()
                    .with_timezone(&Utc)
            )
        );
        assert_eq!(d.send_date.to_string(), "2026-02-24");
        assert_eq!(d.time_slot, TimeSlot::Afternoon);
        assert_eq!(d.offer_status, OfferStatus::None);
    }

    #[test]
    fn test_new_delivery_without_source() {
        let d = NewDelivery::new(sent_at(), Pattern::B, "本文".to_string(), Some("  ".to_string()));
        assert!(d.source_text.is_none());
        assert!(d.student_id7.is_none());
        assert!(d.gender.is_none());
        assert!(d.notes.is_empty());
    }

    #[test]
    fn test_notes_column_round_trip_and_free_text() {
        let notes = DeliveryNotes {
            major: Some("マーケティング".to_string()),
            ..DeliveryNotes::default()
        };
        let column = notes.to_column().unwrap();
        assert_eq!(column, r#"{"major":"マーケティング"}"#);
        assert_eq!(DeliveryNotes::from_column(Some(&column)), notes);

        let legacy = DeliveryNotes::from_column(Some("電話済み"));
        assert_eq!(legacy.memo.as_deref(), Some("電話済み"));
        assert_eq!(DeliveryNotes::default().to_column(), None);
    }
}
