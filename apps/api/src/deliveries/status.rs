use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Offer lifecycle tag on a delivery record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    #[default]
    None,
    Approved,
    OnHold,
    Cancelled,
}

/// Names used by older records, accepted on input and never emitted.
const LEGACY_SYNONYMS: [(&str, OfferStatus); 3] = [
    ("offered", OfferStatus::None),
    ("applied", OfferStatus::Approved),
    ("declined", OfferStatus::Cancelled),
];

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::None => "none",
            OfferStatus::Approved => "approved",
            OfferStatus::OnHold => "on_hold",
            OfferStatus::Cancelled => "cancelled",
        }
    }

    /// Export label.
    pub fn label(&self) -> &'static str {
        match self {
            OfferStatus::None => "未処理",
            OfferStatus::Approved => "承認",
            OfferStatus::OnHold => "保留",
            OfferStatus::Cancelled => "取消",
        }
    }

    /// Lenient read of a stored column; unknown values read as `None`.
    pub fn from_column(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(OfferStatus::None),
            "approved" => Ok(OfferStatus::Approved),
            "on_hold" => Ok(OfferStatus::OnHold),
            "cancelled" => Ok(OfferStatus::Cancelled),
            other => LEGACY_SYNONYMS
                .iter()
                .find(|(name, _)| *name == other)
                .map(|(_, status)| *status)
                .ok_or_else(|| {
                    "status must be one of none, approved, on_hold, cancelled".to_string()
                }),
        }
    }
}

/// The three mutually exclusive status timestamp columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusTimestamps {
    pub approved_at: Option<DateTime<Utc>>,
    pub on_hold_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl StatusTimestamps {
    /// At most one column set: the one matching `status`. `None` clears all.
    pub fn for_status(status: OfferStatus, at: DateTime<Utc>) -> Self {
        let mut ts = Self::default();
        match status {
            OfferStatus::None => {}
            OfferStatus::Approved => ts.approved_at = Some(at),
            OfferStatus::OnHold => ts.on_hold_at = Some(at),
            OfferStatus::Cancelled => ts.cancelled_at = Some(at),
        }
        ts
    }

    /// Timestamp belonging to `status`, if any.
    pub fn date_for(&self, status: OfferStatus) -> Option<DateTime<Utc>> {
        match status {
            OfferStatus::None => None,
            OfferStatus::Approved => self.approved_at,
            OfferStatus::OnHold => self.on_hold_at,
            OfferStatus::Cancelled => self.cancelled_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_and_legacy_parse() {
        assert_eq!("on_hold".parse::<OfferStatus>().unwrap(), OfferStatus::OnHold);
        assert_eq!("offered".parse::<OfferStatus>().unwrap(), OfferStatus::None);
        assert_eq!("applied".parse::<OfferStatus>().unwrap(), OfferStatus::Approved);
        assert_eq!("declined".parse::<OfferStatus>().unwrap(), OfferStatus::Cancelled);
        assert!("rejected".parse::<OfferStatus>().is_err());
    }

    #[test]
    fn test_legacy_names_never_emitted() {
        let parsed: OfferStatus = "applied".parse().unwrap();
        assert_eq!(parsed.as_str(), "approved");
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"approved\"");
    }

    #[test]
    fn test_timestamps_are_exclusive() {
        let now = Utc::now();
        for status in [
            OfferStatus::Approved,
            OfferStatus::OnHold,
            OfferStatus::Cancelled,
        ] {
            let ts = StatusTimestamps::for_status(status, now);
            let set = [ts.approved_at, ts.on_hold_at, ts.cancelled_at]
                .iter()
                .filter(|t| t.is_some())
                .count();
            assert_eq!(set, 1);
            assert_eq!(ts.date_for(status), Some(now));
        }
        assert_eq!(
            StatusTimestamps::for_status(OfferStatus::None, now),
            StatusTimestamps::default()
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(OfferStatus::None.label(), "未処理");
        assert_eq!(OfferStatus::Cancelled.label(), "取消");
        assert_eq!(OfferStatus::from_column("garbage"), OfferStatus::None);
    }
}
