//! Bulk import of legacy delivery history into a staging database.
//!
//! Records are validated one by one. A bad record is counted as skipped with
//! a `Record {index}: ...` message and never aborts the batch.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::deliveries::jst::parse_instant;
use crate::deliveries::repository;
use crate::extraction::Pattern;
use crate::models::delivery::{DeliveryNotes, NewDelivery};

/// Messages returned to the caller; the rest are only counted.
pub const MAX_REPORTED_ERRORS: usize = 10;

const DEDUPE_PREFIX_CHARS: usize = 200;

/// One history record as exported by older tooling.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    #[serde(default)]
    pub sent_at: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub template_type: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub final_message: Option<String>,
    #[serde(default)]
    pub generated_message: Option<String>,
    #[serde(default)]
    pub source_text: Option<String>,
    #[serde(default)]
    pub paste_text: Option<String>,
    #[serde(default)]
    pub student_id7: Option<String>,
    #[serde(default)]
    pub last_login_at: Option<String>,
    #[serde(default)]
    pub offer_status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub success: bool,
    pub inserted: usize,
    pub skipped: usize,
    pub total: usize,
    pub errors: Vec<String>,
}

/// `sent_at` (RFC 3339, millisecond precision, `Z`) joined with the first
/// 16 hex digits of the MD5 of the message's first 200 characters.
pub fn dedupe_key(sent_at: DateTime<Utc>, final_message: &str) -> String {
    let prefix: String = final_message.chars().take(DEDUPE_PREFIX_CHARS).collect();
    let mut hasher = Md5::new();
    hasher.update(prefix.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!(
        "{}-{}",
        sent_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        &digest[..16]
    )
}

fn first_present<'a>(candidates: &[&'a Option<String>]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .map(str::trim)
        .find(|c| !c.is_empty())
}

/// Validates one record and resolves its aliases.
/// Priority: `sentAt` > `timestamp` > `createdAt`, `templateType` > `pattern`,
/// `finalMessage` > `generatedMessage`, `sourceText` > `pasteText`.
pub fn prepare_record(record: &ImportRecord) -> Result<NewDelivery, String> {
    let sent_at_raw = first_present(&[&record.sent_at, &record.timestamp, &record.created_at])
        .ok_or_else(|| "missing sent_at".to_string())?;
    let sent_at = parse_instant(sent_at_raw, false)
        .ok_or_else(|| format!("invalid sent_at '{sent_at_raw}'"))?;

    let template_type: Pattern = first_present(&[&record.template_type, &record.pattern])
        .ok_or_else(|| "missing template_type".to_string())?
        .parse()?;

    let final_message = first_present(&[&record.final_message, &record.generated_message])
        .ok_or_else(|| "missing final_message".to_string())?
        .to_string();

    let source_text =
        first_present(&[&record.source_text, &record.paste_text]).map(str::to_string);

    let mut delivery = NewDelivery::new(sent_at, template_type, final_message, source_text);

    if let Some(student_id) = first_present(&[&record.student_id7]) {
        delivery.student_id7 = Some(student_id.to_string());
    }
    if let Some(raw) = first_present(&[&record.last_login_at]) {
        delivery.last_login_at = Some(
            parse_instant(raw, false).ok_or_else(|| format!("invalid last_login_at '{raw}'"))?,
        );
    }
    if let Some(raw) = first_present(&[&record.offer_status]) {
        delivery.offer_status = raw.parse()?;
    }
    if let Some(raw) = first_present(&[&record.notes]) {
        let imported = DeliveryNotes::from_column(Some(raw));
        delivery.notes = DeliveryNotes {
            major: imported.major.or(delivery.notes.major.take()),
            memo: imported.memo.or(delivery.notes.memo.take()),
            faculty_name: imported.faculty_name.or(delivery.notes.faculty_name.take()),
            department_name: imported
                .department_name
                .or(delivery.notes.department_name.take()),
            prefecture: imported.prefecture.or(delivery.notes.prefecture.take()),
            graduation_year: imported
                .graduation_year
                .or(delivery.notes.graduation_year.take()),
        };
    }

    Ok(delivery)
}

/// Inserts every valid, not-yet-stored record. Duplicates of stored rows and
/// of earlier records in the same batch are skipped silently.
pub async fn import_records(
    pool: &PgPool,
    records: &[ImportRecord],
) -> Result<ImportSummary, sqlx::Error> {
    let mut seen: HashSet<String> = repository::dedupe_sources(pool)
        .await?
        .into_iter()
        .map(|(sent_at, message)| dedupe_key(sent_at, &message))
        .collect();

    let mut inserted = 0;
    let mut skipped = 0;
    let mut errors = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let delivery = match prepare_record(record) {
            Ok(d) => d,
            Err(e) => {
                errors.push(format!("Record {index}: {e}"));
                skipped += 1;
                continue;
            }
        };

        let key = dedupe_key(delivery.sent_at, &delivery.final_message);
        if seen.contains(&key) {
            skipped += 1;
            continue;
        }

        match repository::insert_delivery(pool, &delivery).await {
            Ok(_) => {
                seen.insert(key);
                inserted += 1;
            }
            Err(e) => {
                warn!(index, error = %e, "Import record insert failed");
                errors.push(format!("Record {index}: {e}"));
                skipped += 1;
            }
        }
    }

    info!(inserted, skipped, total = records.len(), "Delivery import finished");

    errors.truncate(MAX_REPORTED_ERRORS);
    Ok(ImportSummary {
        success: true,
        inserted,
        skipped,
        total: records.len(),
        errors,
    })
}
