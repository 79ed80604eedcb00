//! CSV rendering of delivery records for spreadsheet tools.
//!
//! Output is UTF-8 with a leading BOM, CRLF record terminators and RFC 4180
//! quoting (a field is quoted only when it contains a comma, quote or line
//! break; inner quotes are doubled).

use chrono::{DateTime, Utc};
use csv::{Terminator, WriterBuilder};

use crate::deliveries::jst::{format_csv_datetime, format_filename_stamp};
use crate::models::delivery::DeliveryRow;

const BOM: &str = "\u{FEFF}";

pub const HEADERS: [&str; 9] = [
    "配信日時(JST)",
    "配信日",
    "時間帯",
    "テンプレ",
    "学生ID(7桁)",
    "最終ログイン日時(JST)",
    "オファー状態",
    "状態日付(JST)",
    "スカウト文",
];

fn record(row: &DeliveryRow) -> [String; 9] {
    [
        format_csv_datetime(Some(row.sent_at)),
        row.send_date.format("%Y-%m-%d").to_string(),
        row.time_slot.clone(),
        row.template_type.clone(),
        row.student_id7.clone().unwrap_or_default(),
        format_csv_datetime(row.last_login_at),
        row.status().label().to_string(),
        format_csv_datetime(row.status_date()),
        row.final_message.clone(),
    ]
}

/// Renders the header row followed by one record per row, in the given order.
pub fn render_csv(rows: &[DeliveryRow]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::CRLF)
        .from_writer(BOM.as_bytes().to_vec());

    writer.write_record(HEADERS)?;
    for row in rows {
        writer.write_record(record(row))?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// `deliveries_YYYYMMDD_HHMM.csv`, stamped in JST.
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("deliveries_{}.csv", format_filename_stamp(now))
}
