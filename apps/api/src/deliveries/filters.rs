//! Query-string filters shared by the list and CSV export endpoints.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};

use crate::deliveries::jst::{parse_date, parse_instant, TimeSlot};
use crate::deliveries::status::OfferStatus;
use crate::errors::AppError;
use crate::extraction::Pattern;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 50;
/// Upper bound on `page`; beyond it every page is empty anyway.
pub const MAX_PAGE: i64 = 1_000_000;

/// Raw query parameters. Empty values count as absent.
#[derive(Debug, Default, Deserialize)]
pub struct DeliveryFilterParams {
    #[serde(default, alias = "sendDateFrom")]
    pub send_date_from: Option<String>,
    #[serde(default, alias = "sendDateTo")]
    pub send_date_to: Option<String>,
    #[serde(default, alias = "timeSlot")]
    pub time_slot: Option<String>,
    #[serde(default, alias = "templateType")]
    pub template_type: Option<String>,
    #[serde(default, alias = "studentId7")]
    pub student_id7: Option<String>,
    #[serde(default, alias = "lastLoginFrom")]
    pub last_login_from: Option<String>,
    #[serde(default, alias = "lastLoginTo")]
    pub last_login_to: Option<String>,
    #[serde(default, alias = "offerStatus")]
    pub offer_status: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default, alias = "pageSize")]
    pub page_size: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryFilter {
    pub send_date_from: Option<NaiveDate>,
    pub send_date_to: Option<NaiveDate>,
    pub time_slot: Option<TimeSlot>,
    pub template_type: Option<Pattern>,
    /// Substring match.
    pub student_id7: Option<String>,
    pub last_login_from: Option<DateTime<Utc>>,
    pub last_login_to: Option<DateTime<Utc>>,
    pub offer_status: Option<OfferStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: i64,
    pub page_size: i64,
}

impl Paging {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_with<T>(
    value: &Option<String>,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, AppError> {
    match present(value) {
        None => Ok(None),
        Some(v) => parse(v)
            .map(Some)
            .ok_or_else(|| AppError::Validation(format!("{name} has an invalid value: '{v}'"))),
    }
}

impl DeliveryFilterParams {
    pub fn filter(&self) -> Result<DeliveryFilter, AppError> {
        Ok(DeliveryFilter {
            send_date_from: parse_with(&self.send_date_from, "send_date_from", parse_date)?,
            send_date_to: parse_with(&self.send_date_to, "send_date_to", parse_date)?,
            time_slot: parse_with(&self.time_slot, "time_slot", |v| v.parse().ok())?,
            template_type: parse_with(&self.template_type, "template_type", |v| v.parse().ok())?,
            student_id7: present(&self.student_id7).map(str::to_string),
            last_login_from: parse_with(&self.last_login_from, "last_login_from", |v| {
                parse_instant(v, false)
            })?,
            last_login_to: parse_with(&self.last_login_to, "last_login_to", |v| {
                parse_instant(v, true)
            })?,
            offer_status: parse_with(&self.offer_status, "offer_status", |v| v.parse().ok())?,
        })
    }

    /// Page defaults to 1 and is clamped to 1..=MAX_PAGE; page size defaults
    /// to 50 and is clamped to 1..=50.
    pub fn paging(&self) -> Result<Paging, AppError> {
        let page = parse_with(&self.page, "page", |v| v.parse::<i64>().ok())?.unwrap_or(1);
        let page_size = parse_with(&self.page_size, "page_size", |v| v.parse::<i64>().ok())?
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Ok(Paging {
            page: page.clamp(1, MAX_PAGE),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        })
    }
}

fn push_clause(qb: &mut QueryBuilder<'_, Postgres>, first: &mut bool, sql: &str) {
    qb.push(if *first { " WHERE " } else { " AND " });
    qb.push(sql);
    *first = false;
}

impl DeliveryFilter {
    /// Appends ` WHERE ...` for every set criterion; nothing when the filter is empty.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        let mut first = true;

        if let Some(from) = self.send_date_from {
            push_clause(qb, &mut first, "send_date >= ");
            qb.push_bind(from);
        }
        if let Some(to) = self.send_date_to {
            push_clause(qb, &mut first, "send_date <= ");
            qb.push_bind(to);
        }
        if let Some(slot) = self.time_slot {
            push_clause(qb, &mut first, "time_slot = ");
            qb.push_bind(slot.as_str().to_string());
        }
        if let Some(template) = self.template_type {
            push_clause(qb, &mut first, "template_type = ");
            qb.push_bind(template.as_str().to_string());
        }
        if let Some(student_id) = &self.student_id7 {
            push_clause(qb, &mut first, "strpos(student_id7, ");
            qb.push_bind(student_id.clone());
            qb.push(") > 0");
        }
        if let Some(from) = self.last_login_from {
            push_clause(qb, &mut first, "last_login_at >= ");
            qb.push_bind(from);
        }
        if let Some(to) = self.last_login_to {
            push_clause(qb, &mut first, "last_login_at <= ");
            qb.push_bind(to);
        }
        if let Some(status) = self.offer_status {
            push_clause(qb, &mut first, "offer_status = ");
            qb.push_bind(status.as_str().to_string());
        }
    }
}
