//! Database access for the `deliveries` table.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::deliveries::filters::{DeliveryFilter, Paging};
use crate::deliveries::status::{OfferStatus, StatusTimestamps};
use crate::extraction::fields::Gender;
use crate::extraction::Pattern;
use crate::models::delivery::{DeliveryRow, NewDelivery};

/// Column changes for a PATCH. Outer `None` leaves a column untouched;
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct DeliveryUpdate {
    pub final_message: Option<String>,
    pub student_id7: Option<Option<String>>,
    pub university_name: Option<Option<String>>,
    pub gender: Option<Option<Gender>>,
    pub template_type: Option<Pattern>,
    pub notes: Option<Option<String>>,
}

impl DeliveryUpdate {
    pub fn is_empty(&self) -> bool {
        self.final_message.is_none()
            && self.student_id7.is_none()
            && self.university_name.is_none()
            && self.gender.is_none()
            && self.template_type.is_none()
            && self.notes.is_none()
    }
}

#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct AnalyticsRow {
    pub send_date: NaiveDate,
    pub time_slot: String,
    pub template_type: String,
    pub count: i64,
}

pub async fn insert_delivery(pool: &PgPool, new: &NewDelivery) -> Result<DeliveryRow, sqlx::Error> {
    sqlx::query_as::<_, DeliveryRow>(
        r#"
        INSERT INTO deliveries
            (id, sent_at, send_date, time_slot, template_type, final_message, source_text,
             student_id7, university_name, gender, last_login_at, offer_status,
             approved_at, on_hold_at, cancelled_at, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.sent_at)
    .bind(new.send_date)
    .bind(new.time_slot.as_str())
    .bind(new.template_type.as_str())
    .bind(&new.final_message)
    .bind(&new.source_text)
    .bind(&new.student_id7)
    .bind(&new.university_name)
    .bind(new.gender.map(|g| g.as_str()))
    .bind(new.last_login_at)
    .bind(new.offer_status.as_str())
    .bind(new.status_timestamps.approved_at)
    .bind(new.status_timestamps.on_hold_at)
    .bind(new.status_timestamps.cancelled_at)
    .bind(new.notes.to_column())
    .fetch_one(pool)
    .await
}

pub async fn get_delivery(pool: &PgPool, id: Uuid) -> Result<Option<DeliveryRow>, sqlx::Error> {
    sqlx::query_as::<_, DeliveryRow>("SELECT * FROM deliveries WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn count_deliveries(pool: &PgPool, filter: &DeliveryFilter) -> Result<i64, sqlx::Error> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM deliveries");
    filter.push_where(&mut qb);
    qb.build_query_scalar::<i64>().fetch_one(pool).await
}

/// One page, newest first, plus the total matching count.
pub async fn list_deliveries(
    pool: &PgPool,
    filter: &DeliveryFilter,
    paging: Paging,
) -> Result<(Vec<DeliveryRow>, i64), sqlx::Error> {
    let total = count_deliveries(pool, filter).await?;

    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM deliveries");
    filter.push_where(&mut qb);
    qb.push(" ORDER BY sent_at DESC LIMIT ");
    qb.push_bind(paging.page_size);
    qb.push(" OFFSET ");
    qb.push_bind(paging.offset());

    let items = qb.build_query_as::<DeliveryRow>().fetch_all(pool).await?;
    Ok((items, total))
}

/// All matching rows newest first, at most `limit`.
pub async fn export_deliveries(
    pool: &PgPool,
    filter: &DeliveryFilter,
    limit: i64,
) -> Result<Vec<DeliveryRow>, sqlx::Error> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM deliveries");
    filter.push_where(&mut qb);
    qb.push(" ORDER BY sent_at DESC LIMIT ");
    qb.push_bind(limit);
    qb.build_query_as::<DeliveryRow>().fetch_all(pool).await
}

/// Applies `update`; `None` when the row does not exist.
pub async fn update_delivery(
    pool: &PgPool,
    id: Uuid,
    update: &DeliveryUpdate,
) -> Result<Option<DeliveryRow>, sqlx::Error> {
    if update.is_empty() {
        return get_delivery(pool, id).await;
    }

    let mut qb = QueryBuilder::<Postgres>::new("UPDATE deliveries SET ");
    let mut set = qb.separated(", ");
    if let Some(message) = &update.final_message {
        set.push("final_message = ").push_bind_unseparated(message.clone());
    }
    if let Some(student_id) = &update.student_id7 {
        set.push("student_id7 = ").push_bind_unseparated(student_id.clone());
    }
    if let Some(university) = &update.university_name {
        set.push("university_name = ").push_bind_unseparated(university.clone());
    }
    if let Some(gender) = &update.gender {
        set.push("gender = ")
            .push_bind_unseparated(gender.map(|g| g.as_str().to_string()));
    }
    if let Some(template) = update.template_type {
        set.push("template_type = ")
            .push_bind_unseparated(template.as_str().to_string());
    }
    if let Some(notes) = &update.notes {
        set.push("notes = ").push_bind_unseparated(notes.clone());
    }
    qb.push(" WHERE id = ");
    qb.push_bind(id);
    qb.push(" RETURNING *");

    qb.build_query_as::<DeliveryRow>().fetch_optional(pool).await
}

/// Sets the status and rewrites all three timestamp columns together.
pub async fn set_offer_status(
    pool: &PgPool,
    id: Uuid,
    status: OfferStatus,
    at: DateTime<Utc>,
) -> Result<Option<DeliveryRow>, sqlx::Error> {
    let ts = StatusTimestamps::for_status(status, at);
    sqlx::query_as::<_, DeliveryRow>(
        r#"
        UPDATE deliveries
        SET offer_status = $2, approved_at = $3, on_hold_at = $4, cancelled_at = $5
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(ts.approved_at)
    .bind(ts.on_hold_at)
    .bind(ts.cancelled_at)
    .fetch_optional(pool)
    .await
}

/// `true` when a row was deleted.
pub async fn delete_delivery(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM deliveries WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Counts grouped by send date, slot and template within an inclusive date range.
pub async fn analytics_counts(
    pool: &PgPool,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<AnalyticsRow>, sqlx::Error> {
    sqlx::query_as::<_, AnalyticsRow>(
        r#"
        SELECT send_date, time_slot, template_type, COUNT(*) AS count
        FROM deliveries
        WHERE send_date >= $1 AND send_date <= $2
        GROUP BY send_date, time_slot, template_type
        ORDER BY send_date DESC, time_slot ASC, template_type ASC
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

/// `(sent_at, final_message)` of every stored record, for import dedupe.
pub async fn dedupe_sources(pool: &PgPool) -> Result<Vec<(DateTime<Utc>, String)>, sqlx::Error> {
    sqlx::query_as::<_, (DateTime<Utc>, String)>("SELECT sent_at, final_message FROM deliveries")
        .fetch_all(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_update() {
        assert!(DeliveryUpdate::default().is_empty());
        let update = DeliveryUpdate {
            student_id7: Some(None),
            ..DeliveryUpdate::default()
        };
        assert!(!update.is_empty());
    }
}
