//! Axum route handlers for the delivery log.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::deliveries::csv_export::{export_filename, render_csv};
use crate::deliveries::filters::DeliveryFilterParams;
use crate::deliveries::import::{import_records, ImportRecord, ImportSummary};
use crate::deliveries::jst::parse_instant;
use crate::deliveries::repository::{self, DeliveryUpdate};
use crate::deliveries::status::OfferStatus;
use crate::errors::AppError;
use crate::extraction::fields::{is_prefecture, Gender};
use crate::extraction::Pattern;
use crate::models::delivery::{DeliveryNotes, DeliveryRow, NewDelivery};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// Editable profile fields shared by create and patch. Absent or `null`
/// means "not provided"; on patch an empty string clears the field.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileFieldsInput {
    #[serde(default, alias = "studentId7")]
    pub student_id7: Option<String>,
    #[serde(default, alias = "universityName")]
    pub university_name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, alias = "facultyName")]
    pub faculty_name: Option<String>,
    #[serde(default, alias = "departmentName")]
    pub department_name: Option<String>,
    #[serde(default)]
    pub prefecture: Option<String>,
    #[serde(default, alias = "graduationYear")]
    pub graduation_year: Option<String>,
    #[serde(default)]
    pub major: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateDeliveryRequest {
    #[serde(default, alias = "sentAt")]
    pub sent_at: Option<String>,
    #[serde(default, alias = "templateType")]
    pub template_type: Option<String>,
    #[serde(default, alias = "finalMessage")]
    pub final_message: Option<String>,
    #[serde(default, alias = "sourceText")]
    pub source_text: Option<String>,
    #[serde(default, alias = "lastLoginAt")]
    pub last_login_at: Option<String>,
    #[serde(flatten)]
    pub fields: ProfileFieldsInput,
}

#[derive(Debug, Default, Deserialize)]
pub struct PatchDeliveryRequest {
    #[serde(default, alias = "finalMessage")]
    pub final_message: Option<String>,
    #[serde(default, alias = "templateType")]
    pub template_type: Option<String>,
    #[serde(flatten)]
    pub fields: ProfileFieldsInput,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {
    #[serde(default, alias = "offerStatus", alias = "offer_status")]
    pub status: Option<String>,
    #[serde(default, alias = "setAt")]
    pub set_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub records: Option<Vec<ImportRecord>>,
}

/// A delivery as returned by the API: notes decoded, status date resolved.
#[derive(Debug, Serialize)]
pub struct DeliveryView {
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
    pub offer_status: OfferStatus,
    pub approved_at: Option<DateTime<Utc>>,
    pub on_hold_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub status_date: Option<DateTime<Utc>>,
    pub notes: DeliveryNotes,
}

impl From<DeliveryRow> for DeliveryView {
    fn from(row: DeliveryRow) -> Self {
        let offer_status = row.status();
        let status_date = row.status_date();
        let notes = row.parsed_notes();
        DeliveryView {
            id: row.id,
            created_at: row.created_at,
            sent_at: row.sent_at,
            send_date: row.send_date,
            time_slot: row.time_slot,
            template_type: row.template_type,
            final_message: row.final_message,
            source_text: row.source_text,
            student_id7: row.student_id7,
            university_name: row.university_name,
            gender: row.gender,
            last_login_at: row.last_login_at,
            offer_status,
            approved_at: row.approved_at,
            on_hold_at: row.on_hold_at,
            cancelled_at: row.cancelled_at,
            status_date,
            notes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: Uuid,
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct DeliveryListResponse {
    pub items: Vec<DeliveryView>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub delivery: DeliveryView,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Field validation
// ────────────────────────────────────────────────────────────────────────────

/// `None` = not provided, `Some(None)` = clear, `Some(Some(v))` = trimmed value.
fn provided(value: &Option<String>) -> Option<Option<String>> {
    value.as_deref().map(|v| {
        let v = v.trim();
        (!v.is_empty()).then(|| v.to_string())
    })
}

fn validate_student_id(value: Option<String>) -> Result<Option<String>, AppError> {
    match value {
        Some(id) if id.len() != 7 || !id.bytes().all(|b| b.is_ascii_digit()) => Err(
            AppError::Validation(format!("student_id7 must be exactly 7 digits (got '{id}')")),
        ),
        other => Ok(other),
    }
}

fn validate_prefecture(value: Option<String>) -> Result<Option<String>, AppError> {
    match value {
        Some(p) if !is_prefecture(&p) => Err(AppError::Validation(format!(
            "prefecture must be one of the 47 prefectures (got '{p}')"
        ))),
        other => Ok(other),
    }
}

/// `unknown` is stored as NULL.
fn validate_gender(value: Option<String>) -> Result<Option<Gender>, AppError> {
    match value {
        None => Ok(None),
        Some(g) => {
            let gender: Gender = g.parse().map_err(AppError::Validation)?;
            Ok(Some(gender).filter(|g| *g != Gender::Unknown))
        }
    }
}

fn parse_template(value: &str) -> Result<Pattern, AppError> {
    value.trim().parse().map_err(AppError::Validation)
}

fn parse_timestamp(value: &str, name: &str) -> Result<DateTime<Utc>, AppError> {
    parse_instant(value, false)
        .ok_or_else(|| AppError::Validation(format!("{name} is not a valid date-time: '{value}'")))
}

/// Validated profile changes; each entry follows the `provided` convention.
#[derive(Debug, Default)]
struct ProfileChanges {
    student_id7: Option<Option<String>>,
    university_name: Option<Option<String>>,
    gender: Option<Option<Gender>>,
    faculty_name: Option<Option<String>>,
    department_name: Option<Option<String>>,
    prefecture: Option<Option<String>>,
    graduation_year: Option<Option<String>>,
    major: Option<Option<String>>,
    memo: Option<Option<String>>,
}

impl ProfileChanges {
    fn parse(input: &ProfileFieldsInput) -> Result<Self, AppError> {
        Ok(ProfileChanges {
            student_id7: provided(&input.student_id7)
                .map(validate_student_id)
                .transpose()?,
            university_name: provided(&input.university_name),
            gender: provided(&input.gender).map(validate_gender).transpose()?,
            faculty_name: provided(&input.faculty_name),
            department_name: provided(&input.department_name),
            prefecture: provided(&input.prefecture)
                .map(validate_prefecture)
                .transpose()?,
            graduation_year: provided(&input.graduation_year),
            major: provided(&input.major),
            memo: provided(&input.memo),
        })
    }

    fn touches_notes(&self) -> bool {
        self.faculty_name.is_some()
            || self.department_name.is_some()
            || self.prefecture.is_some()
            || self.graduation_year.is_some()
            || self.major.is_some()
            || self.memo.is_some()
    }

    fn apply_to_notes(&self, notes: &mut DeliveryNotes) {
        let fields = [
            (&self.faculty_name, &mut notes.faculty_name),
            (&self.department_name, &mut notes.department_name),
            (&self.prefecture, &mut notes.prefecture),
            (&self.graduation_year, &mut notes.graduation_year),
            (&self.major, &mut notes.major),
            (&self.memo, &mut notes.memo),
        ];
        for (change, slot) in fields {
            if let Some(value) = change {
                *slot = value.clone();
            }
        }
    }
}

/// Applies patch-style changes to a record being created: explicit values win
/// over extracted ones, empty strings are ignored.
fn overlay_on_new(delivery: &mut NewDelivery, changes: &ProfileChanges) {
    if let Some(Some(id)) = &changes.student_id7 {
        delivery.student_id7 = Some(id.clone());
    }
    if let Some(Some(university)) = &changes.university_name {
        delivery.university_name = Some(university.clone());
    }
    if let Some(Some(gender)) = changes.gender {
        delivery.gender = Some(gender);
    }
    let creation_only = ProfileChanges {
        faculty_name: changes.faculty_name.clone().filter(Option::is_some),
        department_name: changes.department_name.clone().filter(Option::is_some),
        prefecture: changes.prefecture.clone().filter(Option::is_some),
        graduation_year: changes.graduation_year.clone().filter(Option::is_some),
        major: changes.major.clone().filter(Option::is_some),
        memo: changes.memo.clone().filter(Option::is_some),
        ..ProfileChanges::default()
    };
    creation_only.apply_to_notes(&mut delivery.notes);
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Delivery {id} not found"))
}

// ────────────────────────────────────────────────────────────────────────────
// Request → domain
// ────────────────────────────────────────────────────────────────────────────

fn build_new_delivery(request: &CreateDeliveryRequest) -> Result<NewDelivery, AppError> {
    let missing = |name: &str| AppError::Validation(format!("{name} is required"));

    let sent_at_raw = provided(&request.sent_at)
        .flatten()
        .ok_or_else(|| missing("sent_at"))?;
    let sent_at = parse_timestamp(&sent_at_raw, "sent_at")?;
    let template_type = parse_template(
        &provided(&request.template_type)
            .flatten()
            .ok_or_else(|| missing("template_type"))?,
    )?;
    let final_message = request
        .final_message
        .clone()
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| missing("final_message"))?;

    let changes = ProfileChanges::parse(&request.fields)?;
    let mut delivery = NewDelivery::new(
        sent_at,
        template_type,
        final_message,
        request.source_text.clone(),
    );
    overlay_on_new(&mut delivery, &changes);

    if let Some(raw) = provided(&request.last_login_at).flatten() {
        delivery.last_login_at = Some(parse_timestamp(&raw, "last_login_at")?);
    }
    Ok(delivery)
}

/// Validated patch, with the notes column still to be merged against the stored row.
struct PatchPlan {
    update: DeliveryUpdate,
    changes: ProfileChanges,
}

fn plan_patch(request: &PatchDeliveryRequest) -> Result<PatchPlan, AppError> {
    let changes = ProfileChanges::parse(&request.fields)?;

    let final_message = match &request.final_message {
        Some(m) if m.trim().is_empty() => {
            return Err(AppError::Validation("final_message cannot be empty".to_string()))
        }
        other => other.clone(),
    };
    let template_type = provided(&request.template_type)
        .flatten()
        .map(|t| parse_template(&t))
        .transpose()?;

    let update = DeliveryUpdate {
        final_message,
        student_id7: changes.student_id7.clone(),
        university_name: changes.university_name.clone(),
        gender: changes.gender,
        template_type,
        notes: None,
    };

    if update.is_empty() && !changes.touches_notes() {
        return Err(AppError::Validation("No updatable fields provided".to_string()));
    }
    Ok(PatchPlan { update, changes })
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/deliveries
///
/// Fields missing from the body are filled from `source_text` by extraction.
pub async fn handle_create_delivery(
    State(state): State<AppState>,
    Json(request): Json<CreateDeliveryRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let delivery = build_new_delivery(&request)?;
    let row = repository::insert_delivery(&state.db, &delivery).await?;
    info!(id = %row.id, template = %row.template_type, "Delivery recorded");
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id: row.id,
            success: true,
        }),
    ))
}

/// GET /api/v1/deliveries
pub async fn handle_list_deliveries(
    State(state): State<AppState>,
    Query(params): Query<DeliveryFilterParams>,
) -> Result<Json<DeliveryListResponse>, AppError> {
    let filter = params.filter()?;
    let paging = params.paging()?;
    let (rows, total) = repository::list_deliveries(&state.db, &filter, paging).await?;
    Ok(Json(DeliveryListResponse {
        items: rows.into_iter().map(DeliveryView::from).collect(),
        total,
        page: paging.page,
        page_size: paging.page_size,
    }))
}

/// GET /api/v1/deliveries/:id
pub async fn handle_get_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryView>, AppError> {
    let row = repository::get_delivery(&state.db, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(row.into()))
}

/// PATCH /api/v1/deliveries/:id
pub async fn handle_patch_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PatchDeliveryRequest>,
) -> Result<Json<DeliveryView>, AppError> {
    let PatchPlan { mut update, changes } = plan_patch(&request)?;

    if changes.touches_notes() {
        let existing = repository::get_delivery(&state.db, id)
            .await?
            .ok_or_else(|| not_found(id))?;
        let mut notes = existing.parsed_notes();
        changes.apply_to_notes(&mut notes);
        update.notes = Some(notes.to_column());
    }

    let row = repository::update_delivery(&state.db, id, &update)
        .await?
        .ok_or_else(|| not_found(id))?;
    info!(id = %id, "Delivery updated");
    Ok(Json(row.into()))
}

/// PATCH /api/v1/deliveries/:id/status
///
/// Sets the offer status; the matching timestamp is `set_at` or now, the
/// other two are cleared.
pub async fn handle_set_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let status: OfferStatus = provided(&request.status)
        .flatten()
        .ok_or_else(|| AppError::Validation("status is required".to_string()))?
        .parse()
        .map_err(AppError::Validation)?;
    let at = match provided(&request.set_at).flatten() {
        Some(raw) => parse_timestamp(&raw, "set_at")?,
        None => Utc::now(),
    };

    let row = repository::set_offer_status(&state.db, id, status, at)
        .await?
        .ok_or_else(|| not_found(id))?;
    info!(id = %id, status = %status, "Offer status changed");
    Ok(Json(StatusResponse {
        success: true,
        delivery: row.into(),
    }))
}

/// DELETE /api/v1/deliveries/:id
pub async fn handle_delete_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, AppError> {
    if !repository::delete_delivery(&state.db, id).await? {
        return Err(not_found(id));
    }
    info!(id = %id, "Delivery deleted");
    Ok(Json(DeletedResponse { success: true }))
}

/// GET /api/v1/deliveries/export.csv
///
/// Same filters as the list endpoint, no paging. Fails with 400 instead of
/// truncating when the match count exceeds the export cap.
pub async fn handle_export_csv(
    State(state): State<AppState>,
    Query(params): Query<DeliveryFilterParams>,
) -> Result<Response, AppError> {
    let filter = params.filter()?;
    let max_rows = state.config.export_max_rows;

    let total = repository::count_deliveries(&state.db, &filter).await?;
    if total > max_rows {
        return Err(AppError::Validation(format!(
            "Export is limited to {max_rows} rows; narrow the filters (matched {total})"
        )));
    }

    let rows = repository::export_deliveries(&state.db, &filter, max_rows).await?;
    let body = render_csv(&rows).map_err(|e| AppError::Internal(e.into()))?;
    let filename = export_filename(Utc::now());
    info!(rows = rows.len(), %filename, "CSV export generated");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}

/// POST /api/v1/admin/import-deliveries
///
/// Staging only.
pub async fn handle_import_deliveries(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportSummary>, AppError> {
    if !state.config.app_env.is_staging() {
        return Err(AppError::Forbidden(
            "Bulk import is only available in the staging environment".to_string(),
        ));
    }
    let records = request
        .records
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AppError::Validation("records must be a non-empty array".to_string()))?;

    let summary = import_records(&state.db, &records).await?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::AppEnv;
    use crate::scout::generator::tests::StubGenerator;

    fn state(app_env: AppEnv) -> AppState {
        AppState::for_tests(Arc::new(StubGenerator::new(&[])), app_env)
    }

    fn create_request(json: serde_json::Value) -> CreateDeliveryRequest {
        serde_json::from_value(json).unwrap()
    }

    fn patch_request(json: serde_json::Value) -> PatchDeliveryRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_create_requires_core_fields() {
        for (body, field) in [
            (serde_json::json!({"template_type": "A", "final_message": "x"}), "sent_at"),
            (serde_json::json!({"sent_at": "2026-02-24T06:30:00Z", "final_message": "x"}), "template_type"),
            (serde_json::json!({"sent_at": "2026-02-24T06:30:00Z", "template_type": "A", "final_message": " "}), "final_message"),
        ] {
            let err = build_new_delivery(&create_request(body)).unwrap_err();
            assert!(matches!(err, AppError::Validation(ref m) if m.contains(field)), "{err}");
        }
    }

    #[test]
    fn test_create_fills_from_source_and_explicit_values_win() {
        let request = create_request(serde_json::json!({
            "sentAt": "2026-02-24T23:10:00+09:00",
            "templateType": "B",
            "finalMessage": "本文",
            "sourceText": "ID: 7654321\n大学名：早稲田大学\n学部：文学部",
            "universityName": "慶應義塾大学",
            "studentId7": "",
            "major": "心理学",
        }));
        let d = build_new_delivery(&request).unwrap();
        assert_eq!(d.student_id7.as_deref(), Some("7654321"));
        assert_eq!(d.university_name.as_deref(), Some("慶應義塾大学"));
        assert_eq!(d.notes.faculty_name.as_deref(), Some("文学部"));
        assert_eq!(d.notes.major.as_deref(), Some("心理学"));
        assert_eq!(d.send_date.to_string(), "2026-02-24");
        assert_eq!(d.time_slot.as_str(), "18-23");
    }

    #[test]
    fn test_patch_without_fields_is_rejected() {
        let err = plan_patch(&patch_request(serde_json::json!({}))).err().unwrap();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("No updatable")));
        let err = plan_patch(&patch_request(serde_json::json!({"gender": null}))).err().unwrap();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_patch_field_validation() {
        for body in [
            serde_json::json!({"student_id7": "123456"}),
            serde_json::json!({"studentId7": "12345678"}),
            serde_json::json!({"prefecture": "東京"}),
            serde_json::json!({"gender": "f"}),
            serde_json::json!({"template_type": "C"}),
            serde_json::json!({"final_message": ""}),
        ] {
            assert!(
                matches!(plan_patch(&patch_request(body.clone())), Err(AppError::Validation(_))),
                "{body}"
            );
        }
    }

    #[test]
    fn test_patch_empty_string_clears() {
        let plan = plan_patch(&patch_request(serde_json::json!({
            "student_id7": "",
            "gender": "unknown",
            "prefecture": "大阪府",
            "memo": "",
        })))
        .unwrap();
        assert_eq!(plan.update.student_id7, Some(None));
        assert_eq!(plan.update.gender, Some(None));
        assert!(plan.changes.touches_notes());

        let mut notes = DeliveryNotes {
            memo: Some("古いメモ".to_string()),
            major: Some("経済学".to_string()),
            ..DeliveryNotes::default()
        };
        plan.changes.apply_to_notes(&mut notes);
        assert_eq!(notes.memo, None);
        assert_eq!(notes.major.as_deref(), Some("経済学"));
        assert_eq!(notes.prefecture.as_deref(), Some("大阪府"));
    }

    #[tokio::test]
    async fn test_list_rejects_bad_page() {
        let params: DeliveryFilterParams =
            serde_json::from_value(serde_json::json!({"page": "x"})).unwrap();
        let err = handle_list_deliveries(State(state(AppEnv::Production)), Query(params))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status_requires_known_value() {
        let err = handle_set_status(
            State(state(AppEnv::Production)),
            Path(Uuid::new_v4()),
            Json(StatusRequest {
                status: Some("rejected".to_string()),
                set_at: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = handle_set_status(
            State(state(AppEnv::Production)),
            Path(Uuid::new_v4()),
            Json(StatusRequest::default()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("status")));
    }

    #[tokio::test]
    async fn test_import_is_forbidden_outside_staging() {
        let err = handle_import_deliveries(
            State(state(AppEnv::Production)),
            Json(ImportRequest {
                records: Some(vec![ImportRecord::default()]),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_import_requires_records() {
        let err = handle_import_deliveries(
            State(state(AppEnv::Staging)),
            Json(ImportRequest { records: Some(vec![]) }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_view_decodes_notes_and_status_date() {
        let approved = DateTime::parse_from_rfc3339("2026-02-25T01:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let row = DeliveryRow {
            id: Uuid::new_v4(),
            created_at: approved,
            sent_at: approved,
            send_date: NaiveDate::from_ymd_opt(2026, 2, 25).unwrap(),
            time_slot: "06-11".to_string(),
            template_type: "A".to_string(),
            final_message: "本文".to_string(),
            source_text: None,
            student_id7: None,
            university_name: None,
            gender: None,
            last_login_at: None,
            offer_status: "approved".to_string(),
            approved_at: Some(approved),
            on_hold_at: None,
            cancelled_at: None,
            notes: Some("電話済み".to_string()),
        };
        let view = DeliveryView::from(row);
        assert_eq!(view.offer_status, OfferStatus::Approved);
        assert_eq!(view.status_date, Some(approved));
        assert_eq!(view.notes.memo.as_deref(), Some("電話済み"));
    }
}
