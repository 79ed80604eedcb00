//! Axum route handlers for the Scout API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::scout::generator::{
    analyze, generate_opening, generate_profile_line, generate_scout, generate_title,
    GenerationMode, ScoutAnalysis, ScoutDraft,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateFieldRequest {
    pub mode: Option<String>,
    #[serde(default, alias = "pasteText")]
    pub paste_text: Option<String>,
    #[serde(default, alias = "facultyName")]
    pub faculty_name: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum GenerateFieldResponse {
    Title { title: String },
    Opening { opening_message: String },
    ProfileLine { profile_line: String },
}

#[derive(Debug, Deserialize)]
pub struct PasteRequest {
    #[serde(alias = "pasteText")]
    pub paste_text: String,
}

fn require_text<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Validation(message.to_string()))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/gemini
///
/// Single collaborator call for one field. `b_profile_line` needs `faculty_name`;
/// the other modes need `paste_text`.
pub async fn handle_generate_field(
    State(state): State<AppState>,
    Json(request): Json<GenerateFieldRequest>,
) -> Result<Json<GenerateFieldResponse>, AppError> {
    let mode: GenerationMode = request
        .mode
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(AppError::Validation)?;

    let response = match mode {
        GenerationMode::BProfileLine => {
            let faculty = require_text(
                request.faculty_name.as_deref(),
                "faculty_name is required for b_profile_line mode",
            )?;
            GenerateFieldResponse::ProfileLine {
                profile_line: generate_profile_line(state.llm.as_ref(), faculty).await?,
            }
        }
        GenerationMode::Title => {
            let paste = require_text(request.paste_text.as_deref(), "paste_text is required")?;
            GenerateFieldResponse::Title {
                title: generate_title(state.llm.as_ref(), paste).await?,
            }
        }
        GenerationMode::Opening => {
            let paste = require_text(request.paste_text.as_deref(), "paste_text is required")?;
            GenerateFieldResponse::Opening {
                opening_message: generate_opening(state.llm.as_ref(), paste).await?,
            }
        }
    };

    Ok(Json(response))
}

/// POST /api/v1/scout/analyze
///
/// Extraction preview: fields, self-PR candidate and pattern. No collaborator call.
pub async fn handle_analyze(
    Json(request): Json<PasteRequest>,
) -> Result<Json<ScoutAnalysis>, AppError> {
    require_text(Some(&request.paste_text), "paste_text cannot be empty")?;
    Ok(Json(analyze(&request.paste_text)))
}

/// POST /api/v1/scout/generate
///
/// Full pipeline. The draft is returned, not stored; saving goes through
/// POST /api/v1/deliveries.
pub async fn handle_generate_scout(
    State(state): State<AppState>,
    Json(request): Json<PasteRequest>,
) -> Result<Json<ScoutDraft>, AppError> {
    require_text(Some(&request.paste_text), "paste_text cannot be empty")?;
    let draft = generate_scout(state.llm.as_ref(), &state.templates, &request.paste_text).await?;
    Ok(Json(draft))
}
