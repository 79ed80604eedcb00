//! Scout generation: orchestrates one message.
//!
//! Flow: extract fields + self-PR → classify → greeting (A: generated title,
//! B: fixed greeting with an optional generated profile line) → generated
//! opening → reflow → assemble with the fixed block.
//!
//! Every collaborator response is re-validated here (length caps, ASCII
//! spaces removed); nothing it returns is trusted as-is.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::extraction::{
    classify, extract_fields, extract_self_pr, ExtractedFields, Pattern, SelfPrCandidate,
};
use crate::llm_client::{extract_json_field, truncate_chars, GenerationRequest, TextGenerator};
use crate::scout::prompts::{
    opening_system, title_system, OPENING_PROMPT_TEMPLATE, PROFILE_LINE_PROMPT_TEMPLATE,
    PROFILE_LINE_SYSTEM, TITLE_PROMPT_TEMPLATE,
};
use crate::scout::reflow::{reflow, visible_char_count};
use crate::scout::templates::ScoutTemplates;

pub const TITLE_MAX_CHARS: usize = 20;
pub const OPENING_MAX_CHARS: usize = 300;
pub const PROFILE_LINE_MAX_CHARS: usize = 150;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Title,
    Opening,
    BProfileLine,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Title => "title",
            GenerationMode::Opening => "opening",
            GenerationMode::BProfileLine => "b_profile_line",
        }
    }

    /// JSON key the collaborator is asked to fill.
    pub fn response_key(&self) -> &'static str {
        match self {
            GenerationMode::Title => "title",
            GenerationMode::Opening => "opening_message",
            GenerationMode::BProfileLine => "profile_line",
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(GenerationMode::Title),
            "opening" => Ok(GenerationMode::Opening),
            "b_profile_line" => Ok(GenerationMode::BProfileLine),
            _ => Err("mode must be 'title', 'opening', or 'b_profile_line'".to_string()),
        }
    }
}

/// Extraction preview for a paste. No collaborator involved.
#[derive(Debug, Clone, Serialize)]
pub struct ScoutAnalysis {
    pub fields: ExtractedFields,
    pub self_pr: SelfPrCandidate,
    pub pattern: Pattern,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct ScoutDraft {
    pub pattern: Pattern,
    pub self_pr_char_count: usize,
    pub fields: ExtractedFields,
    pub title: Option<String>,
    pub profile_line: Option<String>,
    pub opening_message: String,
    /// Reflowed opening length, newlines excluded.
    pub opening_char_count: usize,
    pub final_message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Collaborator calls
// ────────────────────────────────────────────────────────────────────────────

fn remove_ascii_spaces(text: &str) -> String {
    text.replace(' ', "")
}

fn fill_template(template: &str, placeholder: &str, value: &str) -> String {
    template.replacen(placeholder, value, 1)
}

/// Title for the A greeting: at most 20 chars, no ASCII spaces, never empty.
pub async fn generate_title(llm: &dyn TextGenerator, paste_text: &str) -> Result<String, AppError> {
    let system = title_system();
    let prompt = fill_template(TITLE_PROMPT_TEMPLATE, "{paste_text}", paste_text);
    let key = GenerationMode::Title.response_key();

    let raw = llm
        .generate(&GenerationRequest {
            system: &system,
            prompt: &prompt,
            response_key: key,
        })
        .await?;

    let extracted = extract_json_field(&raw, key, TITLE_MAX_CHARS);
    let title = remove_ascii_spaces(&truncate_chars(&extracted, TITLE_MAX_CHARS));
    let title = title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Llm("Title could not be generated".to_string()));
    }
    Ok(title)
}

/// Raw opening paragraph, capped at 300 chars. Reflow happens in the pipeline.
pub async fn generate_opening(
    llm: &dyn TextGenerator,
    paste_text: &str,
) -> Result<String, AppError> {
    let system = opening_system();
    let prompt = fill_template(OPENING_PROMPT_TEMPLATE, "{paste_text}", paste_text);
    let key = GenerationMode::Opening.response_key();

    let raw = llm
        .generate(&GenerationRequest {
            system: &system,
            prompt: &prompt,
            response_key: key,
        })
        .await?;

    let opening = truncate_chars(&extract_json_field(&raw, key, OPENING_MAX_CHARS), OPENING_MAX_CHARS);
    if opening.trim().is_empty() {
        return Err(AppError::Llm("Opening message could not be generated".to_string()));
    }
    Ok(opening)
}

/// One sentence for the B greeting placeholder. May be empty.
pub async fn generate_profile_line(
    llm: &dyn TextGenerator,
    faculty_name: &str,
) -> Result<String, AppError> {
    let prompt = fill_template(PROFILE_LINE_PROMPT_TEMPLATE, "{faculty_name}", faculty_name);
    let key = GenerationMode::BProfileLine.response_key();

    let raw = llm
        .generate(&GenerationRequest {
            system: PROFILE_LINE_SYSTEM,
            prompt: &prompt,
            response_key: key,
        })
        .await?;

    let line = extract_json_field(&raw, key, PROFILE_LINE_MAX_CHARS);
    Ok(remove_ascii_spaces(&line).trim().to_string())
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

pub fn analyze(paste_text: &str) -> ScoutAnalysis {
    let self_pr = extract_self_pr(paste_text);
    let pattern = classify(&self_pr.text);
    ScoutAnalysis {
        fields: extract_fields(paste_text),
        self_pr,
        pattern,
    }
}

/// Runs the full pipeline for one paste. Each collaborator call is made at
/// most once; a failure of a required call aborts the run.
pub async fn generate_scout(
    llm: &dyn TextGenerator,
    templates: &ScoutTemplates,
    paste_text: &str,
) -> Result<ScoutDraft, AppError> {
    let analysis = analyze(paste_text);
    info!(
        pattern = %analysis.pattern,
        self_pr_chars = analysis.self_pr.char_count,
        "Generating scout message"
    );

    let (greeting, title, profile_line) = match analysis.pattern {
        Pattern::A => {
            let title = generate_title(llm, paste_text).await?;
            (templates.greeting_a(&title), Some(title), None)
        }
        Pattern::B => {
            let profile_line = match analysis.fields.faculty_name.as_deref() {
                Some(faculty) => match generate_profile_line(llm, faculty).await {
                    Ok(line) if !line.is_empty() => Some(line),
                    Ok(_) => None,
                    Err(e) => {
                        warn!("Profile line generation failed, leaving the slot empty: {e}");
                        None
                    }
                },
                None => None,
            };
            (
                templates.greeting_b(profile_line.as_deref()),
                None,
                profile_line,
            )
        }
    };

    let raw_opening = generate_opening(llm, paste_text).await?;
    let opening_message = reflow(&raw_opening, &templates.reflow);
    let opening_char_count = visible_char_count(&opening_message);
    let final_message = templates.assemble(&greeting, &opening_message);

    info!(
        pattern = %analysis.pattern,
        opening_chars = opening_char_count,
        "Scout message assembled"
    );

    Ok(ScoutDraft {
        pattern: analysis.pattern,
        self_pr_char_count: analysis.self_pr.char_count,
        fields: analysis.fields,
        title,
        profile_line,
        opening_message,
        opening_char_count,
        final_message,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::llm_client::LlmError;
    use crate::scout::reflow::CLOSING_SENTENCE;
    use crate::scout::templates::FIXED_TEXT;

    /// Answers by response key; keys without an answer fail with a 503.
    pub(crate) struct StubGenerator {
        answers: Vec<(&'static str, String)>,
        pub calls: Mutex<Vec<String>>,
    }

    impl StubGenerator {
        pub(crate) fn new(answers: &[(&'static str, &str)]) -> Self {
            Self {
                answers: answers.iter().map(|(k, v)| (*k, v.to_string())).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, LlmError> {
            self.calls
                .lock()
                .unwrap()
                .push(request.response_key.to_string());
            self.answers
                .iter()
                .find(|(k, _)| *k == request.response_key)
                .map(|(_, v)| v.clone())
                .ok_or(LlmError::Api {
                    status: 503,
                    message: "unavailable".to_string(),
                })
        }
    }

    fn long_pr_paste() -> String {
        format!("自己PR\n{}\n\n", "あ".repeat(250))
    }

    const SHORT_PR_PASTE: &str = "学部：経済学部\n自己PR\n頑張ります。";

    #[test]
    fn test_mode_parse() {
        assert_eq!("b_profile_line".parse::<GenerationMode>().unwrap(), GenerationMode::BProfileLine);
        assert!("summary".parse::<GenerationMode>().is_err());
        assert_eq!(GenerationMode::Opening.response_key(), "opening_message");
    }

    #[test]
    fn test_analyze_classifies_long_pr_as_a() {
        let a = analyze(&long_pr_paste());
        assert_eq!(a.self_pr.char_count, 250);
        assert_eq!(a.pattern, Pattern::A);
    }

    #[tokio::test]
    async fn test_title_is_revalidated() {
        let llm = StubGenerator::new(&[("title", r#"{"title":"挑戦を 続ける 姿勢が魅力の行動力あるあなたへ"}"#)]);
        let title = generate_title(&llm, "paste").await.unwrap();
        assert!(!title.contains(' '));
        assert!(title.chars().count() <= TITLE_MAX_CHARS);
        assert!(title.starts_with("挑戦を続ける"));
    }

    #[tokio::test]
    async fn test_empty_title_is_an_error() {
        let llm = StubGenerator::new(&[("title", r#"{"title":"   "}"#)]);
        let err = generate_title(&llm, "paste").await.unwrap_err();
        assert!(matches!(err, AppError::Llm(_)));
    }

    #[tokio::test]
    async fn test_opening_capped_at_300_chars() {
        let long = "あ".repeat(400);
        let answer = format!(r#"{{"opening_message":"{long}"}}"#);
        let llm = StubGenerator::new(&[("opening_message", answer.as_str())]);
        let opening = generate_opening(&llm, "paste").await.unwrap();
        assert_eq!(opening.chars().count(), OPENING_MAX_CHARS);
    }

    #[tokio::test]
    async fn test_profile_line_strips_spaces() {
        let llm = StubGenerator::new(&[("profile_line", "```json\n{\"profile_line\": \"経済学部で 学ばれている点に興味を持ちました。\"}\n```")]);
        let line = generate_profile_line(&llm, "経済学部").await.unwrap();
        assert_eq!(line, "経済学部で学ばれている点に興味を持ちました。");
    }

    #[tokio::test]
    async fn test_pattern_a_pipeline() {
        let llm = StubGenerator::new(&[
            ("title", r#"{"title":"挑戦を続ける姿勢のあなたへ"}"#),
            ("opening_message", r#"{"opening_message":"挑戦する姿勢が印象的でした"}"#),
        ]);
        let templates = ScoutTemplates::default();
        let draft = generate_scout(&llm, &templates, &long_pr_paste()).await.unwrap();

        assert_eq!(draft.pattern, Pattern::A);
        assert_eq!(draft.title.as_deref(), Some("挑戦を続ける姿勢のあなたへ"));
        assert_eq!(draft.opening_message, format!("挑戦する姿勢が印象的でした。{CLOSING_SENTENCE}"));
        assert_eq!(
            draft.final_message,
            format!(
                "{}\n\n{}\n\n{FIXED_TEXT}",
                templates.greeting_a("挑戦を続ける姿勢のあなたへ"),
                draft.opening_message
            )
        );
        assert_eq!(llm.calls(), vec!["title", "opening_message"]);
    }

    #[tokio::test]
    async fn test_pattern_b_pipeline_uses_profile_line() {
        let line = "プロフィールを拝見し、経済学部で経済や経営について学ばれている点に興味を持ち、ご連絡しました。";
        let answer = format!(r#"{{"profile_line":"{line}"}}"#);
        let llm = StubGenerator::new(&[
            ("profile_line", answer.as_str()),
            ("opening_message", r#"{"opening_message":"前向きな姿勢を感じました。"}"#),
        ]);
        let draft = generate_scout(&llm, &ScoutTemplates::default(), SHORT_PR_PASTE)
            .await
            .unwrap();

        assert_eq!(draft.pattern, Pattern::B);
        assert!(draft.title.is_none());
        assert_eq!(draft.profile_line.as_deref(), Some(line));
        assert!(draft.final_message.starts_with("【就活相談OK｜カジュアル面談】"));
        assert!(draft.final_message.contains(line));
        assert!(draft.final_message.ends_with(FIXED_TEXT));
        assert_eq!(llm.calls(), vec!["profile_line", "opening_message"]);
    }

    #[tokio::test]
    async fn test_pattern_b_profile_failure_keeps_fixed_greeting() {
        let llm = StubGenerator::new(&[(
            "opening_message",
            r#"{"opening_message":"前向きな姿勢を感じました。"}"#,
        )]);
        let draft = generate_scout(&llm, &ScoutTemplates::default(), SHORT_PR_PASTE)
            .await
            .unwrap();
        assert!(draft.profile_line.is_none());
        let templates = ScoutTemplates::default();
        assert!(draft.final_message.starts_with(&templates.greeting_b(None)));
    }

    #[tokio::test]
    async fn test_pattern_b_without_faculty_skips_profile_call() {
        let llm = StubGenerator::new(&[(
            "opening_message",
            r#"{"opening_message":"前向きな姿勢を感じました。"}"#,
        )]);
        let draft = generate_scout(&llm, &ScoutTemplates::default(), "自己PR\n頑張ります。")
            .await
            .unwrap();
        assert_eq!(draft.pattern, Pattern::B);
        assert_eq!(llm.calls(), vec!["opening_message"]);
        assert!(draft
            .final_message
            .starts_with(&ScoutTemplates::default().greeting_b(None)));
    }

    #[tokio::test]
    async fn test_opening_upstream_error_passes_status_through() {
        let llm = StubGenerator::new(&[("title", r#"{"title":"挑戦を続ける姿勢のあなたへ"}"#)]);
        let err = generate_scout(&llm, &ScoutTemplates::default(), &long_pr_paste())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_opening_char_count_excludes_newlines() {
        let opening = "周囲を支えながらチームを前に進める力があると感じました。困難な状況でも諦めずに取り組む姿勢が伝わってきました。";
        let answer = format!(r#"{{"opening_message":"{opening}"}}"#);
        let llm = StubGenerator::new(&[("opening_message", answer.as_str())]);
        let draft = generate_scout(&llm, &ScoutTemplates::default(), "自己PR\n短い。")
            .await
            .unwrap();
        assert!(draft.opening_message.contains('\n'));
        assert_eq!(
            draft.opening_char_count,
            draft.opening_message.replace('\n', "").chars().count()
        );
    }
}
