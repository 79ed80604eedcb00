/// LLM Client: the single point of entry for all generative-language API calls.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// Everything goes through the `TextGenerator` trait so the scout pipeline can
/// run against a stub in tests.
///
/// Model: gemini-2.0-flash (hardcoded)
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";
/// The model used for all generation calls.
pub const MODEL: &str = "gemini-2.0-flash";
const TEMPERATURE: f32 = 0.4;
const MAX_OUTPUT_TOKENS: u32 = 512;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("No response from Gemini")]
    EmptyContent,

    #[error("GEMINI_API_KEY is not configured")]
    NotConfigured,
}

/// One generation call: instruction, prompt, and the single JSON key the
/// response schema asks for.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    pub response_key: &'a str,
}

/// Produces raw candidate text for a generation request.
///
/// Output is NOT trusted: callers run it through `extract_json_field` and their
/// own length/space re-validation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
}

impl GeminiResponse {
    /// Extracts the text of the first part of the first candidate.
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
    }
}

/// Single-property JSON schema: `{ key: string }`, key required.
fn response_schema(key: &str) -> Value {
    json!({
        "type": "object",
        "properties": { key: { "type": "string" } },
        "required": [key],
    })
}

/// Gemini `generateContent` client. No retries: a failed call surfaces
/// immediately and the caller re-invokes.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            api_key,
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::NotConfigured)?;

        let body = GeminiRequest {
            system_instruction: GeminiContent {
                parts: vec![GeminiPart {
                    text: request.system,
                }],
            },
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
                response_mime_type: "application/json",
                response_schema: response_schema(request.response_key),
            },
        };

        let response = self
            .client
            .post(GEMINI_API_URL)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Gemini API returned {}: {}", status, message);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GeminiResponse = response.json().await?;
        let text = parsed.text().ok_or(LlmError::EmptyContent)?;

        debug!(
            key = request.response_key,
            chars = text.chars().count(),
            "Gemini call succeeded"
        );

        Ok(text.to_string())
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

static FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?\s*").unwrap());

/// Pulls a single string field out of collaborator output.
///
/// Order: JSON parse → `"key": "..."` regex → fence-stripped raw text
/// truncated to `fallback_max` chars.
pub fn extract_json_field(raw: &str, key: &str, fallback_max: usize) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(strip_json_fences(raw)) {
        if let Some(Value::String(s)) = map.get(key) {
            if !s.is_empty() {
                return s.clone();
            }
        }
    }

    let pattern = format!(r#""{}"\s*:\s*"([^"]+)""#, regex::escape(key));
    if let Ok(re) = Regex::new(&pattern) {
        if let Some(m) = re.captures(raw).and_then(|c| c.get(1)) {
            return m.as_str().to_string();
        }
    }

    let cleaned = FENCE_RE.replace_all(raw, "");
    truncate_chars(cleaned.trim(), fallback_max)
}

/// Truncates to at most `max` chars (Unicode scalar values, never bytes).
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_extract_field_from_clean_json() {
        let raw = r#"{"title":"挑戦を続ける姿勢のあなたへ"}"#;
        assert_eq!(extract_json_field(raw, "title", 20), "挑戦を続ける姿勢のあなたへ");
    }

    #[test]
    fn test_extract_field_from_fenced_json() {
        let raw = "```json\n{\"opening_message\": \"感じました。\"}\n```";
        assert_eq!(extract_json_field(raw, "opening_message", 300), "感じました。");
    }

    #[test]
    fn test_extract_field_regex_fallback_on_broken_json() {
        let raw = r#"{"title": "周囲を巻き込めるあなたへ", trailing garbage"#;
        assert_eq!(extract_json_field(raw, "title", 20), "周囲を巻き込めるあなたへ");
    }

    #[test]
    fn test_extract_field_truncates_plain_text() {
        let raw = "あいうえおかきくけこさしすせそたちつてとなにぬねの";
        let out = extract_json_field(raw, "title", 20);
        assert_eq!(out.chars().count(), 20);
        assert!(raw.starts_with(&out));
    }

    #[test]
    fn test_extract_field_wrong_key_falls_back() {
        let raw = r#"{"other":"x"}"#;
        assert_eq!(extract_json_field(raw, "title", 5), "{\"oth");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        assert_eq!(truncate_chars("😀😀😀", 2), "😀😀");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }

    #[test]
    fn test_gemini_response_text() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"{\"title\":\"x\"}"}]}}]}"#;
        let parsed: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.text(), Some("{\"title\":\"x\"}"));
    }

    #[test]
    fn test_gemini_response_without_candidates() {
        let parsed: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.text(), None);
    }

    #[test]
    fn test_response_schema_names_single_key() {
        let schema = response_schema("profile_line");
        assert_eq!(schema["properties"]["profile_line"]["type"], "string");
        assert_eq!(schema["required"][0], "profile_line");
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let client = GeminiClient::new(None).unwrap();
        let req = GenerationRequest {
            system: "s",
            prompt: "p",
            response_key: "title",
        };
        assert!(matches!(
            client.generate(&req).await,
            Err(LlmError::NotConfigured)
        ));
    }
}
