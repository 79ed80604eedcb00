//! Field extractors: best-effort structured fields from a pasted profile.
//!
//! Every extractor is total: it never fails and never mutates its input. Each one
//! is an ordered strategy list; the first strategy returning `Some` wins.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// The 47 prefectures, in the fixed order used for first-match tie-breaking.
pub const PREFECTURES: [&str; 47] = [
    "北海道", "青森県", "岩手県", "宮城県", "秋田県", "山形県", "福島県",
    "茨城県", "栃木県", "群馬県", "埼玉県", "千葉県", "東京都", "神奈川県",
    "新潟県", "富山県", "石川県", "福井県", "山梨県", "長野県", "岐阜県",
    "静岡県", "愛知県", "三重県", "滋賀県", "京都府", "大阪府", "兵庫県",
    "奈良県", "和歌山県", "鳥取県", "島根県", "岡山県", "広島県", "山口県",
    "徳島県", "香川県", "愛媛県", "高知県", "福岡県", "佐賀県", "長崎県",
    "熊本県", "大分県", "宮崎県", "鹿児島県", "沖縄県",
];

/// Source text timestamps are Japan wall-clock time.
pub const JST_OFFSET_SECS: i32 = 9 * 3600;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    Unknown,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
            Gender::Unknown => "unknown",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            "unknown" => Ok(Gender::Unknown),
            other => Err(format!(
                "gender must be one of male, female, other, unknown (got '{other}')"
            )),
        }
    }
}

/// All fields extracted from one paste. Each is independently nullable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub student_id7: Option<String>,
    pub university_name: Option<String>,
    pub faculty_name: Option<String>,
    pub department_name: Option<String>,
    pub prefecture: Option<String>,
    pub graduation_year: Option<String>,
    pub gender: Gender,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Runs every extractor over the paste.
pub fn extract_fields(text: &str) -> ExtractedFields {
    ExtractedFields {
        student_id7: extract_student_id7(text),
        university_name: extract_university_name(text),
        faculty_name: extract_faculty_name(text),
        department_name: extract_department_name(text),
        prefecture: extract_prefecture(text),
        graduation_year: extract_graduation_year(text),
        gender: extract_gender(text),
        last_login_at: extract_last_login_at(text),
    }
}

type Strategy<T> = fn(&str) -> Option<T>;

fn first_match<T>(text: &str, strategies: &[Strategy<T>]) -> Option<T> {
    if text.is_empty() {
        return None;
    }
    strategies.iter().find_map(|strategy| strategy(text))
}

static STUDENT_ID_LABELED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)ID\s*[:：]?\s*([0-9]{7})(?:[^0-9]|$)").unwrap());
static DIGIT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());

static LOGIN_LABELED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:最終ログイン日時|最終ログイン|ログイン日時)\s*[:：]?\s*([0-9]{4})[/\-]([0-9]{1,2})[/\-]([0-9]{1,2})\s*([0-9]{1,2}):([0-9]{2})",
    )
    .unwrap()
});
static LOGIN_ANY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]{4})[/\-]([0-9]{1,2})[/\-]([0-9]{1,2})\s*([0-9]{1,2}):([0-9]{2})").unwrap()
});

static UNIVERSITY_LABELED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:大学名|学校名)[ \t　]*[:：][ \t　]*([^\n\r]+)").unwrap());
static UNIVERSITY_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+大学").unwrap());

static FACULTY_LABELED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"学部[ \t　]*[:：][ \t　]*([^\n\r]+)").unwrap());
// The prefix run may not contain 大 or 学, so "○○大学○○学部" yields only the faculty.
static FACULTY_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\s大学]+学部").unwrap());

static DEPARTMENT_LABELED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"学科[ \t　]*[:：][ \t　]*([^\n\r]+)").unwrap());
static DEPARTMENT_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+学科").unwrap());

static PREFECTURE_LABELED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:都道府県|出身地|居住地|住所)[ \t　]*[:：][ \t　]*([^\n\r]+)").unwrap()
});

static GRAD_FULL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]{4})年卒").unwrap());
static GRAD_SHORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]{2})卒").unwrap());
static GRAD_LABELED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"卒業(?:予定)?\s*[:：]?\s*([0-9]{4})年").unwrap());

static GENDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"性別\s*[:：]?\s*(男性|女性|その他|男|女)").unwrap());

// ────────────────────────────────────────────────────────────────────────────
// Student ID
// ────────────────────────────────────────────────────────────────────────────

pub fn extract_student_id7(text: &str) -> Option<String> {
    first_match(text, &[student_id_labeled, student_id_isolated])
}

fn student_id_labeled(text: &str) -> Option<String> {
    STUDENT_ID_LABELED_RE
        .captures(text)
        .map(|c| c[1].to_string())
}

/// First run of exactly 7 ASCII digits not glued to an ASCII word character.
fn student_id_isolated(text: &str) -> Option<String> {
    DIGIT_RUN_RE.find_iter(text).find_map(|m| {
        let before = text[..m.start()].chars().next_back();
        let after = text[m.end()..].chars().next();
        let glued = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        (m.as_str().len() == 7 && !glued(before) && !glued(after)).then(|| m.as_str().to_string())
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Last login
// ────────────────────────────────────────────────────────────────────────────

pub fn extract_last_login_at(text: &str) -> Option<DateTime<Utc>> {
    first_match(text, &[last_login_labeled, last_login_any])
}

fn last_login_labeled(text: &str) -> Option<DateTime<Utc>> {
    LOGIN_LABELED_RE.captures(text).and_then(|c| jst_from_captures(&c))
}

fn last_login_any(text: &str) -> Option<DateTime<Utc>> {
    LOGIN_ANY_RE.captures(text).and_then(|c| jst_from_captures(&c))
}

/// Interprets captured `Y M D h m` as a +09:00 wall-clock time.
fn jst_from_captures(caps: &Captures<'_>) -> Option<DateTime<Utc>> {
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    let hour: u32 = caps[4].parse().ok()?;
    let minute: u32 = caps[5].parse().ok()?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
    FixedOffset::east_opt(JST_OFFSET_SECS)?
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

// ────────────────────────────────────────────────────────────────────────────
// University / faculty / department
// ────────────────────────────────────────────────────────────────────────────

fn labeled_value(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|v| !v.is_empty())
}

fn suffix_match(re: &Regex, text: &str) -> Option<String> {
    re.find(text).map(|m| m.as_str().trim().to_string())
}

pub fn extract_university_name(text: &str) -> Option<String> {
    first_match(
        text,
        &[
            |t| labeled_value(&UNIVERSITY_LABELED_RE, t),
            |t| suffix_match(&UNIVERSITY_SUFFIX_RE, t),
        ],
    )
}

pub fn extract_faculty_name(text: &str) -> Option<String> {
    first_match(
        text,
        &[
            |t| labeled_value(&FACULTY_LABELED_RE, t),
            |t| suffix_match(&FACULTY_SUFFIX_RE, t),
        ],
    )
}

pub fn extract_department_name(text: &str) -> Option<String> {
    first_match(
        text,
        &[
            |t| labeled_value(&DEPARTMENT_LABELED_RE, t),
            |t| suffix_match(&DEPARTMENT_SUFFIX_RE, t),
        ],
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Prefecture
// ────────────────────────────────────────────────────────────────────────────

pub fn is_prefecture(value: &str) -> bool {
    PREFECTURES.contains(&value)
}

fn first_prefecture_in(value: &str) -> Option<String> {
    PREFECTURES
        .iter()
        .find(|pref| value.contains(*pref))
        .map(|pref| pref.to_string())
}

pub fn extract_prefecture(text: &str) -> Option<String> {
    first_match(
        text,
        &[
            |t| {
                PREFECTURE_LABELED_RE
                    .captures(t)
                    .and_then(|c| first_prefecture_in(&c[1]))
            },
            first_prefecture_in,
        ],
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Graduation year
// ────────────────────────────────────────────────────────────────────────────

pub fn extract_graduation_year(text: &str) -> Option<String> {
    first_match(text, &[graduation_full, graduation_short, graduation_labeled])
}

fn graduation_full(text: &str) -> Option<String> {
    GRAD_FULL_RE.captures(text).map(|c| format!("{}卒", &c[1]))
}

/// Two-digit year: 00–50 → 2000s, 51–99 → 1900s.
fn graduation_short(text: &str) -> Option<String> {
    let caps = GRAD_SHORT_RE.captures(text)?;
    let yy: u32 = caps[1].parse().ok()?;
    let year = if yy <= 50 { 2000 + yy } else { 1900 + yy };
    Some(format!("{year}卒"))
}

fn graduation_labeled(text: &str) -> Option<String> {
    GRAD_LABELED_RE.captures(text).map(|c| format!("{}卒", &c[1]))
}

// ────────────────────────────────────────────────────────────────────────────
// Gender
// ────────────────────────────────────────────────────────────────────────────

/// `Unknown` (never `None`) when the paste carries no gender field.
pub fn extract_gender(text: &str) -> Gender {
    let Some(caps) = GENDER_RE.captures(text) else {
        return Gender::Unknown;
    };
    match &caps[1] {
        "男性" | "男" => Gender::Male,
        "女性" | "女" => Gender::Female,
        "その他" => Gender::Other,
        _ => Gender::Unknown,
    }
}
