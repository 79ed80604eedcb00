//! Self-PR extractor. Finds the block of the paste that holds the student's
//! self-promotion narrative.
//!
//! Heading search runs in keyword priority order, not document order: a later
//! 自己PR heading wins over an earlier 強み heading. With no usable heading the
//! longest blank-line-delimited section is returned.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Heading keywords, highest priority first.
pub const PR_HEADINGS: [&str; 5] = ["自己PR", "アピール", "強み", "ガクチカ", "学生時代に力を入れたこと"];

/// Glyphs that open a new labeled section in pasted profiles.
const SECTION_GLYPHS: &[char] = &[
    '【', '[', '［', '■', '□', '◆', '◇', '●', '○', '▼', '▽', '★', '☆', '《', '＜', '<',
];

/// Words that mark a short line as the heading of an unrelated section.
const SECTION_WORDS: &[&str] = &["資格", "趣味", "特技", "スキル", "語学"];

/// Lines at or under this length are candidates for the section-word heuristic.
const SHORT_LINE_MAX_CHARS: usize = 20;

/// This many consecutive blank lines end a block.
const BLANK_RUN_LIMIT: usize = 3;

static SECTION_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelfPrCandidate {
    pub text: String,
    /// Length in Unicode scalar values.
    pub char_count: usize,
}

impl SelfPrCandidate {
    fn new(text: String) -> Self {
        let char_count = text.chars().count();
        Self { text, char_count }
    }
}

pub fn extract_self_pr(text: &str) -> SelfPrCandidate {
    let normalized = text.replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.split('\n').collect();

    for keyword in PR_HEADINGS {
        if let Some(block) = block_after_heading(&lines, keyword) {
            return SelfPrCandidate::new(block);
        }
    }

    SelfPrCandidate::new(longest_section(&normalized))
}

/// Scans top to bottom for `keyword`; returns the first non-empty block that follows it.
fn block_after_heading(lines: &[&str], keyword: &str) -> Option<String> {
    for (i, line) in lines.iter().enumerate() {
        if !line.contains(keyword) {
            continue;
        }
        let block = collect_block(&lines[i + 1..]);
        if !block.is_empty() {
            return Some(block);
        }
    }
    None
}

fn collect_block(lines: &[&str]) -> String {
    let mut collected: Vec<&str> = Vec::new();
    let mut blank_run = 0;

    for line in lines {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run >= BLANK_RUN_LIMIT {
                break;
            }
            collected.push(line);
            continue;
        }
        if starts_new_section(line) {
            break;
        }
        blank_run = 0;
        collected.push(line);
    }

    let start = collected
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(collected.len());
    let end = collected
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(start, |i| i + 1);

    collected[start..end].join("\n")
}

/// Brackets and separators allowed around a bare heading keyword.
const HEADING_DECORATION: &[char] = &[
    '【', '】', '[', ']', '［', '］', '(', ')', '（', '）', '<', '>', '＜', '＞', '《', '》',
    ':', '：', '■', '◆', '●', '★', ' ', '\u{3000}',
];

fn starts_new_section(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.starts_with(SECTION_GLYPHS) || is_bare_pr_heading(trimmed) {
        return true;
    }
    trimmed.chars().count() <= SHORT_LINE_MAX_CHARS
        && SECTION_WORDS.iter().any(|w| trimmed.contains(w))
}

/// A line that is nothing but a heading keyword, optionally bracketed or
/// followed by a colon. Body sentences mentioning 強み etc. do not qualify.
fn is_bare_pr_heading(line: &str) -> bool {
    let bare = line.trim_matches(HEADING_DECORATION);
    PR_HEADINGS.contains(&bare)
}

/// Longest section by char count (first wins ties); the trimmed text when there are none.
fn longest_section(text: &str) -> String {
    let mut best: Option<(&str, usize)> = None;
    for section in SECTION_SPLIT_RE.split(text) {
        if section.trim().is_empty() {
            continue;
        }
        let section = section.trim_matches(|c| c == '\n' || c == '\r');
        let len = section.chars().count();
        if best.map_or(true, |(_, best_len)| len > best_len) {
            best = Some((section, len));
        }
    }
    match best {
        Some((section, _)) => section.to_string(),
        None => text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repeat(c: char, n: usize) -> String {
        std::iter::repeat(c).take(n).collect()
    }

    #[test]
    fn test_heading_block_until_blank_line_scenario() {
        let body = repeat('あ', 250);
        let text = format!("プロフィール\n自己PR\n{body}\n\n");
        let c = extract_self_pr(&text);
        assert_eq!(c.char_count, 250);
        assert_eq!(c.text, body);
    }

    #[test]
    fn test_no_heading_picks_longest_paragraph_scenario() {
        let short = repeat('い', 50);
        let long = repeat('う', 80);
        let text = format!("{short}\n\n{long}");
        let c = extract_self_pr(&text);
        assert_eq!(c.text, long);
        assert_eq!(c.char_count, 80);
    }

    #[test]
    fn test_priority_order_beats_document_order() {
        let text = "強み\n粘り強さです。\n\n\n\n自己PR\n私はサークルの代表を務めました。";
        assert_eq!(extract_self_pr(text).text, "私はサークルの代表を務めました。");
    }

    #[test]
    fn test_block_stops_at_bracket_heading() {
        let text = "自己PR\n一行目です。\n二行目です。\n【資格】\n普通自動車免許";
        assert_eq!(extract_self_pr(text).text, "一行目です。\n二行目です。");
    }

    #[test]
    fn test_block_stops_at_short_section_word_line() {
        let text = "アピール\n接客のアルバイトを三年続けました。\n趣味\n読書";
        assert_eq!(
            extract_self_pr(text).text,
            "接客のアルバイトを三年続けました。"
        );
    }

    #[test]
    fn test_long_line_with_section_word_does_not_stop() {
        let line = "資格取得のために毎朝二時間勉強を続け、半年で合格しました。";
        let text = format!("自己PR\n{line}\n続きの文章です。");
        assert_eq!(extract_self_pr(&text).text, format!("{line}\n続きの文章です。"));
    }

    #[test]
    fn test_block_survives_two_blank_lines_and_stops_at_three() {
        let text = "自己PR\n一段落目。\n\n\n二段落目。\n\n\n\n無関係な情報";
        assert_eq!(extract_self_pr(text).text, "一段落目。\n\n\n二段落目。");
    }

    #[test]
    fn test_empty_heading_block_falls_through() {
        let text = "自己PR\n\n\n\n\n\nガクチカ\n学園祭の実行委員として企画を担当しました。";
        assert_eq!(
            extract_self_pr(text).text,
            "学園祭の実行委員として企画を担当しました。"
        );
    }

    #[test]
    fn test_heading_words_inside_body_do_not_end_block() {
        let filler = repeat('あ', 195);
        let text = format!("自己PR\n私の強みは傾聴力です。\n{filler}\n\n趣味\n読書");
        let c = extract_self_pr(&text);
        assert!(c.text.starts_with("私の強みは傾聴力です。"));
        assert_eq!(c.char_count, 207);
        assert_eq!(crate::extraction::classify(&c.text), crate::extraction::Pattern::A);
    }

    #[test]
    fn test_short_body_line_with_appeal_word_is_kept() {
        let text = "自己PR\nアピールは粘り強さ。\n最後までやり抜きます。";
        assert_eq!(
            extract_self_pr(text).text,
            "アピールは粘り強さ。\n最後までやり抜きます。"
        );
    }

    #[test]
    fn test_bare_pr_heading_ends_block() {
        let text = "自己PR\n部活動を続けました。\n【強み】\n継続力";
        assert_eq!(extract_self_pr(text).text, "部活動を続けました。");
        let text = "自己PR\n部活動を続けました。\n強み：\n継続力";
        assert_eq!(extract_self_pr(text).text, "部活動を続けました。");
    }

    #[test]
    fn test_empty_input_yields_empty_candidate() {
        let c = extract_self_pr("");
        assert_eq!(c.text, "");
        assert_eq!(c.char_count, 0);
    }

    #[test]
    fn test_crlf_input() {
        let text = "自己PR\r\n努力を続けました。\r\n\r\n";
        assert_eq!(extract_self_pr(text).text, "努力を続けました。");
    }

    #[test]
    fn test_counts_code_points_not_utf16_units() {
        let text = "自己PR\n😀😀😀";
        assert_eq!(extract_self_pr(text).char_count, 3);
    }

    #[test]
    fn test_idempotent_on_extracted_block() {
        let text = "自己PR\n私は粘り強い性格です。\n部活動で主将を務めました。\n\n【趣味】\n旅行";
        let first = extract_self_pr(text);
        let second = extract_self_pr(&first.text);
        assert_eq!(first, second);
    }
}
