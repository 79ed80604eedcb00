//! Opening-paragraph reflow.
//!
//! Generated prose is flattened and re-wrapped from scratch: sentences are
//! packed greedily into lines of at most `max_line_chars`, oversize sentences
//! are cut on `、` (or on particles once a fragment is long enough, or hard
//! at `max_line_chars` when neither applies), then the line count and minimum
//! line length are enforced by merging neighbours. Those merges take
//! precedence, so a merged line may exceed `max_line_chars`.
//! The closing sentence is an atomic chunk that always ends the last line.
//!
//! All lengths are counted in `char`s.

// ────────────────────────────────────────────────────────────────────────────
// Policy
// ────────────────────────────────────────────────────────────────────────────

pub const CLOSING_SENTENCE: &str = "ぜひ一度お話したくご連絡しました！";

const SPLIT_PARTICLES: &[char] = &['が', 'を', 'に', 'で', 'と', 'は', 'も', 'へ', 'や'];

#[derive(Debug, Clone)]
pub struct ReflowConfig {
    pub max_line_chars: usize,
    pub max_lines: usize,
    /// Lines shorter than this are merged into a neighbour.
    pub min_line_chars: usize,
    /// A particle only ends a fragment once the fragment has this many chars.
    pub particle_split_min: usize,
    pub particles: &'static [char],
    pub closing: &'static str,
}

impl Default for ReflowConfig {
    fn default() -> Self {
        Self {
            max_line_chars: 34,
            max_lines: 6,
            min_line_chars: 12,
            particle_split_min: 18,
            particles: SPLIT_PARTICLES,
            closing: CLOSING_SENTENCE,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Entry point
// ────────────────────────────────────────────────────────────────────────────

/// Reflows `raw` into newline-joined lines ending with the closing sentence.
///
/// Never call this on the fixed company block; that text is assembled verbatim.
pub fn reflow(raw: &str, config: &ReflowConfig) -> String {
    let text = normalize(raw);
    if text.is_empty() {
        return config.closing.to_string();
    }

    let body = body_before_closing(&text, config);
    let mut lines = pack_lines(&body, config);

    merge_to_max_lines(&mut lines, config.max_lines);
    merge_short_lines(&mut lines, config.min_line_chars);
    ensure_closing_last(&mut lines, config);

    lines.join("\n")
}

/// Character count of a reflowed paragraph, newlines excluded.
pub fn visible_char_count(reflowed: &str) -> usize {
    reflowed.chars().filter(|c| *c != '\n').count()
}

// ────────────────────────────────────────────────────────────────────────────
// Steps
// ────────────────────────────────────────────────────────────────────────────

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_ideographic = false;
    for c in raw.chars() {
        match c {
            ' ' | '\t' | '\r' | '\n' => continue,
            '\u{3000}' => {
                if !prev_ideographic {
                    out.push(c);
                }
                prev_ideographic = true;
            }
            _ => {
                out.push(c);
                prev_ideographic = false;
            }
        }
    }
    out.trim().to_string()
}

/// Text preceding the closing sentence. Anything after its first occurrence is
/// dropped; when it is absent the body gets terminal punctuation instead.
fn body_before_closing(text: &str, config: &ReflowConfig) -> String {
    match text.find(config.closing) {
        Some(idx) => text[..idx].to_string(),
        None => {
            let mut body = text.to_string();
            if !body.ends_with(&['。', '！', '!'][..]) {
                body.push('。');
            }
            body
        }
    }
}

/// Splits after every char matching `is_delim`, keeping the delimiter.
fn split_after(text: &str, is_delim: impl Fn(char) -> bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut buf = String::new();
    for c in text.chars() {
        buf.push(c);
        if is_delim(c) {
            parts.push(std::mem::take(&mut buf));
        }
    }
    if !buf.is_empty() {
        parts.push(buf);
    }
    parts
}

/// Cuts an oversize sentence on `、`, else on particles, then hard-cuts any
/// fragment still longer than `max_line_chars`.
fn split_oversize(chunk: &str, config: &ReflowConfig) -> Vec<String> {
    soft_fragments(chunk, config)
        .into_iter()
        .flat_map(|part| hard_cut(&part, config.max_line_chars))
        .collect()
}

fn hard_cut(part: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = part.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

fn soft_fragments(chunk: &str, config: &ReflowConfig) -> Vec<String> {
    if chunk.contains('、') {
        return split_after(chunk, |c| c == '、');
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for c in chunk.chars() {
        current.push(c);
        current_len += 1;
        if current_len >= config.particle_split_min && config.particles.contains(&c) {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn push_line(lines: &mut Vec<String>, s: &str) {
    let v = s.trim();
    if !v.is_empty() {
        lines.push(v.to_string());
    }
}

fn feed_chunk(lines: &mut Vec<String>, chunk: &str, config: &ReflowConfig) {
    if chunk.is_empty() {
        return;
    }
    let chunk_len = char_len(chunk);

    if let Some(last) = lines.last_mut() {
        if char_len(last) + chunk_len <= config.max_line_chars {
            last.push_str(chunk);
            return;
        }
    }

    if chunk_len > config.max_line_chars {
        let mut acc = String::new();
        for part in split_oversize(chunk, config) {
            if char_len(&acc) + char_len(&part) <= config.max_line_chars {
                acc.push_str(&part);
            } else {
                push_line(lines, &acc);
                acc = part;
            }
        }
        push_line(lines, &acc);
        return;
    }

    push_line(lines, chunk);
}

/// The closing joins the last line when it fits, otherwise becomes its own line.
fn feed_closing(lines: &mut Vec<String>, config: &ReflowConfig) {
    let closing_len = char_len(config.closing);
    match lines.last_mut() {
        Some(last) if char_len(last) + closing_len <= config.max_line_chars => {
            last.push_str(config.closing);
        }
        _ => lines.push(config.closing.to_string()),
    }
}

fn pack_lines(body: &str, config: &ReflowConfig) -> Vec<String> {
    let mut lines = Vec::new();
    for sentence in split_after(body, |c| c == '。') {
        feed_chunk(&mut lines, &sentence, config);
    }
    feed_closing(&mut lines, config);
    lines
}

/// Merges the adjacent pair with the smallest combined length until at most
/// `max_lines` remain. Ties go to the earliest pair.
fn merge_to_max_lines(lines: &mut Vec<String>, max_lines: usize) {
    while lines.len() > max_lines {
        let Some(idx) = (0..lines.len() - 1)
            .min_by_key(|&i| char_len(&lines[i]) + char_len(&lines[i + 1]))
        else {
            break;
        };
        let next = lines.remove(idx + 1);
        lines[idx].push_str(&next);
    }
}

/// Lines under `min_chars` fold into the previous line; a short first line
/// folds into the second.
fn merge_short_lines(lines: &mut Vec<String>, min_chars: usize) {
    let mut i = 0;
    while i < lines.len() {
        if lines.len() > 1 && char_len(&lines[i]) < min_chars {
            if i > 0 {
                let line = lines.remove(i);
                lines[i - 1].push_str(&line);
            } else {
                let first = lines.remove(0);
                lines[0].insert_str(0, &first);
            }
            continue;
        }
        i += 1;
    }
}

/// Rebuilds the tail when the closing is missing from the end of the last line
/// or occurs more than once.
fn ensure_closing_last(lines: &mut Vec<String>, config: &ReflowConfig) {
    let occurrences: usize = lines.iter().map(|l| l.matches(config.closing).count()).sum();
    let ends_last = lines.last().is_some_and(|l| l.ends_with(config.closing));
    if occurrences == 1 && ends_last {
        return;
    }

    let body = lines.concat().replace(config.closing, "");
    let mut rebuilt = Vec::new();
    for sentence in split_after(&body, |c| c == '。') {
        feed_chunk(&mut rebuilt, &sentence, config);
    }
    merge_to_max_lines(&mut rebuilt, config.max_lines.saturating_sub(1));

    match rebuilt.last_mut() {
        Some(last) if config.max_lines <= 1 => last.push_str(config.closing),
        _ => rebuilt.push(config.closing.to_string()),
    }
    *lines = rebuilt;
}
