use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Self-PR length (in chars) at which a profile gets the long-form template.
pub const SELF_PR_THRESHOLD: usize = 200;

/// Message template variant. Stored as `template_type` on delivery records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pattern {
    A,
    B,
}

impl Pattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pattern::A => "A",
            Pattern::B => "B",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Pattern::A),
            "B" => Ok(Pattern::B),
            other => Err(format!("template_type must be 'A' or 'B' (got '{other}')")),
        }
    }
}

/// `A` iff the candidate has at least `SELF_PR_THRESHOLD` chars. Inclusive boundary.
pub fn classify(candidate: &str) -> Pattern {
    if candidate.chars().count() >= SELF_PR_THRESHOLD {
        Pattern::A
    } else {
        Pattern::B
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repeat(s: &str, n: usize) -> String {
        s.repeat(n)
    }

    #[test]
    fn test_boundary_is_inclusive_for_a() {
        assert_eq!(classify(&repeat("あ", 200)), Pattern::A);
        assert_eq!(classify(&repeat("あ", 199)), Pattern::B);
    }

    #[test]
    fn test_empty_is_b() {
        assert_eq!(classify(""), Pattern::B);
    }

    #[test]
    fn test_surrogate_pair_chars_count_once() {
        // 200 emoji are 400 UTF-16 units and 800 bytes; still exactly 200 chars.
        assert_eq!(classify(&repeat("😀", 200)), Pattern::A);
        assert_eq!(classify(&repeat("😀", 150)), Pattern::B);
    }

    #[test]
    fn test_classify_matches_threshold_for_all_lengths() {
        for n in [0usize, 1, 100, 199, 200, 201, 500] {
            let text = repeat("字", n);
            assert_eq!(classify(&text) == Pattern::A, n >= SELF_PR_THRESHOLD);
        }
    }

    #[test]
    fn test_pattern_parse() {
        assert_eq!("A".parse::<Pattern>().unwrap(), Pattern::A);
        assert!("a".parse::<Pattern>().is_err());
        assert_eq!(Pattern::B.to_string(), "B");
    }

    #[test]
    fn test_pattern_serde() {
        assert_eq!(serde_json::to_string(&Pattern::A).unwrap(), "\"A\"");
        let p: Pattern = serde_json::from_str("\"B\"").unwrap();
        assert_eq!(p, Pattern::B);
    }
}
