//! Message boilerplate and assembly.
//!
//! `FIXED_TEXT` is copied into every message as-is. Line breaks, symbols and
//! full/half-width characters must not change, and reflow never touches it.

use crate::scout::reflow::ReflowConfig;

const SENDER_INTRO: &str = "初めまして。\nスタートライン新卒採用責任者の船戸です。";

const GREETING_B_HEADING: &str = "【就活相談OK｜カジュアル面談】";

const GREETING_B_QUESTION: &str = "就活でこんな気持ちになることありませんか？";

pub const FIXED_TEXT: &str = "◆＼当社の事業は一言で言うと…／
「人と企業のつなぐHRソリューション企業」
（架け橋となり、採用～定着～活躍を支援）

この仕事の面白さは、人の強みを見つけ、
個性を生かした、活躍の場をつくれること。

◆こんな気持ちが大切です。
---------------------------
・成長をサポートしたい
・「ありがとう」がやりがい
・誰かの可能性を広げたい
---------------------------

1つでも当てはまったら
当社の仕事は向いています！

是非、カジュアル面談にて
ざっくばらんにお話できれば嬉しいです！

承諾＝応募ではありません
就活相談だけでも歓迎です。
※希望する方には会社説明会をご案内(WEB)


◆＼働きやすさも整っています／
---------------------------
・土日祝休み／年休120日以上
・残業20時間以下／ＷＬＢ◎
・ジョブローテーション制度有
※数年で本社勤務など実績多数あり
---------------------------

お話できるのを楽しみにしています！

株式会社スタートライン
新卒採用責任者　船戸";

/// Read-only boilerplate, built once at startup and shared through `AppState`.
#[derive(Debug, Clone)]
pub struct ScoutTemplates {
    pub sender_intro: String,
    pub greeting_b_heading: String,
    pub greeting_b_question: String,
    pub fixed_text: String,
    /// Line policy for the generated opening paragraph.
    pub reflow: ReflowConfig,
}

impl Default for ScoutTemplates {
    fn default() -> Self {
        Self {
            sender_intro: SENDER_INTRO.to_string(),
            greeting_b_heading: GREETING_B_HEADING.to_string(),
            greeting_b_question: GREETING_B_QUESTION.to_string(),
            fixed_text: FIXED_TEXT.to_string(),
            reflow: ReflowConfig::default(),
        }
    }
}

impl ScoutTemplates {
    pub fn greeting_a(&self, title: &str) -> String {
        format!("【{title}】\n\n{}", self.sender_intro)
    }

    /// B greeting. The empty line before the question is the profile-line slot;
    /// without a line the slot stays empty.
    pub fn greeting_b(&self, profile_line: Option<&str>) -> String {
        let line = profile_line.map(str::trim).unwrap_or_default();
        format!(
            "{}\n\n{}\n\n{line}\n{}",
            self.greeting_b_heading, self.sender_intro, self.greeting_b_question
        )
    }

    pub fn assemble(&self, greeting: &str, body: &str) -> String {
        assemble(greeting, body, &self.fixed_text)
    }
}

pub fn assemble(greeting: &str, body: &str, fixed: &str) -> String {
    format!("{greeting}\n\n{body}\n\n{fixed}")
}
