// Prompt constants for the scout generation calls.
// Reuses the shared rules from llm_client::prompts.

use crate::llm_client::prompts::{SYSTEM_INSTRUCTION_BASE, TONE_INSTRUCTION};

const TITLE_ROLE: &str = "あなたは新卒スカウト文の見出しを作るライターです。";

const OPENING_ROLE: &str = "あなたは新卒スカウト文の「冒頭パート」だけを作るライターです。";

const OPENING_LAYOUT_RULES: &str = "【最重要ルール】
「。」（句点）ごとに改行する。
1文＝1行として書く。
冒頭パート全体で100〜150文字程度にする。";

const OPENING_SCOPE_RULES: &str = "【重要】
あなたが生成するのは「冒頭パート（opening_message）」のみです。
この後ろに続く会社紹介文などの固定文はアプリ側で別途結合します。";

/// The profile-line call carries its own shorter rule set.
pub const PROFILE_LINE_SYSTEM: &str = "あなたは新卒スカウト文作成のプロです。
必ず日本語で出力してください。
事実不明の創作は禁止です。
半角スペースは禁止です。
「」や**などの装飾は禁止です。
出力は必ずJSONのみで、指定キー以外は出力しません。";

pub fn title_system() -> String {
    format!("{TITLE_ROLE}\n{SYSTEM_INSTRUCTION_BASE}")
}

pub fn opening_system() -> String {
    format!(
        "{OPENING_ROLE}\n{SYSTEM_INSTRUCTION_BASE}\n\n{OPENING_LAYOUT_RULES}\n\n{TONE_INSTRUCTION}\n\n{OPENING_SCOPE_RULES}"
    )
}

/// Title prompt. Replace `{paste_text}` before sending.
pub const TITLE_PROMPT_TEMPLATE: &str = "【タスク】
以下のOfferBox貼り付けテキストを読み、スカウト文の見出し（title）を作成してください。

【要件】
- ちょうど20文字（厳守）
- 末尾は必ず「あなたへ」で終わる
- 学生の特徴を褒める（刺さる）見出しにする
- 「」は禁止
- ** **は禁止
- 半角スペースは禁止
- 絵文字は禁止

【例】
- 支える力が強みのあなたへ
- 周囲を巻き込めるあなたへ
- 挑戦を続ける姿勢のあなたへ

【出力形式】
JSONで {\"title\":\"...\"} のみを返してください。
JSON以外の文字は一切出さないでください。

【入力テキスト】
<<<PASTE_TEXT>>>
{paste_text}";

/// Opening-paragraph prompt. Replace `{paste_text}` before sending.
pub const OPENING_PROMPT_TEMPLATE: &str = "【タスク】
以下のOfferBox貼り付けテキストを読み、スカウト文の「冒頭パート」を作成してください。

【改行ルール（最重要・厳守）】
- 「。」（句点）ごとに改行する
- 1文＝1行として書く
- 「、」では改行しない

【全体の文字数】
- 冒頭パート全体で100〜150文字程度
- 3〜4文程度

【構成ルール】
- 最終行は必ず「ぜひ一度お話したくご連絡しました！」で終える

【内容ルール】
- 具体エピソードを最低1つ含める（詳しく書く）
- 冒頭で強みを要約し、その後にエピソードを入れる
- 学生の良さを具体的に言語化する

【文章トーン（重要）】
- トーンは協調型（寄り添い・押し付けない）
- 「上から目線」「評価っぽい表現」を避ける
- 人柄の断定を避ける（例：「〜な方です」より「〜な印象を受けました」）
- 推測・印象表現を使う（例：「〜と感じました」「〜のように拝見しました」）

【禁止事項】
- 「〇〇さん」などの呼びかけは禁止
- 「」** **、絵文字、半角スペースは禁止
- 個人特定情報は禁止
- 断定が強すぎる表現は禁止（例：「確信しています」「間違いなく」「必ず」「絶対に」）
- 過度な称賛は禁止（例：「素晴らしい」「感銘を受けました」「圧倒的」）

【良い例（句点で改行・柔らかい表現）】
周囲を支えながらチームを前に進める力があると感じました。
高校の球技大会でリーダーを務め、皆で成果を出した経験が印象的でした。
困難な状況でも諦めずに取り組む姿勢が伝わってきました。
人の成長を支援する当社の仕事に向いているのではと思いました。
ぜひ一度お話したくご連絡しました！

【悪い例】
- 句点で改行していない：周囲を支えながらチームを前に進める力があると感じました。高校の球技大会で...
- 断定が強い：あなたは間違いなくリーダーシップがあります。確信しています。
- 上から目線：素晴らしい経験をお持ちですね。感銘を受けました。

【出力形式】
JSONで {\"opening_message\":\"...\"} のみを返してください。
改行は \\n で表現してください。

【入力テキスト】
<<<PASTE_TEXT>>>
{paste_text}";

/// B-pattern profile line prompt. Replace `{faculty_name}` before sending.
pub const PROFILE_LINE_PROMPT_TEMPLATE: &str = "以下のスカウト文の「プロフィールを拝見し〜」の1文を、学部名に合わせて具体化してください。

【ルール】
- 出力は1文のみ（差し替え用）
- 形式は必ず以下：
  「プロフィールを拝見し、【学部名】で【一言要約】について学ばれている点に興味を持ち、ご連絡しました。」
- 【一言要約】は学部名から一般的に推測できる範囲で、短く（例：◯◯や◯◯）
- 学生は自己PRがほぼ空欄の前提なので、研究内容・経験の断定は禁止
- 「すごい」「感銘」「素晴らしい」など過度な称賛は禁止
- トーンは協調型（寄り添い・押し付けない）

【学部名】
{faculty_name}

【出力形式】
JSONで {\"profile_line\":\"...\"} のみを返してください。";
