// Shared prompt fragments.
// Each service that needs generation calls defines its own prompts.rs alongside it.
// This file contains the cross-cutting rules every scout prompt carries.

/// Base rules appended to every scout system instruction.
pub const SYSTEM_INSTRUCTION_BASE: &str = "必ず日本語で出力してください。
個人特定情報（氏名・住所・電話番号・メールアドレス・学籍番号・学生番号・SNS ID等）を出力に含めません。
事実不明の創作はしません（入力テキストにない経験・実績は書かない）。
誇張表現（例：必ず成功、トップレベル等）は避けます。
括弧（「」）や強調記号（**）などの装飾は一切使用しません。
出力は必ずJSONのみで、指定キー以外は出力しません。
半角スペース（ASCIIスペース）を一切出力しないでください。
文章中に不要な空白を入れないでください。
「〇〇さん」「○○さん」などの呼びかけ表現は絶対に使わないでください。名前は特定できないため不要です。";

/// Tone rules shared by the opening-message prompts.
pub const TONE_INSTRUCTION: &str = "【断定表現の禁止・言い換えルール】
- 断定が強すぎる表現は禁止（例：「確信しています」「間違いなく」「必ず」「絶対に」「100%」）
- 自然体で柔らかい表現に言い換えること
- 推測・印象表現を優先すること（例：「〜と感じました」「〜のように拝見しました」「〜と思いました」「〜かもしれません」）
- 過度な称賛は禁止（例：「素晴らしい」「感銘を受けました」「圧倒的」「卓越した」など）";
