//! Matcher - 返信メッセージとタスクの対応付け（キーワード重なりヒューリスティック）
//!
//! # 判定手順
//! 1. 生成 bot 以外の投稿は捨てる
//! 2. 添付ファイルのない投稿は捨てる
//! 3. 本文を空白で分割して小文字化
//! 4. プロンプトも同様に分割し、先頭 8 トークンから 3 文字以下を除いたものをキーワードとする
//! 5. 両者の集合の共通部分を数える（重複は 1 回）
//! 6. 共通部分が 2 以上、またはキーワード数が 2 以下ならマッチ
//! 7. 画像拡張子（png / jpg / jpeg / webp）の添付 URL が空ならマッチしない
//!
//! これは best-effort です。語彙が重なる 2 つのタスクが同じ返信を取り合った場合は
//! 先にスキャンした側が勝ちます（それ以上の区別はしない）。

use std::collections::HashSet;

use crate::domain::InboundMessage;

/// Only the first few prompt tokens are considered.
pub const PROMPT_TOKEN_WINDOW: usize = 8;

/// Tokens shorter than this (in characters) are dropped as low-signal.
pub const MIN_KEYWORD_CHARS: usize = 4;

/// Shared keywords needed for a match.
pub const REQUIRED_OVERLAP: usize = 2;

/// A message accepted as the reply to a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedResponse {
    pub message_id: String,
    pub image_urls: Vec<String>,
}

pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Keyword set of a prompt: first [`PROMPT_TOKEN_WINDOW`] tokens, minus short ones.
pub fn prompt_keywords(prompt: &str) -> HashSet<String> {
    tokenize(prompt)
        .into_iter()
        .take(PROMPT_TOKEN_WINDOW)
        .filter(|token| token.chars().count() >= MIN_KEYWORD_CHARS)
        .collect()
}

/// Does the message text overlap the prompt enough?
pub fn keywords_match(prompt: &str, content: &str) -> bool {
    let keywords = prompt_keywords(prompt);
    // 2 語以下のプロンプトでは「2 語一致」が厳しすぎるので無条件で受け入れる
    if keywords.len() <= REQUIRED_OVERLAP {
        return true;
    }
    let tokens: HashSet<String> = tokenize(content).into_iter().collect();
    keywords.intersection(&tokens).count() >= REQUIRED_OVERLAP
}

/// Evaluate one message against one prompt.
pub fn evaluate(prompt: &str, message: &InboundMessage, generator_id: &str) -> Option<MatchedResponse> {
    if message.author_id != generator_id || message.attachments.is_empty() {
        return None;
    }
    if !keywords_match(prompt, &message.content) {
        return None;
    }
    let image_urls = message.image_urls();
    if image_urls.is_empty() {
        return None;
    }
    Some(MatchedResponse {
        message_id: message.id.clone(),
        image_urls,
    })
}

/// First valid match in scan order.
pub fn find_match<'a, I>(prompt: &str, messages: I, generator_id: &str) -> Option<MatchedResponse>
where
    I: IntoIterator<Item = &'a InboundMessage>,
{
    messages
        .into_iter()
        .find_map(|message| evaluate(prompt, message, generator_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Attachment;
    use chrono::Utc;
    use rstest::rstest;

    const GENERATOR: &str = "936929561302675456";

    fn message(id: &str, author: &str, content: &str, files: &[&str]) -> InboundMessage {
        InboundMessage {
            id: id.into(),
            author_id: author.into(),
            content: content.into(),
            attachments: files
                .iter()
                .map(|f| Attachment::new(*f, format!("https://cdn/{f}")))
                .collect(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn keywords_drop_short_tokens_and_respect_window() {
        let keywords = prompt_keywords("a red fox jumps over the lazy dog");
        let expected: HashSet<String> = ["jumps", "over", "lazy"].iter().map(|s| s.to_string()).collect();
        assert_eq!(keywords, expected);

        // 9 語目以降は無視
        let keywords = prompt_keywords("one two six ten red big old new castle");
        assert!(keywords.is_empty());
    }

    #[test]
    fn fox_reply_matches() {
        let reply = message("1", GENERATOR, "Red Fox Jumps over rocks", &["fox.png"]);
        let found = evaluate("a red fox jumps over the lazy dog", &reply, GENERATOR).unwrap();
        assert_eq!(found.image_urls, vec!["https://cdn/fox.png".to_string()]);
    }

    #[test]
    fn short_prompt_matches_any_image_reply() {
        let reply = message("1", GENERATOR, "completely unrelated", &["x.webp"]);
        assert!(evaluate("cat", &reply, GENERATOR).is_some());
    }

    #[rstest]
    #[case::wrong_author("someone-else", "red fox jumps over", &["fox.png"])]
    #[case::no_attachments(GENERATOR, "red fox jumps over", &[])]
    #[case::only_text_files(GENERATOR, "red fox jumps over", &["notes.txt", "log.txt"])]
    #[case::one_keyword(GENERATOR, "lazy afternoon", &["fox.png"])]
    fn non_matches(#[case] author: &str, #[case] content: &str, #[case] files: &[&str]) {
        let reply = message("1", author, content, files);
        assert!(evaluate("a red fox jumps over the lazy dog", &reply, GENERATOR).is_none());
    }

    #[test]
    fn text_attachment_never_matches_even_for_short_prompts() {
        let reply = message("1", GENERATOR, "cat", &["cat.txt"]);
        assert!(evaluate("cat", &reply, GENERATOR).is_none());
    }

    #[test]
    fn repeated_tokens_count_once() {
        // "jumps" が何度出ても 1 語扱い
        let reply = message("1", GENERATOR, "jumps jumps jumps", &["a.png"]);
        assert!(evaluate("a red fox jumps over the lazy dog", &reply, GENERATOR).is_none());
    }

    #[test]
    fn decision_is_independent_of_token_order() {
        let prompt = "misty mountain lake sunrise";
        let a = message("1", GENERATOR, "sunrise lake", &["a.png"]);
        let b = message("2", GENERATOR, "lake sunrise", &["a.png"]);
        assert_eq!(
            evaluate(prompt, &a, GENERATOR).is_some(),
            evaluate(prompt, &b, GENERATOR).is_some()
        );
        assert!(evaluate(prompt, &a, GENERATOR).is_some());
    }

    #[test]
    fn find_match_skips_invalid_and_returns_first_valid() {
        let prompt = "misty mountain lake sunrise";
        let messages = vec![
            message("1", GENERATOR, "misty mountain", &["notes.txt"]),
            message("2", GENERATOR, "misty mountain", &["first.png"]),
            message("3", GENERATOR, "misty mountain", &["second.png"]),
        ];
        let found = find_match(prompt, &messages, GENERATOR).unwrap();
        assert_eq!(found.message_id, "2");
    }
}
