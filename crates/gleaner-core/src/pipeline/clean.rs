//! Markup and noise removal applied before language detection.

use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+@\S+").unwrap());
static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@\w+").unwrap());
static HASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\w+").unwrap());
static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Strips markup, URLs, emails, mentions, hashtags and punctuation, then
/// collapses whitespace. Every removal substitutes a space so adjacent words
/// never fuse. Word characters from any script survive.
#[must_use]
pub fn clean(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    let no_tags = TAG_RE.replace_all(text, " ");
    let decoded = html_escape::decode_html_entities(&no_tags);
    let no_urls = URL_RE.replace_all(&decoded, " ");
    let no_emails = EMAIL_RE.replace_all(&no_urls, " ");
    let no_mentions = MENTION_RE.replace_all(&no_emails, " ");
    let no_hashtags = HASHTAG_RE.replace_all(&no_mentions, " ");
    let words_only = NON_WORD_RE.replace_all(&no_hashtags, " ");
    WHITESPACE_RE.replace_all(&words_only, " ").trim().to_string()
}
