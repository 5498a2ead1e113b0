//! Text shaping for titles: input truncation, fallback synthesis, post-validation.

pub const INPUT_CHAR_LIMIT: usize = 500;
pub const MAX_TITLE_CHARS: usize = 150;
pub const FALLBACK_WORDS: usize = 7;
pub const ELLIPSIS: &str = "...";
pub const UNTITLED: &str = "Untitled response";

const QUOTE_CHARS: &[char] = &['"', '\'', '`', '“', '”', '‘', '’', '«', '»'];

/// Cut `text` to at most `max_chars` characters, backing up to the last whitespace so
/// no word is split. A single word longer than the limit is hard-cut.
///
/// Returns the kept prefix (trailing whitespace removed) and whether anything was cut.
pub fn truncate_at_word_boundary(text: &str, max_chars: usize) -> (&str, bool) {
    let Some((cut, next)) = text.char_indices().nth(max_chars) else {
        return (text, false);
    };
    let head = &text[..cut];
    if next.is_whitespace() {
        return (head.trim_end(), true);
    }
    match head.rfind(char::is_whitespace) {
        Some(space) if !head[..space].trim().is_empty() => (head[..space].trim_end(), true),
        _ => (head, true),
    }
}

/// Backend input: the response content capped near [`INPUT_CHAR_LIMIT`].
pub fn prepare_input(content: &str) -> &str {
    truncate_at_word_boundary(content.trim(), INPUT_CHAR_LIMIT).0
}

/// Clean a model-produced title. `None` when nothing usable remains.
pub fn validate_title(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let stripped = collapsed.trim_matches(|c| QUOTE_CHARS.contains(&c)).trim();
    if stripped.is_empty() {
        return None;
    }
    Some(cap_length(stripped))
}

/// Title from the first few words of the content, used when the backend cannot help.
pub fn fallback_title(content: &str) -> String {
    let mut words = content.split_whitespace();
    let head: Vec<&str> = words.by_ref().take(FALLBACK_WORDS).collect();
    if head.is_empty() {
        return UNTITLED.to_string();
    }
    let mut title = head.join(" ");
    if words.next().is_some() {
        title.push_str(ELLIPSIS);
    }
    cap_length(&title)
}

fn cap_length(title: &str) -> String {
    if title.chars().count() <= MAX_TITLE_CHARS {
        return title.to_string();
    }
    let budget = MAX_TITLE_CHARS - ELLIPSIS.len();
    let (kept, _) = truncate_at_word_boundary(title, budget);
    format!("{}{}", kept, ELLIPSIS)
}
