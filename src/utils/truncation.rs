//! Character-safe truncation. Budgets are counted in `char`s so multi-byte
//! text is never split mid-codepoint.

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Keep at most `max_chars` from the start of `text`.
pub fn keep_head(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Keep at most `max_chars` from the end of `text`.
pub fn keep_tail(text: &str, max_chars: usize) -> &str {
    let total = char_len(text);
    if total <= max_chars {
        return text;
    }
    match text.char_indices().nth(total - max_chars) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

/// Shorten for one-line display, appending "..." when cut.
pub fn shorten(text: &str, max_chars: usize) -> String {
    if char_len(text) <= max_chars {
        text.to_string()
    } else {
        format!("{}...", keep_head(text, max_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_head_and_tail() {
        assert_eq!(keep_head("abcdef", 3), "abc");
        assert_eq!(keep_tail("abcdef", 3), "def");
        assert_eq!(keep_tail("abc", 10), "abc");
        assert_eq!(keep_tail("abc", 0), "");
    }

    #[test]
    fn test_multibyte_boundaries() {
        assert_eq!(keep_tail("日本語テキスト", 2), "スト");
        assert_eq!(keep_head("日本語テキスト", 2), "日本");
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("short", 10), "short");
        assert_eq!(shorten("/Applications/Safari.app/Contents/MacOS/Safari", 10), "/Applicati...");
    }
}
