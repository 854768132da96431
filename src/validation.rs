//! Input validation for names, passwords and chat
//!
//! Names are checked against an allowlist and rejected outright when they
//! contain anything resembling an injection payload. Every failure maps to
//! [`ArenaError::InvalidInput`] so callers learn nothing about which rule fired.

use crate::error::{ArenaError, ArenaResult};
use tracing::debug;

/// Maximum length of a room name
pub const MAX_ROOM_NAME_LENGTH: usize = 50;

/// Maximum length of a player display name
pub const MAX_PLAYER_NAME_LENGTH: usize = 30;

/// Password length bounds
pub const MIN_PASSWORD_LENGTH: usize = 4;
pub const MAX_PASSWORD_LENGTH: usize = 50;

const SQL_KEYWORDS: &[&str] = &[
    "select", "insert", "update", "delete", "drop", "union", "exec", "execute", "create",
    "alter", "truncate", "declare", "grant", "revoke", "merge", "replace",
];

const NOSQL_OPERATORS: &[&str] = &[
    "$ne", "$eq", "$gt", "$gte", "$lt", "$lte", "$in", "$nin", "$or", "$and", "$not", "$nor",
    "$where", "$regex", "$exists", "$expr",
];

const INJECTION_TOKENS: &[&str] = &[
    "--", "/*", "*/", "';", "\";", "xp_", "%27", "%3c",
];

const SCRIPT_PATTERNS: &[&str] = &[
    "<script", "</script", "javascript:", "vbscript:", "data:text/html", "eval(",
    "expression(", "document.cookie", "document.write", "window.location",
];

const PASSWORD_SYMBOLS: &str = "!@#$%^&*()-_=+[]{}.,?:~";

/// Validate a room name, returning the trimmed value
pub fn validate_room_name(name: &str) -> ArenaResult<String> {
    validate_name(name, MAX_ROOM_NAME_LENGTH, "room name")
}

/// Validate a player display name, returning the trimmed value
pub fn validate_player_name(name: &str) -> ArenaResult<String> {
    validate_name(name, MAX_PLAYER_NAME_LENGTH, "player name")
}

/// Validate a room password
pub fn validate_password(password: &str) -> ArenaResult<String> {
    let length = password.chars().count();
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
        return reject("password", "length");
    }
    if !password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c))
    {
        return reject("password", "character set");
    }
    if contains_dangerous_pattern(password) || contains_html_tag(password) {
        return reject("password", "pattern");
    }
    Ok(password.to_string())
}

/// Validate a chat message, returning the trimmed text
pub fn validate_chat_message(message: &str, max_length: usize) -> ArenaResult<String> {
    let trimmed = message.trim();
    if trimmed.is_empty() || trimmed.chars().count() > max_length {
        return reject("chat message", "length");
    }
    Ok(trimmed.to_string())
}

fn validate_name(name: &str, max_length: usize, field: &str) -> ArenaResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > max_length {
        return reject(field, "length");
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-' || c == '_')
    {
        return reject(field, "character set");
    }
    if contains_dangerous_pattern(trimmed) || contains_html_tag(trimmed) {
        return reject(field, "pattern");
    }
    Ok(trimmed.to_string())
}

fn reject<T>(field: &str, rule: &str) -> ArenaResult<T> {
    // The rule stays in server logs only
    debug!("Rejected {} ({})", field, rule);
    Err(ArenaError::InvalidInput)
}

/// Check for SQL keywords, NoSQL operators, comment tokens and script patterns
pub fn contains_dangerous_pattern(input: &str) -> bool {
    let lower = input.to_lowercase();

    let has_sql_keyword = lower
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .any(|word| SQL_KEYWORDS.contains(&word));
    if has_sql_keyword {
        return true;
    }

    if NOSQL_OPERATORS.iter().any(|op| lower.contains(op))
        || INJECTION_TOKENS.iter().any(|token| lower.contains(token))
        || SCRIPT_PATTERNS.iter().any(|pattern| lower.contains(pattern))
    {
        return true;
    }

    contains_event_handler(&lower)
}

/// Detect `onclick=`, `onerror =` and friends
fn contains_event_handler(lower: &str) -> bool {
    let bytes = lower.as_bytes();
    let mut i = 0;
    while i + 2 < bytes.len() {
        let at_word_start = i == 0 || !bytes[i - 1].is_ascii_alphanumeric();
        if at_word_start && bytes[i] == b'o' && bytes[i + 1] == b'n' {
            let mut j = i + 2;
            while j < bytes.len() && bytes[j].is_ascii_alphabetic() {
                j += 1;
            }
            let has_name = j > i + 2;
            while j < bytes.len() && bytes[j] == b' ' {
                j += 1;
            }
            if has_name && j < bytes.len() && bytes[j] == b'=' {
                return true;
            }
        }
        i += 1;
    }
    false
}

/// Detect anything that looks like an HTML tag or comment
pub fn contains_html_tag(input: &str) -> bool {
    let chars: Vec<char> = input.chars().collect();
    chars.windows(2).any(|pair| {
        pair[0] == '<' && (pair[1].is_ascii_alphabetic() || pair[1] == '/' || pair[1] == '!')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_room_names() {
        assert_eq!(validate_room_name("Battle Arena").unwrap(), "Battle Arena");
        assert_eq!(validate_room_name("  quiz_night-2 ").unwrap(), "quiz_night-2");
    }

    #[test]
    fn test_rejects_script_and_sql() {
        assert_eq!(
            validate_room_name("<script>alert(1)</script>"),
            Err(ArenaError::InvalidInput)
        );
        assert_eq!(
            validate_room_name("SELECT * FROM users"),
            Err(ArenaError::InvalidInput)
        );
        // Allowed characters only, but still a keyword
        assert_eq!(
            validate_room_name("drop table rooms"),
            Err(ArenaError::InvalidInput)
        );
    }

    #[test]
    fn test_rejects_comment_tokens() {
        assert!(validate_player_name("admin--").is_err());
        assert!(validate_player_name("a_b-c").is_ok());
    }

    #[test]
    fn test_length_limits() {
        assert!(validate_room_name(&"a".repeat(50)).is_ok());
        assert!(validate_room_name(&"a".repeat(51)).is_err());
        assert!(validate_player_name(&"a".repeat(30)).is_ok());
        assert!(validate_player_name(&"a".repeat(31)).is_err());
        assert!(validate_player_name("   ").is_err());
    }

    #[test]
    fn test_passwords() {
        assert!(validate_password("abc").is_err());
        assert!(validate_password("s3cret!").is_ok());
        assert!(validate_password("{\"$ne\": 1}").is_err());
        assert!(validate_password("$gt:0000").is_err());
        assert!(validate_password("x' OR '1'='1").is_err());
        assert!(validate_password(&"p".repeat(51)).is_err());
    }

    #[test]
    fn test_event_handlers_and_tags() {
        assert!(contains_dangerous_pattern("img onerror=alert"));
        assert!(contains_dangerous_pattern("x onload = y"));
        assert!(!contains_dangerous_pattern("online quiz"));
        assert!(contains_html_tag("<b>bold</b>"));
        assert!(!contains_html_tag("3 < 4"));
    }

    #[test]
    fn test_chat_message() {
        assert_eq!(validate_chat_message("  hi  ", 500).unwrap(), "hi");
        assert!(validate_chat_message("", 500).is_err());
        assert!(validate_chat_message(&"x".repeat(501), 500).is_err());
    }
}
