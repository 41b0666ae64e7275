use serde::{Deserialize, Serialize};
use std::fmt;

/// Digit strings up to this length are service/short codes kept verbatim.
pub const SHORT_CODE_MAX_DIGITS: usize = 5;

/// Normalized contact identifier used to group messages into conversations.
///
/// Phone numbers compare digit-for-digit with formatting stripped. Short
/// codes and alphanumeric sender ids are kept as given (trimmed). No
/// country-code canonicalization is done, so `+86 138...` and `138...` are
/// distinct keys.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContactKey(String);

impl ContactKey {
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.chars().any(char::is_alphabetic) {
            return Self(trimmed.to_string());
        }
        let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() || digits.len() <= SHORT_CODE_MAX_DIGITS {
            Self(trimmed.to_string())
        } else {
            Self(digits)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContactKey({})", self.0)
    }
}

impl fmt::Display for ContactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display form of a number: 11-digit mobile numbers starting with `1` as
/// `138 1234 5678`, 5-digit service numbers bare, anything else unchanged.
pub fn format_phone_number(number: &str) -> String {
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 11 && digits.starts_with('1') {
        format!("{} {} {}", &digits[..3], &digits[3..7], &digits[7..])
    } else if digits.len() == 5 {
        digits
    } else {
        number.to_string()
    }
}

/// Cut `content` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}
