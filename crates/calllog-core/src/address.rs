//! Remote address normalization and matching.
//!
//! Phone numbers arrive in many formats (`+1 (555) 123-4567`, `5551234567`,
//! `555.123.4567p12`). Two addresses refer to the same party when their
//! minimized forms are equal:
//!
//! - formatting characters (space, `-`, `(`, `)`, `.`, `/`) are dropped
//! - the number part compares by its trailing `digits` digits
//! - a dial string (everything from the first `p`/`w`) is kept verbatim
//! - anything that is not a phone number (SIP, IM) compares case-insensitively

/// Default number of trailing digits compared when matching phone numbers.
pub const DEFAULT_MATCH_DIGITS: usize = 7;

/// Strip formatting from a phone number.
///
/// Returns `None` when `raw` is not a phone number (contains letters other
/// than a dial-string separator, `@`, `:` and so on, or has no digits).
pub fn normalize_phone_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());

    for (i, c) in trimmed.char_indices() {
        match c {
            '0'..='9' | '*' | '#' => out.push(c),
            '+' if out.is_empty() => out.push(c),
            ' ' | '-' | '(' | ')' | '.' | '/' => {}
            'p' | 'P' | 'w' | 'W' if !out.is_empty() => {
                out.push_str(&trimmed[i..]);
                break;
            }
            _ => return None,
        }
    }

    if out.chars().any(|c| c.is_ascii_digit()) {
        Some(out)
    } else {
        None
    }
}

/// Reduce an address to the form used for equality checks and group keys.
pub fn minimize_remote(raw: &str, digits: usize) -> String {
    let Some(normalized) = normalize_phone_number(raw) else {
        return raw.trim().to_lowercase();
    };

    let split = normalized
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(normalized.len());
    let (number, dial) = normalized.split_at(split);
    let number = number.trim_start_matches('+');

    // Service codes (`*100#`) are compared whole.
    if !number.bytes().all(|b| b.is_ascii_digit()) {
        return format!("{number}{dial}");
    }

    let tail_start = number.len().saturating_sub(digits);
    format!("{}{dial}", &number[tail_start..])
}

/// Whether two remote addresses refer to the same party.
pub fn remote_address_match(a: &str, b: &str, digits: usize) -> bool {
    a == b || minimize_remote(a, digits) == minimize_remote(b, digits)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── normalize ──

    #[test]
    fn normalize_strips_formatting() {
        assert_eq!(
            normalize_phone_number("+1 (555) 123-4567").as_deref(),
            Some("+15551234567")
        );
        assert_eq!(normalize_phone_number("555.123/4567").as_deref(), Some("5551234567"));
    }

    #[test]
    fn normalize_keeps_dial_string() {
        assert_eq!(
            normalize_phone_number("555-1234p12#").as_deref(),
            Some("5551234p12#")
        );
    }

    #[test]
    fn normalize_rejects_non_numbers() {
        assert!(normalize_phone_number("alice@example.com").is_none());
        assert!(normalize_phone_number("sip:555@host").is_none());
        assert!(normalize_phone_number("").is_none());
        assert!(normalize_phone_number("---").is_none());
        assert!(normalize_phone_number("p123").is_none());
    }

    #[test]
    fn normalize_plus_only_leading() {
        assert!(normalize_phone_number("555+1234").is_none());
    }

    // ── minimize ──

    #[test]
    fn minimize_takes_trailing_digits() {
        assert_eq!(minimize_remote("+1 555 123 4567", 7), "1234567");
        assert_eq!(minimize_remote("123", 7), "123");
    }

    #[test]
    fn minimize_keeps_service_codes_whole() {
        assert_eq!(minimize_remote("*100#", 7), "*100#");
    }

    #[test]
    fn minimize_lowercases_non_phone() {
        assert_eq!(minimize_remote(" Alice@Example.COM ", 7), "alice@example.com");
    }

    // ── match ──

    #[test]
    fn match_ignores_formatting_and_prefix() {
        assert!(remote_address_match("+1 (555) 123-4567", "5551234567", 7));
        assert!(remote_address_match("+358401234567", "0401234567", 7));
    }

    #[test]
    fn match_respects_digit_count() {
        assert!(remote_address_match("+1 555 999 4567", "+1 555 123 4567", 4));
        assert!(!remote_address_match("+1 555 999 4567", "+1 555 123 4567", 7));
    }

    #[test]
    fn match_compares_dial_string() {
        assert!(remote_address_match("5551234567p1", "555 123 4567p1", 7));
        assert!(!remote_address_match("5551234567p1", "5551234567p2", 7));
        assert!(!remote_address_match("5551234567p1", "5551234567", 7));
    }

    #[test]
    fn match_non_phone_case_insensitive() {
        assert!(remote_address_match("Bob@Jabber.org", "bob@jabber.org", 7));
        assert!(!remote_address_match("bob@jabber.org", "5551234567", 7));
    }

    // ── properties ──

    proptest::proptest! {
        #[test]
        fn formatting_never_changes_match(
            digits in proptest::collection::vec(0u8..10, 4..14),
            sep in proptest::sample::select(vec![" ", "-", ".", "/"]),
        ) {
            let plain: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
            let spaced = plain
                .chars()
                .map(String::from)
                .collect::<Vec<_>>()
                .join(sep);
            proptest::prop_assert!(remote_address_match(&plain, &spaced, DEFAULT_MATCH_DIGITS));
        }

        #[test]
        fn match_is_symmetric(a in "[0-9+ ()-]{0,16}", b in "[0-9+ ()-]{0,16}") {
            proptest::prop_assert_eq!(
                remote_address_match(&a, &b, DEFAULT_MATCH_DIGITS),
                remote_address_match(&b, &a, DEFAULT_MATCH_DIGITS)
            );
        }
    }
}
