//! Phone number helpers.

/// Normalize a phone number to `+<digits>` / `<digits>` form.
///
/// Spaces, dashes, dots and parentheses are dropped. Returns `None` when what remains is
/// not 7-15 digits with an optional leading `+`.
pub fn normalize_phone_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let (plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", trimmed),
    };

    let digits: String = rest
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    if !(7..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some(format!("{plus}{digits}"))
}

/// Mask a phone number for logs: only the last four digits survive.
pub fn mask_phone_number(phone_number: &str) -> String {
    let tail: String = phone_number
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("***{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_formatting() {
        assert_eq!(
            normalize_phone_number(" +1 (555) 123-4567 ").as_deref(),
            Some("+15551234567")
        );
        assert_eq!(
            normalize_phone_number("0801.234.5678").as_deref(),
            Some("08012345678")
        );
    }

    #[test]
    fn test_normalize_rejects_invalid() {
        assert!(normalize_phone_number("").is_none());
        assert!(normalize_phone_number("+12ab456789").is_none());
        assert!(normalize_phone_number("12345").is_none());
        assert!(normalize_phone_number("++15551234567").is_none());
    }

    #[test]
    fn test_mask_keeps_last_four() {
        assert_eq!(mask_phone_number("+15551234567"), "***4567");
        assert_eq!(mask_phone_number("12"), "***12");
    }
}
