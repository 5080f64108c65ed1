/// Canonical form of a guess or answer.
///
/// Leading and trailing whitespace is removed, inner whitespace runs collapse to a
/// single space and the text is lowercased. Two answers are equal when their
/// normalized forms are equal.
pub fn normalize_answer(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_answer_lowercases_and_trims() {
        assert_eq!(normalize_answer("  Karl "), "karl");
        assert_eq!(normalize_answer("KARL"), "karl");
    }

    #[test]
    fn test_normalize_answer_collapses_whitespace() {
        assert_eq!(normalize_answer("new   York\tcity"), "new york city");
    }

    #[test]
    fn test_normalize_answer_empty() {
        assert_eq!(normalize_answer(""), "");
        assert_eq!(normalize_answer("   "), "");
    }

    #[test]
    fn test_normalize_answer_is_idempotent() {
        let once = normalize_answer(" São  Paulo ");
        assert_eq!(normalize_answer(&once), once);
    }
}
