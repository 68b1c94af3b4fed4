use unicode_normalization::UnicodeNormalization;

/// Normalized form of a title used for duplicate detection.
///
/// NFKC-normalizes (full-width latin becomes ascii), lowercases, turns every
/// non-alphanumeric character into a space and collapses runs of spaces.
/// Returns `None` when nothing is left.
pub fn normalize_title(title: &str) -> Option<String> {
    let folded: String = title
        .nfkc()
        .flat_map(|c| c.to_lowercase())
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let normalized = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// NFKC plus Unicode lowercasing, the form free-text search compares in
pub fn fold_case(s: &str) -> String {
    s.nfkc().flat_map(char::to_lowercase).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_punctuation() {
        assert_eq!(
            normalize_title("Shukujo no Tashinami | The Lady's Taste"),
            Some("shukujo no tashinami the lady s taste".to_string())
        );
        assert_eq!(
            normalize_title("  Venus   Nights!! "),
            normalize_title("venus nights")
        );
        assert_eq!(normalize_title("Dolls Ch. 8"), Some("dolls ch 8".to_string()));
    }

    #[test]
    fn test_width_folding() {
        assert_eq!(normalize_title("ＶＥＮＵＳ　Ｎｉｇｈｔｓ"), Some("venus nights".to_string()));
        assert_eq!(normalize_title("淑女のたしなみ"), Some("淑女のたしなみ".to_string()));
    }

    #[test]
    fn test_fold_case() {
        assert_eq!(fold_case("ÜBER Alles"), "über alles");
        assert_eq!(fold_case("ＶＥＮＵＳ Nights"), "venus nights");
        assert_eq!(fold_case("Shukujo | 100%"), "shukujo | 100%");
    }

    #[test]
    fn test_empty() {
        assert_eq!(normalize_title(""), None);
        assert_eq!(normalize_title(" -- !! "), None);
    }
}
