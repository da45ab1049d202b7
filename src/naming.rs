//! Identifier rules and name helpers

use regex::Regex;
use std::sync::OnceLock;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"))
}

/// Entity, table, field and attribute names must be plain SQL-safe identifiers
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

/// Convert PascalCase/camelCase to snake_case ("AssociationClass" -> "association_class")
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;

    for c in s.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c == '-' || c == ' ' {
            result.push('_');
            prev_lower = false;
        } else {
            result.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }

    result
}

/// Closest known name to `query`, for "did you mean" hints
pub fn suggest<'a>(query: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<String> {
    use fuzzy_matcher::skim::SkimMatcherV2;
    use fuzzy_matcher::FuzzyMatcher;

    let matcher = SkimMatcherV2::default().ignore_case();

    candidates
        .into_iter()
        .filter_map(|candidate| {
            matcher
                .fuzzy_match(candidate, query)
                .or_else(|| matcher.fuzzy_match(query, candidate))
                .map(|score| (score, candidate))
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, candidate)| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(is_valid_identifier("user_account"));
        assert!(is_valid_identifier("AssociationClass"));
        assert!(!is_valid_identifier("users.id"));
        assert!(!is_valid_identifier("1st"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("AssociationClass"), "association_class");
        assert_eq!(to_snake_case("Users"), "users");
        assert_eq!(to_snake_case("imageURL"), "image_url");
    }

    #[test]
    fn test_suggest() {
        let names = ["Users", "Planets", "People"];
        assert_eq!(suggest("Planet", names), Some("Planets".to_string()));
        assert_eq!(suggest("Ghosts", names), None);
    }
}
