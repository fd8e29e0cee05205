use super::*;

// =============================================================================
// normalize
// =============================================================================

#[test]
fn normalize_lowercases_and_hyphenates_spaces() {
    assert_eq!(normalize("Coffee Shop"), "coffee-shop");
    assert_eq!(normalize("coffee-shop"), "coffee-shop");
    assert_eq!(normalize("  Coffee    Shop  "), "coffee-shop");
}

#[test]
fn normalize_strips_disallowed_characters() {
    assert_eq!(normalize("café"), "caf");
    assert_eq!(normalize("pizza!!"), "pizza");
    assert_eq!(normalize("11am?"), "11am");
}

#[test]
fn normalize_collapses_and_trims_hyphens() {
    assert_eq!(normalize("--a---b--"), "a-b");
    assert_eq!(normalize("a - b"), "a-b");
}

#[test]
fn normalize_truncates_to_three_segments() {
    assert_eq!(normalize("a-b-c-d"), "a-b-c");
    assert_eq!(normalize("one two three four five"), "one-two-three");
}

#[test]
fn normalize_is_total_on_garbage() {
    assert_eq!(normalize(""), "");
    assert_eq!(normalize("   "), "");
    assert_eq!(normalize("!!! --- ?"), "");
}

#[test]
fn normalize_is_idempotent() {
    for input in ["Coffee Shop", "a-b-c-d", "café au lait", "--x--", "Saturday  Brunch Spot Downtown", ""] {
        let once = normalize(input);
        assert_eq!(normalize(&once), once, "not idempotent for {input:?}");
    }
}

// =============================================================================
// validate
// =============================================================================

#[test]
fn validate_accepts_simple_tags() {
    assert!(validate("coffee").is_ok());
    assert!(validate("coffee-shop").is_ok());
    assert!(validate("Saturday-Brunch").is_ok());
    assert!(validate("a-b-c").is_ok());
}

#[test]
fn validate_rejects_empty_and_whitespace_only() {
    assert_eq!(validate(""), Err(TagError::Empty));
    assert_eq!(validate("   \t"), Err(TagError::Empty));
}

#[test]
fn validate_rejects_internal_space_with_suggestion() {
    let err = validate("coffee shop").unwrap_err();
    assert!(matches!(err, TagError::ContainsWhitespace { .. }));
    assert_eq!(err.suggestion(), Some("coffee-shop"));
    assert_eq!(err.field(), "text");
}

#[test]
fn validate_rejects_three_hyphens_with_truncated_suggestion() {
    let err = validate("a-b-c-d").unwrap_err();
    assert!(matches!(err, TagError::TooManySegments { .. }));
    assert_eq!(err.suggestion(), Some("a-b-c"));
}

#[test]
fn validate_rejects_non_ascii_letters() {
    let err = validate("café").unwrap_err();
    assert!(matches!(err, TagError::InvalidCharacters { .. }));
    assert_eq!(err.suggestion(), Some("caf"));
}

#[test]
fn validate_accepts_digits() {
    assert!(validate("saturday-11am").is_ok());
    assert_eq!(canonicalize("Saturday-11AM").unwrap(), "saturday-11am");
}

#[test]
fn validate_rejects_punctuation() {
    let err = validate("pizza!").unwrap_err();
    assert!(matches!(err, TagError::InvalidCharacters { .. }));
    assert_eq!(err.suggestion(), Some("pizza"));
}

#[test]
fn validate_rejects_malformed_hyphens() {
    for input in ["-coffee", "coffee-", "coffee--shop"] {
        let err = validate(input).unwrap_err();
        assert!(matches!(err, TagError::MalformedHyphens { .. }), "{input:?} gave {err:?}");
    }
    assert_eq!(validate("coffee--shop").unwrap_err().suggestion(), Some("coffee-shop"));
}

#[test]
fn validate_reports_no_suggestion_when_nothing_survives() {
    let err = validate("!?!").unwrap_err();
    assert!(matches!(err, TagError::InvalidCharacters { suggestion: None }));
}

#[test]
fn canonicalize_lowercases_valid_input() {
    assert_eq!(canonicalize("Coffee-Shop").unwrap(), "coffee-shop");
    assert_eq!(canonicalize("  brunch ").unwrap(), "brunch");
}

// =============================================================================
// Category
// =============================================================================

#[test]
fn category_parses_case_insensitively() {
    assert_eq!("Time".parse::<Category>().unwrap(), Category::Time);
    assert_eq!("food".parse::<Category>().unwrap(), Category::Food);
    assert_eq!(" ACTIVITY ".parse::<Category>().unwrap(), Category::Activity);
}

#[test]
fn category_rejects_unknown_value() {
    let err = "weather".parse::<Category>().unwrap_err();
    assert_eq!(err, TagError::UnknownCategory("weather".into()));
    assert_eq!(err.field(), "category");
}

#[test]
fn category_serializes_lowercase() {
    assert_eq!(serde_json::to_value(Category::Location).unwrap(), serde_json::json!("location"));
}
