//! CLI input validation functions.
//!
//! These validators are used by clap's `value_parser` attribute to validate
//! user input at parse time.

/// Validate a node id: non-empty after trimming.
pub fn validate_node_id(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("Node ID cannot be empty".to_string());
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("src/auth.rs", Some("src/auth.rs"))]
    #[case("  api  ", Some("api"))]
    #[case("", None)]
    #[case("   ", None)]
    fn node_ids(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(validate_node_id(input).ok().as_deref(), expected);
    }
}
