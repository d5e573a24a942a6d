//! Column limits, sentinel values and field validation for generated-name
//! records.
//!
//! The limits mirror the `CHECK` constraints in the `generated_names` and
//! `generated_name_components` tables. Validating against them up front lets
//! callers reject a record before it reaches the store.

// ---------------------------------------------------------------------------
// Column limits (characters)
// ---------------------------------------------------------------------------

pub const MAX_RESOURCE_NAME_LENGTH: usize = 255;
pub const MAX_RESOURCE_TYPE_LENGTH: usize = 255;
pub const MAX_USER_LENGTH: usize = 100;
pub const MAX_MESSAGE_LENGTH: usize = 2000;
/// Long enough for the textual form of an IPv6 address.
pub const MAX_IP_ADDRESS_LENGTH: usize = 45;
pub const MAX_USER_AGENT_LENGTH: usize = 1000;
pub const MAX_SESSION_ID_LENGTH: usize = 100;
pub const MAX_REQUEST_ID_LENGTH: usize = 100;
pub const MAX_COMPONENT_NAME_LENGTH: usize = 100;
pub const MAX_COMPONENT_VALUE_LENGTH: usize = 200;

// ---------------------------------------------------------------------------
// Sentinels
// ---------------------------------------------------------------------------

/// User recorded when the caller supplies none.
pub const DEFAULT_USER: &str = "General";

/// Creator tag for natively created records.
pub const DEFAULT_CREATED_BY: &str = "System";

/// Creator tag stamped on every record inserted by the legacy migration.
pub const MIGRATION_CREATED_BY: &str = "Migration";

/// Placeholder key for records with a blank resource type in usage statistics.
pub const UNKNOWN_RESOURCE_TYPE: &str = "Unknown";

/// Component name used when a legacy component has no elements at all.
pub const UNKNOWN_COMPONENT_NAME: &str = "Unknown";

// ---------------------------------------------------------------------------
// Query limits
// ---------------------------------------------------------------------------

/// Maximum number of rows returned by a free-text search.
pub const SEARCH_RESULT_LIMIT: i64 = 100;

/// Default row limit for per-user listings.
pub const DEFAULT_USER_LIMIT: i64 = 100;

/// Default row count for recent-record listings.
pub const DEFAULT_RECENT_COUNT: i64 = 50;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check that a required text field is non-empty and within `max` characters.
pub fn validate_required(field: &str, value: &str, max: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} cannot be empty"));
    }
    validate_max_length(field, value, max)
}

/// Check that a text field is within `max` characters.
pub fn validate_max_length(field: &str, value: &str, max: usize) -> Result<(), String> {
    let len = value.chars().count();
    if len > max {
        return Err(format!(
            "{field} exceeds maximum length of {max} characters (got {len})"
        ));
    }
    Ok(())
}

/// Same as [`validate_max_length`] for optional fields; `None` always passes.
pub fn validate_optional(field: &str, value: Option<&str>, max: usize) -> Result<(), String> {
    match value {
        Some(v) => validate_max_length(field, v, max),
        None => Ok(()),
    }
}

/// Validate one name component against the component column limits.
pub fn validate_component(index: usize, name: &str, value: &str) -> Result<(), String> {
    validate_max_length(
        &format!("Component {index} name"),
        name,
        MAX_COMPONENT_NAME_LENGTH,
    )?;
    validate_max_length(
        &format!("Component {index} value"),
        value,
        MAX_COMPONENT_VALUE_LENGTH,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_rejects_blank() {
        assert!(validate_required("Resource name", "", 10).is_err());
        assert!(validate_required("Resource name", "   ", 10).is_err());
    }

    #[test]
    fn required_accepts_value_at_limit() {
        assert!(validate_required("User", &"a".repeat(MAX_USER_LENGTH), MAX_USER_LENGTH).is_ok());
    }

    #[test]
    fn max_length_counts_characters_not_bytes() {
        // Four characters, twelve bytes.
        assert!(validate_max_length("Message", "日本語字", 4).is_ok());
        assert!(validate_max_length("Message", "日本語字", 3).is_err());
    }

    #[test]
    fn max_length_error_names_the_field() {
        let err = validate_max_length("IP address", &"1".repeat(46), MAX_IP_ADDRESS_LENGTH)
            .unwrap_err();
        assert!(err.starts_with("IP address exceeds maximum length of 45"));
    }

    #[test]
    fn optional_none_passes() {
        assert!(validate_optional("Session id", None, 1).is_ok());
        assert!(validate_optional("Session id", Some("ab"), 1).is_err());
    }

    #[test]
    fn component_value_may_be_empty() {
        assert!(validate_component(0, "Env", "").is_ok());
        assert!(validate_component(1, "Env", &"x".repeat(201)).is_err());
    }
}
