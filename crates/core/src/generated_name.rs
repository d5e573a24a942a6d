//! The caller-facing generated-name value and its legacy flat-file form.
//!
//! A [`GeneratedName`] is what the naming engine produces and what the
//! legacy `generatednames.json` file stores (a JSON array of them). The
//! file was written with PascalCase keys; camelCase keys are accepted too.
//! Each component is a short ordered list of strings: name, then value.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;
use crate::naming::{
    validate_component, validate_max_length, validate_optional, validate_required,
    DEFAULT_USER, MAX_MESSAGE_LENGTH, MAX_RESOURCE_NAME_LENGTH, MAX_RESOURCE_TYPE_LENGTH,
    MAX_USER_LENGTH, UNKNOWN_COMPONENT_NAME,
};
use crate::types::{DbId, Timestamp};

/// One name-generation event as seen by callers and the legacy file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GeneratedName {
    #[serde(default, alias = "id")]
    pub id: DbId,
    #[serde(alias = "createdOn", deserialize_with = "deserialize_created_on")]
    pub created_on: Timestamp,
    #[serde(alias = "resourceName")]
    pub resource_name: String,
    #[serde(
        default,
        alias = "resourceTypeName",
        deserialize_with = "deserialize_null_as_empty"
    )]
    pub resource_type_name: String,
    #[serde(default, alias = "components")]
    pub components: Vec<Vec<String>>,
    #[serde(default = "default_user", alias = "user")]
    pub user: String,
    #[serde(default, alias = "message")]
    pub message: Option<String>,
}

impl GeneratedName {
    /// Build a fresh, unsaved name (id 0) stamped with the current time.
    pub fn new(
        resource_name: impl Into<String>,
        resource_type_name: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            created_on: Utc::now(),
            resource_name: resource_name.into(),
            resource_type_name: resource_type_name.into(),
            components: Vec::new(),
            user: user.into(),
            message: None,
        }
    }

    /// Append a `(name, value)` component after the existing ones.
    pub fn with_component(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.components.push(vec![name.into(), value.into()]);
        self
    }

    /// Components as `(name, value)` pairs in their original order.
    pub fn component_pairs(&self) -> Vec<(String, String)> {
        self.components.iter().map(|c| split_component(c)).collect()
    }

    /// Creation timestamp truncated to the store's microsecond precision.
    pub fn stored_created_on(&self) -> Timestamp {
        self.created_on.trunc_subsecs(6)
    }

    /// Check every field against the record column limits.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_required("Resource name", &self.resource_name, MAX_RESOURCE_NAME_LENGTH)
            .and_then(|_| {
                validate_max_length(
                    "Resource type name",
                    &self.resource_type_name,
                    MAX_RESOURCE_TYPE_LENGTH,
                )
            })
            .and_then(|_| validate_required("User", &self.user, MAX_USER_LENGTH))
            .and_then(|_| {
                validate_optional("Message", self.message.as_deref(), MAX_MESSAGE_LENGTH)
            })
            .and_then(|_| {
                self.component_pairs()
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, (name, value))| validate_component(i, name, value))
            })
            .map_err(CoreError::Validation)
    }
}

/// Turn a legacy component (an ordered list of strings) into `(name, value)`.
///
/// An empty list becomes `("Unknown", "")`; a single element is the name
/// with an empty value; anything after the second element is ignored.
pub fn split_component(parts: &[String]) -> (String, String) {
    let name = parts
        .first()
        .cloned()
        .unwrap_or_else(|| UNKNOWN_COMPONENT_NAME.to_string());
    let value = parts.get(1).cloned().unwrap_or_default();
    (name, value)
}

// ---------------------------------------------------------------------------
// Legacy file parsing
// ---------------------------------------------------------------------------

/// Returns `true` when the raw legacy file content holds no records.
pub fn is_empty_source(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed == "[]"
}

/// Split the raw legacy file into its array elements without decoding them.
///
/// Decoding happens per element (see [`GeneratedName::from_legacy_value`]) so
/// one malformed record cannot hide the others.
pub fn parse_legacy_array(raw: &str) -> Result<Vec<serde_json::Value>, serde_json::Error> {
    if is_empty_source(raw) {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
}

impl GeneratedName {
    /// Decode a single legacy array element.
    pub fn from_legacy_value(value: serde_json::Value) -> Result<Self, CoreError> {
        serde_json::from_value(value)
            .map_err(|e| CoreError::Validation(format!("Malformed legacy record: {e}")))
    }
}

/// Best-effort resource name of an undecoded legacy element, for error messages.
pub fn resource_name_hint(value: &serde_json::Value) -> String {
    ["ResourceName", "resourceName"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .unwrap_or("<unknown>")
        .to_string()
}

/// Parse a legacy timestamp.
///
/// Accepts RFC 3339 (any offset, normalised to UTC) and the offset-less
/// `2024-01-01T00:00:00.1234567` form, which is taken as UTC.
pub fn parse_legacy_timestamp(raw: &str) -> Option<Timestamp> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_created_on<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_legacy_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
}

fn deserialize_null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Timelike};
    use serde_json::json;

    fn strings(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    // -- split_component ------------------------------------------------------

    #[test]
    fn split_component_pair() {
        assert_eq!(
            split_component(&strings(&["Env", "prod"])),
            ("Env".to_string(), "prod".to_string())
        );
    }

    #[test]
    fn split_component_empty_is_unknown() {
        assert_eq!(
            split_component(&[]),
            ("Unknown".to_string(), String::new())
        );
    }

    #[test]
    fn split_component_single_element_has_empty_value() {
        assert_eq!(
            split_component(&strings(&["Env"])),
            ("Env".to_string(), String::new())
        );
    }

    #[test]
    fn split_component_ignores_extra_elements() {
        assert_eq!(
            split_component(&strings(&["Env", "prod", "extra"])).1,
            "prod"
        );
    }

    // -- legacy decoding ------------------------------------------------------

    #[test]
    fn decodes_pascal_case_record() {
        let value = json!({
            "Id": 7,
            "CreatedOn": "2024-01-01T00:00:00Z",
            "ResourceName": "vm-prod-01",
            "ResourceTypeName": "Virtual Machine",
            "Components": [["ResourceType", "vm"], ["Env", "prod"]],
            "User": "alice",
            "Message": null
        });
        let name = GeneratedName::from_legacy_value(value).unwrap();
        assert_eq!(name.id, 7);
        assert_eq!(name.resource_name, "vm-prod-01");
        assert_eq!(name.user, "alice");
        assert_eq!(name.created_on, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(name.component_pairs()[1], ("Env".to_string(), "prod".to_string()));
    }

    #[test]
    fn decodes_camel_case_record_with_defaults() {
        let value = json!({
            "resourceName": "vm-prod-01",
            "createdOn": "2024-01-01T00:00:00Z",
            "components": [["ResourceType", "vm"]]
        });
        let name = GeneratedName::from_legacy_value(value).unwrap();
        assert_eq!(name.id, 0);
        assert_eq!(name.user, DEFAULT_USER);
        assert_eq!(name.resource_type_name, "");
        assert!(name.message.is_none());
    }

    #[test]
    fn null_resource_type_becomes_empty() {
        let value = json!({
            "ResourceName": "st01",
            "CreatedOn": "2024-01-01T00:00:00Z",
            "ResourceTypeName": null
        });
        assert_eq!(
            GeneratedName::from_legacy_value(value).unwrap().resource_type_name,
            ""
        );
    }

    #[test]
    fn missing_resource_name_is_a_validation_error() {
        let value = json!({ "CreatedOn": "2024-01-01T00:00:00Z", "User": "bob" });
        assert_matches!(
            GeneratedName::from_legacy_value(value),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn parse_legacy_array_treats_blank_as_empty() {
        assert!(parse_legacy_array("").unwrap().is_empty());
        assert!(parse_legacy_array("  [] ").unwrap().is_empty());
        assert_eq!(parse_legacy_array("[{}, {}]").unwrap().len(), 2);
        assert!(parse_legacy_array("{not json").is_err());
    }

    #[test]
    fn resource_name_hint_falls_back() {
        assert_eq!(resource_name_hint(&json!({"resourceName": "a"})), "a");
        assert_eq!(resource_name_hint(&json!({"ResourceName": 5})), "<unknown>");
    }

    // -- timestamps -----------------------------------------------------------

    #[test]
    fn parses_offsetless_timestamp_as_utc() {
        let ts = parse_legacy_timestamp("2024-03-05T10:20:30.1234567").unwrap();
        assert_eq!(ts.hour(), 10);
        assert_eq!(ts.nanosecond(), 123_456_700);
    }

    #[test]
    fn parses_offset_timestamp_into_utc() {
        let ts = parse_legacy_timestamp("2024-03-05T10:00:00+02:00").unwrap();
        assert_eq!(ts.hour(), 8);
    }

    #[test]
    fn rejects_garbage_timestamp() {
        assert!(parse_legacy_timestamp("yesterday").is_none());
    }

    #[test]
    fn stored_created_on_truncates_to_micros() {
        let mut name = GeneratedName::new("n", "t", "u");
        name.created_on = parse_legacy_timestamp("2024-03-05T10:20:30.1234567").unwrap();
        assert_eq!(name.stored_created_on().nanosecond(), 123_456_000);
    }

    // -- validation -----------------------------------------------------------

    #[test]
    fn validate_accepts_well_formed_name() {
        let name = GeneratedName::new("vm-prod-01", "vm", "alice").with_component("Env", "prod");
        assert!(name.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_user() {
        let name = GeneratedName::new("vm-prod-01", "vm", "");
        assert_matches!(name.validate(), Err(CoreError::Validation(msg)) if msg.contains("User"));
    }

    #[test]
    fn validate_rejects_oversized_component() {
        let name = GeneratedName::new("vm", "vm", "alice").with_component("x".repeat(101), "v");
        assert_matches!(
            name.validate(),
            Err(CoreError::Validation(msg)) if msg.contains("Component 0")
        );
    }

    #[test]
    fn serializes_with_pascal_case_keys() {
        let name = GeneratedName::new("vm", "vm", "alice");
        let value = serde_json::to_value(&name).unwrap();
        assert!(value.get("ResourceName").is_some());
        assert!(value.get("CreatedOn").is_some());
    }
}
