//! Generated-name record and component models, insert DTOs and filter criteria.

use indexmap::IndexMap;
use namelog_core::generated_name::GeneratedName;
use namelog_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A row from the `generated_names` table with its components attached.
///
/// `components` is not a column; repositories fill it in ascending
/// `sort_order` after loading the row.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct GeneratedNameRecord {
    pub id: DbId,
    pub created_at: Timestamp,
    pub resource_name: String,
    pub resource_type_name: String,
    pub user_name: String,
    pub message: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
    pub created_by: String,
    pub updated_at: Option<Timestamp>,
    pub is_deleted: bool,
    #[sqlx(skip)]
    pub components: Vec<GeneratedNameComponent>,
}

impl GeneratedNameRecord {
    /// Convert back to the caller-facing form, components in stored order.
    pub fn to_generated_name(&self) -> GeneratedName {
        GeneratedName {
            id: self.id,
            created_on: self.created_at,
            resource_name: self.resource_name.clone(),
            resource_type_name: self.resource_type_name.clone(),
            components: self
                .components
                .iter()
                .map(|c| vec![c.component_name.clone(), c.component_value.clone()])
                .collect(),
            user: self.user_name.clone(),
            message: self.message.clone(),
        }
    }
}

/// A row from the `generated_name_components` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct GeneratedNameComponent {
    pub id: DbId,
    pub generated_name_id: DbId,
    pub component_name: String,
    pub component_value: String,
    pub sort_order: i32,
}

// ---------------------------------------------------------------------------
// Create DTOs
// ---------------------------------------------------------------------------

/// DTO for inserting a record together with its components.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateGeneratedName {
    /// Defaults to the insert time if omitted.
    pub created_at: Option<Timestamp>,
    pub resource_name: String,
    pub resource_type_name: String,
    /// Defaults to `General` if omitted.
    pub user_name: Option<String>,
    pub message: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
    /// Defaults to `System` if omitted.
    pub created_by: Option<String>,
    #[serde(default)]
    pub components: Vec<CreateGeneratedNameComponent>,
}

impl CreateGeneratedName {
    /// Map a caller-facing name onto an insert DTO. Audit fields and the
    /// creator tag are left for the caller to fill in.
    pub fn from_generated_name(name: &GeneratedName) -> Self {
        Self {
            created_at: Some(name.stored_created_on()),
            resource_name: name.resource_name.clone(),
            resource_type_name: name.resource_type_name.clone(),
            user_name: Some(name.user.clone()),
            message: name.message.clone(),
            components: CreateGeneratedNameComponent::from_pairs(name.component_pairs()),
            ..Default::default()
        }
    }
}

/// DTO for one component of a new record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateGeneratedNameComponent {
    pub component_name: String,
    pub component_value: String,
    pub sort_order: i32,
}

impl CreateGeneratedNameComponent {
    /// Build components from ordered `(name, value)` pairs; the position
    /// becomes the sort order.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Vec<Self> {
        pairs
            .into_iter()
            .enumerate()
            .map(|(index, (component_name, component_value))| Self {
                component_name,
                component_value,
                sort_order: index as i32,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Filter criteria for paged listing. Every populated field narrows the
/// result (AND). Text fields match as substrings except `ip_address`, which
/// must match exactly. Date bounds are inclusive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratedNameFilter {
    pub user: Option<String>,
    pub resource_type: Option<String>,
    pub resource_name: Option<String>,
    pub from_date: Option<Timestamp>,
    pub to_date: Option<Timestamp>,
    pub ip_address: Option<String>,
    /// Matches resource name, resource type, user, or any component name/value.
    pub search_term: Option<String>,
    pub component_name: Option<String>,
    pub component_value: Option<String>,
    /// Lift the soft-delete exclusion for this query only.
    #[serde(default)]
    pub include_deleted: bool,
}

impl GeneratedNameFilter {
    /// Returns `true` if any criterion (including `include_deleted`) is set.
    pub fn has_filters(&self) -> bool {
        [
            &self.user,
            &self.resource_type,
            &self.resource_name,
            &self.ip_address,
            &self.search_term,
            &self.component_name,
            &self.component_value,
        ]
        .iter()
        .any(|field| field.as_deref().is_some_and(|v| !v.is_empty()))
            || self.from_date.is_some()
            || self.to_date.is_some()
            || self.include_deleted
    }
}

/// Record counts per resource type, largest first.
pub type UsageStatistics = IndexMap<String, i64>;
