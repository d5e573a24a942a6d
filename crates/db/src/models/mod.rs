//! Entity models and DTOs.

pub mod generated_name;
