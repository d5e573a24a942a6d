//! Domain types and pure rules for the generated-name record store.
//!
//! Nothing in this crate touches the database or the filesystem, so it can
//! be shared by the repository layer, the migration service and tests.

pub mod audit;
pub mod error;
pub mod generated_name;
pub mod migration;
pub mod naming;
pub mod paging;
pub mod types;
