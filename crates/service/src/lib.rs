//! Services over the generated-name store: the write-routing facade, the
//! legacy flat-file migration and background maintenance.

pub mod background;
pub mod config;
pub mod error;
pub mod legacy_store;
pub mod migration;
pub mod naming_log;
