//! Repository layer: one zero-sized struct per table group, async methods
//! taking a `&PgPool` (or a connection when the caller owns the transaction).

pub mod generated_name_repo;

pub use generated_name_repo::GeneratedNameRepo;
