//! Database migrations.
//!
//! The reference schema stands up a validation database shaped like the
//! property-management application: every table of the registry, the helper
//! functions, the owner-scoped policies, and the supporting indexes.

pub use sea_orm_migration::prelude::*;

mod m20260301_000001_reference_schema;

/// Migrator for running database migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260301_000001_reference_schema::Migration)]
    }
}
