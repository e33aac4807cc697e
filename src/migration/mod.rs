//! Schema migrations (C7): a static, lexicographically-ordered list of
//! SQL scripts applied by [`Migrator`] and tracked in `schema_migrations`.

mod migrator;
pub mod registry;

pub use migrator::{MigrationStatus, Migrator};
pub use registry::Migration;
