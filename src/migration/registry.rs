//! The static list of known migrations, in lexicographic `id` order.
//!
//! Each migration is embedded at compile time via `include_str!` so the
//! binary carries its own schema history and never reads `migrations/`
//! at runtime, mirroring how the teacher bakes its SQL into the binary.

/// One schema change: a lexicographically-sortable id, paired SQL scripts,
/// and the transaction/deployment-ordering flags from C7.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// `YYYYMMDDhhmmss_name`. Sorts the same lexicographically and
    /// chronologically, so plain string comparison gives migration order.
    pub id: &'static str,
    pub up_sql: &'static str,
    pub down_sql: &'static str,
    /// SQLite allows DDL inside a transaction, so this is `false` for
    /// everything in this registry today. Kept per-migration because a
    /// future migration (e.g. one using `VACUUM`) may need it.
    pub disable_transaction_up: bool,
    pub disable_transaction_down: bool,
    /// `true` if application code depending on this migration's effects
    /// must already be deployed before it runs. [`crate::migration::Migrator::up`]
    /// skips these when told to.
    pub post_deployment: bool,
}

macro_rules! migration {
    ($id:literal, $name:literal) => {
        Migration {
            id: $id,
            up_sql: include_str!(concat!(
                "../../migrations/",
                $id,
                "_",
                $name,
                ".up.sql"
            )),
            down_sql: include_str!(concat!(
                "../../migrations/",
                $id,
                "_",
                $name,
                ".down.sql"
            )),
            disable_transaction_up: false,
            disable_transaction_down: false,
            post_deployment: false,
        }
    };
}

/// All known migrations, oldest first. [`crate::migration::Migrator`] is the
/// only thing that should read this list.
pub fn all() -> Vec<Migration> {
    vec![
        migration!("20230101000000", "create_repositories"),
        migration!("20230101000100", "create_blobs"),
        migration!("20230101000200", "create_manifests"),
        migration!("20230101000300", "create_manifest_references"),
        migration!("20230101000400", "create_layers"),
        migration!("20230101000500", "create_tags"),
        migration!("20230101000600", "create_repository_blobs"),
        migration!("20230101000700", "create_gc_review_after_defaults"),
        migration!("20230101000800", "create_gc_blob_review_queue"),
        migration!("20230101000900", "create_gc_manifest_review_queue"),
        migration!("20230101001000", "create_gc_blob_tracking_tables"),
        Migration {
            post_deployment: true,
            ..migration!("20230101001100", "create_gc_triggers")
        },
    ]
}
