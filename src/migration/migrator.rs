//! Applies and rolls back the migrations in [`super::registry`] against a
//! live pool, tracking progress in a `schema_migrations` table.
//!
//! Grounded in the teacher's `adapters::sqlite::migrations::Migrator`
//! (per-migration transactions, a tracking table keyed on migration
//! identity), generalized from the teacher's bare integer `version` to a
//! string `id` and given the `post_deployment` gate C7 requires.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;

use crate::error::MigrationError;
use crate::migration::registry::{self, Migration};

/// Current status of one migration against a pool, as reported by
/// [`Migrator::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub id: String,
    pub applied_at: Option<DateTime<Utc>>,
    pub post_deployment: bool,
    /// `true` if `schema_migrations` names this id but the in-process
    /// registry has no [`Migration`] for it. No automatic action is ever
    /// taken on an unknown id; it is reported here and nowhere else.
    pub unknown: bool,
}

pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the bookkeeping table this migrator uses to record applied
    /// ids. Idempotent; safe to call on every startup.
    pub async fn ensure_schema_migrations_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                id TEXT PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The newest id in the registry, regardless of what has been applied.
    pub fn latest_version(&self) -> Option<&'static str> {
        registry::all().last().map(|m| m.id)
    }

    /// The newest id actually applied to this pool, if any.
    pub async fn version(&self) -> Result<Option<String>, MigrationError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT id FROM schema_migrations ORDER BY id DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id,)| id))
    }

    async fn applied_rows(&self) -> Result<Vec<(String, i64)>, MigrationError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT id, applied_at FROM schema_migrations ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    /// Every registry migration's status, plus any id recorded in
    /// `schema_migrations` the registry no longer (or never did) recognize.
    pub async fn status(&self) -> Result<Vec<MigrationStatus>, MigrationError> {
        let applied = self.applied_rows().await?;
        let known = registry::all();

        let mut out = Vec::with_capacity(known.len());
        for migration in &known {
            let applied_at = applied
                .iter()
                .find(|(id, _)| id == migration.id)
                .map(|(_, millis)| millis_to_datetime(*millis));
            out.push(MigrationStatus {
                id: migration.id.to_string(),
                applied_at,
                post_deployment: migration.post_deployment,
                unknown: false,
            });
        }

        for (id, millis) in &applied {
            if known.iter().any(|m| &m.id == id) {
                continue;
            }
            out.push(MigrationStatus {
                id: id.clone(),
                applied_at: Some(millis_to_datetime(*millis)),
                post_deployment: false,
                unknown: true,
            });
        }

        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn pending(&self, known: &[Migration], applied: &[(String, i64)], skip_post_deployment: bool) -> Vec<Migration> {
        known
            .iter()
            .filter(|m| !applied.iter().any(|(id, _)| id == m.id))
            .filter(|m| !(skip_post_deployment && m.post_deployment))
            .copied()
            .collect()
    }

    /// The ids that [`Migrator::up_n`] would apply, without applying them.
    pub async fn up_n_plan(
        &self,
        n: usize,
        skip_post_deployment: bool,
    ) -> Result<Vec<&'static str>, MigrationError> {
        let known = registry::all();
        let applied = self.applied_rows().await?;
        let pending = self.pending(&known, &applied, skip_post_deployment);
        let take = if n == 0 { pending.len() } else { n.min(pending.len()) };
        Ok(pending.into_iter().take(take).map(|m| m.id).collect())
    }

    /// Applies up to `n` pending migrations in ascending id order. `n == 0`
    /// means "all pending". Skips `post_deployment` migrations when
    /// `skip_post_deployment` is set. Returns the number applied.
    pub async fn up_n(&self, n: usize, skip_post_deployment: bool) -> Result<usize, MigrationError> {
        self.ensure_schema_migrations_table().await?;
        let known = registry::all();
        let applied = self.applied_rows().await?;
        let pending = self.pending(&known, &applied, skip_post_deployment);
        let take = if n == 0 { pending.len() } else { n.min(pending.len()) };

        let mut count = 0;
        for migration in pending.into_iter().take(take) {
            self.apply_up(&migration).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Applies every pending migration. Equivalent to `up_n(0, ..)`.
    pub async fn up(&self, skip_post_deployment: bool) -> Result<usize, MigrationError> {
        self.up_n(0, skip_post_deployment).await
    }

    async fn apply_up(&self, migration: &Migration) -> Result<(), MigrationError> {
        if migration.disable_transaction_up {
            sqlx::raw_sql(migration.up_sql)
                .execute(&self.pool)
                .await
                .map_err(|source| MigrationError::StepFailed { id: migration.id, source })?;
            self.record_applied(migration.id).await?;
        } else {
            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(migration.up_sql)
                .execute(&mut *tx)
                .await
                .map_err(|source| MigrationError::StepFailed { id: migration.id, source })?;
            sqlx::query("INSERT INTO schema_migrations (id, applied_at) VALUES (?, ?)")
                .bind(migration.id)
                .bind(now_millis())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }
        Ok(())
    }

    async fn record_applied(&self, id: &str) -> Result<(), MigrationError> {
        sqlx::query("INSERT INTO schema_migrations (id, applied_at) VALUES (?, ?)")
            .bind(id)
            .bind(now_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The ids that [`Migrator::down_n`] would roll back, without doing so.
    /// Ignores ids `schema_migrations` knows about but the registry
    /// doesn't; there is no down script to run for those.
    pub async fn down_n_plan(&self, n: usize) -> Result<Vec<&'static str>, MigrationError> {
        let known = registry::all();
        let applied = self.applied_rows().await?;
        let mut candidates: Vec<&'static str> = applied
            .iter()
            .rev()
            .filter_map(|(id, _)| known.iter().find(|m| &m.id == id).map(|m| m.id))
            .collect();
        let take = if n == 0 { candidates.len() } else { n.min(candidates.len()) };
        candidates.truncate(take);
        Ok(candidates)
    }

    /// Rolls back up to `n` applied migrations, most recently applied
    /// first. `n == 0` means "all applied". Runs regardless of the
    /// `post_deployment` flag, since down-migrations must mirror history.
    pub async fn down_n(&self, n: usize) -> Result<usize, MigrationError> {
        let known = registry::all();
        let plan = self.down_n_plan(n).await?;

        let mut count = 0;
        for id in plan {
            let migration = known.iter().find(|m| m.id == id).expect("planned id is always in the registry");
            self.apply_down(migration).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Rolls back every applied migration. Equivalent to `down_n(0)`.
    pub async fn down(&self) -> Result<usize, MigrationError> {
        self.down_n(0).await
    }

    async fn apply_down(&self, migration: &Migration) -> Result<(), MigrationError> {
        if migration.disable_transaction_down {
            sqlx::raw_sql(migration.down_sql)
                .execute(&self.pool)
                .await
                .map_err(|source| MigrationError::StepFailed { id: migration.id, source })?;
            sqlx::query("DELETE FROM schema_migrations WHERE id = ?")
                .bind(migration.id)
                .execute(&self.pool)
                .await?;
        } else {
            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(migration.down_sql)
                .execute(&mut *tx)
                .await
                .map_err(|source| MigrationError::StepFailed { id: migration.id, source })?;
            sqlx::query("DELETE FROM schema_migrations WHERE id = ?")
                .bind(migration.id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }
        Ok(())
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now)
}
