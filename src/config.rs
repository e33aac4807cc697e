//! Configuration surface relevant to the core (§6).
//!
//! Loading these from YAML/env is the surrounding service's job — see
//! `SPEC_FULL.md` §1 — so this module only defines the shape, as plain
//! `serde`-deserializable structs with defaults, the same division of
//! labor the teacher draws between `infrastructure::config::ConfigLoader`
//! (outside this crate's concern) and the structs it fills in.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::model::ReviewEvent;

/// `database.*` from §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: String,
    pub sslcert: Option<String>,
    pub sslkey: Option<String>,
    pub sslrootcert: Option<String>,
    pub preparedstatements: bool,
    pub pool: PoolConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "registry".to_string(),
            password: String::new(),
            dbname: "registry".to_string(),
            sslmode: "disable".to_string(),
            sslcert: None,
            sslkey: None,
            sslrootcert: None,
            preparedstatements: false,
            pool: PoolConfig::default(),
        }
    }
}

/// `database.pool.*` from §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_idle: u32,
    pub max_open: u32,
    #[serde(with = "humantime_like")]
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: 5,
            max_open: 10,
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// `gc.*` from §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    #[serde(with = "humantime_like")]
    pub initial_interval: Duration,
    #[serde(with = "humantime_like")]
    pub max_backoff: Duration,
    pub no_idle_backoff: bool,
    pub jitter_max_seconds: f64,
    pub review_after_defaults: ReviewAfterDefaults,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
            no_idle_backoff: false,
            jitter_max_seconds: 10.0,
            review_after_defaults: ReviewAfterDefaults::default(),
        }
    }
}

/// `gc.review_after_defaults{event -> duration}` from §6, backing
/// `GCReviewAfterDefaults` (§3). Missing entries fall back to
/// [`ReviewEvent::FALLBACK_DELAY_SECONDS`] per §4.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewAfterDefaults(HashMap<String, Duration>);

impl Default for ReviewAfterDefaults {
    fn default() -> Self {
        let one_day = Duration::from_secs(ReviewEvent::FALLBACK_DELAY_SECONDS as u64);
        let one_hour = Duration::from_secs(3_600);
        Self(HashMap::from([
            (ReviewEvent::BlobUpload.as_str().to_string(), one_day),
            (ReviewEvent::ManifestUpload.as_str().to_string(), one_hour),
            (ReviewEvent::ManifestDelete.as_str().to_string(), one_day),
            (ReviewEvent::LayerDelete.as_str().to_string(), one_day),
            (
                ReviewEvent::ManifestListDelete.as_str().to_string(),
                one_day,
            ),
            (ReviewEvent::TagDelete.as_str().to_string(), one_day),
            (ReviewEvent::TagSwitch.as_str().to_string(), one_day),
        ]))
    }
}

impl ReviewAfterDefaults {
    /// The delay for `event`, or the §4.3 fallback if unset.
    pub fn delay_for(&self, event: ReviewEvent) -> Duration {
        self.0
            .get(event.as_str())
            .copied()
            .unwrap_or_else(|| Duration::from_secs(ReviewEvent::FALLBACK_DELAY_SECONDS as u64))
    }

    /// `(event, seconds)` pairs ready to seed `gc_review_after_defaults`.
    pub fn to_rows(&self) -> Vec<(String, i64)> {
        ReviewEvent::ALL
            .iter()
            .map(|event| {
                (
                    event.as_str().to_string(),
                    self.delay_for(*event).as_secs() as i64,
                )
            })
            .collect()
    }
}

/// `migration.disablemirrorfs` from §6. Validating that it's only set
/// when the database is enabled is the surrounding service's
/// responsibility, per §6's own note; this crate only carries the flag.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MigrationFeatureFlags {
    pub disable_mirror_fs: bool,
}

/// Serializes `Duration` as whole seconds, matching how the teacher's own
/// config structs round-trip durations through YAML/env (plain integers,
/// no duration-string parsing library).
mod humantime_like {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
