//! Data-model types from §3 that the GC core needs to name, constructed
//! narrowly enough to support the review queues, triggers, and policies —
//! full CRUD over manifests/blobs/tags belongs to the surrounding registry
//! metadata service, not this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A content-addressed digest, e.g. `sha256:deadbeef...`. Stored and
/// compared as an opaque string; this crate never interprets its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest(pub String);

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Digest {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Digest {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Primary key of a `repositories` row.
pub type RepositoryId = i64;

/// Primary key of a `manifests` row.
pub type ManifestId = i64;

/// The seven event kinds that trigger a review-queue enqueue, per §4.3.
/// The triggers themselves are plain SQL; this enum exists for Rust-side
/// code that needs to reason about *why* a row exists (tests, logging,
/// seeding [`crate::config::ReviewAfterDefaults`]), not as something the
/// triggers consult at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewEvent {
    BlobUpload,
    ManifestUpload,
    ManifestDelete,
    LayerDelete,
    ManifestListDelete,
    TagDelete,
    TagSwitch,
}

impl ReviewEvent {
    /// The key used in `gc_review_after_defaults.event` and the fallback
    /// this crate's migrations apply when a key is missing (1 day), per
    /// §4.3.
    pub const FALLBACK_DELAY_SECONDS: i64 = 86_400;

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BlobUpload => "blob_upload",
            Self::ManifestUpload => "manifest_upload",
            Self::ManifestDelete => "manifest_delete",
            Self::LayerDelete => "layer_delete",
            Self::ManifestListDelete => "manifest_list_delete",
            Self::TagDelete => "tag_delete",
            Self::TagSwitch => "tag_switch",
        }
    }

    pub const ALL: [ReviewEvent; 7] = [
        Self::BlobUpload,
        Self::ManifestUpload,
        Self::ManifestDelete,
        Self::LayerDelete,
        Self::ManifestListDelete,
        Self::TagDelete,
        Self::TagSwitch,
    ];
}

/// A row leased from `gc_blob_review_queue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobReviewRow {
    pub digest: Digest,
    pub review_after: DateTime<Utc>,
    pub review_count: i64,
}

/// A row leased from `gc_manifest_review_queue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestReviewRow {
    pub repository_id: RepositoryId,
    pub manifest_id: ManifestId,
    pub review_after: DateTime<Utc>,
    pub review_count: i64,
}
