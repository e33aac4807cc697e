//! Reclamation predicates (C4): is a blob or manifest actually safe to
//! delete right now, independent of why it was enqueued for review.
//!
//! These read the tables the §4.3 triggers keep in sync rather than
//! deriving membership ad hoc, so a policy check is a handful of indexed
//! `EXISTS` queries instead of a scan over `manifests`/`layers`.

use sqlx::SqliteConnection;

use crate::error::PolicyError;
use crate::model::{Digest, ManifestId, RepositoryId};

/// A blob is unreferenced when no repository claims it directly, no layer
/// points at it, and no manifest uses it as a configuration blob.
///
/// Takes the connection of the caller's worker transaction (§4.2/§4.5):
/// the check has to see exactly the state the subsequent delete-or-track
/// decision acts on, not a separate autocommit snapshot.
pub async fn is_blob_unreferenced(tx: &mut SqliteConnection, digest: &Digest) -> Result<bool, PolicyError> {
    let referenced: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM repository_blobs WHERE blob_digest = ?)
         OR EXISTS(SELECT 1 FROM gc_blobs_layers WHERE digest = ?)
         OR EXISTS(SELECT 1 FROM gc_blobs_configurations WHERE digest = ?)",
    )
    .bind(&digest.0)
    .bind(&digest.0)
    .bind(&digest.0)
    .fetch_one(&mut *tx)
    .await?;

    Ok(!referenced)
}

/// A manifest is unreferenced when no tag points at it and no other
/// manifest (a manifest list) lists it as a child. Same transactional
/// requirement as [`is_blob_unreferenced`].
pub async fn is_manifest_unreferenced(
    tx: &mut SqliteConnection,
    repository_id: RepositoryId,
    manifest_id: ManifestId,
) -> Result<bool, PolicyError> {
    let referenced: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM tags WHERE repository_id = ? AND manifest_id = ?)
         OR EXISTS(SELECT 1 FROM manifest_references WHERE repository_id = ? AND child_id = ?)",
    )
    .bind(repository_id)
    .bind(manifest_id)
    .bind(repository_id)
    .bind(manifest_id)
    .fetch_one(&mut *tx)
    .await?;

    Ok(!referenced)
}
