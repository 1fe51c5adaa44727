//! Snapshot file IO.
//!
//! The snapshot is an `Envelope<Snapshot>` JSON file. Writes go to a
//! sibling temp file first and are renamed into place.

use nodeflow_core::{Result, StoreError};
use nodeflow_workflow::{Envelope, MemoryStores, Snapshot};
use std::path::Path;
use tracing::{debug, instrument};

fn unavailable(path: &Path, err: &std::io::Error) -> StoreError {
    StoreError::Unavailable {
        details: format!("{}: {err}", path.display()),
    }
}

/// Loads in-memory stores from the snapshot at `path`.
///
/// # Errors
///
/// Returns `StoreError::Unavailable` if the file cannot be read, or
/// `StoreError::Corrupt` if it is not a snapshot envelope.
#[instrument]
pub async fn load(path: &Path) -> Result<MemoryStores, StoreError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| unavailable(path, &e))?;
    let snapshot: Envelope<Snapshot> =
        Envelope::from_json_bytes(&bytes, &path.display().to_string())?;
    let snapshot = snapshot.into_payload();
    debug!(
        workflows = snapshot.workflows.len(),
        entities = snapshot.entities.len(),
        scheduled = snapshot.scheduled.len(),
        "snapshot loaded"
    );
    Ok(MemoryStores::from_snapshot(snapshot))
}

/// Writes every table of `stores` to `path`.
///
/// # Errors
///
/// Returns a `StoreError` if the snapshot cannot be serialized or written.
#[instrument(skip(stores))]
pub async fn save(path: &Path, stores: &MemoryStores) -> Result<(), StoreError> {
    let bytes = Envelope::new(stores.snapshot().await).to_json_bytes()?;
    let staging = path.with_extension("json.tmp");
    tokio::fs::write(&staging, bytes)
        .await
        .map_err(|e| unavailable(&staging, &e))?;
    tokio::fs::rename(&staging, path)
        .await
        .map_err(|e| unavailable(path, &e))?;
    debug!("snapshot written");
    Ok(())
}
