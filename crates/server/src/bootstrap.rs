//! Startup consistency report.

use anyhow::Result;
use runlet_core::keys;
use runlet_metadata::MetadataStore;
use runlet_storage::BlobStore;
use std::collections::HashSet;

/// Log content blobs that no record points at.
///
/// These are the documented leftovers of an add or name change that failed
/// part-way. Nothing is deleted; returns the orphaned keys.
pub async fn report_orphaned_content(
    storage: &dyn BlobStore,
    metadata: &dyn MetadataStore,
) -> Result<Vec<String>> {
    let known: HashSet<(String, String)> = metadata
        .list_all_scripts()
        .await?
        .into_iter()
        .map(|row| (row.scope, row.name))
        .collect();

    let mut orphans = Vec::new();
    for key in storage.list(keys::content_prefix()).await? {
        match keys::parse_content_key(&key) {
            Some(identity) if known.contains(&identity) => {}
            Some((scope, name)) => {
                tracing::warn!(key = %key, scope = %scope, name = %name, "Orphaned script content");
                orphans.push(key);
            }
            None => {
                tracing::warn!(key = %key, "Unrecognized key under the script namespace");
            }
        }
    }

    if orphans.is_empty() {
        tracing::debug!("No orphaned script content");
    } else {
        tracing::warn!(count = orphans.len(), "Orphaned script content found");
    }
    Ok(orphans)
}
