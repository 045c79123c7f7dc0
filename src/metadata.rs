use std::path::Path;

use serde_json::Value;

use crate::flickr::{ApiError, MediaApi, MetadataKind};

/// Which of the three per-item documents ended up on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataBundle {
    pub exif: bool,
    pub info: bool,
    pub sizes: bool,
}

impl MetadataBundle {
    pub fn set(&mut self, kind: MetadataKind, present: bool) {
        match kind {
            MetadataKind::Exif => self.exif = present,
            MetadataKind::Info => self.info = present,
            MetadataKind::Sizes => self.sizes = present,
        }
    }
}

/// Fetch one metadata document, treating any failure as absence. Items
/// without camera metadata legitimately have no exif, and restricted items
/// can deny info, so a missing document is logged and skipped, never an
/// abort.
pub async fn fetch_document<A: MediaApi>(
    api: &A,
    kind: MetadataKind,
    photo_id: &str,
) -> Option<Value> {
    match api.get_metadata(kind, photo_id).await {
        Ok(doc) => Some(doc),
        Err(ApiError::NotFound) => {
            log::debug!("no {kind} document for {photo_id}", kind = kind.file_suffix());
            None
        }
        Err(e) => {
            log::warn!(
                "couldn't fetch {kind} for {photo_id}: {e}",
                kind = kind.file_suffix()
            );
            None
        }
    }
}

/// Write one document as pretty-printed JSON at `data/{stem}_{kind}.json`.
/// Returns whether the file made it to disk.
pub fn write_document(data_dir: &Path, stem: &str, kind: MetadataKind, doc: &Value) -> bool {
    let path = data_dir.join(format!("{stem}_{suffix}.json", suffix = kind.file_suffix()));
    let text = match serde_json::to_string_pretty(doc) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("couldn't serialize {} document: {e}", kind.file_suffix());
            return false;
        }
    };
    match std::fs::write(&path, text) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("couldn't write {}: {e}", path.display());
            false
        }
    }
}
