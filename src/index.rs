use std::collections::HashSet;
use std::path::Path;

/// Snapshot of which item ids are already mirrored locally.
///
/// Built from a single scan of the `photos/` directory at the start of a run.
/// Stems end in `_{id}`, and the id is the only token of the stem that is a
/// reliable unique key, so membership is tracked by id alone. Per-item
/// filesystem probes are avoided on purpose; large collections would turn
/// those into one stat call per remote item.
pub struct ExistenceIndex {
    ids: HashSet<String>,
}

impl ExistenceIndex {
    /// Scan a photos directory once. A missing or unreadable directory is a
    /// first run, not an error, and yields an empty index.
    pub fn scan(photos_dir: &Path) -> ExistenceIndex {
        let mut ids = HashSet::new();

        match std::fs::read_dir(photos_dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let name = entry.file_name();
                    if let Some(id) = id_from_file_name(&name.to_string_lossy()) {
                        ids.insert(id);
                    }
                }
            }
            Err(e) => {
                log::debug!(
                    "no existing index at {dir}: {e}",
                    dir = photos_dir.display()
                );
            }
        }

        ExistenceIndex { ids }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Record an item completed during this run, so a duplicate appearing on
    /// a later page of the same run is also skipped.
    pub fn insert(&mut self, id: String) {
        self.ids.insert(id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Parse the trailing `_{id}` token out of a filename like
/// `2020-03-14_18_32_47_Jane_Example_49876543210.jpg`.
pub fn id_from_file_name(name: &str) -> Option<String> {
    let stem = match name.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => name,
    };
    let (_, id) = stem.rsplit_once('_')?;
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trailing_id() {
        assert_eq!(
            id_from_file_name("2020-03-14_18_32_47_Jane_Example_123.jpg"),
            Some("123".to_string())
        );
        assert_eq!(id_from_file_name("no-underscore.jpg"), None);
        assert_eq!(id_from_file_name("trailing_.jpg"), None);
    }

    #[test]
    fn missing_directory_is_an_empty_index() {
        let index = ExistenceIndex::scan(Path::new("/nonexistent/for/sure"));
        assert_eq!(index.len(), 0);
        assert!(!index.contains("1"));
    }

    #[test]
    fn scan_finds_existing_ids() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("2020-01-01_00_00_00_A_111.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("2020-01-02_00_00_00_B_222.mp4"), b"x").unwrap();

        let mut index = ExistenceIndex::scan(dir.path());
        assert_eq!(index.len(), 2);
        assert!(index.contains("111"));
        assert!(index.contains("222"));
        assert!(!index.contains("333"));

        index.insert("333".to_string());
        assert!(index.contains("333"));
    }
}
