use crate::model::MediaRef;

/// Derive the local filename stem for an item: `{taken}_{owner}_{id}`.
///
/// The stem is a pure function of the item, so re-runs resolve to the same
/// name and the existence index can match on it. The id is appended verbatim
/// and is what keeps stems unique; the taken datetime and owner name are only
/// there so directory listings sort and read well.
pub fn filename_stem(item: &MediaRef) -> String {
    let taken = sanitize(&item.date_taken);
    let owner = sanitize(&item.owner_name);
    format!("{taken}_{owner}_{id}", id = item.id)
}

/// Replace characters that are unsafe on common filesystems, plus whitespace,
/// with underscores. Never applied to the id suffix.
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, owner_name: &str, date_taken: &str) -> MediaRef {
        MediaRef {
            id: id.to_string(),
            owner: "12345678@N00".to_string(),
            owner_name: owner_name.to_string(),
            title: String::new(),
            date_taken: date_taken.to_string(),
            media: "photo".to_string(),
            original_url: None,
            original_format: None,
        }
    }

    #[test]
    fn stem_is_deterministic() {
        let a = item("123", "Jane Example", "2020-03-14 18:32:47");
        assert_eq!(filename_stem(&a), filename_stem(&a));
        assert_eq!(
            filename_stem(&a),
            "2020-03-14_18_32_47_Jane_Example_123"
        );
    }

    #[test]
    fn unsafe_owner_characters_are_replaced() {
        let a = item("9", "a/b\\c:d*e?f\"g<h>i|j", "2020-01-01 00:00:00");
        let stem = filename_stem(&a);
        assert!(stem.ends_with("_9"));
        assert!(!stem.contains(['/', '\\', ':', '*', '?', '"', '<', '>', '|']));
    }

    #[test]
    fn distinct_ids_never_collide() {
        let a = item("100", "Same Name", "2020-01-01 12:00:00");
        let b = item("200", "Same Name", "2020-01-01 12:00:00");
        assert_ne!(filename_stem(&a), filename_stem(&b));
    }
}
