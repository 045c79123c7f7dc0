use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use crate::index;
use crate::metadata::MetadataBundle;
use crate::model::{self, MediaRef};

/// One row of the listing page: a successfully mirrored item.
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub stem: String,
    pub file_name: Option<String>,
    pub id: String,
    pub permalink: String,
    pub title: String,
    pub visibility: String,
    pub license: String,
    pub bundle: MetadataBundle,
}

impl ManifestEntry {
    /// Build an entry for an item processed during this run, preferring the
    /// info document's fields when it was available.
    pub fn from_run(
        item: &MediaRef,
        stem: &str,
        file_name: &str,
        info_doc: Option<&Value>,
        bundle: MetadataBundle,
    ) -> ManifestEntry {
        let mut entry = ManifestEntry {
            stem: stem.to_string(),
            file_name: Some(file_name.to_string()),
            id: item.id.clone(),
            permalink: item.permalink(),
            title: item.title.clone(),
            visibility: String::new(),
            license: String::new(),
            bundle,
        };
        if let Some(doc) = info_doc {
            entry.apply_info(doc);
        }
        entry
    }

    fn apply_info(&mut self, doc: &Value) {
        if let Some(title) = doc["title"]["_content"].as_str() {
            self.title = title.to_string();
        }
        self.visibility = visibility_label(&doc["visibility"]);
        self.license = license_code(&doc["license"]);
        if let Some(url) = doc["urls"]["url"][0]["_content"].as_str() {
            self.permalink = url.to_string();
        } else if let (Some(owner), Some(id)) = (doc["owner"]["nsid"].as_str(), doc["id"].as_str())
        {
            self.permalink = model::permalink(owner, id);
        }
    }
}

/// Write `<collection>/index.html`. The listing is rebuilt from the info
/// documents already on disk plus the `photos/` directory, then overlaid
/// with this run's manifest, so the page covers every run — including items
/// whose info document was denied, this time or in an earlier run.
pub fn write_index(
    root: &Path,
    collection_title: &str,
    run_manifest: &[ManifestEntry],
) -> anyhow::Result<()> {
    let data_dir = root.join("data");
    let photos = photo_files(&root.join("photos"));
    let mut on_disk = scan_data_dir(&data_dir, &photos);

    let mut covered: HashSet<String> = HashSet::new();
    let mut entries: Vec<ManifestEntry> = Vec::new();
    for entry in run_manifest {
        on_disk.remove(&entry.stem);
        covered.insert(entry.stem.clone());
        entries.push(entry.clone());
    }

    let mut earlier: Vec<ManifestEntry> = on_disk.into_values().collect();
    for entry in &earlier {
        covered.insert(entry.stem.clone());
    }

    // Downloaded photos whose info document never landed still get a row:
    // the local file link and an id-only permalink.
    for (stem, file_name) in &photos {
        if covered.contains(stem) {
            continue;
        }
        let Some(id) = index::id_from_file_name(file_name) else {
            continue;
        };
        earlier.push(ManifestEntry {
            stem: stem.clone(),
            file_name: Some(file_name.clone()),
            permalink: model::id_permalink(&id),
            id,
            title: String::new(),
            visibility: String::new(),
            license: String::new(),
            bundle: MetadataBundle {
                exif: data_dir.join(format!("{stem}_exif.json")).exists(),
                info: false,
                sizes: data_dir.join(format!("{stem}_sizes.json")).exists(),
            },
        });
    }

    // Stems lead with the taken datetime, so this is newest-first.
    earlier.sort_by(|a, b| b.stem.cmp(&a.stem));
    entries.extend(earlier);

    let html = render(collection_title, &entries);
    let path = root.join("index.html");
    std::fs::write(&path, html).with_context(|| format!("writing {}", path.display()))
}

/// Map of stem -> file name for everything in `photos/`.
fn photo_files(photos_dir: &Path) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if let Ok(entries) = std::fs::read_dir(photos_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let stem = match name.rsplit_once('.') {
                Some((stem, _)) => stem.to_string(),
                None => name.clone(),
            };
            map.insert(stem, name);
        }
    }
    map
}

/// Rebuild manifest entries for previous runs from `data/*_info.json`.
fn scan_data_dir(
    data_dir: &Path,
    photos: &HashMap<String, String>,
) -> HashMap<String, ManifestEntry> {
    let mut entries = HashMap::new();
    let Ok(dir) = std::fs::read_dir(data_dir) else {
        return entries;
    };
    for entry in dir.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(stem) = name.strip_suffix("_info.json") else {
            continue;
        };
        let Ok(text) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        let Ok(doc) = serde_json::from_str::<Value>(&text) else {
            log::warn!("skipping unparseable info document {name}");
            continue;
        };

        let id = match doc["id"].as_str() {
            Some(id) => id.to_string(),
            None => continue,
        };
        let mut item = ManifestEntry {
            stem: stem.to_string(),
            file_name: photos.get(stem).cloned(),
            id,
            permalink: String::new(),
            title: String::new(),
            visibility: String::new(),
            license: String::new(),
            bundle: MetadataBundle {
                exif: data_dir.join(format!("{stem}_exif.json")).exists(),
                info: true,
                sizes: data_dir.join(format!("{stem}_sizes.json")).exists(),
            },
        };
        item.apply_info(&doc);
        entries.insert(stem.to_string(), item);
    }
    entries
}

fn visibility_label(visibility: &Value) -> String {
    let flag = |key: &str| {
        visibility[key].as_u64().unwrap_or(0) == 1 || visibility[key].as_bool().unwrap_or(false)
    };
    if flag("ispublic") {
        "public".to_string()
    } else {
        match (flag("isfriend"), flag("isfamily")) {
            (true, true) => "friends & family".to_string(),
            (true, false) => "friends".to_string(),
            (false, true) => "family".to_string(),
            (false, false) => "private".to_string(),
        }
    }
}

fn license_code(license: &Value) -> String {
    license
        .as_str()
        .map(str::to_string)
        .or_else(|| license.as_u64().map(|n| n.to_string()))
        .unwrap_or_default()
}

fn render(collection_title: &str, entries: &[ManifestEntry]) -> String {
    let mut html = String::new();
    let title = escape(collection_title);
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n\
         <style>body{{font-family:sans-serif;margin:2em}}\
         table{{border-collapse:collapse}}\
         td,th{{border:1px solid #ccc;padding:0.3em 0.6em;text-align:left}}</style>\n\
         </head>\n<body>\n<h1>{title}</h1>\n\
         <p>{count} items.</p>\n\
         <table>\n<tr><th>Local file</th><th>Title</th><th>Visibility</th>\
         <th>License</th><th>Metadata</th><th>Source</th></tr>\n",
        count = entries.len(),
    );

    for entry in entries {
        let local = match &entry.file_name {
            Some(name) => format!(
                "<a href=\"photos/{href}\">{text}</a>",
                href = escape(name),
                text = escape(name)
            ),
            None => escape(&entry.stem),
        };
        let mut docs = Vec::new();
        if entry.bundle.exif {
            docs.push(format!("<a href=\"data/{}_exif.json\">exif</a>", escape(&entry.stem)));
        }
        if entry.bundle.info {
            docs.push(format!("<a href=\"data/{}_info.json\">info</a>", escape(&entry.stem)));
        }
        if entry.bundle.sizes {
            docs.push(format!("<a href=\"data/{}_sizes.json\">sizes</a>", escape(&entry.stem)));
        }
        let _ = write!(
            html,
            "<tr><td>{local}</td><td>{title}</td><td>{visibility}</td>\
             <td>{license}</td><td>{docs}</td>\
             <td><a href=\"{permalink}\">{id}</a></td></tr>\n",
            title = escape(&entry.title),
            visibility = escape(&entry.visibility),
            license = escape(&entry.license),
            docs = docs.join(" "),
            permalink = escape(&entry.permalink),
            id = escape(&entry.id),
        );
    }

    html.push_str("</table>\n</body>\n</html>\n");
    html
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_doc(id: &str, title: &str) -> Value {
        serde_json::json!({
            "id": id,
            "title": {"_content": title},
            "visibility": {"ispublic": 1, "isfriend": 0, "isfamily": 0},
            "license": "4",
            "owner": {"nsid": "12345678@N00"},
            "urls": {"url": [{"type": "photopage",
                              "_content": format!("https://www.flickr.com/photos/jane/{id}/")}]}
        })
    }

    #[test]
    fn visibility_labels() {
        assert_eq!(
            visibility_label(&serde_json::json!({"ispublic": 1})),
            "public"
        );
        assert_eq!(
            visibility_label(&serde_json::json!({"ispublic": 0, "isfriend": 1, "isfamily": 1})),
            "friends & family"
        );
        assert_eq!(visibility_label(&serde_json::json!({})), "private");
    }

    #[test]
    fn index_covers_earlier_runs_from_disk() {
        let root = tempfile::tempdir().unwrap();
        let photos = root.path().join("photos");
        let data = root.path().join("data");
        std::fs::create_dir_all(&photos).unwrap();
        std::fs::create_dir_all(&data).unwrap();

        std::fs::write(photos.join("2020-01-01_00_00_00_Jane_111.jpg"), b"x").unwrap();
        std::fs::write(
            data.join("2020-01-01_00_00_00_Jane_111_info.json"),
            serde_json::to_string(&info_doc("111", "Old & loved")).unwrap(),
        )
        .unwrap();

        write_index(root.path(), "favorites", &[]).unwrap();

        let html = std::fs::read_to_string(root.path().join("index.html")).unwrap();
        assert!(html.contains("photos/2020-01-01_00_00_00_Jane_111.jpg"));
        assert!(html.contains("Old &amp; loved"));
        assert!(html.contains("https://www.flickr.com/photos/jane/111/"));
        assert!(html.contains("public"));
        assert!(html.contains("1 items"));
    }

    #[test]
    fn photo_without_info_document_is_still_listed() {
        let root = tempfile::tempdir().unwrap();
        let photos = root.path().join("photos");
        let data = root.path().join("data");
        std::fs::create_dir_all(&photos).unwrap();
        std::fs::create_dir_all(&data).unwrap();

        // Downloaded in an earlier run whose getInfo was denied: binary and
        // sizes made it to disk, the info document never did.
        std::fs::write(photos.join("2019-06-01_00_00_00_Jane_555.jpg"), b"x").unwrap();
        std::fs::write(data.join("2019-06-01_00_00_00_Jane_555_sizes.json"), b"{}").unwrap();

        write_index(root.path(), "favorites", &[]).unwrap();

        let html = std::fs::read_to_string(root.path().join("index.html")).unwrap();
        assert!(html.contains("photos/2019-06-01_00_00_00_Jane_555.jpg"));
        assert!(html.contains("https://www.flickr.com/photo.gne?id=555"));
        assert!(html.contains("_555_sizes.json"));
        assert!(!html.contains("_555_info.json"));
        assert!(html.contains("1 items"));
    }

    #[test]
    fn run_manifest_takes_precedence_over_disk_scan() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("photos")).unwrap();
        std::fs::create_dir_all(root.path().join("data")).unwrap();

        let entry = ManifestEntry {
            stem: "2021-05-05_10_00_00_Jane_222".into(),
            file_name: Some("2021-05-05_10_00_00_Jane_222.jpg".into()),
            id: "222".into(),
            permalink: "https://www.flickr.com/photos/12345678@N00/222/".into(),
            title: "Fresh".into(),
            visibility: "public".into(),
            license: "0".into(),
            bundle: MetadataBundle {
                exif: false,
                info: true,
                sizes: true,
            },
        };
        write_index(root.path(), "favorites", &[entry]).unwrap();

        let html = std::fs::read_to_string(root.path().join("index.html")).unwrap();
        assert!(html.contains("Fresh"));
        assert!(html.contains("_222_info.json"));
        assert!(html.contains("_222_sizes.json"));
        assert!(!html.contains("_222_exif.json"));
    }
}
