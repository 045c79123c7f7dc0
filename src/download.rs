use std::path::Path;

use anyhow::Context;
use filetime::FileTime;

use crate::flickr::MediaApi;
use crate::model::{MediaRef, SizesDoc};

/// MP4 transcode labels Flickr uses for video, in preference order.
/// Video "originals" are often not served directly, so the transcode is the
/// reliable representation.
const VIDEO_LABELS: [&str; 4] = ["Video Original", "Site MP4", "HD MP4", "Mobile MP4"];

/// The binary representation picked for an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChosenSource {
    pub url: String,
    pub extension: String,
}

/// Pick the best binary representation: the original when the API reports
/// one, else an MP4 transcode for video, else the largest size variant.
pub fn choose_source(item: &MediaRef, sizes: Option<&SizesDoc>) -> Option<ChosenSource> {
    if let Some(url) = &item.original_url {
        return Some(ChosenSource {
            url: url.clone(),
            extension: item
                .original_format
                .clone()
                .unwrap_or_else(|| "jpg".to_string()),
        });
    }

    let sizes = sizes?;

    if item.is_video() {
        for label in VIDEO_LABELS {
            if let Some(variant) = sizes.sizes.iter().find(|s| s.label == label) {
                return Some(ChosenSource {
                    url: variant.source.clone(),
                    extension: "mp4".to_string(),
                });
            }
        }
    }

    let best = sizes.sizes.iter().max_by_key(|s| s.area())?;
    Some(ChosenSource {
        url: best.source.clone(),
        extension: extension_from_url(&best.source).unwrap_or_else(|| "jpg".to_string()),
    })
}

/// Fetch the chosen binary and write it in one piece at
/// `photos_dir/{stem}.{ext}`. Bytes are fully buffered before the write, so a
/// failed download leaves no partial file behind. Returns the file name.
pub async fn fetch_to_disk<A: MediaApi>(
    api: &A,
    item: &MediaRef,
    source: &ChosenSource,
    photos_dir: &Path,
    stem: &str,
) -> anyhow::Result<String> {
    let bytes = api
        .fetch_binary(&source.url)
        .await
        .with_context(|| format!("downloading {}", source.url))?;

    let file_name = format!("{stem}.{ext}", ext = source.extension);
    let path = photos_dir.join(&file_name);
    std::fs::write(&path, &bytes).with_context(|| format!("writing {}", path.display()))?;

    if let Some(taken) = item.taken_at() {
        let mtime = FileTime::from_unix_time(taken.timestamp(), 0);
        if let Err(e) = filetime::set_file_mtime(&path, mtime) {
            log::warn!("couldn't set mtime on {}: {e}", path.display());
        }
    }

    Ok(file_name)
}

fn extension_from_url(url: &str) -> Option<String> {
    let last = url.rsplit('/').next()?;
    let last = last.split(['?', '#']).next()?;
    let (_, ext) = last.rsplit_once('.')?;
    if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext.to_ascii_lowercase())
    } else {
        None
    }
}
