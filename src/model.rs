pub use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One entry of a remote listing page, as returned by `flickr.favorites.getList`
/// or `flickr.people.getPhotosOf` with
/// `extras=date_taken,owner_name,media,url_o,original_format`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub owner: String,
    #[serde(rename = "ownername", default)]
    pub owner_name: String,
    #[serde(default)]
    pub title: String,
    /// Local time at the camera, `YYYY-MM-DD HH:MM:SS`, no zone.
    #[serde(rename = "datetaken", default)]
    pub date_taken: String,
    #[serde(default = "photo_media")]
    pub media: String,
    /// Direct URL of the original file, when the API serves one.
    #[serde(rename = "url_o", default)]
    pub original_url: Option<String>,
    #[serde(rename = "originalformat", default)]
    pub original_format: Option<String>,
}

fn photo_media() -> String {
    "photo".to_string()
}

impl MediaRef {
    pub fn is_video(&self) -> bool {
        self.media == "video"
    }

    /// Parse the taken datetime. Flickr reports it without a zone; it is
    /// treated as UTC, which is good enough for file mtimes.
    pub fn taken_at(&self) -> Option<DateTime<Utc>> {
        chrono::NaiveDateTime::parse_from_str(&self.date_taken, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn permalink(&self) -> String {
        permalink(&self.owner, &self.id)
    }
}

pub fn permalink(owner: &str, id: &str) -> String {
    format!("https://www.flickr.com/photos/{owner}/{id}/")
}

/// Permalink for an item whose owner is unknown; Flickr redirects
/// `photo.gne` lookups to the canonical photo page.
pub fn id_permalink(id: &str) -> String {
    format!("https://www.flickr.com/photo.gne?id={id}")
}

/// One page of a paged listing call (the `photos` envelope of the response).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingPage {
    #[serde(default, deserialize_with = "number_or_string")]
    pub page: u64,
    #[serde(default, deserialize_with = "number_or_string")]
    pub pages: u64,
    #[serde(default, deserialize_with = "number_or_string")]
    pub total: u64,
    #[serde(rename = "photo", default)]
    pub items: Vec<MediaRef>,
}

/// The `sizes` envelope of `flickr.photos.getSizes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizesDoc {
    #[serde(rename = "size", default)]
    pub sizes: Vec<SizeVariant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeVariant {
    pub label: String,
    #[serde(default, deserialize_with = "number_or_string")]
    pub width: u64,
    #[serde(default, deserialize_with = "number_or_string")]
    pub height: u64,
    pub source: String,
    #[serde(default)]
    pub media: String,
}

impl SizeVariant {
    pub fn area(&self) -> u64 {
        self.width.saturating_mul(self.height)
    }
}

/// Flickr is inconsistent about numeric fields: `width` comes back as a
/// string for some size labels and as a number for others, and `total` on
/// listing pages is a string. Accept both.
fn number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
