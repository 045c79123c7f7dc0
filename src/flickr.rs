use serde_json::Value;

use crate::config::Config;
use crate::model::ListingPage;
use crate::oauth::{self, OauthKeys};
use crate::retry::{self, RetryPolicy};

const REST_URL: &str = "https://api.flickr.com/services/rest";
const USER_AGENT: &str = concat!("flickr-mirror/", env!("CARGO_PKG_VERSION"));
const PER_PAGE: &str = "500";
const LISTING_EXTRAS: &str = "date_taken,owner_name,media,url_o,original_format";

/// Which remote collection a run mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// Items the authorizing user has favorited.
    Favorites,
    /// Items other people tagged the authorizing user in.
    PhotosOf,
}

impl Collection {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Collection::Favorites => "favorites",
            Collection::PhotosOf => "photosof",
        }
    }

    fn method(&self) -> &'static str {
        match self {
            Collection::Favorites => "flickr.favorites.getList",
            Collection::PhotosOf => "flickr.people.getPhotosOf",
        }
    }
}

/// The three per-item metadata documents. Each is independently optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Exif,
    Info,
    Sizes,
}

impl MetadataKind {
    /// Suffix of the JSON file written under `data/`.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            MetadataKind::Exif => "exif",
            MetadataKind::Info => "info",
            MetadataKind::Sizes => "sizes",
        }
    }

    fn method(&self) -> &'static str {
        match self {
            MetadataKind::Exif => "flickr.photos.getExif",
            MetadataKind::Info => "flickr.photos.getInfo",
            MetadataKind::Sizes => "flickr.photos.getSizes",
        }
    }

    /// Key of the response envelope holding the document itself.
    fn envelope(&self) -> &'static str {
        match self {
            MetadataKind::Exif | MetadataKind::Info => "photo",
            MetadataKind::Sizes => "sizes",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("rate limited by the API")]
    Throttled,
    #[error("API error {code}: {message}")]
    Api { code: u64, message: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Malformed(String),
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Throttled => true,
            ApiError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            _ => false,
        }
    }
}

/// The narrow remote surface the orchestrator needs: credential check, paged
/// listing, per-item metadata, binary fetch. Tests substitute an in-memory
/// implementation; production uses [`FlickrClient`].
pub trait MediaApi {
    async fn verify_credentials(&self) -> Result<String, ApiError>;
    async fn list_page(&self, collection: Collection, page: u64) -> Result<ListingPage, ApiError>;
    async fn get_metadata(&self, kind: MetadataKind, photo_id: &str) -> Result<Value, ApiError>;
    async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, ApiError>;
}

/// OAuth-signed client for the Flickr REST endpoint.
pub struct FlickrClient {
    client: reqwest::Client,
    config: Config,
    retry: RetryPolicy,
}

impl FlickrClient {
    pub fn new(config: Config) -> anyhow::Result<FlickrClient> {
        config.oauth_credentials()?;
        Ok(FlickrClient {
            client: build_client()?,
            config,
            retry: RetryPolicy::default(),
        })
    }

    fn signed_query(&self, method: &str, args: &[(&str, &str)]) -> Vec<(String, String)> {
        // oauth_credentials() was checked in new()
        let (token, token_secret) = self.config.oauth_credentials().unwrap_or(("", ""));
        let keys = OauthKeys {
            consumer_key: &self.config.api_key,
            consumer_secret: &self.config.api_secret,
            token: Some(token),
            token_secret: Some(token_secret),
        };

        let mut params: Vec<(String, String)> = vec![
            ("method".into(), method.into()),
            ("format".into(), "json".into()),
            ("nojsoncallback".into(), "1".into()),
        ];
        params.extend(args.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        oauth::signed_params("GET", REST_URL, &keys, params)
    }

    /// One signed REST call with retry on throttling and transient failures.
    async fn call(&self, method: &str, args: &[(&str, &str)]) -> Result<Value, ApiError> {
        retry::with_backoff(&self.retry, ApiError::is_retryable, || async move {
            let params = self.signed_query(method, args);
            let response = self.client.get(REST_URL).query(&params).send().await?;
            if response.status().as_u16() == 429 {
                return Err(ApiError::Throttled);
            }
            // Surface 5xx as a status-bearing error before decoding; a decode
            // error on an HTML error page would not be retryable.
            let response = response.error_for_status()?;
            let body: Value = response.json().await?;
            if body["stat"] == "fail" {
                let code = body["code"].as_u64().unwrap_or(0);
                let message = body["message"].as_str().unwrap_or("unknown").to_string();
                return Err(map_failure(code, message));
            }
            Ok(body)
        })
        .await
    }
}

fn build_client() -> anyhow::Result<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(USER_AGENT),
    );
    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

/// Map Flickr's `stat=fail` codes to the error taxonomy. Codes 98-100 are
/// credential problems; code 0 is the API's "temporarily unavailable".
fn map_failure(code: u64, message: String) -> ApiError {
    match code {
        1 => ApiError::NotFound,
        98 | 99 | 100 => ApiError::Auth(message),
        0 => ApiError::Throttled,
        _ => ApiError::Api { code, message },
    }
}

impl MediaApi for FlickrClient {
    /// `flickr.test.login`; resolves the caller's NSID and proves the token
    /// works before any item is touched.
    async fn verify_credentials(&self) -> Result<String, ApiError> {
        let body = self.call("flickr.test.login", &[]).await?;
        body["user"]["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Malformed("test.login returned no user id".into()))
    }

    async fn list_page(&self, collection: Collection, page: u64) -> Result<ListingPage, ApiError> {
        let page_arg = page.to_string();
        let mut args: Vec<(&str, &str)> = vec![
            ("per_page", PER_PAGE),
            ("page", &page_arg),
            ("extras", LISTING_EXTRAS),
        ];
        // getPhotosOf requires an explicit subject; favorites defaults to
        // the calling user.
        let nsid = self.config.user_nsid.clone().unwrap_or_default();
        if collection == Collection::PhotosOf {
            if nsid.is_empty() {
                return Err(ApiError::Auth(
                    "no user_nsid in config; run authorize again".into(),
                ));
            }
            args.push(("user_id", nsid.as_str()));
        }

        let mut body = self.call(collection.method(), &args).await?;
        serde_json::from_value(body["photos"].take())
            .map_err(|e| ApiError::Malformed(format!("listing page: {e}")))
    }

    async fn get_metadata(&self, kind: MetadataKind, photo_id: &str) -> Result<Value, ApiError> {
        let mut body = self.call(kind.method(), &[("photo_id", photo_id)]).await?;
        let doc = body[kind.envelope()].take();
        if doc.is_null() {
            return Err(ApiError::Malformed(format!(
                "{method} returned no {envelope} envelope",
                method = kind.method(),
                envelope = kind.envelope()
            )));
        }
        Ok(doc)
    }

    /// Plain (unsigned) fetch; binaries live on Flickr's CDN, and size/original
    /// URLs are pre-authorized.
    async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        retry::with_backoff(&self.retry, ApiError::is_retryable, || async move {
            let response = self.client.get(url).send().await?;
            if response.status().as_u16() == 429 {
                return Err(ApiError::Throttled);
            }
            let response = response.error_for_status()?;
            Ok(response.bytes().await?.to_vec())
        })
        .await
    }
}
