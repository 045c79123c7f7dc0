//! OAuth 1.0a request signing and the one-time authorization flow.
//!
//! Flickr still speaks OAuth 1.0a: every REST call carries a set of `oauth_*`
//! parameters plus an HMAC-SHA1 signature over the method, URL and the full
//! sorted parameter list (RFC 5849 §3.4).

use std::collections::HashMap;
use std::io::Write as _;

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

const REQUEST_TOKEN_URL: &str = "https://www.flickr.com/services/oauth/request_token";
const AUTHORIZE_URL: &str = "https://www.flickr.com/services/oauth/authorize";
const ACCESS_TOKEN_URL: &str = "https://www.flickr.com/services/oauth/access_token";

/// RFC 5849 leaves exactly ALPHA / DIGIT / "-" / "." / "_" / "~" unencoded.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Signing material for one request. `token`/`token_secret` are absent only
/// during the request-token step of authorization.
pub struct OauthKeys<'a> {
    pub consumer_key: &'a str,
    pub consumer_secret: &'a str,
    pub token: Option<&'a str>,
    pub token_secret: Option<&'a str>,
}

/// Credentials returned by the access-token exchange.
pub struct AccessToken {
    pub token: String,
    pub secret: String,
    pub user_nsid: String,
    pub username: String,
}

/// Add the `oauth_*` protocol parameters and the signature to `params`.
/// The returned list is ready to be sent as the request's query string.
pub fn signed_params(
    method: &str,
    url: &str,
    keys: &OauthKeys<'_>,
    mut params: Vec<(String, String)>,
) -> Vec<(String, String)> {
    params.push(("oauth_consumer_key".into(), keys.consumer_key.into()));
    params.push(("oauth_nonce".into(), nonce()));
    params.push(("oauth_signature_method".into(), "HMAC-SHA1".into()));
    params.push((
        "oauth_timestamp".into(),
        chrono::Utc::now().timestamp().to_string(),
    ));
    params.push(("oauth_version".into(), "1.0".into()));
    if let Some(token) = keys.token {
        params.push(("oauth_token".into(), token.into()));
    }

    let base = base_string(method, url, &params);
    let signature = sign(&base, keys.consumer_secret, keys.token_secret.unwrap_or(""));
    params.push(("oauth_signature".into(), signature));
    params
}

/// The signature base string: `METHOD&enc(url)&enc(sorted k=v pairs)`.
/// Sorting happens on the already-encoded pairs, per the RFC.
fn base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut pairs: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect();
    pairs.sort();
    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(url),
        encode(&pairs.join("&"))
    )
}

fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> String {
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC key of any length");
    mac.update(base.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

fn encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}

fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

/// Parse a form-encoded token response (`oauth_token=...&oauth_token_secret=...`).
fn parse_form(body: &str) -> HashMap<String, String> {
    body.split('&')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((
                percent_decode_str(k).decode_utf8_lossy().into_owned(),
                percent_decode_str(v).decode_utf8_lossy().into_owned(),
            ))
        })
        .collect()
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str, body: &str) -> anyhow::Result<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .with_context(|| format!("no {name} in token response: {body}"))
}

/// Interactive one-time authorization: obtain a request token, send the user
/// to Flickr's grant page, and trade the verifier they type in for an access
/// token. Read-only permissions are enough for mirroring.
pub async fn authorize(
    client: &reqwest::Client,
    api_key: &str,
    api_secret: &str,
) -> anyhow::Result<AccessToken> {
    let keys = OauthKeys {
        consumer_key: api_key,
        consumer_secret: api_secret,
        token: None,
        token_secret: None,
    };
    let params = signed_params(
        "GET",
        REQUEST_TOKEN_URL,
        &keys,
        vec![("oauth_callback".into(), "oob".into())],
    );
    let body = client
        .get(REQUEST_TOKEN_URL)
        .query(&params)
        .send()
        .await?
        .text()
        .await
        .context("requesting OAuth request token")?;
    let fields = parse_form(&body);
    let request_token = field(&fields, "oauth_token", &body)?.to_string();
    let request_secret = field(&fields, "oauth_token_secret", &body)?.to_string();

    println!("Open this URL in your web browser, sign in, and agree to the authorization.");
    println!("You will be shown a verifier code to type in here:");
    println!();
    println!("  {AUTHORIZE_URL}?oauth_token={request_token}&perms=read");
    println!();
    print!("Verifier code: ");
    std::io::stdout().flush()?;

    let mut verifier = String::new();
    std::io::stdin()
        .read_line(&mut verifier)
        .context("reading verifier code")?;
    let verifier = verifier.trim().to_string();

    let keys = OauthKeys {
        consumer_key: api_key,
        consumer_secret: api_secret,
        token: Some(&request_token),
        token_secret: Some(&request_secret),
    };
    let params = signed_params(
        "GET",
        ACCESS_TOKEN_URL,
        &keys,
        vec![("oauth_verifier".into(), verifier)],
    );
    let body = client
        .get(ACCESS_TOKEN_URL)
        .query(&params)
        .send()
        .await?
        .text()
        .await
        .context("exchanging verifier for access token")?;
    let fields = parse_form(&body);

    Ok(AccessToken {
        token: field(&fields, "oauth_token", &body)?.to_string(),
        secret: field(&fields, "oauth_token_secret", &body)?.to_string(),
        user_nsid: field(&fields, "user_nsid", &body)?.to_string(),
        username: fields.get("username").cloned().unwrap_or_default(),
    })
}
