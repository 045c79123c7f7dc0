use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Credentials and account identity, kept in a JSON file next to wherever the
/// tool is run from. `api_key`/`api_secret` are filled in by hand from the
/// Flickr app registration; the rest is written by the `authorize` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_key: String,
    pub api_secret: String,
    #[serde(default)]
    pub oauth_token: Option<String>,
    #[serde(default)]
    pub oauth_token_secret: Option<String>,
    #[serde(default)]
    pub user_nsid: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("can't read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            anyhow::bail!(
                "config file {} needs api_key and api_secret from your Flickr app registration",
                path.display()
            );
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .with_context(|| format!("can't write config file {}", path.display()))
    }

    /// The OAuth token pair, or an instruction to authorize first.
    pub fn oauth_credentials(&self) -> anyhow::Result<(&str, &str)> {
        match (&self.oauth_token, &self.oauth_token_secret) {
            (Some(token), Some(secret)) if !token.is_empty() => Ok((token, secret)),
            _ => anyhow::bail!("no OAuth token in config; run `flickr-mirror authorize` first"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config {
            api_key: "key".into(),
            api_secret: "secret".into(),
            oauth_token: Some("tok".into()),
            oauth_token_secret: Some("toksec".into()),
            user_nsid: Some("12345678@N00".into()),
            username: Some("jane".into()),
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.oauth_credentials().unwrap(), ("tok", "toksec"));
        assert_eq!(loaded.user_nsid.as_deref(), Some("12345678@N00"));
    }

    #[test]
    fn missing_token_points_at_authorize() {
        let config = Config {
            api_key: "key".into(),
            api_secret: "secret".into(),
            oauth_token: None,
            oauth_token_secret: None,
            user_nsid: None,
            username: None,
        };
        let err = config.oauth_credentials().unwrap_err();
        assert!(err.to_string().contains("authorize"));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_key": "", "api_secret": ""}"#).unwrap();
        assert!(Config::load(&path).is_err());
    }
}
