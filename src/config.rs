use crate::dataspace::MatchPolicy;
use crate::error::ConfigError;
use crate::product::TileCode;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const TOKEN_URL: &str =
    "https://identity.dataspace.copernicus.eu/auth/realms/CDSE/protocol/openid-connect/token";
const CATALOG_URL: &str = "https://catalogue.dataspace.copernicus.eu/odata/v1";
const DOWNLOAD_URL: &str = "https://zipper.dataspace.copernicus.eu/odata/v1";
const PUBLIC_CLIENT_ID: &str = "cdse-public";

/// Everything the client needs, read once at startup and passed down by reference.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    tiles: BTreeMap<String, Vec<TileCode>>,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub download: DownloadSettings,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Endpoints {
    pub token_url: Url,
    pub catalog_url: Url,
    pub download_url: Url,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct HttpSettings {
    pub connect_timeout_secs: Option<u64>,
    /// Overall request timeout. Absent or zero means no limit.
    pub timeout_secs: Option<u64>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct DownloadSettings {
    pub datadir: PathBuf,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub match_policy: MatchPolicy,
}

fn default_client_id() -> String {
    PUBLIC_CLIENT_ID.to_string()
}

impl Config {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn from_template(table: &toml::Table) -> Result<Self> {
        let config: Self = toml::from_str(&table.to_string())?;
        Ok(config)
    }

    /// Starting point written by `init-config`.
    pub fn template() -> toml::Table {
        toml::toml! {
            [credentials]
            username = ""
            password = ""
            client_id = "cdse-public"

            // Sentinel-2A and 2B share an orbit 180 degrees apart, so any tile
            // is revisited every five days.
            [tiles]
            test = ["16QEJ", "16QDH"]

            [download]
            datadir = "./data"
            max_retries = 3
            retry_delay_ms = 1000
            match_policy = "earliest"
        }
    }

    pub fn tile_set(self: &Self, name: &str) -> Result<&[TileCode], ConfigError> {
        self.tiles
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ConfigError::UnknownTileSet(name.to_string()))
    }

    pub fn tile_set_names(self: &Self) -> impl Iterator<Item = &str> {
        self.tiles.keys().map(String::as_str)
    }
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            client_id: default_client_id(),
        }
    }

    /// Replace the stored pair with values supplied on the command line or environment.
    pub fn override_with(&mut self, username: Option<String>, password: Option<String>) {
        if let Some(username) = username {
            self.username = username;
        }
        if let Some(password) = password {
            self.password = password;
        }
    }

    pub fn require(self: &Self) -> Result<&Self, ConfigError> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        Ok(self)
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            token_url: Url::parse(TOKEN_URL).expect("Default token url should always parse"),
            catalog_url: Url::parse(CATALOG_URL).expect("Default catalog url should always parse"),
            download_url: Url::parse(DOWNLOAD_URL)
                .expect("Default download url should always parse"),
        }
    }
}

impl Endpoints {
    /// Point every endpoint at one base url, used to aim the client at a mock server.
    #[cfg(test)]
    pub fn with_base(base: &str) -> Result<Self> {
        let base = base.trim_end_matches('/');
        Ok(Self {
            token_url: Url::parse(&format!("{base}/token"))?,
            catalog_url: Url::parse(&format!("{base}/odata/v1"))?,
            download_url: Url::parse(&format!("{base}/odata/v1"))?,
        })
    }

    pub fn products_url(self: &Self) -> String {
        format!("{}/Products", self.catalog_url.as_str().trim_end_matches('/'))
    }

    pub fn product_value_url(self: &Self, id: &str) -> String {
        format!(
            "{}/Products({id})/$value",
            self.download_url.as_str().trim_end_matches('/')
        )
    }
}

impl HttpSettings {
    pub fn build_client(self: &Self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = self.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.timeout_secs.filter(|&s| s > 0) {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(builder.build()?)
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            datadir: PathBuf::from("./data"),
            max_retries: 3,
            retry_delay_ms: 1000,
            match_policy: MatchPolicy::default(),
        }
    }
}

impl DownloadSettings {
    pub fn retry_delay(self: &Self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_template() {
        let config = Config::from_template(&Config::template()).unwrap();
        assert_eq!(config.credentials.client_id, "cdse-public");
        let tiles = config.tile_set("test").unwrap();
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0].as_str(), "16QEJ");
        assert_eq!(config.download.max_retries, 3);
        assert_eq!(config.download.match_policy, MatchPolicy::Earliest);
    }

    #[test]
    fn test_write_and_read_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataspace.toml");
        let config = Config::from_template(&Config::template()).unwrap();
        config.write(&path).unwrap();

        let config = Config::read(&path).unwrap();
        assert_eq!(config.tile_set("test").unwrap()[1].as_str(), "16QDH");
        assert_eq!(config.endpoints.token_url.as_str(), TOKEN_URL);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [credentials]
            username = "user"
            password = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.credentials.client_id, "cdse-public");
        assert_eq!(config.download.datadir, PathBuf::from("./data"));
        assert_eq!(config.http.timeout_secs, None);
        assert_eq!(
            config.endpoints.product_value_url("abc"),
            "https://zipper.dataspace.copernicus.eu/odata/v1/Products(abc)/$value"
        );
    }

    #[test]
    fn test_invalid_tile_in_config_is_rejected() {
        let result = toml::from_str::<Config>(
            r#"
            [tiles]
            bad = ["16QEJ", "ZZZZZ"]
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_tile_set() {
        let config = Config::default();
        assert!(matches!(
            config.tile_set("missing"),
            Err(ConfigError::UnknownTileSet(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_credentials_override_and_require() {
        let mut credentials = Credentials::default();
        assert!(credentials.require().is_err());

        credentials.override_with(Some("user".to_string()), None);
        assert!(credentials.require().is_err());

        credentials.override_with(None, Some("secret".to_string()));
        assert_eq!(credentials.require().unwrap().username, "user");
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = Credentials::new("user", "hunter2");
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }
}
