use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_API_BASE: &str = "https://api.dropbox.com/1";
pub const DEFAULT_CONTENT_BASE: &str = "https://api-content.dropbox.com/1";
pub const DEFAULT_LOGOUT_URL: &str = "https://www.dropbox.com/logout";
pub const DEFAULT_SEARCH_USER_AGENT: &str = "runscope/0.1";
pub const DEFAULT_PROVIDER_NAME: &str = "Dropbox";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub dropbox: DropboxSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DropboxSettings {
    /// Display name used as the provider prefix of share links.
    pub provider_name: String,
    /// Account / metadata / fileops host, including the `/1` version segment.
    pub api_base: String,
    /// Content host used for downloads and uploads.
    pub content_base: String,
    /// Client key sent as `oauth_consumer_key` by the search endpoint.
    pub app_key: String,
    pub logout_url: String,
    pub search_user_agent: String,
}

impl Default for DropboxSettings {
    fn default() -> Self {
        Self {
            provider_name: DEFAULT_PROVIDER_NAME.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            content_base: DEFAULT_CONTENT_BASE.to_string(),
            app_key: String::new(),
            logout_url: DEFAULT_LOGOUT_URL.to_string(),
            search_user_agent: DEFAULT_SEARCH_USER_AGENT.to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("CLOUDBRIDGE"),
            )
            .set_default("dropbox.provider_name", DEFAULT_PROVIDER_NAME)?
            .set_default("dropbox.api_base", DEFAULT_API_BASE)?
            .set_default("dropbox.content_base", DEFAULT_CONTENT_BASE)?
            .set_default("dropbox.app_key", "")?
            .set_default("dropbox.logout_url", DEFAULT_LOGOUT_URL)?
            .set_default("dropbox.search_user_agent", DEFAULT_SEARCH_USER_AGENT)?
            .build()?;

        config.try_deserialize()
    }
}
