use serde::Deserialize;
use std::{net::IpAddr, num::ParseIntError, time::Duration};
use trackboard_common::model::{Id, user::UserMarker};

/// Process configuration, read from the environment (and an optional `.env`).
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    pub session_secret: String,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub soundcloud_client_id: Option<String>,
    #[serde(default = "default_soundcloud_api_url")]
    pub soundcloud_api_url: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
    /// Comma separated user ids.
    #[serde(default)]
    pub admin_user_ids: String,
    #[serde(default)]
    pub system_user_id: Option<u64>,
    #[serde(default = "default_site_title")]
    pub site_title: String,
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default)]
    pub dev_mode: bool,
    #[serde(default)]
    pub snowflake_worker_id: u8,
    #[serde(default)]
    pub snowflake_process_id: u8,
}

fn default_soundcloud_api_url() -> String {
    "https://api.soundcloud.com".to_owned()
}

fn default_provider_timeout_secs() -> u64 {
    10
}

fn default_site_title() -> String {
    "trackboard".to_owned()
}

fn default_public_url() -> String {
    "http://localhost:8000".to_owned()
}

impl Env {
    pub fn admin_user_ids(&self) -> Result<Vec<Id<UserMarker>>, ParseIntError> {
        self.admin_user_ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::parse)
            .collect()
    }

    #[must_use]
    pub fn system_user_id(&self) -> Option<Id<UserMarker>> {
        self.system_user_id.map(Id::from)
    }

    #[must_use]
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    #[must_use]
    pub fn site_settings(&self) -> SiteSettings {
        SiteSettings {
            title: self.site_title.clone(),
            public_url: self.public_url.trim_end_matches('/').to_owned(),
            dev_mode: self.dev_mode,
            system_user_id: self.system_user_id(),
        }
    }
}

/// The part of the configuration pages and feeds need at request time.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct SiteSettings {
    pub title: String,
    /// Absolute base url without a trailing slash.
    pub public_url: String,
    pub dev_mode: bool,
    pub system_user_id: Option<Id<UserMarker>>,
}

impl SiteSettings {
    #[must_use]
    pub fn page_title(&self) -> String {
        if self.dev_mode {
            format!("{} (dev)", self.title)
        } else {
            self.title.clone()
        }
    }
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            title: default_site_title(),
            public_url: default_public_url(),
            dev_mode: false,
            system_user_id: None,
        }
    }
}
