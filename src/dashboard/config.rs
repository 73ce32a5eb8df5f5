use std::path::PathBuf;
use std::time::Duration;

use rocket::figment::{providers::Env, Figment};
use serde::Deserialize;

use crate::dashboard::{geocode::DEFAULT_NOMINATIM_URL, refresh::DEFAULT_INTERVAL};

/// Dashboard configuration, read from `CIVIX_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Base URL of the REST API, including the `/api` prefix.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Auto-refresh interval in seconds.
    #[serde(default = "default_refresh_secs")]
    refresh_secs: u64,
    /// Where the logged-in session is kept between runs.
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
    #[serde(default = "default_nominatim_url")]
    pub nominatim_url: String,
}

fn default_api_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_refresh_secs() -> u64 {
    DEFAULT_INTERVAL.as_secs()
}

fn default_session_path() -> PathBuf {
    PathBuf::from("civix-session.json")
}

fn default_nominatim_url() -> String {
    DEFAULT_NOMINATIM_URL.to_string()
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self, rocket::figment::Error> {
        Self::from_figment(Figment::new().merge(Env::prefixed("CIVIX_")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, rocket::figment::Error> {
        figment.extract()
    }

    /// Never zero, so a timer can always be built from it.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let config = DashboardConfig::from_figment(Figment::new()).unwrap();
        assert_eq!(config.api_url, "http://localhost:8000/api");
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.nominatim_url, DEFAULT_NOMINATIM_URL);
    }

    #[test]
    fn values_override_defaults() {
        let figment = Figment::new()
            .merge(("api_url", "https://civix.example.org/api"))
            .merge(("refresh_secs", 0))
            .merge(("session_path", "/tmp/civix/session.json"));
        let config = DashboardConfig::from_figment(figment).unwrap();
        assert_eq!(config.api_url, "https://civix.example.org/api");
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
        assert_eq!(config.session_path, PathBuf::from("/tmp/civix/session.json"));
    }
}
