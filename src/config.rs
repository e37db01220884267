// Player configuration.
// Logging can only be switched off in development builds.

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::peer::types::ServerConfig;
use crate::utils::add_ice_url_scheme;

#[cfg(debug_assertions)]
pub const LOGGING_ENABLED: bool = true; // debug builds log

#[cfg(not(debug_assertions))]
pub const LOGGING_ENABLED: bool = false; // release builds stay silent

// Extra switches for development builds
#[cfg(debug_assertions)]
pub mod dev {
    // set to false to silence logging in development builds too
    pub const ENABLE_LOGGING: bool = true;
}

#[cfg(not(debug_assertions))]
pub mod dev {
    pub const ENABLE_LOGGING: bool = false;
}

pub const ICE_SERVERS_VAR: &str = "RTC_PLAYER_ICE_SERVERS";
pub const CHANNEL_PREFIX_VAR: &str = "RTC_PLAYER_CHANNEL_PREFIX";
pub const ACCEPT_REMOTE_VAR: &str = "RTC_PLAYER_ACCEPT_REMOTE";

pub const DEFAULT_CHANNEL_PREFIX: &str = "webrtc_signaling";

static DEFAULT_ICE_SERVERS: Lazy<Vec<ServerConfig>> =
    Lazy::new(|| vec![ServerConfig::stun("default-stun", "stun:stun.l.google.com:19302")]);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub ice_servers: Vec<ServerConfig>,
    /// Channel for a session is `<channel_prefix>-<id>`.
    pub channel_prefix: String,
    pub receive_audio: bool,
    pub receive_video: bool,
    /// Let an inbound offer or candidate open a session for an unmounted id.
    pub accept_remote_sessions: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            ice_servers: DEFAULT_ICE_SERVERS.clone(),
            channel_prefix: DEFAULT_CHANNEL_PREFIX.into(),
            receive_audio: true,
            receive_video: true,
            accept_remote_sessions: true,
        }
    }
}

impl PlayerConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `RTC_PLAYER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ICE_SERVERS_VAR).filter(|v| !v.trim().is_empty()) {
            config.ice_servers = raw
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .enumerate()
                .map(|(n, url)| env_server(n, url))
                .collect();
        }
        if let Some(prefix) = lookup(CHANNEL_PREFIX_VAR).filter(|v| !v.trim().is_empty()) {
            config.channel_prefix = prefix.trim().to_string();
        }
        if let Some(raw) = lookup(ACCEPT_REMOTE_VAR) {
            config.accept_remote_sessions = match raw.trim() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::Env {
                        var: ACCEPT_REMOTE_VAR,
                        value: raw,
                    })
                }
            };
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for server in &self.ice_servers {
            if server.url.trim().is_empty() {
                return Err(ConfigError::EmptyUrl(server.id.clone()));
            }
            if server.is_turn() && (server.username.is_none() || server.credential.is_none()) {
                return Err(ConfigError::MissingTurnCredentials(server.id.clone()));
            }
        }
        Ok(())
    }
}

fn env_server(n: usize, url: &str) -> ServerConfig {
    let mut server = ServerConfig::stun(&format!("env-{n}"), url);
    if url.starts_with("turn:") {
        server.r#type = "turn".into();
    }
    server.url = add_ice_url_scheme(&server);
    server
}
