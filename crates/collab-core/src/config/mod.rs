//! Engine configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod activity;
pub mod channel;
pub mod chat;
pub mod logging;
pub mod notifications;
pub mod presence;

use serde::{Deserialize, Serialize};

use self::activity::ActivityConfig;
use self::channel::ChannelConfig;
use self::chat::ChatConfig;
use self::logging::LoggingConfig;
use self::notifications::NotificationsConfig;
use self::presence::PresenceConfig;

use crate::error::AppError;

/// Root engine configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollabConfig {
    /// Channel session and reconnect settings.
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Presence heartbeat and staleness settings.
    #[serde(default)]
    pub presence: PresenceConfig,
    /// Chat cache settings.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Activity feed retention settings.
    #[serde(default)]
    pub activity: ActivityConfig,
    /// Notification inbox settings.
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CollabConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `CATALYST__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CATALYST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = CollabConfig::default();
        assert!(config.channel.max_reconnect_attempts > 0);
        assert!(config.presence.heartbeat_interval_seconds < config.presence.stale_after_seconds);
        assert!(config.notifications.max_retained > 0);
    }
}
