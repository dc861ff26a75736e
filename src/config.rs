use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{key} must be 'public' or 'signin', got '{value}'")]
    InvalidDefaultRoute { key: &'static str, value: String },
    #[error("{key} must be a whole number of seconds greater than zero, got '{value}'")]
    InvalidSeconds { key: &'static str, value: String },
}

/// What a path outside the route table shows to a signed-out visitor.
/// Signed-in users always land on their own events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DefaultRoute {
    /// The public upcoming events list.
    #[default]
    Public,
    /// A redirect to `/signin`.
    SignIn,
}

impl FromStr for DefaultRoute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "public" => Ok(DefaultRoute::Public),
            "signin" | "sign-in" => Ok(DefaultRoute::SignIn),
            _ => Err(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub session_file: PathBuf,
    pub default_route: DefaultRoute,
    pub poll_interval: Duration,
    pub popup_close_delay: Duration,
    pub redirect_delay: Duration,
    pub notification_dismiss: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:9000".to_string(),
            session_file: PathBuf::from(".evently-session.json"),
            default_route: DefaultRoute::Public,
            poll_interval: Duration::from_secs(5),
            popup_close_delay: Duration::from_secs(5),
            redirect_delay: Duration::from_secs(2),
            notification_dismiss: Duration::from_secs(3),
        }
    }
}

impl Config {
    /// Reads `EVENTLY_*` variables. Call `dotenvy::dotenv()` first to pick up
    /// a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(url) = lookup("EVENTLY_API_URL").filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(path) = lookup("EVENTLY_SESSION_FILE").filter(|v| !v.trim().is_empty()) {
            config.session_file = PathBuf::from(path);
        }
        if let Some(value) = lookup("EVENTLY_DEFAULT_ROUTE") {
            config.default_route =
                value
                    .parse()
                    .map_err(|value| ConfigError::InvalidDefaultRoute {
                        key: "EVENTLY_DEFAULT_ROUTE",
                        value,
                    })?;
        }

        let seconds = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match lookup(key) {
                None => Ok(default),
                Some(value) => match value.trim().parse::<u64>() {
                    Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
                    _ => Err(ConfigError::InvalidSeconds { key, value }),
                },
            }
        };

        config.poll_interval = seconds("EVENTLY_POLL_INTERVAL_SECS", config.poll_interval)?;
        config.popup_close_delay = seconds("EVENTLY_POPUP_CLOSE_SECS", config.popup_close_delay)?;
        config.redirect_delay = seconds("EVENTLY_REDIRECT_DELAY_SECS", config.redirect_delay)?;
        config.notification_dismiss =
            seconds("EVENTLY_NOTIFY_DISMISS_SECS", config.notification_dismiss)?;

        Ok(config)
    }
}
