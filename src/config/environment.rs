use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_GMAIL_QUERY: &str = "from:noreply@garmin.com subject:LiveTrack";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a number, got {value:?}")]
    NotANumber { name: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("{0} must be a finite number")]
    NotFinite(&'static str),

    #[error("AUTH_RETRY_INTERVAL ({auth_retry}s) must not exceed EMAIL_CHECK_INTERVAL ({poll}s)")]
    RetryLongerThanPoll { auth_retry: u64, poll: u64 },

    #[error("ACTIVITY_DEAD_AGE_HOURS ({dead}) must be at least ACTIVITY_MAX_AGE_HOURS ({max})")]
    DeadBeforeStale { max: f64, dead: f64 },

    #[error("TRANSIENT_ERROR_POLICY must be 'clear' or 'preserve', got {0:?}")]
    UnknownPolicy(String),
}

/// What the poller shows while the mail API is failing for non-auth reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransientErrorPolicy {
    /// Clear the URL: show nothing rather than something unconfirmed.
    #[default]
    Clear,
    /// Keep the last known URL and timestamp alongside the error.
    Preserve,
}

impl FromStr for TransientErrorPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clear" => Ok(Self::Clear),
            "preserve" => Ok(Self::Preserve),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Environment configuration.
///
/// Built once at startup and handed to every component; nothing else in the
/// crate reads the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub poll_interval: Duration,
    pub auth_retry_interval: Duration,
    pub max_age_hours: f64,
    pub dead_age_hours: f64,
    pub expected_account: Option<String>,
    pub credentials_file: PathBuf,
    pub token_file: PathBuf,
    pub gmail_query: String,
    pub state_file: PathBuf,
    pub reload_socket: PathBuf,
    pub transient_error_policy: TransientErrorPolicy,
    pub port: u16,
    pub app_title: String,
    pub admin_token: Option<String>,
    pub oauth_redirect_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let poll_secs = parse_or(&get, "EMAIL_CHECK_INTERVAL", 30u64)?;
        let auth_retry_secs = parse_or(&get, "AUTH_RETRY_INTERVAL", 10u64)?;
        if poll_secs == 0 {
            return Err(ConfigError::NotPositive("EMAIL_CHECK_INTERVAL"));
        }
        if auth_retry_secs == 0 {
            return Err(ConfigError::NotPositive("AUTH_RETRY_INTERVAL"));
        }
        if auth_retry_secs > poll_secs {
            return Err(ConfigError::RetryLongerThanPoll {
                auth_retry: auth_retry_secs,
                poll: poll_secs,
            });
        }

        let max_age_hours = parse_or(&get, "ACTIVITY_MAX_AGE_HOURS", 24.0f64)?;
        let dead_age_hours = parse_or(&get, "ACTIVITY_DEAD_AGE_HOURS", 48.0f64)?;
        for (name, value) in [
            ("ACTIVITY_MAX_AGE_HOURS", max_age_hours),
            ("ACTIVITY_DEAD_AGE_HOURS", dead_age_hours),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite(name));
            }
        }
        if max_age_hours <= 0.0 {
            return Err(ConfigError::NotPositive("ACTIVITY_MAX_AGE_HOURS"));
        }
        if dead_age_hours < max_age_hours {
            return Err(ConfigError::DeadBeforeStale {
                max: max_age_hours,
                dead: dead_age_hours,
            });
        }

        let transient_error_policy = match get("TRANSIENT_ERROR_POLICY") {
            Some(raw) => raw.parse()?,
            None => TransientErrorPolicy::default(),
        };

        Ok(Self {
            poll_interval: Duration::from_secs(poll_secs),
            auth_retry_interval: Duration::from_secs(auth_retry_secs),
            max_age_hours,
            dead_age_hours,
            expected_account: get("GMAIL_ACCOUNT").map(|a| a.trim().to_string()),
            credentials_file: PathBuf::from(
                get("GMAIL_CREDENTIALS_FILE").unwrap_or_else(|| "credentials.json".to_string()),
            ),
            token_file: PathBuf::from(
                get("GMAIL_TOKEN_FILE").unwrap_or_else(|| "token.json".to_string()),
            ),
            gmail_query: get("GMAIL_QUERY").unwrap_or_else(|| DEFAULT_GMAIL_QUERY.to_string()),
            state_file: PathBuf::from(
                get("STATE_FILE").unwrap_or_else(|| "/tmp/livetrack_state.json".to_string()),
            ),
            reload_socket: PathBuf::from(
                get("RELOAD_SOCKET").unwrap_or_else(|| "/tmp/livetrack_reload.sock".to_string()),
            ),
            transient_error_policy,
            port: parse_or(&get, "PORT", 5000u16)?,
            app_title: get("APP_TITLE").unwrap_or_else(|| "Garmin LiveTrack Public".to_string()),
            admin_token: get("ADMIN_TOKEN"),
            oauth_redirect_url: get("OAUTH_REDIRECT_URL"),
        })
    }

    /// A producer is considered unresponsive once its snapshot is older than this.
    pub fn health_window(&self) -> Duration {
        self.poll_interval * 2
    }

    pub fn default_redirect_url(&self) -> String {
        format!("http://localhost:{}/admin/callback", self.port)
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::NotANumber {
            name,
            value: raw,
        }),
        None => Ok(default),
    }
}
