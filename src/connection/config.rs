use std::time::Duration;

use crate::core::ConfigError;

const DEFAULT_PROJECT_SERVICE_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_CONTACT_SERVICE_URL: &str = "http://127.0.0.1:8080/contactservice";
const DEFAULT_ROOM_ENGINE_URL: &str = "http://127.0.0.1:1234";
const DEFAULT_ROOM_RESOURCE_PATH: &str = "./socket.io";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
const DEFAULT_OBSERVATION_WINDOW_MS: u64 = 5000;

/// Identity the presence probe joins rooms under. Collaboration widgets do
/// not display join/leave activity for it.
pub const DEFAULT_RESERVED_IDENTITY: &str = "invisible_user";

const ENV_PROJECT_SERVICE_URL: &str = "PROJECTLIST_PROJECT_SERVICE_URL";
const ENV_CONTACT_SERVICE_URL: &str = "PROJECTLIST_CONTACT_SERVICE_URL";
const ENV_ROOM_ENGINE_URL: &str = "PROJECTLIST_ROOM_ENGINE_URL";
const ENV_ROOM_RESOURCE_PATH: &str = "PROJECTLIST_ROOM_RESOURCE_PATH";
const ENV_REQUEST_TIMEOUT_SECS: &str = "PROJECTLIST_REQUEST_TIMEOUT_SECS";
const ENV_OBSERVATION_WINDOW_MS: &str = "PROJECTLIST_OBSERVATION_WINDOW_MS";
const ENV_DISABLE_ALL_PROJECTS: &str = "PROJECTLIST_DISABLE_ALL_PROJECTS";

/// Remote service configuration
///
/// Endpoints of the project and contact services plus the presence
/// settings used when probing collaboration rooms.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the project service, without trailing slash
    pub project_service_url: String,

    /// Base URL of the contact (group) service
    pub contact_service_url: String,

    /// Per-request timeout for both services
    pub request_timeout: Duration,

    /// Hide the "all projects" listing
    pub disable_all_projects: bool,

    /// Presence probing settings
    pub presence: PresenceConfig,
}

/// Presence probing settings
///
/// `engine_url` and `resource_path` locate the shared-state room engine.
/// The aggregator never dials them itself: they are read by the host when
/// it builds its [`RoomEngine`](crate::presence::RoomEngine) connector, so
/// an in-process engine such as `MemoryRoomHub` ignores them.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Address of the shared-state room engine, for host-supplied engines
    pub engine_url: String,

    /// Resource path on the room engine, for host-supplied engines
    pub resource_path: String,

    /// How long a probe keeps a room open collecting join notifications
    pub observation_window: Duration,

    /// Identity the probe announces itself with
    pub reserved_identity: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            engine_url: DEFAULT_ROOM_ENGINE_URL.to_string(),
            resource_path: DEFAULT_ROOM_RESOURCE_PATH.to_string(),
            observation_window: Duration::from_millis(DEFAULT_OBSERVATION_WINDOW_MS),
            reserved_identity: DEFAULT_RESERVED_IDENTITY.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Create a configuration pointing both services at `project_service_url`
    /// with the contact service mounted under `/contactservice`.
    pub fn new(project_service_url: &str) -> Self {
        let base = project_service_url.trim_end_matches('/');
        Self {
            project_service_url: base.to_string(),
            contact_service_url: format!("{base}/contactservice"),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            disable_all_projects: false,
            presence: PresenceConfig::default(),
        }
    }

    /// Set the contact service URL
    pub fn contact_service_url(mut self, url: &str) -> Self {
        self.contact_service_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Disable the "all projects" scope
    pub fn disable_all_projects(mut self, disabled: bool) -> Self {
        self.disable_all_projects = disabled;
        self
    }

    /// Set the room engine address and resource path
    pub fn room_engine(mut self, url: &str, resource_path: &str) -> Self {
        self.presence.engine_url = url.to_string();
        self.presence.resource_path = resource_path.to_string();
        self
    }

    /// Set the presence observation window
    pub fn observation_window(mut self, window: Duration) -> Self {
        self.presence.observation_window = window;
        self
    }

    /// Load from `PROJECTLIST_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = env_value(ENV_PROJECT_SERVICE_URL) {
            config.project_service_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = env_value(ENV_CONTACT_SERVICE_URL) {
            config = config.contact_service_url(&url);
        }
        if let Some(url) = env_value(ENV_ROOM_ENGINE_URL) {
            config.presence.engine_url = url;
        }
        if let Some(path) = env_value(ENV_ROOM_RESOURCE_PATH) {
            config.presence.resource_path = path;
        }
        if let Some(raw) = env_value(ENV_REQUEST_TIMEOUT_SECS) {
            let secs = parse_positive(ENV_REQUEST_TIMEOUT_SECS, &raw)?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = env_value(ENV_OBSERVATION_WINDOW_MS) {
            let millis = parse_positive(ENV_OBSERVATION_WINDOW_MS, &raw)?;
            config.presence.observation_window = Duration::from_millis(millis);
        }
        if let Some(raw) = env_value(ENV_DISABLE_ALL_PROJECTS) {
            config.disable_all_projects = parse_flag(ENV_DISABLE_ALL_PROJECTS, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, url) in [
            (ENV_PROJECT_SERVICE_URL, &self.project_service_url),
            (ENV_CONTACT_SERVICE_URL, &self.contact_service_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("'{url}' must start with http:// or https://"),
                });
            }
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: ENV_REQUEST_TIMEOUT_SECS,
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.presence.reserved_identity.is_empty() {
            return Err(ConfigError::Invalid {
                key: "reserved_identity",
                reason: "cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECT_SERVICE_URL).contact_service_url(DEFAULT_CONTACT_SERVICE_URL)
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    let value = raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
        key,
        reason: format!("'{raw}' is not an integer"),
    })?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            reason: format!("'{raw}' is not a boolean"),
        }),
    }
}
