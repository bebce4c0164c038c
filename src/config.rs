use crate::error::ConfigError;
use log::info;
use reqwest::Url;
use std::{env, fmt, path::PathBuf, time::Duration};

const DEFAULT_APP_NAME: &str = "seamless-ssid";
const DEFAULT_WEBHOOK_PORT: u16 = 8000;
const DEFAULT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_DEVICE_REGISTRY: &str = "data/ms_device_list.csv";
const DEFAULT_PROFILE_TABLE: &str = "data/boats.csv";
const DEFAULT_SWITCH_MODEL_FILTER: &str = "MS";
const DEFAULT_ENV_FILE: &str = ".env";

/// Webhook service configuration, validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Name logged at startup
    pub app_name: String,

    /// Listening socket
    pub server: ServerConfig,

    /// Dashboard API access
    pub dashboard: DashboardConfig,

    /// SSID settings written on every update
    pub wireless: WirelessConfig,

    /// Flat-file stores
    pub paths: PathConfig,
}

/// Configuration of the `setup-devices` provisioning tool
#[derive(Clone, Debug)]
pub struct SetupConfig {
    pub dashboard: DashboardConfig,
    pub device_registry: PathBuf,
    pub switch_model_filter: String,
    pub env_file: PathBuf,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Clone)]
pub struct DashboardConfig {
    pub api_key: String,
    pub base_url: Url,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct WirelessConfig {
    pub network_id: String,
    pub ssid_name: String,
    pub psk: String,
}

#[derive(Clone, Debug)]
pub struct PathConfig {
    pub device_registry: PathBuf,
    pub profile_table: PathBuf,
}

/// Collects required variables so every missing one is reported at once
struct EnvReader<F> {
    lookup: F,
    missing: Vec<String>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn new(lookup: F) -> Self {
        Self {
            lookup,
            missing: Vec::new(),
        }
    }

    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }

    fn or_default(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn required(&mut self, name: &str) -> String {
        self.optional(name).unwrap_or_else(|| {
            self.missing.push(name.to_string());
            String::new()
        })
    }

    fn finish(self) -> Result<(), ConfigError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingVariables(self.missing))
        }
    }
}

impl AppConfig {
    /// Load from the process environment after applying an optional `.env` file
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build and validate the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut vars = EnvReader::new(lookup);

        let api_key = vars.required("MERAKI_API_KEY");
        let base_url = vars.required("MERAKI_BASE_URL");
        let network_id = vars.required("MERAKI_NETWORK_ID");
        let ssid_name = vars.required("MERAKI_SSID_NAME");
        let psk = vars.required("MY_PSK");

        let app_name = vars.or_default("APP_NAME", DEFAULT_APP_NAME);
        let port = vars.optional("WEBHOOK_PORT");
        let timeout = vars.optional("MERAKI_TIMEOUT_SECS");
        let device_registry = vars.or_default("DEVICE_REGISTRY_CSV", DEFAULT_DEVICE_REGISTRY);
        let profile_table = vars.or_default("PROFILE_TABLE_CSV", DEFAULT_PROFILE_TABLE);

        vars.finish()?;

        Ok(Self {
            app_name,
            server: ServerConfig::parse(port)?,
            dashboard: DashboardConfig::parse(api_key, &base_url, timeout)?,
            wireless: WirelessConfig {
                network_id,
                ssid_name,
                psk,
            },
            paths: PathConfig {
                device_registry: device_registry.into(),
                profile_table: profile_table.into(),
            },
        })
    }

    /// Log the effective configuration with secrets redacted
    pub fn log_summary(&self) {
        info!("{}", self.app_name);
        info!("webhook port: {}", self.server.port);
        info!("dashboard: {:?}", self.dashboard);
        info!("wireless: {:?}", self.wireless);
        info!("device registry: {:?}", self.paths.device_registry);
        info!("profile table: {:?}", self.paths.profile_table);
    }
}

impl SetupConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut vars = EnvReader::new(lookup);

        let api_key = vars.required("MERAKI_API_KEY");
        let base_url = vars.required("MERAKI_BASE_URL");
        let timeout = vars.optional("MERAKI_TIMEOUT_SECS");
        let device_registry = vars.or_default("DEVICE_REGISTRY_CSV", DEFAULT_DEVICE_REGISTRY);
        let switch_model_filter =
            vars.or_default("SWITCH_MODEL_FILTER", DEFAULT_SWITCH_MODEL_FILTER);
        let env_file = vars.or_default("ENV_FILE", DEFAULT_ENV_FILE);

        vars.finish()?;

        Ok(Self {
            dashboard: DashboardConfig::parse(api_key, &base_url, timeout)?,
            device_registry: device_registry.into(),
            switch_model_filter,
            env_file: env_file.into(),
        })
    }
}

impl ServerConfig {
    fn parse(port: Option<String>) -> Result<Self, ConfigError> {
        let port = match port {
            Some(port) => port.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "WEBHOOK_PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_WEBHOOK_PORT,
        };

        Ok(Self { port })
    }
}

impl DashboardConfig {
    fn parse(
        api_key: String,
        base_url: &str,
        timeout: Option<String>,
    ) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url.trim()).map_err(|e| ConfigError::Invalid {
            name: "MERAKI_BASE_URL",
            reason: e.to_string(),
        })?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                name: "MERAKI_BASE_URL",
                reason: format!("unsupported scheme {}", base_url.scheme()),
            });
        }

        let timeout_secs = match timeout {
            Some(secs) => secs
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::Invalid {
                    name: "MERAKI_TIMEOUT_SECS",
                    reason: e.to_string(),
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "MERAKI_TIMEOUT_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            api_key,
            base_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

// secrets never reach the log

impl fmt::Debug for DashboardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashboardConfig")
            .field("api_key", &"****")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl fmt::Debug for WirelessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WirelessConfig")
            .field("network_id", &self.network_id)
            .field("ssid_name", &self.ssid_name)
            .field("psk", &"****")
            .finish()
    }
}
