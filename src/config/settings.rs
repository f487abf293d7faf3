use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub api: ApiSettings,
    pub risk: RiskSettings,
    pub otp: OtpSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSettings {
    pub very_high_amount: f64,
    pub high_amount: f64,
    pub suspicious_keywords: Vec<String>,
    pub frequency_window_seconds: i64,
    pub flag_threshold: u32,
    /// Minutes east of UTC used for the unusual-hour rule; host local time when unset
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpSettings {
    pub digits: u32,
    pub validity_seconds: i64,
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub issuer: String,
    pub audience: String,
    pub seed_demo_users: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api: ApiSettings::default(),
            risk: RiskSettings::default(),
            otp: OtpSettings::default(),
            auth: AuthSettings::default(),
            notifications: NotificationSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for RiskSettings {
    fn default() -> Self {
        RiskSettings {
            very_high_amount: 50_000.0,
            high_amount: 10_000.0,
            suspicious_keywords: ["unknown", "temp", "test", "fake"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            frequency_window_seconds: 3600,
            flag_threshold: 40,
            utc_offset_minutes: None,
        }
    }
}

impl Default for OtpSettings {
    fn default() -> Self {
        OtpSettings {
            digits: 6,
            validity_seconds: 120,
            sweep_interval_seconds: 30,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            jwt_secret: "change-me-fraudguard-dev-secret".to_string(),
            token_ttl_hours: 24,
            issuer: "fraudguard".to_string(),
            audience: "fraudguard-api".to_string(),
            seed_demo_users: true,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Defaults, then `config/fraudguard.{toml,yaml,json}` if present, then
    /// `FRAUDGUARD__SECTION__KEY` environment variables.
    pub fn new() -> Result<Self, ConfigError> {
        let defaults = Settings::default();

        let settings: Settings = Config::builder()
            .set_default("api.host", defaults.api.host)?
            .set_default("api.port", defaults.api.port as i64)?
            .set_default("risk.very_high_amount", defaults.risk.very_high_amount)?
            .set_default("risk.high_amount", defaults.risk.high_amount)?
            .set_default("risk.suspicious_keywords", defaults.risk.suspicious_keywords)?
            .set_default("risk.frequency_window_seconds", defaults.risk.frequency_window_seconds)?
            .set_default("risk.flag_threshold", defaults.risk.flag_threshold as i64)?
            .set_default("otp.digits", defaults.otp.digits as i64)?
            .set_default("otp.validity_seconds", defaults.otp.validity_seconds)?
            .set_default("otp.sweep_interval_seconds", defaults.otp.sweep_interval_seconds as i64)?
            .set_default("auth.jwt_secret", defaults.auth.jwt_secret)?
            .set_default("auth.token_ttl_hours", defaults.auth.token_ttl_hours)?
            .set_default("auth.issuer", defaults.auth.issuer)?
            .set_default("auth.audience", defaults.auth.audience)?
            .set_default("auth.seed_demo_users", defaults.auth.seed_demo_users)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.json", defaults.logging.json)?
            .add_source(File::with_name("config/fraudguard").required(false))
            .add_source(
                Environment::with_prefix("FRAUDGUARD")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("risk.suspicious_keywords")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.risk.high_amount >= self.risk.very_high_amount {
            return Err(ConfigError::Message(
                "risk.high_amount must be below risk.very_high_amount".to_string(),
            ));
        }
        if self.risk.frequency_window_seconds <= 0 {
            return Err(ConfigError::Message(
                "risk.frequency_window_seconds must be positive".to_string(),
            ));
        }
        if self.otp.digits == 0 || self.otp.digits > 9 {
            return Err(ConfigError::Message("otp.digits must be between 1 and 9".to_string()));
        }
        if self.otp.validity_seconds <= 0 {
            return Err(ConfigError::Message("otp.validity_seconds must be positive".to_string()));
        }
        if self.otp.sweep_interval_seconds == 0 {
            return Err(ConfigError::Message(
                "otp.sweep_interval_seconds must be positive".to_string(),
            ));
        }
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message("auth.jwt_secret must not be empty".to_string()));
        }
        if self.auth.token_ttl_hours <= 0 {
            return Err(ConfigError::Message("auth.token_ttl_hours must be positive".to_string()));
        }
        Ok(())
    }
}
