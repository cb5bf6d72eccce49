use std::env;

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use thiserror::Error;

const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://localhost:3000",
    "http://localhost:8080",
    "http://localhost:19006",
];

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    server: ServerSettings,
    runtime: RuntimeSettings,
    cors: CorsSettings,
    database: DatabaseSettings,
    vision: VisionSettings,
    scoring: ScoringSettings,
    chat: ChatSettings,
    content: ContentSettings,
    admin: AdminSettings,
    telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct ServerSettings {
    host: ServerHost,
    port: ServerPort,
}

#[derive(Debug, Clone)]
pub(crate) struct CorsSettings {
    pub(crate) origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct DatabaseSettings {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) name: String,
    pub(crate) user: String,
    pub(crate) password: String,
    pub(crate) ssl_mode: String,
    pub(crate) database_url: Option<String>,
    pub(crate) max_connections: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct VisionSettings {
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) timeout_seconds: u64,
    pub(crate) fallback_text_detection: bool,
    pub(crate) preprocess: bool,
    pub(crate) preprocess_size: u32,
}

/// Thresholds used by the letter-match scorer.
#[derive(Debug, Clone)]
pub(crate) struct ScoringSettings {
    pub(crate) strong_confidence: f64,
    pub(crate) dominance_ratio: f64,
    pub(crate) min_symbol_confidence: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct ChatSettings {
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) model: String,
    pub(crate) temperature: f64,
    pub(crate) timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct ContentSettings {
    pub(crate) myth_batch_size: u32,
    pub(crate) image_label_decoys: usize,
    pub(crate) max_upload_size_mb: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct AdminSettings {
    pub(crate) basic_auth_enabled: bool,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Test => "test",
        }
    }

    fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ServerHost(String);

#[derive(Debug, Clone, Copy)]
pub(crate) struct ServerPort(u16);

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid server host: {0}")]
    InvalidHost(String),
    #[error("invalid server port: {0}")]
    InvalidPort(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid cors origins: {0}")]
    InvalidCors(String),
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
}

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("APP_HOST", "0.0.0.0");
        let port = env_or_default("APP_PORT", "8000");

        let environment =
            parse_environment(env_optional("APP_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("APP_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let db_host = env_or_default("DB_HOST", "localhost");
        let db_port = parse_u16("DB_PORT", env_or_default("DB_PORT", "5432"))?;
        let db_name = env_or_default("DB_NAME", "alphabet_mastery");
        let db_user = env_or_default("DB_USER", "postgres");
        let db_password = env_or_default("DB_PASSWORD", "");
        let db_ssl_mode = env_or_default("DB_SSLMODE", "prefer");
        let database_url = env_optional("DATABASE_URL");
        let db_max_connections =
            parse_u32("DB_MAX_CONNECTIONS", env_or_default("DB_MAX_CONNECTIONS", "10"))?;

        let gcv_api_key = env_or_default("GCV_API_KEY", "");
        let gcv_base_url = env_or_default("GCV_BASE_URL", "https://vision.googleapis.com/v1");
        let gcv_timeout_seconds =
            parse_u64("GCV_TIMEOUT_SECONDS", env_or_default("GCV_TIMEOUT_SECONDS", "15"))?;
        let fallback_text_detection = env_optional("GCV_FALLBACK_TEXT_DETECTION")
            .map(|value| parse_bool(&value))
            .unwrap_or(true);
        let preprocess =
            env_optional("OCR_PREPROCESS").map(|value| parse_bool(&value)).unwrap_or(false);
        let preprocess_size =
            parse_u32("OCR_PREPROCESS_SIZE", env_or_default("OCR_PREPROCESS_SIZE", "512"))?;

        let strong_confidence = parse_f64(
            "LETTER_STRONG_CONFIDENCE",
            env_or_default("LETTER_STRONG_CONFIDENCE", "0.70"),
        )?;
        let dominance_ratio =
            parse_f64("LETTER_DOMINANCE_RATIO", env_or_default("LETTER_DOMINANCE_RATIO", "0.60"))?;
        let min_symbol_confidence = parse_f64(
            "LETTER_MIN_SYMBOL_CONFIDENCE",
            env_or_default("LETTER_MIN_SYMBOL_CONFIDENCE", "0.30"),
        )?;

        let gemini_api_key = env_optional("GEMINI_API_KEY").unwrap_or_else(|| gcv_api_key.clone());
        let gemini_base_url = env_or_default(
            "GEMINI_BASE_URL",
            "https://generativelanguage.googleapis.com/v1beta",
        );
        let gemini_model = env_or_default("GEMINI_MODEL", "gemini-2.5-flash");
        let gemini_temperature =
            parse_f64("GEMINI_TEMPERATURE", env_or_default("GEMINI_TEMPERATURE", "0.7"))?;
        let gemini_timeout_seconds =
            parse_u64("GEMINI_TIMEOUT_SECONDS", env_or_default("GEMINI_TIMEOUT_SECONDS", "30"))?;

        let myth_batch_size =
            parse_u32("MYTH_BATCH_SIZE", env_or_default("MYTH_BATCH_SIZE", "10"))?;
        let image_label_decoys =
            parse_u32("IMAGE_LABEL_DECOYS", env_or_default("IMAGE_LABEL_DECOYS", "4"))? as usize;
        let max_upload_size_mb =
            parse_u64("MAX_UPLOAD_SIZE_MB", env_or_default("MAX_UPLOAD_SIZE_MB", "10"))?;

        let basic_auth_enabled =
            env_optional("BASIC_AUTH_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);
        let admin_username = env_optional("ADMIN_USERNAME");
        let admin_password = env_optional("ADMIN_PASSWORD");

        let log_level = env_or_default("APP_LOG_LEVEL", "info");
        let json = env_optional("APP_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                host: db_host,
                port: db_port,
                name: db_name,
                user: db_user,
                password: db_password,
                ssl_mode: db_ssl_mode,
                database_url,
                max_connections: db_max_connections,
            },
            vision: VisionSettings {
                api_key: gcv_api_key,
                base_url: gcv_base_url,
                timeout_seconds: gcv_timeout_seconds,
                fallback_text_detection,
                preprocess,
                preprocess_size,
            },
            scoring: ScoringSettings { strong_confidence, dominance_ratio, min_symbol_confidence },
            chat: ChatSettings {
                api_key: gemini_api_key,
                base_url: gemini_base_url,
                model: gemini_model,
                temperature: gemini_temperature,
                timeout_seconds: gemini_timeout_seconds,
            },
            content: ContentSettings { myth_batch_size, image_label_decoys, max_upload_size_mb },
            admin: AdminSettings {
                basic_auth_enabled,
                username: admin_username,
                password: admin_password,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn vision(&self) -> &VisionSettings {
        &self.vision
    }

    pub(crate) fn scoring(&self) -> &ScoringSettings {
        &self.scoring
    }

    pub(crate) fn chat(&self) -> &ChatSettings {
        &self.chat
    }

    pub(crate) fn content(&self) -> &ContentSettings {
        &self.content
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("LETTER_STRONG_CONFIDENCE", self.scoring.strong_confidence),
            ("LETTER_DOMINANCE_RATIO", self.scoring.dominance_ratio),
            ("LETTER_MIN_SYMBOL_CONFIDENCE", self.scoring.min_symbol_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue { field, value: value.to_string() });
            }
        }

        if self.database.ssl_mode.parse::<PgSslMode>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "DB_SSLMODE",
                value: self.database.ssl_mode.clone(),
            });
        }

        if self.content.myth_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MYTH_BATCH_SIZE",
                value: String::from("0"),
            });
        }
        if self.content.image_label_decoys == 0 {
            return Err(ConfigError::InvalidValue {
                field: "IMAGE_LABEL_DECOYS",
                value: String::from("0"),
            });
        }
        if self.vision.preprocess_size < 32 {
            return Err(ConfigError::InvalidValue {
                field: "OCR_PREPROCESS_SIZE",
                value: self.vision.preprocess_size.to_string(),
            });
        }

        if self.admin.basic_auth_enabled
            && (self.admin.username.is_none() || self.admin.password.is_none())
        {
            return Err(ConfigError::MissingSecret("ADMIN_USERNAME/ADMIN_PASSWORD"));
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.password.is_empty() {
            return Err(ConfigError::MissingSecret("DB_PASSWORD"));
        }

        if self.vision.api_key.is_empty() {
            return Err(ConfigError::MissingSecret("GCV_API_KEY"));
        }

        Ok(())
    }
}

impl DatabaseSettings {
    /// `DATABASE_URL` when set, otherwise the discrete `DB_*` fields passed
    /// through the builder so credentials never need URL escaping.
    pub(crate) fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        if let Some(url) = &self.database_url {
            return url.parse();
        }

        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.name)
            .ssl_mode(self.ssl_mode.parse::<PgSslMode>()?);
        if !self.password.is_empty() {
            options = options.password(&self.password);
        }
        Ok(options)
    }
}

impl ServerHost {
    fn parse(value: String) -> Result<Self, ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidHost(value));
        }
        Ok(Self(value))
    }
}

impl ServerPort {
    fn parse(value: String) -> Result<Self, ConfigError> {
        let parsed: u16 = value.parse().map_err(|_| ConfigError::InvalidPort(value.clone()))?;
        if parsed == 0 {
            return Err(ConfigError::InvalidPort(value));
        }
        Ok(Self(parsed))
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_u16(field: &'static str, value: String) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_u32(field: &'static str, value: String) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_f64(field: &'static str, value: String) -> Result<f64, ConfigError> {
    match value.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(parsed),
        _ => Err(ConfigError::InvalidValue { field, value }),
    }
}

fn parse_cors_origins(value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = value else {
        return Ok(DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect());
    };

    if raw.trim().is_empty() {
        return Ok(DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect());
    }

    if raw.trim_start().starts_with('[') {
        let parsed: Vec<String> =
            serde_json::from_str(&raw).map_err(|_| ConfigError::InvalidCors(raw.clone()))?;
        if parsed.is_empty() {
            return Ok(DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect());
        }
        return Ok(parsed);
    }

    let items: Vec<String> = raw
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();

    if items.is_empty() {
        return Ok(DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect());
    }

    Ok(items)
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

fn parse_environment(value: Option<String>) -> Environment {
    match value.as_deref().map(|val| val.to_lowercase()) {
        Some(ref val) if val == "production" || val == "prod" => Environment::Production,
        Some(ref val) if val == "staging" => Environment::Staging,
        Some(ref val) if val == "test" || val == "testing" => Environment::Test,
        _ => Environment::Development,
    }
}
