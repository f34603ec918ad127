use std::time::Duration;

use super::ServerError;

/// Server configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | DATABASE_PATH | pos.db | SQLite file |
/// | HTTP_PORT | 3000 | HTTP port |
/// | ENVIRONMENT | development | development / staging / production |
/// | GATEWAY_SERVER_KEY | (required outside development) | Gateway server key |
/// | GATEWAY_PRODUCTION | false | Use the gateway's production hosts |
/// | GATEWAY_SNAP_URL / GATEWAY_API_URL | gateway defaults | Host overrides |
/// | GATEWAY_FINISH_URL | unset | Customer redirect after checkout |
/// | GATEWAY_TIMEOUT_MS | 15000 | Gateway request timeout |
/// | PAYMENT_TOKEN_EXPIRY_SECS | 600 | Gateway token lifetime |
/// | MAX_GATEWAY_RETRIES | 5 | Failed/expired attempts before retries stop |
/// | SWEEP_INTERVAL_SECS | 60 | Expiry sweep period |
/// | LOG_LEVEL | info | tracing filter |
/// | LOG_JSON | false | JSON log lines |
/// | LOG_DIR | unset | Daily rolling log files |
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub http_port: u16,
    /// development | staging | production
    pub environment: String,

    // === Gateway ===
    pub gateway_server_key: String,
    pub gateway_production: bool,
    pub gateway_snap_url: Option<String>,
    pub gateway_api_url: Option<String>,
    pub gateway_finish_url: Option<String>,
    pub gateway_timeout: Duration,

    // === Pipeline ===
    pub payment_token_expiry: Duration,
    pub max_gateway_retries: i64,
    pub sweep_interval: Duration,

    // === Logging ===
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments
    fn require_secret(name: &str, environment: &str) -> Result<String, ServerError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(ServerError::Config(format!(
                        "{name} must be set in {environment} environment"
                    )));
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(ServerError::Config(format!(
                "{name} must not be empty in {environment} environment"
            )));
        }
        Ok(val)
    }

    /// Load configuration from environment variables (and `.env`)
    pub fn from_env() -> Result<Self, ServerError> {
        dotenv::dotenv().ok();
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = Self {
            database_path: std::env::var("DATABASE_PATH").unwrap_or_else(|_| "pos.db".into()),
            http_port: env_parse("HTTP_PORT", 3000),
            gateway_server_key: Self::require_secret("GATEWAY_SERVER_KEY", &environment)?,
            gateway_production: env_parse("GATEWAY_PRODUCTION", false),
            gateway_snap_url: env_opt("GATEWAY_SNAP_URL"),
            gateway_api_url: env_opt("GATEWAY_API_URL"),
            gateway_finish_url: env_opt("GATEWAY_FINISH_URL"),
            gateway_timeout: Duration::from_millis(env_parse("GATEWAY_TIMEOUT_MS", 15_000)),
            payment_token_expiry: Duration::from_secs(env_parse("PAYMENT_TOKEN_EXPIRY_SECS", 600)),
            max_gateway_retries: env_parse("MAX_GATEWAY_RETRIES", 5),
            sweep_interval: Duration::from_secs(env_parse("SWEEP_INTERVAL_SECS", 60)),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_parse("LOG_JSON", false),
            log_dir: env_opt("LOG_DIR"),
            environment,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ServerError> {
        if self.payment_token_expiry.is_zero() {
            return Err(ServerError::Config(
                "PAYMENT_TOKEN_EXPIRY_SECS must be positive".into(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(ServerError::Config("SWEEP_INTERVAL_SECS must be positive".into()));
        }
        if self.max_gateway_retries < 0 {
            return Err(ServerError::Config(
                "MAX_GATEWAY_RETRIES must not be negative".into(),
            ));
        }
        if self.gateway_production && !self.is_production() {
            tracing::warn!(environment = %self.environment, "Gateway production hosts used outside production");
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_secret_only_in_development_has_fallback() {
        let name = "POS_TEST_SECRET_THAT_IS_NEVER_SET";
        let dev = Config::require_secret(name, "development").unwrap();
        assert!(dev.starts_with("dev-"));
        assert!(Config::require_secret(name, "production").is_err());
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        assert_eq!(env_parse("POS_TEST_PORT_THAT_IS_NEVER_SET", 3000u16), 3000);
    }
}
