use crate::models::RewardTable;
use std::env;
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
}

/// Bracket provider (Challonge) client configuration
#[derive(Debug, Clone)]
pub struct BracketProviderConfig {
    pub api_url: String,
    /// Settlement polling is disabled without a key
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

/// Chat-platform notification sink configuration
#[derive(Debug, Clone, Default)]
pub struct NotifierConfig {
    /// Log-only sink when unset
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SettlementConfig {
    pub poll_interval_secs: u64,
    /// A match claim older than this may be taken over by another run
    pub claim_lease_secs: u64,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub log_level: String,
    pub log_json: bool,
    pub environment: String,
    pub bracket: BracketProviderConfig,
    pub notifier: NotifierConfig,
    pub settlement: SettlementConfig,
    /// `parent` domain required by Twitch clip embeds
    pub clip_embed_parent: String,
    pub rewards: RewardTable,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} has an invalid value: {}", key, raw)),
        Err(_) => Ok(default),
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let config = Self {
            url,
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10)?,
            acquire_timeout_secs: env_parse("DATABASE_ACQUIRE_TIMEOUT_SECS", 30)?,
            idle_timeout_secs: env_parse("DATABASE_IDLE_TIMEOUT_SECS", 600)?, // 10 minutes
            max_lifetime_secs: env_parse("DATABASE_MAX_LIFETIME_SECS", 1800)?, // 30 minutes
            test_before_acquire: env_parse("DATABASE_TEST_BEFORE_ACQUIRE", true)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }
        if self.acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/arena".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

impl BracketProviderConfig {
    pub fn from_env() -> Result<Self, String> {
        let timeout_secs = env_parse("BRACKET_TIMEOUT_SECS", 10)?;
        if timeout_secs == 0 {
            return Err("BRACKET_TIMEOUT_SECS must be greater than 0".to_string());
        }
        Ok(Self {
            api_url: env_optional("CHALLONGE_API_URL")
                .unwrap_or_else(|| "https://api.challonge.com/v2.1".to_string()),
            api_key: env_optional("CHALLONGE_API_KEY"),
            timeout_secs,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for BracketProviderConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.challonge.com/v2.1".to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

impl NotifierConfig {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            webhook_url: env_optional("NOTIFIER_WEBHOOK_URL"),
            timeout_secs: env_parse("NOTIFIER_TIMEOUT_SECS", 5)?,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl SettlementConfig {
    pub fn from_env() -> Result<Self, String> {
        let config = Self {
            poll_interval_secs: env_parse("SETTLEMENT_POLL_INTERVAL_SECS", 60)?,
            claim_lease_secs: env_parse("SETTLEMENT_CLAIM_LEASE_SECS", 300)?,
        };
        if config.poll_interval_secs == 0 {
            return Err("SETTLEMENT_POLL_INTERVAL_SECS must be greater than 0".to_string());
        }
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.claim_lease_secs)
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            claim_lease_secs: 300,
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        let log_json = match log_format.to_lowercase().as_str() {
            "json" => true,
            "text" => false,
            other => return Err(format!("Invalid LOG_FORMAT: {}. Must be text or json", other)),
        };

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        let rewards = match env_optional("REWARD_TABLE_JSON") {
            Some(json) => RewardTable::from_json(&json)?,
            None => RewardTable::default(),
        };

        Ok(Self {
            database,
            log_level: log_level.to_lowercase(),
            log_json,
            environment: environment.to_lowercase(),
            bracket: BracketProviderConfig::from_env()?,
            notifier: NotifierConfig::from_env()?,
            settlement: SettlementConfig::from_env()?,
            clip_embed_parent: env_optional("CLIP_EMBED_PARENT")
                .unwrap_or_else(|| "localhost".to_string()),
            rewards,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            log_level: "info".to_string(),
            log_json: false,
            environment: "development".to_string(),
            bracket: BracketProviderConfig::default(),
            notifier: NotifierConfig {
                webhook_url: None,
                timeout_secs: 5,
            },
            settlement: SettlementConfig::default(),
            clip_embed_parent: "localhost".to_string(),
            rewards: RewardTable::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_config_rejects_zero_connections() {
        let config = DatabaseConfig {
            max_connections: 0,
            ..DatabaseConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert!(config.is_development());
        assert!(!config.is_production());
        assert!(!config.bracket.is_configured());
        assert_eq!(config.settlement.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.rewards.points("tournaments", "participation"), Some(100));
    }
}
