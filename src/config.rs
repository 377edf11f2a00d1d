use std::str::FromStr;
use std::time::Duration;

use crate::messaging::{ORDER_PAID_TOPIC, SHIP_ASSEMBLED_TOPIC};

// ============================================================================
// Service Configuration - environment variables, optionally from `.env`
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Loads `.env` if there is one. Variables already set in the process win.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env"),
    }
}

/// Reads keys through `lookup` so tests never touch the process environment.
struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn string(&self, key: &'static str, default: &str) -> String {
        (self.lookup)(key)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        (self.lookup)(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(key))
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.lookup)(key).filter(|v| !v.trim().is_empty()) {
            None => Ok(default),
            Some(raw) => parse_value(key, &raw),
        }
    }

    fn parse_required<T>(&self, key: &'static str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.required(key)?;
        parse_value(key, &raw)
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Settings every service shares.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonConfig {
    pub kafka_brokers: String,
    pub metrics_port: u16,
    pub shutdown_grace: Duration,
    pub order_paid_topic: String,
    pub ship_assembled_topic: String,
}

impl CommonConfig {
    fn read<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Self, ConfigError> {
        Ok(Self {
            kafka_brokers: env.string("KAFKA_BROKERS", "localhost:9092"),
            metrics_port: env.parse("METRICS_PORT", 9090)?,
            shutdown_grace: Duration::from_secs(env.parse("SHUTDOWN_GRACE_SECS", 30)?),
            order_paid_topic: env.string("ORDER_PAID_TOPIC", ORDER_PAID_TOPIC),
            ship_assembled_topic: env.string("SHIP_ASSEMBLED_TOPIC", SHIP_ASSEMBLED_TOPIC),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Scylla,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scylla" => Ok(StoreBackend::Scylla),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("expected `scylla` or `memory`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderServiceConfig {
    pub common: CommonConfig,
    pub http_host: String,
    pub http_port: u16,
    pub store: StoreBackend,
    pub scylla_nodes: Vec<String>,
    pub scylla_keyspace: String,
    pub inventory_addr: String,
    pub payment_addr: String,
    pub upstream_timeout: Duration,
    pub consumer_group: String,
}

impl OrderServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup };
        Ok(Self {
            common: CommonConfig::read(&env)?,
            http_host: env.string("HTTP_HOST", "0.0.0.0"),
            http_port: env.parse("HTTP_PORT", 8080)?,
            store: env.parse("ORDER_STORE", StoreBackend::Scylla)?,
            scylla_nodes: env
                .string("SCYLLA_NODES", "127.0.0.1:9042")
                .split(',')
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect(),
            scylla_keyspace: env.string("SCYLLA_KEYSPACE", "orders_ks"),
            inventory_addr: env.string("INVENTORY_GRPC_ADDR", "http://localhost:50051"),
            payment_addr: env.string("PAYMENT_GRPC_ADDR", "http://localhost:50052"),
            upstream_timeout: Duration::from_millis(env.parse("UPSTREAM_TIMEOUT_MS", 3000)?),
            consumer_group: env.string("ORDER_CONSUMER_GROUP", "order-service"),
        })
    }
}

/// Longest simulated build the assembly service accepts.
pub const MAX_BUILD_SECS_LIMIT: u64 = 3600;

#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyServiceConfig {
    pub common: CommonConfig,
    pub consumer_group: String,
    pub min_build_secs: u64,
    pub max_build_secs: u64,
}

impl AssemblyServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup };
        let min_build_secs: u64 = env.parse("ASSEMBLY_MIN_BUILD_SECS", 1)?;
        let max_build_secs: u64 = env.parse("ASSEMBLY_MAX_BUILD_SECS", 10)?;

        if min_build_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "ASSEMBLY_MIN_BUILD_SECS",
                value: min_build_secs.to_string(),
                reason: "build time must be at least one second".to_string(),
            });
        }
        if max_build_secs < min_build_secs {
            return Err(ConfigError::Invalid {
                key: "ASSEMBLY_MAX_BUILD_SECS",
                value: max_build_secs.to_string(),
                reason: format!("must not be below ASSEMBLY_MIN_BUILD_SECS ({min_build_secs})"),
            });
        }
        if max_build_secs > MAX_BUILD_SECS_LIMIT {
            return Err(ConfigError::Invalid {
                key: "ASSEMBLY_MAX_BUILD_SECS",
                value: max_build_secs.to_string(),
                reason: format!("must not exceed {MAX_BUILD_SECS_LIMIT} seconds"),
            });
        }

        Ok(Self {
            common: CommonConfig::read(&env)?,
            consumer_group: env.string("ASSEMBLY_CONSUMER_GROUP", "assembly-service"),
            min_build_secs,
            max_build_secs,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationServiceConfig {
    pub common: CommonConfig,
    pub consumer_group: String,
    pub telegram_token: String,
    pub telegram_chat_id: i64,
    pub telegram_api_url: String,
    pub telegram_timeout: Duration,
}

impl NotificationServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup };
        Ok(Self {
            common: CommonConfig::read(&env)?,
            consumer_group: env.string("NOTIFICATION_CONSUMER_GROUP", "notification-service"),
            telegram_token: env.required("TELEGRAM_BOT_TOKEN")?,
            telegram_chat_id: env.parse_required("TELEGRAM_CHAT_ID")?,
            telegram_api_url: env.string("TELEGRAM_API_URL", "https://api.telegram.org"),
            telegram_timeout: Duration::from_secs(env.parse("TELEGRAM_TIMEOUT_SECS", 30)?),
        })
    }
}
