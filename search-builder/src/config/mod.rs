//! Configuration and dependency initialization.
//!
//! All settings come from environment variables (optionally loaded from a
//! `.env` file) and are read once at startup into a [`Config`].

mod dependencies;

pub use dependencies::Dependencies;

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use search_builder_kafka::KafkaConfig;

const DEFAULT_BIND_PORT: u16 = 22900;
const DEFAULT_KAFKA_ADDR: &str = "localhost:9092";
const DEFAULT_CONSUMER_GROUP: &str = "dp-dimension-search-builder";
const DEFAULT_HIERARCHY_BUILT_TOPIC: &str = "hierarchy-built";
const DEFAULT_PRODUCER_TOPIC: &str = "dimension-search-built";
const DEFAULT_EVENT_REPORTER_TOPIC: &str = "report-events";
const DEFAULT_KAFKA_MAX_BYTES: usize = 2_000_000;
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:10200";
const DEFAULT_HIERARCHY_API_URL: &str = "http://localhost:22600";
const DEFAULT_HTTP_CLIENT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECS: u64 = 5;
const DEFAULT_SERVICE_NAME: &str = "dp-dimension-search-builder";

/// Every problem found while reading the configuration.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid configuration: {}", .0.join("; "))]
pub struct ConfigError(pub Vec<String>);

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address of the health endpoint listener.
    pub bind_addr: SocketAddr,
    /// Broker and security settings shared by every Kafka client.
    pub kafka: KafkaConfig,
    pub consumer_group: String,
    pub hierarchy_built_topic: String,
    pub producer_topic: String,
    pub event_reporter_topic: String,
    pub kafka_max_bytes: usize,
    /// Start from the oldest message when the group has no committed offset.
    pub kafka_offset_oldest: bool,
    pub opensearch_url: String,
    pub hierarchy_api_url: String,
    /// Bound on each request to OpenSearch and the hierarchy API.
    pub http_client_timeout: Duration,
    /// Bound on the whole shutdown.
    pub graceful_shutdown_timeout: Duration,
    /// Name carried by failure reports.
    pub service_name: String,
}

impl Config {
    /// Read and validate the configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BIND_ADDR`: health endpoint address (default: 0.0.0.0:22900)
    /// - `KAFKA_ADDR`: comma separated broker addresses (default: localhost:9092)
    /// - `KAFKA_USERNAME` / `KAFKA_PASSWORD` / `KAFKA_SSL_CA_PEM`: SASL/SSL settings (optional)
    /// - `CONSUMER_GROUP`: consumer group ID (default: dp-dimension-search-builder)
    /// - `HIERARCHY_BUILT_TOPIC`: inbound topic (default: hierarchy-built)
    /// - `PRODUCER_TOPIC`: completion topic (default: dimension-search-built)
    /// - `EVENT_REPORTER_TOPIC`: failure report topic (default: report-events)
    /// - `KAFKA_MAX_BYTES`: largest outbound message (default: 2000000)
    /// - `KAFKA_OFFSET_OLDEST`: start from the oldest message (default: true)
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:10200)
    /// - `HIERARCHY_API_URL`: hierarchy API URL (default: http://localhost:22600)
    /// - `HTTP_CLIENT_TIMEOUT_SECS`: request timeout in seconds (default: 30)
    /// - `GRACEFUL_SHUTDOWN_TIMEOUT_SECS`: shutdown timeout in seconds (default: 5)
    /// - `SERVICE_NAME`: name used in failure reports (default: dp-dimension-search-builder)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`], reading variables through `lookup`.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let string = |key: &str, default: &str| read(key).unwrap_or_else(|| default.to_string());
        let mut problems = Vec::new();
        let service_name = string("SERVICE_NAME", DEFAULT_SERVICE_NAME);

        let config = Self {
            bind_addr: parse(
                &read,
                "BIND_ADDR",
                SocketAddr::from(([0, 0, 0, 0], DEFAULT_BIND_PORT)),
                &mut problems,
            ),
            kafka: KafkaConfig::from_lookup(DEFAULT_KAFKA_ADDR, service_name.as_str(), &read),
            consumer_group: string("CONSUMER_GROUP", DEFAULT_CONSUMER_GROUP),
            hierarchy_built_topic: string("HIERARCHY_BUILT_TOPIC", DEFAULT_HIERARCHY_BUILT_TOPIC),
            producer_topic: string("PRODUCER_TOPIC", DEFAULT_PRODUCER_TOPIC),
            event_reporter_topic: string("EVENT_REPORTER_TOPIC", DEFAULT_EVENT_REPORTER_TOPIC),
            kafka_max_bytes: parse(
                &read,
                "KAFKA_MAX_BYTES",
                DEFAULT_KAFKA_MAX_BYTES,
                &mut problems,
            ),
            kafka_offset_oldest: parse(&read, "KAFKA_OFFSET_OLDEST", true, &mut problems),
            opensearch_url: string("OPENSEARCH_URL", DEFAULT_OPENSEARCH_URL),
            hierarchy_api_url: string("HIERARCHY_API_URL", DEFAULT_HIERARCHY_API_URL),
            http_client_timeout: Duration::from_secs(parse(
                &read,
                "HTTP_CLIENT_TIMEOUT_SECS",
                DEFAULT_HTTP_CLIENT_TIMEOUT_SECS,
                &mut problems,
            )),
            graceful_shutdown_timeout: Duration::from_secs(parse(
                &read,
                "GRACEFUL_SHUTDOWN_TIMEOUT_SECS",
                DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECS,
                &mut problems,
            )),
            service_name,
        };

        if let Err(ConfigError(more)) = config.validate() {
            problems.extend(more);
        }
        if !problems.is_empty() {
            return Err(ConfigError(problems));
        }
        Ok(config)
    }

    /// Check the configuration, reporting every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.kafka.broker_list().is_empty() {
            problems.push("KAFKA_ADDR must name at least one broker".to_string());
        }
        if self.kafka.username.is_some() != self.kafka.password.is_some() {
            problems.push("KAFKA_USERNAME and KAFKA_PASSWORD must be set together".to_string());
        }
        for (key, value) in [
            ("CONSUMER_GROUP", &self.consumer_group),
            ("HIERARCHY_BUILT_TOPIC", &self.hierarchy_built_topic),
            ("PRODUCER_TOPIC", &self.producer_topic),
            ("EVENT_REPORTER_TOPIC", &self.event_reporter_topic),
            ("SERVICE_NAME", &self.service_name),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("{} must not be empty", key));
            }
        }
        if self.hierarchy_built_topic == self.producer_topic {
            problems.push("PRODUCER_TOPIC must differ from HIERARCHY_BUILT_TOPIC".to_string());
        }
        for (key, value) in [
            ("OPENSEARCH_URL", &self.opensearch_url),
            ("HIERARCHY_API_URL", &self.hierarchy_api_url),
        ] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                problems.push(format!("{} must be an http(s) url, got {:?}", key, value));
            }
        }
        if self.kafka_max_bytes == 0 {
            problems.push("KAFKA_MAX_BYTES must be greater than zero".to_string());
        }
        if self.http_client_timeout.is_zero() {
            problems.push("HTTP_CLIENT_TIMEOUT_SECS must be greater than zero".to_string());
        }
        if self.graceful_shutdown_timeout.is_zero() {
            problems.push("GRACEFUL_SHUTDOWN_TIMEOUT_SECS must be greater than zero".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError(problems))
        }
    }
}

/// Parse `key`, recording a problem and falling back to `default` on bad input.
fn parse<T, F>(read: &F, key: &str, default: T, problems: &mut Vec<String>) -> T
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match read(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            problems.push(format!("{} has invalid value {:?}: {}", key, raw, e));
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_vars(&[]).unwrap();

        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:22900");
        assert_eq!(config.kafka.brokers, "localhost:9092");
        assert_eq!(config.consumer_group, "dp-dimension-search-builder");
        assert_eq!(config.hierarchy_built_topic, "hierarchy-built");
        assert_eq!(config.producer_topic, "dimension-search-built");
        assert_eq!(config.event_reporter_topic, "report-events");
        assert_eq!(config.kafka_max_bytes, 2_000_000);
        assert!(config.kafka_offset_oldest);
        assert_eq!(config.opensearch_url, "http://localhost:10200");
        assert_eq!(config.hierarchy_api_url, "http://localhost:22600");
        assert_eq!(config.http_client_timeout, Duration::from_secs(30));
        assert_eq!(config.graceful_shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.service_name, "dp-dimension-search-builder");
    }

    #[test]
    fn test_overrides() {
        let config = from_vars(&[
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("KAFKA_ADDR", "kafka-1:9092,kafka-2:9092"),
            ("KAFKA_OFFSET_OLDEST", "false"),
            ("KAFKA_USERNAME", "user"),
            ("KAFKA_PASSWORD", "secret"),
            ("GRACEFUL_SHUTDOWN_TIMEOUT_SECS", "10"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.kafka.broker_list(), vec!["kafka-1:9092", "kafka-2:9092"]);
        assert!(!config.kafka_offset_oldest);
        assert!(config.kafka.uses_sasl());
        assert_eq!(config.graceful_shutdown_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_all_problems_are_collected() {
        let err = from_vars(&[
            ("BIND_ADDR", "not-an-address"),
            ("KAFKA_MAX_BYTES", "lots"),
            ("KAFKA_USERNAME", "user"),
            ("OPENSEARCH_URL", "localhost:9200"),
            ("GRACEFUL_SHUTDOWN_TIMEOUT_SECS", "0"),
        ])
        .unwrap_err();

        assert_eq!(err.0.len(), 5, "{:?}", err.0);
        assert!(err.0[0].starts_with("BIND_ADDR"));
        assert!(err.0[1].starts_with("KAFKA_MAX_BYTES"));
        assert!(err.to_string().starts_with("invalid configuration: "));
    }

    #[test]
    fn test_validate_rejects_same_inbound_and_outbound_topic() {
        let mut config = from_vars(&[]).unwrap();
        config.producer_topic = config.hierarchy_built_topic.clone();

        let err = config.validate().unwrap_err();
        assert_eq!(
            err.0,
            vec!["PRODUCER_TOPIC must differ from HIERARCHY_BUILT_TOPIC".to_string()]
        );
    }
}
