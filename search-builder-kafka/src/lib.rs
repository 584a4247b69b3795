//! Shared Kafka utilities for the dimension search builder.
//!
//! This crate provides the client configuration used by the inbound
//! consumer and by both outbound producers, so that broker addresses and
//! SASL/SSL settings are applied the same way everywhere.
//!
//! ## Usage
//!
//! ```ignore
//! use search_builder_kafka::{create_future_producer, create_stream_consumer, KafkaConfig};
//!
//! // Using environment variables
//! let config = KafkaConfig::from_env("localhost:9092", "dp-dimension-search-builder");
//!
//! // Or with explicit configuration
//! let config = KafkaConfig::new("localhost:9092", "dp-dimension-search-builder")
//!     .with_credentials("user".to_string(), "secret".to_string());
//!
//! let producer = create_future_producer(&config, 2_000_000)?;
//! let consumer = create_stream_consumer(&config, "dp-dimension-search-builder", true)?;
//! ```

use std::env;

use anyhow::Result;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::StreamConsumer;
use rdkafka::producer::FutureProducer;

/// Connection settings shared by every Kafka client of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaConfig {
    /// Kafka broker addresses, comma separated (e.g., "localhost:9092,localhost:9093")
    pub brokers: String,
    /// Client ID reported to the brokers
    pub client_id: String,
    /// SASL username (enables SASL/SSL if set together with a password)
    pub username: Option<String>,
    /// SASL password
    pub password: Option<String>,
    /// Custom CA certificate in PEM format
    pub ssl_ca_pem: Option<String>,
}

impl KafkaConfig {
    /// Create a new KafkaConfig with the given brokers and client_id.
    pub fn new(brokers: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            client_id: client_id.into(),
            username: None,
            password: None,
            ssl_ca_pem: None,
        }
    }

    /// Create a KafkaConfig from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `KAFKA_ADDR` - Broker addresses (uses provided default if not set)
    /// - `KAFKA_USERNAME` - SASL username (optional)
    /// - `KAFKA_PASSWORD` - SASL password (optional)
    /// - `KAFKA_SSL_CA_PEM` - Custom CA cert in PEM format (optional)
    pub fn from_env(default_brokers: &str, client_id: impl Into<String>) -> Self {
        Self::from_lookup(default_brokers, client_id, |key| env::var(key).ok())
    }

    /// Same as [`KafkaConfig::from_env`], reading variables through `lookup`.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(default_brokers: &str, client_id: impl Into<String>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            brokers: read("KAFKA_ADDR").unwrap_or_else(|| default_brokers.to_string()),
            client_id: client_id.into(),
            username: read("KAFKA_USERNAME"),
            password: read("KAFKA_PASSWORD"),
            ssl_ca_pem: read("KAFKA_SSL_CA_PEM"),
        }
    }

    /// Set SASL credentials.
    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    /// Set custom CA certificate.
    pub fn with_ssl_ca(mut self, ca_pem: String) -> Self {
        self.ssl_ca_pem = Some(ca_pem);
        self
    }

    /// Whether SASL/SSL will be used.
    pub fn uses_sasl(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Individual broker addresses.
    pub fn broker_list(&self) -> Vec<&str> {
        self.brokers
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .collect()
    }

    /// Apply the broker, client id and security settings to `client_config`.
    pub fn apply(&self, client_config: &mut ClientConfig) {
        client_config
            .set("bootstrap.servers", &self.brokers)
            .set("client.id", &self.client_id);

        // If SASL credentials are provided, enable SASL/SSL (for managed Kafka)
        // Otherwise, use plaintext (for local development)
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            client_config
                .set("security.protocol", "SASL_SSL")
                .set("sasl.mechanisms", "PLAIN")
                .set("sasl.username", username)
                .set("sasl.password", password);

            if let Some(ca_pem) = &self.ssl_ca_pem {
                client_config.set("ssl.ca.pem", ca_pem);
            }
        }
    }

    /// Client configuration for a producer accepting messages up to `max_bytes`.
    pub fn producer_config(&self, max_bytes: usize) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        self.apply(&mut client_config);
        client_config
            .set("compression.type", "zstd")
            .set("message.timeout.ms", "5000")
            .set("message.max.bytes", max_bytes.to_string());
        client_config
    }

    /// Client configuration for a consumer in `group_id` with manual commits.
    ///
    /// A group without committed offsets starts from the oldest message when
    /// `offset_oldest` is set, otherwise from the newest.
    pub fn consumer_config(&self, group_id: &str, offset_oldest: bool) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        self.apply(&mut client_config);
        client_config
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set(
                "auto.offset.reset",
                if offset_oldest { "earliest" } else { "latest" },
            )
            .set("session.timeout.ms", "6000");
        client_config
    }
}

/// Create an async Kafka producer.
///
/// Configures the producer with:
/// - zstd compression
/// - `message.max.bytes` set to `max_bytes`
/// - SASL/SSL authentication if credentials are provided
pub fn create_future_producer(config: &KafkaConfig, max_bytes: usize) -> Result<FutureProducer> {
    Ok(config.producer_config(max_bytes).create()?)
}

/// Create a stream consumer with auto commit disabled.
pub fn create_stream_consumer(
    config: &KafkaConfig,
    group_id: &str,
    offset_oldest: bool,
) -> Result<StreamConsumer> {
    Ok(config.consumer_config(group_id, offset_oldest).create()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = KafkaConfig::from_lookup("localhost:9092", "builder", lookup(&[]));
        assert_eq!(config, KafkaConfig::new("localhost:9092", "builder"));
        assert!(!config.uses_sasl());
    }

    #[test]
    fn test_from_lookup_ignores_empty_values() {
        let config = KafkaConfig::from_lookup(
            "localhost:9092",
            "builder",
            lookup(&[("KAFKA_ADDR", ""), ("KAFKA_USERNAME", "")]),
        );
        assert_eq!(config.brokers, "localhost:9092");
        assert_eq!(config.username, None);
    }

    #[test]
    fn test_broker_list_splits_and_trims() {
        let config = KafkaConfig::new("a:9092, b:9092,,", "builder");
        assert_eq!(config.broker_list(), vec!["a:9092", "b:9092"]);
    }

    #[test]
    fn test_plaintext_config_has_no_sasl() {
        let config = KafkaConfig::new("localhost:9092", "builder");
        let client_config = config.producer_config(1000);

        assert_eq!(client_config.get("bootstrap.servers"), Some("localhost:9092"));
        assert_eq!(client_config.get("client.id"), Some("builder"));
        assert_eq!(client_config.get("message.max.bytes"), Some("1000"));
        assert_eq!(client_config.get("security.protocol"), None);
    }

    #[test]
    fn test_sasl_config_applied_with_credentials() {
        let config = KafkaConfig::new("broker:9096", "builder")
            .with_credentials("user".to_string(), "secret".to_string())
            .with_ssl_ca("PEM".to_string());
        let client_config = config.consumer_config("group", true);

        assert_eq!(client_config.get("security.protocol"), Some("SASL_SSL"));
        assert_eq!(client_config.get("sasl.username"), Some("user"));
        assert_eq!(client_config.get("sasl.password"), Some("secret"));
        assert_eq!(client_config.get("ssl.ca.pem"), Some("PEM"));
    }

    #[test]
    fn test_username_without_password_stays_plaintext() {
        let mut config = KafkaConfig::new("broker:9092", "builder");
        config.username = Some("user".to_string());

        let client_config = config.producer_config(1000);
        assert_eq!(client_config.get("security.protocol"), None);
    }

    #[test]
    fn test_consumer_config_offsets_and_manual_commit() {
        let config = KafkaConfig::new("localhost:9092", "builder");

        let oldest = config.consumer_config("group", true);
        assert_eq!(oldest.get("group.id"), Some("group"));
        assert_eq!(oldest.get("enable.auto.commit"), Some("false"));
        assert_eq!(oldest.get("auto.offset.reset"), Some("earliest"));

        let newest = config.consumer_config("group", false);
        assert_eq!(newest.get("auto.offset.reset"), Some("latest"));
    }
}
