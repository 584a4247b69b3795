//! Dependency initialization and wiring for the dimension search builder.

use std::sync::Arc;

use tracing::info;

use hierarchy_client::HierarchyClient;
use search_builder_repository::OpenSearchProvider;

use crate::config::Config;
use crate::consumer::KafkaConsumer;
use crate::health::HealthCheck;
use crate::processor::MessageProcessor;
use crate::producer::{ErrorReporter, KafkaProducer};
use crate::ServiceError;

/// Container for all initialized dependencies.
///
/// Every closable resource is held behind an `Arc` so that the shutdown
/// coordinator can own the handle it closes while the consumer loop keeps
/// using it.
pub struct Dependencies {
    pub consumer: Arc<KafkaConsumer>,
    pub completion_producer: Arc<KafkaProducer>,
    pub error_producer: Arc<KafkaProducer>,
    pub processor: MessageProcessor,
    pub health: Arc<HealthCheck>,
}

impl Dependencies {
    /// Create every client described by `config`.
    ///
    /// No network call is made here; clients connect on first use.
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        info!(
            opensearch_url = %config.opensearch_url,
            hierarchy_api_url = %config.hierarchy_api_url,
            kafka_brokers = %config.kafka.brokers,
            consumer_group = %config.consumer_group,
            sasl = config.kafka.uses_sasl(),
            "Initializing dependencies"
        );

        let hierarchy = Arc::new(
            HierarchyClient::new(&config.hierarchy_api_url, config.http_client_timeout)
                .map_err(|e| ServiceError::startup(format!("hierarchy client: {}", e)))?,
        );

        let search_index = Arc::new(
            OpenSearchProvider::new(&config.opensearch_url, config.http_client_timeout)
                .map_err(|e| ServiceError::startup(format!("OpenSearch provider: {}", e)))?,
        );

        let consumer = Arc::new(
            KafkaConsumer::new(
                &config.kafka,
                &config.consumer_group,
                &config.hierarchy_built_topic,
                config.kafka_offset_oldest,
            )
            .map_err(|e| ServiceError::startup(format!("Kafka consumer: {}", e)))?,
        );

        let completion_producer = Arc::new(
            KafkaProducer::new(
                &config.kafka,
                config.kafka_max_bytes,
                &config.producer_topic,
                "Kafka Search Built Producer",
            )
            .map_err(|e| ServiceError::startup(format!("completion producer: {}", e)))?,
        );

        let error_producer = Arc::new(
            KafkaProducer::new(
                &config.kafka,
                config.kafka_max_bytes,
                &config.event_reporter_topic,
                "Kafka Error Producer",
            )
            .map_err(|e| ServiceError::startup(format!("error producer: {}", e)))?,
        );

        let reporter = ErrorReporter::new(error_producer.clone(), config.service_name.as_str());
        let processor = MessageProcessor::new(
            hierarchy.clone(),
            search_index.clone(),
            completion_producer.clone(),
            reporter,
        );

        let health = Arc::new(
            HealthCheck::new(env!("CARGO_PKG_VERSION"), config.http_client_timeout)
                .with_checker(consumer.clone())
                .with_checker(completion_producer.clone())
                .with_checker(error_producer.clone())
                .with_checker(search_index)
                .with_checker(hierarchy),
        );

        info!("Dependencies initialized");

        Ok(Self {
            consumer,
            completion_producer,
            error_producer,
            processor,
            health,
        })
    }
}
