//! Integration tests for the dimension search builder pipeline.
//!
//! These tests use the real consumer loop, processor, walker and shutdown
//! coordinator with mock queues, producers, hierarchy API and search index.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use prost::Message;
use tokio::sync::mpsc;
use tokio::time::timeout;

use hierarchy_client::{HierarchyFetcher, MockHierarchyClient};
use search_builder::consumer::{InboundMessage, InboundQueue};
use search_builder::errors::IngestError;
use search_builder::orchestrator::{ConsumerLoop, LoopTotals};
use search_builder::processor::MessageProcessor;
use search_builder::producer::{ErrorReporter, MessageSink};
use search_builder::schema::{HierarchyBuilt, ReportEvent, SearchIndexBuilt};
use search_builder::shutdown::{Closer, ShutdownCoordinator, ShutdownError, ShutdownState};
use search_builder_repository::{SearchIndexError, SearchIndexProvider};
use search_builder_shared::{HierarchyNode, SearchDocument};

type CallLog = Arc<Mutex<Vec<String>>>;

// Mock inbound queue fed through a channel
struct MockQueue {
    rx: tokio::sync::Mutex<mpsc::Receiver<InboundMessage>>,
    log: CallLog,
}

#[async_trait]
impl Closer for MockQueue {
    fn name(&self) -> &str {
        "inbound"
    }

    async fn close(&self) -> Result<(), IngestError> {
        self.log.lock().unwrap().push("close(inbound)".to_string());
        Ok(())
    }
}

#[async_trait]
impl InboundQueue for MockQueue {
    async fn recv(&self) -> Result<Option<InboundMessage>, IngestError> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn commit(&self, message: &InboundMessage) -> Result<(), IngestError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("commit({})", message.offset));
        Ok(())
    }

    async fn stop_listening(&self) -> Result<(), IngestError> {
        self.log.lock().unwrap().push("stop(inbound)".to_string());
        Ok(())
    }
}

// Mock hierarchy API recording fetches in the shared log
struct LoggingHierarchy {
    inner: MockHierarchyClient,
    log: CallLog,
}

#[async_trait]
impl HierarchyFetcher for LoggingHierarchy {
    async fn get_root(
        &self,
        instance_id: &str,
        dimension: &str,
    ) -> hierarchy_client::Result<HierarchyNode> {
        self.inner.get_root(instance_id, dimension).await
    }

    async fn get_node(
        &self,
        instance_id: &str,
        dimension: &str,
        code_id: &str,
    ) -> hierarchy_client::Result<HierarchyNode> {
        self.log.lock().unwrap().push(format!("fetch({})", code_id));
        self.inner.get_node(instance_id, dimension, code_id).await
    }
}

// Mock search index recording writes, failing for one instance's "B"
struct MockSearchIndex {
    log: CallLog,
    failing_instance: String,
}

#[async_trait]
impl SearchIndexProvider for MockSearchIndex {
    async fn delete_index(&self, _: &str, _: &str) -> Result<u16, SearchIndexError> {
        Ok(404)
    }

    async fn create_index(
        &self,
        instance_id: &str,
        dimension: &str,
    ) -> Result<u16, SearchIndexError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("create({}_{})", instance_id, dimension));
        Ok(200)
    }

    async fn put_document(
        &self,
        instance_id: &str,
        _: &str,
        document: &SearchDocument,
    ) -> Result<u16, SearchIndexError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("write({})", document.code));
        if instance_id == self.failing_instance && document.code == "B" {
            return Err(SearchIndexError::unexpected_status(
                "Index document",
                500,
                "shard failure",
            ));
        }
        Ok(201)
    }
}

// Mock producer that records payloads and its own close
struct MockProducer {
    name: String,
    sent: Mutex<Vec<Vec<u8>>>,
    log: CallLog,
}

impl MockProducer {
    fn new(name: &str, log: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            sent: Mutex::new(Vec::new()),
            log: log.clone(),
        })
    }

    fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSink for MockProducer {
    async fn send(&self, _: &str, payload: Vec<u8>) -> Result<(), IngestError> {
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }
}

#[async_trait]
impl Closer for MockProducer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn close(&self) -> Result<(), IngestError> {
        self.log.lock().unwrap().push(format!("close({})", self.name));
        Ok(())
    }
}

fn notification(offset: i64, instance_id: &str) -> InboundMessage {
    let payload = HierarchyBuilt {
        instance_id: instance_id.to_string(),
        dimension_name: "geography".to_string(),
    }
    .encode_to_vec();
    InboundMessage::new("hierarchy-built", 0, offset, payload)
}

fn drain_log(log: &CallLog) -> Vec<String> {
    std::mem::take(&mut *log.lock().unwrap())
}

#[tokio::test]
async fn test_pipeline_end_to_end() {
    let log = CallLog::default();

    let hierarchy = Arc::new(LoggingHierarchy {
        inner: MockHierarchyClient::with_tree(
            HierarchyNode::new("root", "Root").with_children(["A", "B"]),
            [
                HierarchyNode::new("A", "Alpha").with_children(["C"]),
                HierarchyNode::new("B", "Beta"),
                HierarchyNode::new("C", "Gamma"),
            ],
        ),
        log: log.clone(),
    });
    let index = Arc::new(MockSearchIndex {
        log: log.clone(),
        failing_instance: "inst-broken".to_string(),
    });
    let completions = MockProducer::new("completion producer", &log);
    let reports = MockProducer::new("error producer", &log);

    let processor = MessageProcessor::new(
        hierarchy,
        index,
        completions.clone(),
        ErrorReporter::new(reports.clone(), "dp-dimension-search-builder"),
    );

    let (tx, rx) = mpsc::channel(8);
    let queue = Arc::new(MockQueue {
        rx: tokio::sync::Mutex::new(rx),
        log: log.clone(),
    });
    let handle = ConsumerLoop::new(queue.clone(), processor).spawn();

    // Successful job
    tx.send(notification(0, "inst-ok")).await.unwrap();
    timeout(Duration::from_secs(5), async {
        while handle.totals().committed < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("first message was not committed");

    assert_eq!(
        drain_log(&log),
        vec![
            "create(inst-ok_geography)",
            "write(root)",
            "fetch(A)",
            "write(A)",
            "fetch(C)",
            "write(C)",
            "fetch(B)",
            "write(B)",
            "commit(0)",
        ]
    );
    let completion = SearchIndexBuilt::decode(completions.sent()[0].as_slice()).unwrap();
    assert_eq!(completion.instance_id, "inst-ok");
    assert_eq!(completion.dimension_name, "geography");

    // Write of B fails: C stays written, no completion, one report, still committed
    tx.send(notification(1, "inst-broken")).await.unwrap();
    timeout(Duration::from_secs(5), async {
        while handle.totals().committed < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("second message was not committed");

    assert_eq!(
        drain_log(&log),
        vec![
            "create(inst-broken_geography)",
            "write(root)",
            "fetch(A)",
            "write(A)",
            "fetch(C)",
            "write(C)",
            "fetch(B)",
            "write(B)",
            "commit(1)",
        ]
    );
    assert_eq!(completions.sent().len(), 1);
    let report = ReportEvent::decode(reports.sent()[0].as_slice()).unwrap();
    assert_eq!(report.instance_id, "inst-broken");
    assert_eq!(report.service_name, "dp-dimension-search-builder");
    assert!(report.error.contains("shard failure"));

    // Undecodable message: committed, nothing reported
    tx.send(InboundMessage::new("hierarchy-built", 0, 2, b"\xff\xff\xff".to_vec()))
        .await
        .unwrap();
    timeout(Duration::from_secs(5), async {
        while handle.totals().committed < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("third message was not committed");

    assert_eq!(drain_log(&log), vec!["commit(2)"]);
    assert_eq!(reports.sent().len(), 1);
    assert_eq!(
        handle.totals(),
        LoopTotals {
            processed: 1,
            failed: 2,
            committed: 3
        }
    );

    // Graceful shutdown closes everything once, in order
    let mut coordinator = ShutdownCoordinator::new(Duration::from_secs(5), queue, handle)
        .then_close(completions.clone())
        .then_close(reports.clone());

    coordinator.shutdown().await.unwrap();

    assert_eq!(coordinator.state(), ShutdownState::Closed);
    assert_eq!(
        drain_log(&log),
        vec![
            "stop(inbound)",
            "close(completion producer)",
            "close(error producer)",
            "close(inbound)",
        ]
    );
}

#[tokio::test]
async fn test_shutdown_reports_timeout_for_stuck_job() {
    struct StuckIndex;

    #[async_trait]
    impl SearchIndexProvider for StuckIndex {
        async fn delete_index(&self, _: &str, _: &str) -> Result<u16, SearchIndexError> {
            std::future::pending().await
        }

        async fn create_index(&self, _: &str, _: &str) -> Result<u16, SearchIndexError> {
            Ok(200)
        }

        async fn put_document(
            &self,
            _: &str,
            _: &str,
            _: &SearchDocument,
        ) -> Result<u16, SearchIndexError> {
            Ok(201)
        }
    }

    let log = CallLog::default();
    let completions = MockProducer::new("completion producer", &log);
    let processor = MessageProcessor::new(
        Arc::new(MockHierarchyClient::with_tree(
            HierarchyNode::new("root", "Root"),
            Vec::new(),
        )),
        Arc::new(StuckIndex),
        completions.clone(),
        ErrorReporter::new(MockProducer::new("error producer", &log), "svc"),
    );

    let (tx, rx) = mpsc::channel(8);
    let queue = Arc::new(MockQueue {
        rx: tokio::sync::Mutex::new(rx),
        log: log.clone(),
    });
    let handle = ConsumerLoop::new(queue.clone(), processor).spawn();

    tx.send(notification(0, "inst-1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut coordinator = ShutdownCoordinator::new(Duration::from_millis(100), queue, handle)
        .then_close(completions);

    let err = coordinator.shutdown().await.unwrap_err();

    assert!(matches!(err, ShutdownError::Timeout { .. }));
    assert_eq!(
        drain_log(&log),
        vec![
            "stop(inbound)",
            "close(completion producer)",
            "close(inbound)",
        ]
    );
}
