use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use serde_json::Value;
use stockroom::cache::CacheClient;
use stockroom::config::{AppConfig, Environment, ServerConfig};
use stockroom::health::HealthAggregator;
use stockroom::items::{ItemService, ItemStore};
use stockroom::logging;
use stockroom::metrics::Metrics;
use stockroom::server::{AppState, REQUEST_ID_HEADER, router};
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

struct BufferWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = BufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BufferWriter(Arc::clone(&self.0))
    }
}

impl io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| io::Error::other("lock poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn lines(&self) -> Vec<Value> {
        let bytes = self.0.lock().expect("lock output").clone();
        String::from_utf8(bytes)
            .expect("utf8 log output")
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).expect("json log line"))
            .collect()
    }
}

fn json_subscriber(sink: SharedBuffer) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_writer(sink)
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .finish()
}

fn production_app() -> AppConfig {
    AppConfig {
        name: "stockroom-eu".to_string(),
        environment: Environment::Production,
    }
}

#[test]
fn service_span_stamps_identity() {
    let sink = SharedBuffer::default();

    tracing::subscriber::with_default(json_subscriber(sink.clone()), || {
        let span = logging::service_span(&production_app());
        let _entered = span.enter();
        tracing::info!("Starting Stockroom");
    });

    let lines = sink.lines();
    let line = lines.first().expect("log line");
    assert_eq!(line["span"]["service"], "stockroom-eu");
    assert_eq!(line["span"]["environment"], "production");
}

#[tokio::test]
async fn request_logs_carry_identity_and_request_id() {
    let sink = SharedBuffer::default();
    let _default = tracing::subscriber::set_default(json_subscriber(sink.clone()));

    let metrics = Arc::new(Metrics::new().unwrap());
    let state = AppState {
        items: Arc::new(ItemService::new(
            Arc::new(ItemStore::new()),
            CacheClient::disabled(),
            Arc::clone(&metrics),
            Duration::from_secs(60),
        )),
        health: Arc::new(HealthAggregator::new(Duration::from_millis(100))),
        metrics,
        app: Arc::new(production_app()),
    };
    let app = router(state, &ServerConfig::default(), true);

    let request = Request::builder()
        .uri("/healthz")
        .header(REQUEST_ID_HEADER, "abc-123")
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap();

    let lines = sink.lines();
    let completed = lines
        .iter()
        .find(|l| l["fields"]["message"] == "Request completed")
        .expect("completion log line");
    assert_eq!(completed["span"]["service"], "stockroom-eu");
    assert_eq!(completed["span"]["environment"], "production");
    assert_eq!(completed["span"]["request_id"], "abc-123");
}
