//! HTTP server: routes, middleware stack and graceful shutdown

mod handler;
pub mod middleware;
pub mod response;

pub use handler::{ListParams, ServiceInfo, VERSION};
pub use middleware::{REQUEST_ID_HEADER, RESPONSE_TIME_HEADER, RequestId};
pub use response::ApiError;

use crate::config::{AppConfig, ServerConfig};
use crate::health::HealthAggregator;
use crate::items::ItemService;
use crate::metrics::Metrics;
use axum::Router;
use axum::http::{HeaderValue, StatusCode};
use axum::routing::get;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

/// Shared handler state, built once in `main`
#[derive(Clone)]
pub struct AppState {
    pub items: Arc<ItemService>,
    pub health: Arc<HealthAggregator>,
    pub metrics: Arc<Metrics>,
    pub app: Arc<AppConfig>,
}

/// Build the full application router
///
/// Layers, outermost first: request id, metrics, CORS, timeout, panic catching.
pub fn router(state: AppState, config: &ServerConfig, metrics_enabled: bool) -> Router {
    let metrics = Arc::clone(&state.metrics);
    let app_config = Arc::clone(&state.app);

    let mut routes = Router::new()
        .route("/", get(handler::root))
        .route("/healthz", get(handler::liveness))
        .route("/readyz", get(handler::readiness))
        .route("/health", get(handler::health_detailed))
        .route(
            "/api/v1/items",
            get(handler::list_items).post(handler::create_item),
        )
        .route(
            "/api/v1/items/{id}",
            get(handler::get_item)
                .put(handler::update_item)
                .delete(handler::delete_item),
        );
    if metrics_enabled {
        routes = routes.route("/metrics", get(handler::metrics));
    }

    let mut app = routes
        .with_state(state)
        .layer(CatchPanicLayer::custom(response::panic_response));
    if let Some(limit) = config.request_timeout() {
        app = app.layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            limit,
        ));
    }

    app.layer(cors_layer(&config.cors_origins))
        .layer(axum::middleware::from_fn_with_state(
            metrics,
            middleware::record_metrics,
        ))
        .layer(axum::middleware::from_fn_with_state(
            app_config,
            middleware::request_id,
        ))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(allowed))
}

/// HTTP server bound to the configured address
pub struct Server {
    config: ServerConfig,
    app: Router,
    cancel_token: CancellationToken,
}

impl Server {
    pub fn new(
        config: ServerConfig,
        state: AppState,
        metrics_enabled: bool,
        cancel_token: CancellationToken,
    ) -> Self {
        let app = router(state, &config, metrics_enabled);
        Self {
            config,
            app,
            cancel_token,
        }
    }

    /// Serve until the cancel token fires, then drain in-flight requests
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let addr: SocketAddr = self.config.listen_addr.parse()?;
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", addr);

        let shutdown = self.cancel_token.clone().cancelled_owned();
        axum::serve(listener, self.app.clone())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server shut down");
        Ok(())
    }
}
