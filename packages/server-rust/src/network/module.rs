//! Server lifecycle with deferred startup.
//!
//! `new()` allocates shared state, `start()` binds the listener, `serve()`
//! accepts calls until shutdown. The shutdown controller exists from
//! `new()` on, so the logware layer can share it before the server starts.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context as _;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{health_handler, liveness_handler, readiness_handler, AppState};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::logware::LogwareLayer;

pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    /// Shared controller. Pass it to `LogwareBuilder::shutdown` so drain
    /// waits for pending transaction-log dispatches.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Wraps `api` and the server's health routes in the logware layer and
    /// the transport stack.
    ///
    /// Routes added here:
    /// - `GET /health`: detailed health JSON
    /// - `GET /health/live`: liveness probe
    /// - `GET /health/ready`: readiness probe
    pub fn build_router(&self, api: Router, logware: LogwareLayer) -> Router {
        let state = AppState {
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            start_time: Instant::now(),
        };

        let health = Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .with_state(state);

        api.merge(health)
            .layer(logware)
            .layer(build_http_layers(&self.config))
    }

    /// Binds the listener and returns the bound port, which differs from the
    /// configured one when port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves `router` until `shutdown` resolves, then drains.
    ///
    /// Drain moves the health state to `Draining`, stops accepting calls and
    /// waits up to `drain_timeout` for in-flight calls and pending
    /// dispatches.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        self,
        router: Router,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .context("start() must be called before serve()")?;
        let controller = self.shutdown;

        controller.set_ready();
        info!("serving HTTP");

        let signal_controller = Arc::clone(&controller);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                signal_controller.trigger_shutdown();
            })
            .await?;

        drain(&controller, &self.config).await;
        Ok(())
    }
}

async fn drain(controller: &ShutdownController, config: &NetworkConfig) {
    controller.trigger_shutdown();

    let pending = controller.pending_dispatches();
    if pending > 0 {
        info!(pending, "waiting for transaction log dispatches");
    }

    if controller.wait_for_drain(config.drain_timeout).await {
        info!("drained");
    } else {
        warn!(
            in_flight = controller.in_flight_count(),
            pending_dispatches = controller.pending_dispatches(),
            "drain timeout expired with work remaining"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use super::*;
    use crate::adapters::crypto::PlaintextCrypto;
    use crate::network::HealthState;

    fn logware(module: &NetworkModule) -> LogwareLayer {
        LogwareLayer::builder(Arc::new(PlaintextCrypto))
            .shutdown(module.shutdown_controller())
            .build()
    }

    #[test]
    fn new_does_not_bind() {
        let module = NetworkModule::new(NetworkConfig::default());
        assert!(module.listener.is_none());
        assert!(Arc::ptr_eq(
            &module.shutdown_controller(),
            &module.shutdown_controller()
        ));
    }

    #[tokio::test]
    async fn router_serves_health_routes() {
        let module = NetworkModule::new(NetworkConfig::default());
        let router = module.build_router(Router::new(), logware(&module));
        module.shutdown_controller().set_ready();

        let response = router
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = NetworkModule::new(NetworkConfig {
            host: "127.0.0.1".to_string(),
            ..NetworkConfig::default()
        });
        let port = module.start().await.unwrap();
        assert!(port > 0);
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let module = NetworkModule::new(NetworkConfig::default());
        let err = module
            .serve(Router::new(), std::future::ready(()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("start()"));
    }

    #[tokio::test]
    async fn serve_drains_after_shutdown_signal() {
        let mut module = NetworkModule::new(NetworkConfig {
            host: "127.0.0.1".to_string(),
            drain_timeout: Duration::from_secs(1),
            ..NetworkConfig::default()
        });
        module.start().await.unwrap();
        let controller = module.shutdown_controller();
        let router = module.build_router(Router::new(), logware(&module));

        module.serve(router, std::future::ready(())).await.unwrap();
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }
}
