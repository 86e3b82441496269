//! The call interception pipeline as a tower layer.
//!
//! For every call that is neither exempt nor unmatched:
//!
//! 1. open an audit record (path, request time)
//! 2. resolve the call context unless the endpoint may bypass it
//! 3. buffer the request body and attach the context to the request
//! 4. run the handler, catching panics and business failures
//! 5. buffer the response body
//! 6. on any failure, replace the response with the canonical error payload
//! 7. persist the audit record, then start the saga dispatch
//!
//! The handler runs under `call_timeout`; running past it is a failure like
//! any other. If the call future is dropped before step 7 (client gone, an
//! outer deadline), the audit record is still persisted, marked as failed,
//! from a detached task.
//!
//! Exempt calls (CORS preflight, health probes, documentation) and calls
//! that match no route are forwarded untouched.

use std::any::Any;
use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::{MatchedPath, Request};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures_util::FutureExt;
use logware_core::{AuditRecord, CallContext, EmptyDirectory, UserDirectory};
use tokio::runtime::Handle;
use tokio::time::error::Elapsed;
use tower::{Layer, Service, ServiceExt};
use tracing::{error, field, info_span, warn, Instrument, Span};

use super::buffer;
use super::bypass::{can_bypass_context_generation, ExemptCalls};
use super::config::LogwareConfig;
use super::endpoint::{EndpointProvider, EndpointRegistry};
use super::error::{BusinessError, CallError};
use super::normalizer::ExceptionNormalizer;
use super::recorder::{AuditRecorder, RecordOutcome};
use super::resolver::ContextResolver;
use super::saga::{DispatchInput, SagaDispatcher};
use crate::network::ShutdownController;
use crate::traits::{AuditSink, CryptoService, LocalizationService, TransactionClient};

/// Collaborators and settings shared by every call.
struct Pipeline {
    config: LogwareConfig,
    exempt: ExemptCalls,
    endpoints: Arc<dyn EndpointProvider>,
    resolver: ContextResolver,
    normalizer: ExceptionNormalizer,
    recorder: Option<AuditRecorder>,
    dispatcher: Option<SagaDispatcher>,
    shutdown: Arc<ShutdownController>,
}

impl Pipeline {
    async fn handle<S>(&self, inner: S, request: Request) -> Response
    where
        S: Service<Request> + Send,
        S::Response: IntoResponse,
        S::Error: Display,
        S::Future: Send,
    {
        let _call = self.shutdown.in_flight_guard();
        let method = request.method().clone();
        let path = request.uri().path().to_owned();

        if self.exempt.is_exempt(&method, &path) {
            return self.forward(inner, request).await;
        }

        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(|matched| matched.as_str().to_owned());
        let Some(endpoint) = self.endpoints.endpoint(&method, route.as_deref()) else {
            return self.forward(inner, request).await;
        };

        let bypassed = can_bypass_context_generation(Some(&endpoint));
        let has_authorization = request.headers().contains_key(header::AUTHORIZATION);
        let mut audit = PendingAudit::open(
            self.recorder.clone(),
            AuditRecord::begin(&self.config.application_name, &path, Utc::now()),
        );
        let mut context = None;

        let response = match self
            .intercept(inner, request, bypassed, &mut audit.record, &mut context)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                error!(severity = "critical", error = %err.describe(), "call failed");
                audit.record.fail(err.describe());
                self.normalizer.render(&err).await
            }
        };

        let context = context.unwrap_or_else(|| Arc::new(CallContext::anonymous()));
        let request_body = audit.record.request_body.clone();

        if let Some(outcome) = audit.persist().await {
            Span::current().record("audit", outcome.as_str());
        }

        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.dispatch(DispatchInput {
                bypassed,
                has_authorization,
                context: &context,
                request_body,
                action_name: endpoint.action_name().map(str::to_owned),
            });
        }

        response
    }

    /// Steps 2 to 5. Everything that fails here reaches the caller as the
    /// canonical error payload.
    async fn intercept<S>(
        &self,
        inner: S,
        request: Request,
        bypassed: bool,
        record: &mut AuditRecord,
        slot: &mut Option<Arc<CallContext>>,
    ) -> Result<Response, CallError>
    where
        S: Service<Request> + Send,
        S::Response: IntoResponse,
        S::Error: Display,
        S::Future: Send,
    {
        let resolved = if bypassed {
            None
        } else {
            self.resolver.resolve(request.method(), request.headers())?
        };
        let context = Arc::new(resolved.unwrap_or_else(CallContext::anonymous));
        Span::current().record("request_id", context.request_id());
        *slot = Some(Arc::clone(&context));

        let (mut request, body) =
            buffer::capture_request(request, self.config.max_body_bytes).await?;
        record.capture_request(body);
        request.extensions_mut().insert(context);

        let deadline = self.config.call_timeout;
        let handled = tokio::time::timeout(
            deadline,
            AssertUnwindSafe(inner.oneshot(request)).catch_unwind(),
        )
        .await;
        let response = settle(handled, deadline)?;

        if let Some(err) = response.extensions().get::<BusinessError>() {
            return Err(CallError::Handler(err.clone()));
        }

        let (response, body) =
            buffer::capture_response(response, self.config.max_body_bytes).await?;
        record.capture_response(body);
        Ok(response)
    }

    /// Runs the inner service with no interception. Only a service error or
    /// a missed deadline is turned into the canonical payload, so that no
    /// error body escapes unnormalized.
    async fn forward<S>(&self, inner: S, request: Request) -> Response
    where
        S: Service<Request> + Send,
        S::Response: IntoResponse,
        S::Error: Display,
        S::Future: Send,
    {
        let deadline = self.config.call_timeout;
        let forwarded = tokio::time::timeout(deadline, inner.oneshot(request))
            .await
            .map(Ok);

        match settle(forwarded, deadline) {
            Ok(response) => response,
            Err(err) => {
                error!(severity = "critical", error = %err.describe(), "call failed");
                self.normalizer.render(&err).await
            }
        }
    }
}

/// Result of running the downstream service under a deadline and a panic
/// catcher.
type Handled<R, E> = Result<Result<Result<R, E>, Box<dyn Any + Send>>, Elapsed>;

/// Converts a handler outcome into a response or a failure. Takes the
/// outcome by value so no downstream type outlives this call.
fn settle<R, E>(handled: Handled<R, E>, deadline: Duration) -> Result<Response, CallError>
where
    R: IntoResponse,
    E: Display,
{
    match handled {
        Err(_elapsed) => Err(CallError::Timeout { after: deadline }),
        Ok(Err(panic)) => Err(CallError::HandlerPanic {
            reason: panic_message(panic.as_ref()),
        }),
        Ok(Ok(Err(e))) => Err(CallError::Service {
            reason: e.to_string(),
        }),
        Ok(Ok(Ok(response))) => Ok(response.into_response()),
    }
}

/// Audit record of a call in progress.
///
/// Persisted exactly once: by [`PendingAudit::persist`] on every path that
/// reaches the end of the pipeline, otherwise from `Drop`.
struct PendingAudit {
    record: AuditRecord,
    recorder: Option<AuditRecorder>,
    persisted: bool,
}

impl PendingAudit {
    fn open(recorder: Option<AuditRecorder>, record: AuditRecord) -> Self {
        Self {
            record,
            recorder,
            persisted: false,
        }
    }

    async fn persist(&mut self) -> Option<RecordOutcome> {
        self.persisted = true;
        let record = std::mem::take(&mut self.record).finish(Utc::now());
        match &self.recorder {
            Some(recorder) => Some(recorder.record(record).await),
            None => None,
        }
    }
}

impl Drop for PendingAudit {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        let Some(recorder) = self.recorder.take() else {
            return;
        };

        let mut record = std::mem::take(&mut self.record);
        record.fail(CANCELLED.to_string());
        let record = record.finish(Utc::now());

        let Ok(runtime) = Handle::try_current() else {
            warn!(path = %record.method_path, "call cancelled outside a runtime, audit record lost");
            return;
        };
        warn!(path = %record.method_path, "call cancelled before completion");
        runtime.spawn(async move {
            recorder.record(record).await;
        });
    }
}

/// Failure description of a call whose future was dropped mid-flight.
const CANCELLED: &str = "RequestCancelled";

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// LogwareLayer
// ---------------------------------------------------------------------------

/// Tower layer that intercepts every call of the wrapped service.
///
/// Apply it with `Router::layer` so the matched route is known when the
/// layer runs.
#[derive(Clone)]
pub struct LogwareLayer {
    pipeline: Arc<Pipeline>,
}

impl LogwareLayer {
    /// Starts building a layer. A crypto service is the one collaborator
    /// without a usable default.
    #[must_use]
    pub fn builder(crypto: Arc<dyn CryptoService>) -> LogwareBuilder {
        LogwareBuilder::new(crypto)
    }

    #[must_use]
    pub fn config(&self) -> &LogwareConfig {
        &self.pipeline.config
    }

    /// Controller tracking the calls and dispatches of this layer.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.pipeline.shutdown)
    }
}

impl<S> Layer<S> for LogwareLayer {
    type Service = LogwareService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LogwareService {
            inner,
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

// ---------------------------------------------------------------------------
// LogwareService
// ---------------------------------------------------------------------------

/// Service produced by [`LogwareLayer`]. Never fails: every error becomes a
/// response.
#[derive(Clone)]
pub struct LogwareService<S> {
    inner: S,
    pipeline: Arc<Pipeline>,
}

impl<S> Service<Request> for LogwareService<S>
where
    S: Service<Request> + Clone + Send + 'static,
    S::Response: IntoResponse,
    S::Error: Display,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // readiness of the inner service is awaited per call by `oneshot`
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let pipeline = Arc::clone(&self.pipeline);

        let span = info_span!(
            "logware",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = field::Empty,
            audit = field::Empty,
        );

        Box::pin(
            async move { Ok(pipeline.handle(inner, request).await) }.instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// LogwareBuilder
// ---------------------------------------------------------------------------

/// Assembles a [`LogwareLayer`] from its collaborators.
///
/// Without an audit sink no records are written; without a transaction
/// client nothing is dispatched; without a localizer error messages are the
/// raw message keys.
pub struct LogwareBuilder {
    crypto: Arc<dyn CryptoService>,
    config: LogwareConfig,
    localizer: Option<Arc<dyn LocalizationService>>,
    audit_sink: Option<Arc<dyn AuditSink>>,
    transaction_client: Option<Arc<dyn TransactionClient>>,
    directory: Arc<dyn UserDirectory>,
    endpoints: Arc<dyn EndpointProvider>,
    shutdown: Option<Arc<ShutdownController>>,
}

impl LogwareBuilder {
    fn new(crypto: Arc<dyn CryptoService>) -> Self {
        Self {
            crypto,
            config: LogwareConfig::default(),
            localizer: None,
            audit_sink: None,
            transaction_client: None,
            directory: Arc::new(EmptyDirectory),
            endpoints: Arc::new(EndpointRegistry::new()),
            shutdown: None,
        }
    }

    #[must_use]
    pub fn config(mut self, config: LogwareConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn localizer(mut self, localizer: Arc<dyn LocalizationService>) -> Self {
        self.localizer = Some(localizer);
        self
    }

    #[must_use]
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    #[must_use]
    pub fn transaction_client(mut self, client: Arc<dyn TransactionClient>) -> Self {
        self.transaction_client = Some(client);
        self
    }

    #[must_use]
    pub fn directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = directory;
        self
    }

    #[must_use]
    pub fn endpoints(mut self, endpoints: Arc<dyn EndpointProvider>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Shares the server's shutdown controller, so drain waits for calls
    /// and dispatches of this layer.
    #[must_use]
    pub fn shutdown(mut self, shutdown: Arc<ShutdownController>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    #[must_use]
    pub fn build(self) -> LogwareLayer {
        let config = self.config;
        let shutdown = self
            .shutdown
            .unwrap_or_else(|| Arc::new(ShutdownController::new()));

        let resolver = ContextResolver::new(
            self.crypto,
            Arc::clone(&self.directory),
            config.token.clone(),
            config.documentation_referer_marker.clone(),
        );
        let normalizer = ExceptionNormalizer::new(
            self.localizer,
            config.localization_domain.clone(),
            config.business_failure_status,
        );
        let recorder = self
            .audit_sink
            .map(|sink| AuditRecorder::new(sink, config.audit_timeout));
        let dispatcher = self.transaction_client.map(|client| {
            SagaDispatcher::new(
                client,
                Arc::clone(&self.directory),
                Arc::clone(&shutdown),
                config.saga_timeout,
            )
        });

        LogwareLayer {
            pipeline: Arc::new(Pipeline {
                exempt: ExemptCalls::from_config(&config),
                config,
                endpoints: self.endpoints,
                resolver,
                normalizer,
                recorder,
                dispatcher,
                shutdown,
            }),
        }
    }
}
