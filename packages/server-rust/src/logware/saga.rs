//! Post-response relay of a call's audit data to the transactional logging
//! subsystem.
//!
//! Dispatch is fire-and-forget as far as the caller is concerned: the send
//! runs on a detached task that holds a dispatch guard of the server's
//! [`ShutdownController`], so graceful shutdown waits for it even though the
//! call that triggered it has long returned.

use std::sync::Arc;
use std::time::Duration;

use logware_core::{CallContext, TransactionLogRequest, UserDirectory, UNKNOWN_BRANCH};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, Instrument};

use super::error::CallError;
use crate::network::ShutdownController;
use crate::traits::TransactionClient;

/// What the pipeline knows about a finished call when deciding on dispatch.
#[derive(Debug)]
pub struct DispatchInput<'a> {
    /// Context generation was skipped for the call.
    pub bypassed: bool,
    /// The inbound call carried an `Authorization` header.
    pub has_authorization: bool,
    pub context: &'a CallContext,
    /// Request body captured by the body buffer.
    pub request_body: Option<String>,
    /// Action name of the endpoint that served the call.
    pub action_name: Option<String>,
}

/// Why no transaction log was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ContextBypassed,
    Unauthenticated,
    NoAuthorizationHeader,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DispatchPlan {
    Skip(SkipReason),
    Send(TransactionLogRequest),
}

/// Decides whether the call is relayed and builds the request if so.
///
/// # Errors
///
/// Returns `CallError::AgentCodeMissing` when the call is eligible but the
/// claims carry no agent user code.
pub fn plan_dispatch(input: DispatchInput<'_>) -> Result<DispatchPlan, CallError> {
    if input.bypassed {
        return Ok(DispatchPlan::Skip(SkipReason::ContextBypassed));
    }
    let Some(claims) = input.context.auth_token() else {
        return Ok(DispatchPlan::Skip(SkipReason::Unauthenticated));
    };
    if !input.has_authorization {
        return Ok(DispatchPlan::Skip(SkipReason::NoAuthorizationHeader));
    }

    TransactionLogRequest::from_claims(claims, input.request_body, input.action_name)
        .map(DispatchPlan::Send)
        .ok_or(CallError::AgentCodeMissing)
}

/// Relays eligible calls to the [`TransactionClient`] on detached tasks.
pub struct SagaDispatcher {
    client: Arc<dyn TransactionClient>,
    directory: Arc<dyn UserDirectory>,
    shutdown: Arc<ShutdownController>,
    timeout: Duration,
}

impl SagaDispatcher {
    #[must_use]
    pub fn new(
        client: Arc<dyn TransactionClient>,
        directory: Arc<dyn UserDirectory>,
        shutdown: Arc<ShutdownController>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            directory,
            shutdown,
            timeout,
        }
    }

    /// Starts the dispatch for a finished call.
    ///
    /// Returns the handle of the spawned send, or `None` when nothing was
    /// sent. Every failure is logged and swallowed.
    pub fn dispatch(&self, input: DispatchInput<'_>) -> Option<JoinHandle<()>> {
        let request_id = input.context.request_id().to_string();

        let request = match plan_dispatch(input) {
            Ok(DispatchPlan::Send(request)) => request,
            Ok(DispatchPlan::Skip(reason)) => {
                debug!(request_id = %request_id, ?reason, "saga dispatch skipped");
                return None;
            }
            Err(err) => {
                swallow(&err, &request_id);
                return None;
            }
        };

        let guard = self.shutdown.dispatch_guard();
        let client = Arc::clone(&self.client);
        let directory = Arc::clone(&self.directory);
        let timeout = self.timeout;

        let span = info_span!(
            "saga_dispatch",
            request_id = %request_id,
            call_id = %request.call_id,
            agent = %request.agent_user_code,
        );

        let handle = tokio::spawn(
            async move {
                let _guard = guard;

                let branch_code = directory
                    .find_user(&request.agent_user_code)
                    .map_or(UNKNOWN_BRANCH, |user| user.branch_code);
                let request = request.with_branch_code(branch_code);

                let result = match tokio::time::timeout(timeout, client.send(&request)).await {
                    Ok(sent) => sent.map_err(|e| CallError::SagaDispatch {
                        reason: format!("{e:#}"),
                    }),
                    Err(_elapsed) => Err(CallError::SagaDispatch {
                        reason: format!("no answer within {timeout:?}"),
                    }),
                };

                match result {
                    Ok(()) => info!("transaction log sent"),
                    Err(err) => swallow(&err, &request_id),
                }
            }
            .instrument(span),
        );

        Some(handle)
    }
}

/// Logs a dispatch-time failure critically and drops it. Caller-visible
/// kinds never get here.
fn swallow(err: &CallError, request_id: &str) {
    debug_assert!(err.is_swallowable(), "{err:?} must reach the caller");
    error!(
        severity = "critical",
        request_id = %request_id,
        swallowable = err.is_swallowable(),
        error = %err.describe(),
        "transaction saga send error"
    );
}
