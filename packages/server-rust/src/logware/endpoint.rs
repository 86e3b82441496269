//! Per-route metadata consulted by the bypass policy and the saga dispatcher.
//!
//! Routes are identified by method and the route pattern axum matched
//! (`MatchedPath`), e.g. `POST /orders/{id}`.

use std::collections::HashMap;

use axum::http::Method;

/// Markers attached to an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointMarker {
    /// The endpoint needs a validated call context.
    ContextRequired,
    /// Explicit opt-out. Wins over `ContextRequired`.
    NoContextRequired,
}

/// Metadata of one matched endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointMetadata {
    action_name: Option<String>,
    markers: Vec<EndpointMarker>,
}

impl EndpointMetadata {
    /// Metadata for the handler action named `action_name`, without markers.
    #[must_use]
    pub fn action(action_name: impl Into<String>) -> Self {
        Self {
            action_name: Some(action_name.into()),
            markers: Vec::new(),
        }
    }

    /// Metadata for a matched route nobody registered.
    #[must_use]
    pub fn unmarked() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_marker(mut self, marker: EndpointMarker) -> Self {
        if !self.markers.contains(&marker) {
            self.markers.push(marker);
        }
        self
    }

    #[must_use]
    pub fn context_required(self) -> Self {
        self.with_marker(EndpointMarker::ContextRequired)
    }

    #[must_use]
    pub fn no_context_required(self) -> Self {
        self.with_marker(EndpointMarker::NoContextRequired)
    }

    #[must_use]
    pub fn has(&self, marker: EndpointMarker) -> bool {
        self.markers.contains(&marker)
    }

    /// Name used as `TransactionLogRequest::method_name`.
    #[must_use]
    pub fn action_name(&self) -> Option<&str> {
        self.action_name.as_deref()
    }
}

/// Source of endpoint metadata for incoming calls.
pub trait EndpointProvider: Send + Sync {
    /// Returns the metadata of the endpoint serving `method` on the matched
    /// `route`. `route` is `None` when routing matched nothing, and so is the
    /// result.
    fn endpoint(&self, method: &Method, route: Option<&str>) -> Option<EndpointMetadata>;
}

/// Static table of endpoint metadata, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    routes: HashMap<(Method, String), EndpointMetadata>,
}

impl EndpointRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers metadata for `method` on the route pattern `route`.
    #[must_use]
    pub fn register(mut self, method: Method, route: impl Into<String>, metadata: EndpointMetadata) -> Self {
        self.routes.insert((method, route.into()), metadata);
        self
    }

    /// Number of registered endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl EndpointProvider for EndpointRegistry {
    fn endpoint(&self, method: &Method, route: Option<&str>) -> Option<EndpointMetadata> {
        let route = route?;
        let metadata = self
            .routes
            .get(&(method.clone(), route.to_string()))
            .cloned()
            .unwrap_or_else(EndpointMetadata::unmarked);
        Some(metadata)
    }
}
