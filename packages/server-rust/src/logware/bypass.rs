//! Decides which calls skip context generation, audit and saga dispatch.
//!
//! Two separate questions are answered here:
//!
//! - [`can_bypass_context_generation`]: does the matched endpoint need a
//!   validated call context?
//! - [`ExemptCalls::is_exempt`]: is the call infrastructure traffic (health
//!   probes, documentation, CORS preflight) that is passed straight through
//!   with no audit record and no dispatch at all?

use axum::http::Method;

use super::config::LogwareConfig;
use super::endpoint::{EndpointMarker, EndpointMetadata};

/// Returns `true` when context generation may be skipped for the endpoint.
///
/// Rules, first match wins:
/// 1. no endpoint matched → bypass
/// 2. endpoint carries `NoContextRequired` → bypass
/// 3. endpoint does not carry `ContextRequired` → bypass
/// 4. otherwise the context is required
#[must_use]
pub fn can_bypass_context_generation(endpoint: Option<&EndpointMetadata>) -> bool {
    let Some(endpoint) = endpoint else {
        return true;
    };

    if endpoint.has(EndpointMarker::NoContextRequired) {
        return true;
    }

    !endpoint.has(EndpointMarker::ContextRequired)
}

/// Matcher for calls that are exempt from audit logging and saga dispatch.
#[derive(Debug, Clone)]
pub struct ExemptCalls {
    health_paths: Vec<String>,
    prefixes: Vec<String>,
}

impl ExemptCalls {
    #[must_use]
    pub fn from_config(config: &LogwareConfig) -> Self {
        Self {
            health_paths: config
                .health_paths
                .iter()
                .map(|p| p.to_ascii_uppercase())
                .collect(),
            prefixes: config.exempt_prefixes.clone(),
        }
    }

    /// Whether the call bypasses the pipeline entirely.
    #[must_use]
    pub fn is_exempt(&self, method: &Method, path: &str) -> bool {
        *method == Method::OPTIONS || self.is_health_check(path) || self.has_exempt_prefix(path)
    }

    /// Case-insensitive match of `path` against the health-check variants.
    #[must_use]
    pub fn is_health_check(&self, path: &str) -> bool {
        let upper = path.to_ascii_uppercase();
        self.health_paths.iter().any(|p| upper.contains(p.as_str()))
    }

    fn has_exempt_prefix(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| starts_with_segments(path, prefix))
    }
}

/// Segment-aware prefix match: `/health` matches `/health` and `/health/x`
/// but not `/healthy`.
fn starts_with_segments(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return false;
    }
    match path.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => {
            matches!(path.as_bytes().get(prefix.len()), None | Some(b'/'))
        }
        _ => false,
    }
}
