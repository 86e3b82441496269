//! Configuration for the call interception pipeline.

use std::time::Duration;

use axum::http::StatusCode;
use logware_core::TokenPolicy;

/// Settings shared by every stage of the logware pipeline.
#[derive(Debug, Clone)]
pub struct LogwareConfig {
    /// Name written to every audit record.
    pub application_name: String,
    /// Fixed status code of every business failure response.
    pub business_failure_status: StatusCode,
    /// Domain tag passed to the localization service.
    pub localization_domain: String,
    /// Upper bound for buffering a single request or response body.
    pub max_body_bytes: usize,
    /// Deadline for the downstream handler of a single call.
    pub call_timeout: Duration,
    /// Maximum time a single audit sink write may take.
    pub audit_timeout: Duration,
    /// Maximum time a single transaction client send may take.
    pub saga_timeout: Duration,
    /// Health-check path variants, matched case-insensitively anywhere in the path.
    pub health_paths: Vec<String>,
    /// Path prefixes (whole segments) exempt from audit and dispatch.
    pub exempt_prefixes: Vec<String>,
    /// `Referer` substring that lets a call through without a security header.
    pub documentation_referer_marker: String,
    /// Environment-aware token validation rules.
    pub token: TokenPolicy,
}

impl Default for LogwareConfig {
    fn default() -> Self {
        Self {
            application_name: "logware".to_string(),
            business_failure_status: StatusCode::INTERNAL_SERVER_ERROR,
            localization_domain: "CCP".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
            call_timeout: Duration::from_secs(30),
            audit_timeout: Duration::from_secs(5),
            saga_timeout: Duration::from_secs(30),
            health_paths: vec![
                "/HEALTH/LIVE".to_string(),
                "/HEALTH/LIVE/".to_string(),
                "/HEALTH/READY".to_string(),
                "/HEALTH/READY/".to_string(),
            ],
            exempt_prefixes: vec!["/swagger".to_string(), "/health".to_string()],
            documentation_referer_marker: "/swagger".to_string(),
            token: TokenPolicy::default(),
        }
    }
}
