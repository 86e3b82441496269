//! Builds and validates the caller's security context from request headers.

use std::sync::Arc;

use axum::http::{header, HeaderMap, Method};
use chrono::Utc;
use logware_core::{CallContext, DecryptedClaims, RawCallContext, TokenPolicy, UserDirectory};
use tracing::error;

use super::error::CallError;
use crate::traits::CryptoService;

/// Name of the header carrying the JSON security context.
pub const CONTEXT_HEADER: &str = "ccpcontext";

/// Resolves the `Ccpcontext` header into a validated [`CallContext`].
pub struct ContextResolver {
    crypto: Arc<dyn CryptoService>,
    directory: Arc<dyn UserDirectory>,
    policy: TokenPolicy,
    documentation_referer_marker: String,
}

impl ContextResolver {
    #[must_use]
    pub fn new(
        crypto: Arc<dyn CryptoService>,
        directory: Arc<dyn UserDirectory>,
        policy: TokenPolicy,
        documentation_referer_marker: impl Into<String>,
    ) -> Self {
        Self {
            crypto,
            directory,
            policy,
            documentation_referer_marker: documentation_referer_marker.into(),
        }
    }

    /// Resolves the context of a call that requires one.
    ///
    /// Returns `Ok(None)` when the call legitimately carries no context:
    /// CORS preflight, or a header-less call referred from the documentation
    /// explorer.
    ///
    /// Every failure is classified and propagated; nothing is swallowed here.
    ///
    /// # Errors
    ///
    /// - `CallError::ContextMissing`: header absent, not from the documentation explorer
    /// - `CallError::ContextMalformed`: header not a context payload
    /// - `CallError::TokenDecryption`: token rejected or plaintext not a claims document
    /// - `CallError::TokenValidation`: token expired or issued for another environment
    pub fn resolve(
        &self,
        method: &Method,
        headers: &HeaderMap,
    ) -> Result<Option<CallContext>, CallError> {
        if *method == Method::OPTIONS {
            return Ok(None);
        }

        let Some(value) = headers.get(CONTEXT_HEADER) else {
            if self.referred_from_documentation(headers) {
                return Ok(None);
            }
            return Err(CallError::ContextMissing);
        };

        let result = value
            .to_str()
            .map_err(|e| CallError::ContextMalformed {
                reason: e.to_string(),
            })
            .and_then(|json| {
                RawCallContext::from_header(json).map_err(|e| CallError::ContextMalformed {
                    reason: e.to_string(),
                })
            })
            .and_then(|raw| self.flatten(raw));

        if let Err(err) = &result {
            error!(
                severity = "critical",
                error = %err.describe(),
                "context preparation failed"
            );
        }

        result.map(Some)
    }

    /// Decrypts and validates the session token, then freezes the context.
    fn flatten(&self, raw: RawCallContext) -> Result<CallContext, CallError> {
        let plaintext =
            self.crypto
                .decrypt(&raw.session_token)
                .map_err(|e| CallError::TokenDecryption {
                    reason: e.reason,
                })?;

        let claims = DecryptedClaims::from_plaintext(&plaintext).map_err(|e| {
            CallError::TokenDecryption {
                reason: format!("claims payload: {e}"),
            }
        })?;

        claims.validate(&self.policy, Utc::now())?;

        Ok(raw.resolve(Some(claims), self.directory.as_ref()))
    }

    fn referred_from_documentation(&self, headers: &HeaderMap) -> bool {
        headers
            .get_all(header::REFERER)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|referer| referer.contains(&self.documentation_referer_marker))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use logware_core::{EmptyDirectory, TokenValidationError};

    use super::*;
    use crate::adapters::crypto::PlaintextCrypto;
    use crate::adapters::memory::InMemoryUserDirectory;
    use logware_core::User;

    fn resolver() -> ContextResolver {
        let directory = InMemoryUserDirectory::new();
        directory.insert(User::new("A1", 42).with_register_id("R-A1"));
        ContextResolver::new(
            Arc::new(PlaintextCrypto),
            Arc::new(directory),
            TokenPolicy::for_environment("PROD"),
            "/swagger",
        )
    }

    fn claims_json(environment: &str, expires_in_minutes: i64) -> String {
        let expire = Utc::now() + chrono::Duration::minutes(expires_in_minutes);
        serde_json::json!({
            "DecryptedCall": { "Channel": "IVR", "CallId": "C1" },
            "Agent": { "UserCode": "A1" },
            "ExpireDate": expire,
            "Environment": environment,
        })
        .to_string()
    }

    fn headers_with_token(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let context = serde_json::json!({ "SessionToken": token }).to_string();
        headers.insert(CONTEXT_HEADER, HeaderValue::from_str(&context).unwrap());
        headers
    }

    #[test]
    fn options_needs_no_context() {
        let result = resolver().resolve(&Method::OPTIONS, &HeaderMap::new());
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn missing_header_is_rejected() {
        let err = resolver()
            .resolve(&Method::POST, &HeaderMap::new())
            .unwrap_err();
        assert!(matches!(err, CallError::ContextMissing));
    }

    #[test]
    fn missing_header_from_documentation_passes() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::REFERER,
            HeaderValue::from_static("https://api.local/swagger/index.html"),
        );
        let result = resolver().resolve(&Method::POST, &headers);
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn other_referer_does_not_pass() {
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, HeaderValue::from_static("https://shop.local/cart"));
        let err = resolver().resolve(&Method::POST, &headers).unwrap_err();
        assert!(matches!(err, CallError::ContextMissing));
    }

    #[test]
    fn malformed_header_is_propagated() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTEXT_HEADER, HeaderValue::from_static("{not json"));
        let err = resolver().resolve(&Method::POST, &headers).unwrap_err();
        assert!(matches!(err, CallError::ContextMalformed { .. }));
    }

    #[test]
    fn undecryptable_token_is_propagated() {
        let err = resolver()
            .resolve(&Method::POST, &headers_with_token("%%% not base64 %%%"))
            .unwrap_err();
        assert!(matches!(err, CallError::TokenDecryption { .. }));
    }

    #[test]
    fn plaintext_that_is_not_claims_is_a_decryption_failure() {
        let token = PlaintextCrypto::seal("{\"hello\":1}");
        let err = resolver()
            .resolve(&Method::POST, &headers_with_token(&token))
            .unwrap_err();
        assert!(matches!(err, CallError::TokenDecryption { .. }));
    }

    #[test]
    fn expired_token_fails_validation() {
        let token = PlaintextCrypto::seal(&claims_json("PROD", -10));
        let err = resolver()
            .resolve(&Method::POST, &headers_with_token(&token))
            .unwrap_err();
        assert!(matches!(
            err,
            CallError::TokenValidation(TokenValidationError::Expired { .. })
        ));
    }

    #[test]
    fn foreign_environment_fails_validation() {
        let token = PlaintextCrypto::seal(&claims_json("TEST", 10));
        let err = resolver()
            .resolve(&Method::POST, &headers_with_token(&token))
            .unwrap_err();
        assert!(matches!(
            err,
            CallError::TokenValidation(TokenValidationError::EnvironmentMismatch { .. })
        ));
    }

    #[test]
    fn valid_token_populates_auth_token() {
        let token = PlaintextCrypto::seal(&claims_json("PROD", 10));
        let context = resolver()
            .resolve(&Method::POST, &headers_with_token(&token))
            .unwrap()
            .unwrap();

        let claims = context.auth_token().unwrap();
        assert_eq!(claims.decrypted_call.channel, "IVR");
        assert_eq!(claims.decrypted_call.call_id, "C1");
        assert_eq!(context.user_code(), Some("A1"));
        assert_eq!(context.register_id(), Some("R-A1"));
        assert_eq!(context.session_token(), token);
    }

    #[test]
    fn works_without_a_directory() {
        let resolver = ContextResolver::new(
            Arc::new(PlaintextCrypto),
            Arc::new(EmptyDirectory),
            TokenPolicy::for_environment("PROD"),
            "/swagger",
        );
        let token = PlaintextCrypto::seal(&claims_json("PROD", 10));
        let context = resolver
            .resolve(&Method::POST, &headers_with_token(&token))
            .unwrap()
            .unwrap();
        assert!(context.user().is_none());
        assert_eq!(context.user_code(), Some("A1"));
    }
}
