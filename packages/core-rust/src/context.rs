//! Per-call security context.
//!
//! Building a [`CallContext`] is a two-step affair. The `Ccpcontext` header
//! is deserialized into a [`RawCallContext`] holding exactly what the caller
//! sent. [`RawCallContext::resolve`] then computes every derived field once
//! (request id, user code, directory user, register id) and returns an
//! immutable `CallContext`. Nothing on the context is computed lazily on read.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::claims::DecryptedClaims;
use crate::traits::UserDirectory;
use crate::types::User;

/// The security context exactly as carried by the `Ccpcontext` header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawCallContext {
    /// Opaque encrypted session token.
    pub session_token: String,
    #[serde(default)]
    pub user_code: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl RawCallContext {
    /// Deserializes a `Ccpcontext` header value.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the value is not a JSON object
    /// with at least a `SessionToken`.
    pub fn from_header(value: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(value)
    }

    /// Computes the derived fields and freezes the context.
    ///
    /// - `request_id`: the inbound `RequestId` when non-empty, otherwise a
    ///   freshly generated UUID v4.
    /// - `user_code`: the explicit `UserCode` when non-empty, otherwise the
    ///   agent code from the validated claims.
    /// - `user` and `register_id`: looked up once from `directory` by the
    ///   resolved user code.
    #[must_use]
    pub fn resolve(
        self,
        auth_token: Option<DecryptedClaims>,
        directory: &dyn UserDirectory,
    ) -> CallContext {
        let request_id = non_empty(self.request_id).unwrap_or_else(new_request_id);

        let explicit_code = non_empty(self.user_code);
        let claimed_code = auth_token
            .as_ref()
            .and_then(DecryptedClaims::agent_user_code)
            .map(str::to_string);
        let user_code = explicit_code.or(claimed_code);

        let user = user_code
            .as_deref()
            .and_then(|code| directory.find_user(code));
        let register_id = user.as_ref().and_then(|u| u.register_id.clone());

        CallContext {
            request_id,
            session_token: self.session_token,
            user_code,
            user,
            auth_token,
            register_id,
        }
    }
}

/// Resolved, immutable identity of a single inbound call.
///
/// Exclusively owned by the call that created it. The pipeline hands it to
/// handlers as an `Arc<CallContext>` inside the request extensions; no
/// context is ever reachable from another call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    request_id: String,
    session_token: String,
    user_code: Option<String>,
    user: Option<User>,
    auth_token: Option<DecryptedClaims>,
    register_id: Option<String>,
}

impl CallContext {
    /// Context for a call whose context generation was bypassed.
    ///
    /// Carries only a fresh request id.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            request_id: new_request_id(),
            session_token: String::new(),
            user_code: None,
            user: None,
            auth_token: None,
            register_id: None,
        }
    }

    /// Stable identifier of this call.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The session token as received, still encrypted.
    #[must_use]
    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    #[must_use]
    pub fn user_code(&self) -> Option<&str> {
        self.user_code.as_deref()
    }

    /// Directory entry for `user_code`, if the directory knew it.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Validated token claims. `None` for unauthenticated calls.
    #[must_use]
    pub fn auth_token(&self) -> Option<&DecryptedClaims> {
        self.auth_token.as_ref()
    }

    #[must_use]
    pub fn register_id(&self) -> Option<&str> {
        self.register_id.as_deref()
    }

    /// Whether the call carries validated claims.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth_token.is_some()
    }
}

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use chrono::Utc;

    use super::*;
    use crate::claims::{Agent, DecryptedCall};
    use crate::traits::EmptyDirectory;

    struct MapDirectory(HashMap<String, User>);

    impl UserDirectory for MapDirectory {
        fn find_user(&self, user_code: &str) -> Option<User> {
            self.0.get(user_code).cloned()
        }
    }

    fn directory() -> MapDirectory {
        let mut users = HashMap::new();
        users.insert(
            "U1".to_string(),
            User::new("U1", 10).with_register_id("R-1"),
        );
        users.insert("A1".to_string(), User::new("A1", 20));
        MapDirectory(users)
    }

    fn claims_with_agent(agent: &str) -> DecryptedClaims {
        DecryptedClaims {
            decrypted_call: DecryptedCall {
                channel: "IVR".to_string(),
                call_id: "C1".to_string(),
                related_customer_no: None,
            },
            executing_customer_number: None,
            agent: Some(Agent {
                user_code: Some(agent.to_string()),
            }),
            expire_date: Utc::now(),
            environment: "LOCAL".to_string(),
        }
    }

    #[test]
    fn header_requires_session_token() {
        assert!(RawCallContext::from_header(r#"{"UserCode":"U1"}"#).is_err());
        assert!(RawCallContext::from_header("not json").is_err());

        let raw = RawCallContext::from_header(r#"{"SessionToken":"abc"}"#).unwrap();
        assert_eq!(raw.session_token, "abc");
        assert!(raw.user_code.is_none());
        assert!(raw.request_id.is_none());
    }

    #[test]
    fn request_id_is_stable_across_reads() {
        let ctx = RawCallContext::default().resolve(None, &EmptyDirectory);
        let first = ctx.request_id().to_string();
        assert_eq!(ctx.request_id(), first);
        assert_eq!(ctx.clone().request_id(), first);
    }

    #[test]
    fn request_ids_do_not_collide() {
        let ids: HashSet<String> = (0..10_000)
            .map(|_| CallContext::anonymous().request_id().to_string())
            .collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn inbound_request_id_is_kept() {
        let raw = RawCallContext {
            session_token: "t".to_string(),
            user_code: None,
            request_id: Some("req-42".to_string()),
        };
        assert_eq!(raw.resolve(None, &EmptyDirectory).request_id(), "req-42");
    }

    #[test]
    fn empty_inbound_request_id_is_replaced() {
        let raw = RawCallContext {
            request_id: Some(String::new()),
            ..RawCallContext::default()
        };
        assert!(!raw.resolve(None, &EmptyDirectory).request_id().is_empty());
    }

    #[test]
    fn explicit_user_code_resolves_user_and_register_id() {
        let raw = RawCallContext {
            session_token: "t".to_string(),
            user_code: Some("U1".to_string()),
            request_id: None,
        };
        let ctx = raw.resolve(Some(claims_with_agent("A1")), &directory());

        assert_eq!(ctx.user_code(), Some("U1"));
        assert_eq!(ctx.user().map(|u| u.branch_code), Some(10));
        assert_eq!(ctx.register_id(), Some("R-1"));
        assert!(ctx.is_authenticated());
    }

    #[test]
    fn missing_user_code_falls_back_to_agent() {
        let raw = RawCallContext {
            session_token: "t".to_string(),
            user_code: Some(String::new()),
            request_id: None,
        };
        let ctx = raw.resolve(Some(claims_with_agent("A1")), &directory());

        assert_eq!(ctx.user_code(), Some("A1"));
        assert_eq!(ctx.user().map(|u| u.branch_code), Some(20));
        assert_eq!(ctx.register_id(), None);
    }

    #[test]
    fn unknown_user_keeps_code_without_user() {
        let raw = RawCallContext {
            session_token: "t".to_string(),
            user_code: Some("nobody".to_string()),
            request_id: None,
        };
        let ctx = raw.resolve(None, &directory());

        assert_eq!(ctx.user_code(), Some("nobody"));
        assert!(ctx.user().is_none());
        assert!(!ctx.is_authenticated());
    }

    #[test]
    fn anonymous_context_is_unauthenticated() {
        let ctx = CallContext::anonymous();
        assert!(ctx.auth_token().is_none());
        assert!(ctx.user_code().is_none());
        assert_eq!(ctx.session_token(), "");
    }
}
