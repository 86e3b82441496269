//! Decrypted session token claims and their validation rules.
//!
//! The session token inside the `Ccpcontext` header is opaque to the
//! pipeline. Once the crypto service has turned it into plaintext, the
//! plaintext is a JSON document shaped like [`DecryptedClaims`]. Claims are
//! only trusted after [`DecryptedClaims::validate`] has passed.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Details of the telephony call the token was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DecryptedCall {
    /// Channel the call came in on (e.g. `IVR`).
    pub channel: String,
    /// Identifier of the call in the telephony system.
    pub call_id: String,
    /// Customer the call is about, if identified.
    #[serde(default)]
    pub related_customer_no: Option<String>,
}

/// The agent operating on behalf of the customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Agent {
    #[serde(default)]
    pub user_code: Option<String>,
}

/// Claims carried by a session token after decryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DecryptedClaims {
    pub decrypted_call: DecryptedCall,
    /// Customer the agent is executing transactions for.
    #[serde(default)]
    pub executing_customer_number: Option<String>,
    #[serde(default)]
    pub agent: Option<Agent>,
    /// Instant after which the token is no longer accepted.
    pub expire_date: DateTime<Utc>,
    /// Deployment environment the token was issued for.
    pub environment: String,
}

impl DecryptedClaims {
    /// Parses the plaintext produced by the crypto service.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the plaintext is not a claims document.
    pub fn from_plaintext(plaintext: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(plaintext)
    }

    /// Returns the agent's user code when it is present and non-empty.
    #[must_use]
    pub fn agent_user_code(&self) -> Option<&str> {
        self.agent
            .as_ref()
            .and_then(|agent| agent.user_code.as_deref())
            .filter(|code| !code.is_empty())
    }

    /// Checks the claims against the environment this process runs in.
    ///
    /// The environment always has to match. Expiry is enforced unless the
    /// running environment is listed in `expiry_exempt_environments`.
    ///
    /// # Errors
    ///
    /// Returns `TokenValidationError::EnvironmentMismatch` or
    /// `TokenValidationError::Expired`.
    pub fn validate(
        &self,
        policy: &TokenPolicy,
        now: DateTime<Utc>,
    ) -> Result<(), TokenValidationError> {
        if !self.environment.eq_ignore_ascii_case(&policy.environment) {
            return Err(TokenValidationError::EnvironmentMismatch {
                expected: policy.environment.clone(),
                actual: self.environment.clone(),
            });
        }

        if policy.enforces_expiry() {
            let skew = chrono::Duration::from_std(policy.clock_skew)
                .unwrap_or_else(|_| chrono::Duration::zero());
            if self.expire_date + skew < now {
                return Err(TokenValidationError::Expired {
                    expired_at: self.expire_date,
                });
            }
        }

        Ok(())
    }
}

/// Environment-aware rules applied to every decrypted token.
#[derive(Debug, Clone)]
pub struct TokenPolicy {
    /// Environment this process runs in (e.g. `PROD`).
    pub environment: String,
    /// Environments in which expired tokens are still accepted.
    pub expiry_exempt_environments: Vec<String>,
    /// Tolerance added to `ExpireDate` before a token counts as expired.
    pub clock_skew: Duration,
}

impl TokenPolicy {
    /// Creates a policy for `environment` with the default exemptions and skew.
    #[must_use]
    pub fn for_environment(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            ..Self::default()
        }
    }

    /// Whether token expiry is checked in the running environment.
    #[must_use]
    pub fn enforces_expiry(&self) -> bool {
        !self
            .expiry_exempt_environments
            .iter()
            .any(|env| env.eq_ignore_ascii_case(&self.environment))
    }
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            environment: "LOCAL".to_string(),
            expiry_exempt_environments: vec!["LOCAL".to_string(), "DEV".to_string()],
            clock_skew: Duration::from_secs(30),
        }
    }
}

/// Reasons a decrypted token is rejected.
///
/// The `Display` form is the message key handed to localization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenValidationError {
    #[error("TokenExpired")]
    Expired { expired_at: DateTime<Utc> },
    #[error("TokenEnvironmentMismatch")]
    EnvironmentMismatch { expected: String, actual: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(environment: &str, expire_date: DateTime<Utc>) -> DecryptedClaims {
        DecryptedClaims {
            decrypted_call: DecryptedCall {
                channel: "IVR".to_string(),
                call_id: "C1".to_string(),
                related_customer_no: Some("1001".to_string()),
            },
            executing_customer_number: Some("2002".to_string()),
            agent: Some(Agent {
                user_code: Some("A1".to_string()),
            }),
            expire_date,
            environment: environment.to_string(),
        }
    }

    fn prod_policy() -> TokenPolicy {
        TokenPolicy::for_environment("PROD")
    }

    #[test]
    fn parses_pascal_case_plaintext() {
        let plaintext = r#"{
            "DecryptedCall": { "Channel": "IVR", "CallId": "C1" },
            "Agent": { "UserCode": "A1" },
            "ExpireDate": "2030-01-01T00:00:00Z",
            "Environment": "PROD"
        }"#;

        let parsed = DecryptedClaims::from_plaintext(plaintext).unwrap();
        assert_eq!(parsed.decrypted_call.channel, "IVR");
        assert_eq!(parsed.decrypted_call.call_id, "C1");
        assert!(parsed.decrypted_call.related_customer_no.is_none());
        assert!(parsed.executing_customer_number.is_none());
        assert_eq!(parsed.agent_user_code(), Some("A1"));
    }

    #[test]
    fn plaintext_without_call_is_rejected() {
        let plaintext = r#"{ "ExpireDate": "2030-01-01T00:00:00Z", "Environment": "PROD" }"#;
        assert!(DecryptedClaims::from_plaintext(plaintext).is_err());
    }

    #[test]
    fn empty_agent_code_reads_as_missing() {
        let mut c = claims("PROD", Utc::now());
        c.agent = Some(Agent {
            user_code: Some(String::new()),
        });
        assert_eq!(c.agent_user_code(), None);

        c.agent = None;
        assert_eq!(c.agent_user_code(), None);
    }

    #[test]
    fn valid_token_passes() {
        let now = Utc::now();
        let c = claims("prod", now + chrono::Duration::hours(1));
        assert_eq!(c.validate(&prod_policy(), now), Ok(()));
    }

    #[test]
    fn environment_mismatch_is_rejected() {
        let now = Utc::now();
        let c = claims("TEST", now + chrono::Duration::hours(1));
        let err = c.validate(&prod_policy(), now).unwrap_err();
        assert!(matches!(err, TokenValidationError::EnvironmentMismatch { .. }));
        assert_eq!(err.to_string(), "TokenEnvironmentMismatch");
    }

    #[test]
    fn expired_token_is_rejected_in_enforcing_environment() {
        let now = Utc::now();
        let c = claims("PROD", now - chrono::Duration::minutes(5));
        let err = c.validate(&prod_policy(), now).unwrap_err();
        assert!(matches!(err, TokenValidationError::Expired { .. }));
        assert_eq!(err.to_string(), "TokenExpired");
    }

    #[test]
    fn expiry_within_clock_skew_is_accepted() {
        let now = Utc::now();
        let c = claims("PROD", now - chrono::Duration::seconds(10));
        assert!(c.validate(&prod_policy(), now).is_ok());
    }

    #[test]
    fn expired_token_is_accepted_in_exempt_environment() {
        let now = Utc::now();
        let c = claims("DEV", now - chrono::Duration::days(3));
        let policy = TokenPolicy::for_environment("dev");
        assert!(!policy.enforces_expiry());
        assert!(c.validate(&policy, now).is_ok());
    }

    #[test]
    fn exempt_environment_still_checks_environment() {
        let now = Utc::now();
        let c = claims("PROD", now);
        let err = c.validate(&TokenPolicy::for_environment("DEV"), now).unwrap_err();
        assert!(matches!(err, TokenValidationError::EnvironmentMismatch { .. }));
    }
}
