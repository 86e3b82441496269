use serde::{Deserialize, Serialize};

use crate::claims::DecryptedClaims;
use crate::types::UNKNOWN_BRANCH;

/// Entry relayed to the transactional logging subsystem after a call.
///
/// Built only from validated claims; a call without claims never produces one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionLogRequest {
    /// Captured request body of the call.
    pub message: Option<String>,
    pub channel: String,
    pub call_id: String,
    /// The executing customer.
    pub customer_number: Option<String>,
    pub related_customer_number: Option<String>,
    /// Action name of the endpoint that served the call.
    pub method_name: Option<String>,
    pub agent_user_code: String,
    pub teller_name: String,
    pub agent_domain: String,
    pub updating_user_code: String,
    pub branch_code: i32,
}

impl TransactionLogRequest {
    /// Builds the request from validated claims.
    ///
    /// Returns `None` when the claims carry no agent user code. The branch
    /// code starts out as [`UNKNOWN_BRANCH`].
    #[must_use]
    pub fn from_claims(
        claims: &DecryptedClaims,
        message: Option<String>,
        method_name: Option<String>,
    ) -> Option<Self> {
        let agent = claims.agent_user_code()?.to_string();
        let call = &claims.decrypted_call;

        Some(Self {
            message,
            channel: call.channel.clone(),
            call_id: call.call_id.clone(),
            customer_number: claims.executing_customer_number.clone(),
            related_customer_number: call.related_customer_no.clone(),
            method_name,
            teller_name: agent.clone(),
            agent_domain: agent.clone(),
            updating_user_code: agent.clone(),
            agent_user_code: agent,
            branch_code: UNKNOWN_BRANCH,
        })
    }

    #[must_use]
    pub fn with_branch_code(mut self, branch_code: i32) -> Self {
        self.branch_code = branch_code;
        self
    }
}
