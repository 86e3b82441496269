use serde::{Deserialize, Serialize};

/// Branch code reported when the executing agent is not in the user directory.
pub const UNKNOWN_BRANCH: i32 = -1;

/// A call center user as known to the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    /// Login code of the user. Matches `CallContext::user_code`.
    pub user_code: String,
    /// Personnel register identifier, when the directory knows one.
    #[serde(default)]
    pub register_id: Option<String>,
    /// Branch the user is attached to.
    pub branch_code: i32,
}

impl User {
    /// Creates a user with no register id.
    #[must_use]
    pub fn new(user_code: impl Into<String>, branch_code: i32) -> Self {
        Self {
            user_code: user_code.into(),
            register_id: None,
            branch_code,
        }
    }

    /// Sets the register id.
    #[must_use]
    pub fn with_register_id(mut self, register_id: impl Into<String>) -> Self {
        self.register_id = Some(register_id.into());
        self
    }
}
