use crate::types::User;

/// Read-only lookup into the user directory.
///
/// Lookups never fail: an unreachable directory or an unknown code both
/// yield `None`, and the caller carries on without a resolved user.
pub trait UserDirectory: Send + Sync {
    /// Finds the user registered under `user_code`.
    fn find_user(&self, user_code: &str) -> Option<User>;
}

/// Directory that knows nobody. Used when no directory is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyDirectory;

impl UserDirectory for EmptyDirectory {
    fn find_user(&self, _user_code: &str) -> Option<User> {
        None
    }
}
