use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::WorkflowError;

/// Lookup into the user directory, used to validate `assign_to` references
/// before they are written.
///
/// The engine trusts the directory as given; there is no caching or retry.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Whether a user with this id exists.
    async fn exists(&self, user_id: Uuid) -> Result<bool, WorkflowError>;
}

/// A fixed-membership [`UserDirectory`] for tests and embedded setups.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    users: HashSet<Uuid>,
}

impl StaticDirectory {
    /// Create an empty directory (every lookup misses).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory containing the given users.
    pub fn with_users(users: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            users: users.into_iter().collect(),
        }
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn exists(&self, user_id: Uuid) -> Result<bool, WorkflowError> {
        Ok(self.users.contains(&user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn membership_checks() {
        let known = Uuid::new_v4();
        let directory = StaticDirectory::with_users([known]);
        assert!(directory.exists(known).await.unwrap());
        assert!(!directory.exists(Uuid::new_v4()).await.unwrap());
    }
}
