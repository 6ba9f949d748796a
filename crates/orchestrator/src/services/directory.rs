//! User directory client.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::UserId;
use thiserror::Error;

/// Errors from the user directory.
///
/// Lookups are boolean; the only failure mode is the directory being
/// unreachable, which the caller may retry.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory could not be reached or answered too slowly.
    #[error("User directory unavailable: {0}")]
    Unavailable(String),
}

/// Authoritative lookup of user existence.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns whether the user exists. `Ok(false)` is a definitive
    /// answer, not an error.
    async fn user_exists(&self, user_id: UserId) -> Result<bool, DirectoryError>;
}

#[derive(Debug, Default)]
struct DirectoryState {
    users: HashSet<UserId>,
    unavailable: bool,
    fail_next: u32,
    call_count: u64,
}

/// In-memory directory double for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl InMemoryUserDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user.
    pub fn add_user(&self, user_id: UserId) {
        self.state.write().unwrap().users.insert(user_id);
    }

    /// Toggles permanent unavailability.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Makes the next `n` lookups fail as unavailable, then recover.
    pub fn fail_next_calls(&self, n: u32) {
        self.state.write().unwrap().fail_next = n;
    }

    /// Number of lookups served (including failed ones).
    pub fn call_count(&self) -> u64 {
        self.state.read().unwrap().call_count
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn user_exists(&self, user_id: UserId) -> Result<bool, DirectoryError> {
        let mut state = self.state.write().unwrap();
        state.call_count += 1;

        if state.unavailable {
            return Err(DirectoryError::Unavailable(
                "directory marked unavailable".to_string(),
            ));
        }

        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(DirectoryError::Unavailable(
                "transient directory failure".to_string(),
            ));
        }

        Ok(state.users.contains(&user_id))
    }
}
