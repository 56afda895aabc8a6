//! SessionState: the optional signed-in user

use super::user::UserIdentity;
use crate::storage::{KeyValueStore, StorageResult, USER_KEY};
use std::sync::{Arc, PoisonError, RwLock};

/// Holds at most one [`UserIdentity`], persisted under [`USER_KEY`]
#[derive(Default)]
pub struct SessionState {
    user: RwLock<Option<UserIdentity>>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            user: RwLock::new(None),
            store: Some(store),
        }
    }

    /// Restore the persisted user, if any. Returns whether one was found.
    pub fn load(&self) -> StorageResult<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        let user: Option<UserIdentity> = match store.get(USER_KEY)? {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };
        let found = user.is_some();
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = user;
        Ok(found)
    }

    /// Sign in (`Some`) or sign out (`None`)
    pub fn set(&self, user: Option<UserIdentity>) -> StorageResult<()> {
        let mut current = self.user.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = &self.store {
            match &user {
                Some(u) => store.set(USER_KEY, &serde_json::to_string(u)?)?,
                None => {
                    store.remove(USER_KEY)?;
                }
            }
        }
        *current = user;
        Ok(())
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
