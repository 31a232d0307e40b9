//! Replaceable policy configuration.
//!
//! The store hands out immutable `Arc` snapshots. Replacement swaps the
//! whole document under a short write lock, so a reader sees either the old
//! configuration or the new one in full.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::error::Result;
use crate::policy::PolicyConfiguration;

/// Holder of the current [`PolicyConfiguration`].
#[derive(Debug)]
pub struct PolicyStore {
    current: RwLock<Arc<PolicyConfiguration>>,
}

impl PolicyStore {
    /// Creates a store holding `config`.
    ///
    /// The initial document is trusted as-is; use [`PolicyStore::replace`]
    /// for documents from outside the process.
    pub fn new(config: PolicyConfiguration) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Returns the current configuration.
    pub fn snapshot(&self) -> Arc<PolicyConfiguration> {
        // The guarded value is a single Arc, always consistent even after a
        // panic in another holder.
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replaces the whole configuration.
    ///
    /// The document is validated first; an invalid document leaves the
    /// current configuration in place. Returns the previous configuration.
    pub fn replace(&self, config: PolicyConfiguration) -> Result<Arc<PolicyConfiguration>> {
        config.validate()?;
        let resource_types = config.len();
        let next = Arc::new(config);

        let previous = {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, next)
        };

        info!(
            resource_types,
            previous_resource_types = previous.len(),
            "Policy configuration replaced"
        );
        Ok(previous)
    }
}

impl Default for PolicyStore {
    /// A store holding the built-in policy set.
    fn default() -> Self {
        Self::new(crate::defaults::default_policy_config())
    }
}
