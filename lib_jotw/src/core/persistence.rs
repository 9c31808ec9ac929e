use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use super::model::{Community, CommunityId};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored communities are not valid: {0}")]
    Format(String),
}

/// # Persistence
///
/// Storage seam for community configuration and pending jokes. The registry
/// calls [`Persistence::save_all`] after every mutation with a complete
/// snapshot; a failure is logged by the caller and never undoes the
/// in-memory change.
pub trait Persistence: Send + Sync {
    /// Loads every stored community. A store with nothing saved yet returns
    /// an empty map rather than an error.
    fn load_all(&self) -> Result<HashMap<CommunityId, Community>, PersistenceError>;

    fn save_all(&self, communities: &BTreeMap<CommunityId, Community>) -> Result<(), PersistenceError>;
}
