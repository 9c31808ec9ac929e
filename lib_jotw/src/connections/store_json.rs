use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::core::model::{Community, CommunityId};
use crate::core::persistence::{Persistence, PersistenceError};

/// # JSON File Store
///
/// Keeps every community in one JSON object keyed by community id. Writes go
/// to a temporary file in the same directory which is then renamed over the
/// target, so a crash mid-write leaves the previous file intact.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persistence for JsonFileStore {
    fn load_all(&self) -> Result<HashMap<CommunityId, Community>, PersistenceError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No persisted communities found");
                return Ok(HashMap::new());
            }
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }
        let communities: HashMap<CommunityId, Community> =
            serde_json::from_str(&contents).map_err(|e| PersistenceError::Format(e.to_string()))?;
        info!(path = %self.path.display(), communities = communities.len(), "Loaded persisted communities");
        Ok(communities)
    }

    fn save_all(&self, communities: &BTreeMap<CommunityId, Community>) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(communities).map_err(|e| PersistenceError::Format(e.to_string()))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| PersistenceError::Io(e.error))?;
        debug!(path = %self.path.display(), communities = communities.len(), "Communities persisted");
        Ok(())
    }
}
