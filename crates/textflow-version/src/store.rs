use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use textflow_core::TextUnit;

use crate::diff::{self, VersionComparison};
use crate::error::VersionError;
use crate::policy::VersionPolicy;
use crate::types::{ChangeMeta, Version};

/// Both structures are persisted and locked together.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    documents: HashMap<String, Vec<Version>>,
    hash_index: HashMap<String, String>,
    /// Highest number ever issued per document, so pruning never rewinds numbering.
    #[serde(default)]
    last_numbers: HashMap<String, u64>,
}

impl StoreState {
    /// Drop hash index entries for `document_id` that no remaining version carries.
    fn reindex(&mut self, document_id: &str) {
        let versions = self.documents.get(document_id);
        self.hash_index.retain(|hash, doc| {
            doc != document_id
                || versions.is_some_and(|vs| vs.iter().any(|v| &v.content_hash == hash))
        });
    }

    fn current(&self, document_id: &str) -> Option<&Version> {
        self.documents.get(document_id)?.last()
    }

    fn next_number(&self, document_id: &str) -> u64 {
        let issued = self.last_numbers.get(document_id).copied().unwrap_or(0);
        let retained = self.current(document_id).map_or(0, |v| v.number);
        issued.max(retained) + 1
    }
}

/// In-memory version store. Durability is left to the host via
/// [`VersionStore::export_json`] / [`VersionStore::import_json`].
#[derive(Debug, Default)]
pub struct VersionStore {
    state: RwLock<StoreState>,
}

impl VersionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot `unit` as the next version of its logical document.
    ///
    /// The document id comes from the policy's metadata key, else from a unit with the
    /// same content hash seen before, else a fresh uuid. Creating a version whose hash
    /// equals the current one returns the current version unchanged.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::VersioningDisabled` when the policy is disabled.
    pub fn create_version(
        &self,
        unit: &TextUnit,
        policy: &VersionPolicy,
        change: ChangeMeta,
    ) -> Result<Version, VersionError> {
        if !policy.enabled {
            return Err(VersionError::VersioningDisabled);
        }
        let hash = unit.content_hash();
        let mut state = self.state.write().map_err(|_| VersionError::LockPoisoned)?;

        let document_id = unit
            .get(&policy.document_id_key)
            .map(ToString::to_string)
            .or_else(|| state.hash_index.get(&hash).cloned())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(append(&mut state, &document_id, unit, hash, policy, change))
    }

    /// The current version when `version_id` is `None`, else that specific version.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::LockPoisoned` if the store lock is poisoned.
    pub fn get_version(
        &self,
        document_id: &str,
        version_id: Option<&str>,
    ) -> Result<Option<Version>, VersionError> {
        let state = self.state.read().map_err(|_| VersionError::LockPoisoned)?;
        let Some(versions) = state.documents.get(document_id) else {
            return Ok(None);
        };
        Ok(match version_id {
            None => versions.last().cloned(),
            Some(id) => versions.iter().find(|v| v.id == id).cloned(),
        })
    }

    /// The version whose validity window contains `t`.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::LockPoisoned` if the store lock is poisoned.
    pub fn get_version_by_timestamp(
        &self,
        document_id: &str,
        t: DateTime<Utc>,
    ) -> Result<Option<Version>, VersionError> {
        let state = self.state.read().map_err(|_| VersionError::LockPoisoned)?;
        let now = Utc::now();
        Ok(state
            .documents
            .get(document_id)
            .and_then(|vs| vs.iter().find(|v| v.is_valid_at(t, now)))
            .cloned())
    }

    /// All retained versions of a document, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::LockPoisoned` if the store lock is poisoned.
    pub fn list_versions(&self, document_id: &str) -> Result<Vec<Version>, VersionError> {
        let state = self.state.read().map_err(|_| VersionError::LockPoisoned)?;
        Ok(state.documents.get(document_id).cloned().unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns `VersionError::LockPoisoned` if the store lock is poisoned.
    pub fn document_ids(&self) -> Result<Vec<String>, VersionError> {
        let state = self.state.read().map_err(|_| VersionError::LockPoisoned)?;
        let mut ids: Vec<String> = state.documents.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// # Errors
    ///
    /// Returns `VersionError::VersionsNotFound` naming every id that does not exist.
    pub fn compare_versions(
        &self,
        document_id: &str,
        from: &str,
        to: &str,
    ) -> Result<VersionComparison, VersionError> {
        let state = self.state.read().map_err(|_| VersionError::LockPoisoned)?;
        let versions = state.documents.get(document_id);
        let find = |id: &str| versions.and_then(|vs| vs.iter().find(|v| v.id == id));

        match (find(from), find(to)) {
            (Some(a), Some(b)) => Ok(diff::compare(document_id, a, b)),
            (a, b) => {
                let missing = [(from, a.is_none()), (to, b.is_none())]
                    .into_iter()
                    .filter(|(_, missing)| *missing)
                    .map(|(id, _)| id.to_owned())
                    .collect();
                Err(VersionError::VersionsNotFound {
                    document_id: document_id.to_owned(),
                    missing,
                })
            }
        }
    }

    /// Append a new version carrying the target version's unit, even when the target is
    /// the current version. History is untouched.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::VersioningDisabled` when the policy is disabled,
    /// `VersionError::VersionNotFound` when the target does not exist.
    pub fn rollback_to_version(
        &self,
        document_id: &str,
        version_id: &str,
        policy: &VersionPolicy,
    ) -> Result<Version, VersionError> {
        if !policy.enabled {
            return Err(VersionError::VersioningDisabled);
        }
        let mut state = self.state.write().map_err(|_| VersionError::LockPoisoned)?;
        let target = state
            .documents
            .get(document_id)
            .and_then(|vs| vs.iter().find(|v| v.id == version_id))
            .ok_or_else(|| VersionError::VersionNotFound {
                document_id: document_id.to_owned(),
                version_id: version_id.to_owned(),
            })?;
        let unit = target.unit.clone();
        let hash = target.content_hash.clone();
        let change = ChangeMeta::reason(format!("Rollback to version {}", target.number));

        tracing::info!(document_id, version_id, "rolling back");
        Ok(push_version(&mut state, document_id, &unit, hash, policy, change))
    }

    /// Remove the oldest versions beyond `keep`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::LockPoisoned` if the store lock is poisoned.
    pub fn prune_versions(&self, document_id: &str, keep: usize) -> Result<usize, VersionError> {
        let mut state = self.state.write().map_err(|_| VersionError::LockPoisoned)?;
        let removed = match state.documents.get_mut(document_id) {
            Some(versions) if versions.len() > keep => {
                let excess = versions.len() - keep;
                versions.drain(..excess);
                excess
            }
            _ => return Ok(0),
        };
        if state.documents.get(document_id).is_some_and(Vec::is_empty) {
            state.documents.remove(document_id);
        }
        state.reindex(document_id);
        tracing::debug!(document_id, removed, "pruned versions");
        Ok(removed)
    }

    /// Forget a document and all its versions. Numbering restarts at 1 if the id is
    /// used again.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::DocumentNotFound` for an unknown document.
    pub fn delete_document(&self, document_id: &str) -> Result<usize, VersionError> {
        let mut state = self.state.write().map_err(|_| VersionError::LockPoisoned)?;
        let versions = state
            .documents
            .remove(document_id)
            .ok_or_else(|| VersionError::DocumentNotFound(document_id.to_owned()))?;
        state.last_numbers.remove(document_id);
        state.reindex(document_id);
        Ok(versions.len())
    }

    /// Serialize documents and hash index together.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::Snapshot` if serialization fails.
    pub fn export_json(&self) -> Result<String, VersionError> {
        let state = self.state.read().map_err(|_| VersionError::LockPoisoned)?;
        Ok(serde_json::to_string(&*state)?)
    }

    /// Replace the store contents with a snapshot produced by [`VersionStore::export_json`].
    ///
    /// # Errors
    ///
    /// Returns `VersionError::Snapshot` if the snapshot cannot be parsed.
    pub fn import_json(&self, json: &str) -> Result<(), VersionError> {
        let imported: StoreState = serde_json::from_str(json)?;
        let mut state = self.state.write().map_err(|_| VersionError::LockPoisoned)?;
        *state = imported;
        Ok(())
    }
}

fn append(
    state: &mut StoreState,
    document_id: &str,
    unit: &TextUnit,
    hash: String,
    policy: &VersionPolicy,
    change: ChangeMeta,
) -> Version {
    if let Some(current) = state.current(document_id)
        && current.content_hash == hash
    {
        tracing::debug!(document_id, version = %current.id, "content unchanged");
        return current.clone();
    }
    push_version(state, document_id, unit, hash, policy, change)
}

fn push_version(
    state: &mut StoreState,
    document_id: &str,
    unit: &TextUnit,
    hash: String,
    policy: &VersionPolicy,
    change: ChangeMeta,
) -> Version {
    let now = Utc::now();
    let number = state.next_number(document_id);
    state.last_numbers.insert(document_id.to_owned(), number);
    let versions = state.documents.entry(document_id.to_owned()).or_default();
    if let Some(previous) = versions.last_mut() {
        previous.valid_to = Some(now);
    }

    let version = Version {
        id: policy
            .id_strategy
            .version_id(number, &hash, now.timestamp_millis()),
        document_id: document_id.to_owned(),
        number,
        created_at: now,
        content_hash: hash.clone(),
        unit: unit.clone(),
        valid_from: now,
        valid_to: None,
        change_reason: change.reason,
        author: change.author,
    };
    versions.push(version.clone());

    let mut trimmed = 0;
    if let Some(max) = policy.max_versions
        && versions.len() > max.max(1)
    {
        trimmed = versions.len() - max.max(1);
        versions.drain(..trimmed);
    }

    state.hash_index.insert(hash, document_id.to_owned());
    if trimmed > 0 {
        state.reindex(document_id);
    }

    tracing::debug!(document_id, version = %version.id, number, trimmed, "created version");
    version
}
