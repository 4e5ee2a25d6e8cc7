//! Single-file JSON backend.
//!
//! Every mutation rewrites the snapshot to a sibling temp file, syncs it and
//! renames it over the old one, then syncs the directory. Settled records
//! are moved to an append-only archive next to the snapshot so the snapshot
//! only grows with the open work; their ids stay behind so replayed events
//! are still recognized.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use synth_types::Address;
use tracing::{debug, info, warn};

use crate::{
    MetaStore, MintingRecord, MintingStore, RedemptionRecord, RedemptionStore, StoreError,
};

const SCHEMA_VERSION: u32 = 1;

/// Settled records of each kind kept in the snapshot before they are archived.
pub const DEFAULT_DONE_KEPT: usize = 256;

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    schema_version: u32,
    mintings: BTreeMap<u64, MintingRecord>,
    redemptions: BTreeMap<u64, RedemptionRecord>,
    #[serde(default)]
    archived_mintings: BTreeSet<u64>,
    #[serde(default)]
    archived_redemptions: BTreeSet<u64>,
    /// Hex-encoded values.
    meta: BTreeMap<String, String>,
}

impl Snapshot {
    fn done_counts(&self) -> (usize, usize) {
        (
            self.mintings.values().filter(|r| r.is_done()).count(),
            self.redemptions.values().filter(|r| r.is_done()).count(),
        )
    }
}

/// What a mutation replaced, so a failed flush can put it back.
enum Undo {
    Nothing,
    Minting(u64, Option<MintingRecord>),
    Redemption(u64, Option<RedemptionRecord>),
    Meta(String, Option<String>),
}

impl Undo {
    fn apply(self, state: &mut Snapshot) {
        match self {
            Undo::Nothing => {}
            Undo::Minting(id, Some(record)) => {
                state.mintings.insert(id, record);
            }
            Undo::Minting(id, None) => {
                state.mintings.remove(&id);
            }
            Undo::Redemption(id, Some(record)) => {
                state.redemptions.insert(id, record);
            }
            Undo::Redemption(id, None) => {
                state.redemptions.remove(&id);
            }
            Undo::Meta(key, Some(value)) => {
                state.meta.insert(key, value);
            }
            Undo::Meta(key, None) => {
                state.meta.remove(&key);
            }
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", content = "record", rename_all = "camelCase")]
enum Archived<'a> {
    Minting(&'a MintingRecord),
    Redemption(&'a RedemptionRecord),
}

pub struct JsonFileStore {
    path: PathBuf,
    archive_path: PathBuf,
    done_kept: usize,
    state: Mutex<Snapshot>,
}

impl JsonFileStore {
    /// Open `path`, creating an empty store if the file does not exist.
    /// Settled records beyond [`DEFAULT_DONE_KEPT`] are archived right away.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_keeping(path, DEFAULT_DONE_KEPT)
    }

    /// Like [`open`](Self::open), keeping at most `done_kept` settled
    /// records of each kind in the snapshot.
    pub fn open_keeping(path: impl AsRef<Path>, done_kept: usize) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let bytes = fs::read(&path)?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Corruption(format!("{}: {e}", path.display())))?;
            if snapshot.schema_version != SCHEMA_VERSION {
                return Err(StoreError::Corruption(format!(
                    "{}: schema version {} (expected {SCHEMA_VERSION})",
                    path.display(),
                    snapshot.schema_version
                )));
            }
            info!(
                path = %path.display(),
                mintings = snapshot.mintings.len(),
                redemptions = snapshot.redemptions.len(),
                "opened record store"
            );
            snapshot
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            Snapshot {
                schema_version: SCHEMA_VERSION,
                ..Default::default()
            }
        };
        let store = Self {
            archive_path: path.with_extension("archive.jsonl"),
            path,
            done_kept,
            state: Mutex::new(state),
        };
        store.prune_done()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Move settled records beyond the kept count to the archive, oldest
    /// request ids first. Returns how many were moved.
    pub fn prune_done(&self) -> Result<usize, StoreError> {
        let mut state = self.lock()?;
        self.prune_locked(&mut state)
    }

    fn prune_locked(&self, state: &mut Snapshot) -> Result<usize, StoreError> {
        let (done_mintings, done_redemptions) = state.done_counts();
        let mintings: Vec<u64> = state
            .mintings
            .values()
            .filter(|r| r.is_done())
            .map(|r| r.request_id)
            .take(done_mintings.saturating_sub(self.done_kept))
            .collect();
        let redemptions: Vec<u64> = state
            .redemptions
            .values()
            .filter(|r| r.is_done())
            .map(|r| r.request_id)
            .take(done_redemptions.saturating_sub(self.done_kept))
            .collect();
        if mintings.is_empty() && redemptions.is_empty() {
            return Ok(0);
        }

        let mut lines = Vec::new();
        for id in &mintings {
            if let Some(record) = state.mintings.get(id) {
                serde_json::to_writer(&mut lines, &Archived::Minting(record))?;
                lines.push(b'\n');
            }
        }
        for id in &redemptions {
            if let Some(record) = state.redemptions.get(id) {
                serde_json::to_writer(&mut lines, &Archived::Redemption(record))?;
                lines.push(b'\n');
            }
        }
        // A crash between the two writes leaves a record in both files;
        // the snapshot copy wins and is archived again next time.
        let mut archive = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.archive_path)?;
        archive.write_all(&lines)?;
        archive.sync_data()?;

        let mut next = Snapshot {
            schema_version: state.schema_version,
            mintings: std::mem::take(&mut state.mintings),
            redemptions: std::mem::take(&mut state.redemptions),
            archived_mintings: std::mem::take(&mut state.archived_mintings),
            archived_redemptions: std::mem::take(&mut state.archived_redemptions),
            meta: std::mem::take(&mut state.meta),
        };
        let mut moved_mintings = Vec::with_capacity(mintings.len());
        for id in mintings {
            if let Some(record) = next.mintings.remove(&id) {
                next.archived_mintings.insert(id);
                moved_mintings.push(record);
            }
        }
        let mut moved_redemptions = Vec::with_capacity(redemptions.len());
        for id in redemptions {
            if let Some(record) = next.redemptions.remove(&id) {
                next.archived_redemptions.insert(id);
                moved_redemptions.push(record);
            }
        }
        let result = self.persist(&next);
        if result.is_err() {
            for record in &moved_mintings {
                next.archived_mintings.remove(&record.request_id);
            }
            for record in &moved_redemptions {
                next.archived_redemptions.remove(&record.request_id);
            }
            next.mintings
                .extend(moved_mintings.drain(..).map(|r| (r.request_id, r)));
            next.redemptions
                .extend(moved_redemptions.drain(..).map(|r| (r.request_id, r)));
        }
        *state = next;
        result?;

        let moved = moved_mintings.len() + moved_redemptions.len();
        info!(
            path = %self.archive_path.display(),
            mintings = moved_mintings.len(),
            redemptions = moved_redemptions.len(),
            "archived settled records"
        );
        Ok(moved)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Snapshot>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &self.path)?;
        sync_parent(&self.path)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "record store flushed");
        Ok(())
    }

    /// Apply `f` in place and flush. If the flush fails the change is undone,
    /// so memory never holds what the file does not.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Snapshot) -> Result<(T, Undo), StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.lock()?;
        let (out, undo) = f(&mut state)?;
        if let Err(e) = self.persist(&state) {
            undo.apply(&mut state);
            return Err(e);
        }
        let (done_mintings, done_redemptions) = state.done_counts();
        if done_mintings.max(done_redemptions) > self.done_kept.saturating_mul(2) {
            if let Err(e) = self.prune_locked(&mut state) {
                warn!(error = %e, "archiving settled records failed");
            }
        }
        Ok(out)
    }
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

impl std::fmt::Debug for JsonFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFileStore")
            .field("path", &self.path)
            .finish()
    }
}

impl MintingStore for JsonFileStore {
    fn insert_minting(&self, record: &MintingRecord) -> Result<(), StoreError> {
        self.mutate(|s| {
            let id = record.request_id;
            if s.mintings.contains_key(&id) || s.archived_mintings.contains(&id) {
                return Err(StoreError::Duplicate(format!("minting {id}")));
            }
            s.mintings.insert(id, record.clone());
            Ok(((), Undo::Minting(id, None)))
        })
    }

    fn put_minting(&self, record: &MintingRecord) -> Result<(), StoreError> {
        self.mutate(|s| {
            let id = record.request_id;
            let old = s.mintings.insert(id, record.clone());
            Ok(((), Undo::Minting(id, old)))
        })
    }

    fn get_minting(&self, request_id: u64) -> Result<MintingRecord, StoreError> {
        let state = self.lock()?;
        match state.mintings.get(&request_id) {
            Some(record) => Ok(record.clone()),
            None if state.archived_mintings.contains(&request_id) => Err(StoreError::NotFound(
                format!("minting {request_id} (archived)"),
            )),
            None => Err(StoreError::NotFound(format!("minting {request_id}"))),
        }
    }

    fn minting_exists(&self, request_id: u64) -> Result<bool, StoreError> {
        let state = self.lock()?;
        Ok(state.mintings.contains_key(&request_id)
            || state.archived_mintings.contains(&request_id))
    }

    fn open_mintings(&self, agent: &Address) -> Result<Vec<MintingRecord>, StoreError> {
        Ok(self
            .lock()?
            .mintings
            .values()
            .filter(|r| &r.agent_address == agent && !r.is_done())
            .cloned()
            .collect())
    }
}

impl RedemptionStore for JsonFileStore {
    fn insert_redemption(&self, record: &RedemptionRecord) -> Result<(), StoreError> {
        self.mutate(|s| {
            let id = record.request_id;
            if s.redemptions.contains_key(&id) || s.archived_redemptions.contains(&id) {
                return Err(StoreError::Duplicate(format!("redemption {id}")));
            }
            s.redemptions.insert(id, record.clone());
            Ok(((), Undo::Redemption(id, None)))
        })
    }

    fn put_redemption(&self, record: &RedemptionRecord) -> Result<(), StoreError> {
        self.mutate(|s| {
            let id = record.request_id;
            let old = s.redemptions.insert(id, record.clone());
            Ok(((), Undo::Redemption(id, old)))
        })
    }

    fn get_redemption(&self, request_id: u64) -> Result<RedemptionRecord, StoreError> {
        let state = self.lock()?;
        match state.redemptions.get(&request_id) {
            Some(record) => Ok(record.clone()),
            None if state.archived_redemptions.contains(&request_id) => Err(
                StoreError::NotFound(format!("redemption {request_id} (archived)")),
            ),
            None => Err(StoreError::NotFound(format!("redemption {request_id}"))),
        }
    }

    fn redemption_exists(&self, request_id: u64) -> Result<bool, StoreError> {
        let state = self.lock()?;
        Ok(state.redemptions.contains_key(&request_id)
            || state.archived_redemptions.contains(&request_id))
    }

    fn open_redemptions(&self, agent: &Address) -> Result<Vec<RedemptionRecord>, StoreError> {
        Ok(self
            .lock()?
            .redemptions
            .values()
            .filter(|r| &r.agent_address == agent && !r.is_done())
            .cloned()
            .collect())
    }
}

impl MetaStore for JsonFileStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.mutate(|s| {
            let old = s.meta.insert(key.to_string(), hex::encode(value));
            Ok(((), Undo::Meta(key.to_string(), old)))
        })
    }

    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let state = self.lock()?;
        let value = state
            .meta
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        hex::decode(value).map_err(|e| StoreError::Corruption(format!("{key}: {e}")))
    }

    fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        self.mutate(|s| match s.meta.remove(key) {
            Some(old) => Ok(((), Undo::Meta(key.to_string(), Some(old)))),
            None => Ok(((), Undo::Nothing)),
        })
    }
}
