//! The durable key/value store shared by all pipeline stages.
//!
//! A [`StateStore`] maps qualified keys to small JSON values: cache
//! locations, fingerprints, bits of metadata. Every operation runs under one
//! store-wide lock, and every mutation writes a full snapshot to the backing
//! file before returning. The keys are few and the values small, so rewriting
//! the whole file keeps the format trivial to validate and repair.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use brew_common::CorruptStatePolicy;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StateError;
use crate::registry;
use crate::snapshot::{self, StateMap};

/// Values held by the store.
///
/// Finite floats survive a reload bit for bit. NaN and infinities have no
/// JSON form and are stored as `null`.
pub type Value = serde_json::Value;

/// How the store's initial contents were obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// No backing file existed yet.
    Fresh,
    /// The backing file was read successfully.
    Loaded {
        /// Number of entries read.
        entries: usize,
    },
    /// The backing file was unreadable and the store started empty.
    Recovered {
        /// Why the file could not be used.
        reason: String,
    },
}

/// Process-wide pipeline state backed by a single snapshot file.
///
/// Obtain one with [`StateStore::open`] and share it as `Arc<StateStore>`.
/// Opening the same path again while a store is alive returns that same
/// instance, so all writers to one file go through one lock.
///
/// The lock makes each call atomic, not sequences of calls: another thread
/// may write between a `get` and a following `put`. Use
/// [`compare_and_swap`](Self::compare_and_swap),
/// [`insert_if_absent`](Self::insert_if_absent) or [`update`](Self::update)
/// for read-modify-write.
#[derive(Debug)]
pub struct StateStore {
    /// Normalized path of the snapshot file.
    path: PathBuf,

    /// Current contents. Always equal to the last snapshot written.
    state: Mutex<StateMap>,

    /// Outcome of the initial load.
    load_status: LoadStatus,
}

impl StateStore {
    /// Opens the store backed by `path`, loading it if the file exists.
    ///
    /// A missing file yields an empty store. An unreadable file yields an
    /// empty store plus a warning under [`CorruptStatePolicy::Reset`], and
    /// [`StateError::Corrupt`] under [`CorruptStatePolicy::Fail`].
    ///
    /// If a store for the same path is already open in this process, it is
    /// returned as is and `policy` is ignored.
    pub fn open(
        path: impl AsRef<Path>,
        policy: CorruptStatePolicy,
    ) -> Result<Arc<Self>, StateError> {
        registry::open_shared(path.as_ref(), |path| Self::load(path, policy))
    }

    fn load(path: PathBuf, policy: CorruptStatePolicy) -> Result<Self, StateError> {
        let (state, load_status) = match snapshot::read_snapshot(&path) {
            Ok(Some(state)) => {
                let entries = state.len();
                tracing::debug!(path = %path.display(), entries, "loaded pipeline state");
                (state, LoadStatus::Loaded { entries })
            }
            Ok(None) => {
                tracing::debug!(path = %path.display(), "no pipeline state yet, starting empty");
                (StateMap::new(), LoadStatus::Fresh)
            }
            Err(e) => match policy {
                CorruptStatePolicy::Reset => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "pipeline state unreadable, starting from empty state"
                    );
                    (
                        StateMap::new(),
                        LoadStatus::Recovered {
                            reason: e.to_string(),
                        },
                    )
                }
                CorruptStatePolicy::Fail => {
                    return Err(StateError::Corrupt {
                        path,
                        reason: e.to_string(),
                    })
                }
            },
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
            load_status,
        })
    }

    /// Returns the normalized path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns how the store's initial contents were obtained.
    pub fn load_status(&self) -> &LoadStatus {
        &self.load_status
    }

    fn lock(&self) -> MutexGuard<'_, StateMap> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &StateMap) -> Result<(), StateError> {
        let bytes = snapshot::write_snapshot(&self.path, state)?;
        tracing::debug!(
            path = %self.path.display(),
            entries = state.len(),
            bytes,
            "persisted pipeline state"
        );
        Ok(())
    }

    /// Persists `state` after `key` changed from `previous`. On failure the
    /// change is undone so memory keeps matching the file.
    fn commit(
        &self,
        state: &mut StateMap,
        key: &str,
        previous: Option<Value>,
    ) -> Result<(), StateError> {
        if let Err(e) = self.persist(state) {
            match previous {
                Some(value) => state.insert(key.to_string(), value),
                None => state.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    /// Returns the value under `key`, or an empty JSON object if absent.
    ///
    /// Missing entries are "not cached yet", never an error; callers test the
    /// result for emptiness.
    pub fn get_or_empty(&self, key: &str) -> Value {
        self.get(key)
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
    }

    /// Returns the value under `key` deserialized as `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StateError> {
        self.get(key)
            .map(|value| {
                serde_json::from_value(value).map_err(|e| StateError::Serialization {
                    reason: format!("{key}: {e}"),
                })
            })
            .transpose()
    }

    /// Stores `value` under `key` and writes the snapshot before returning.
    pub fn put(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), StateError> {
        let key = key.into();
        let mut state = self.lock();
        let previous = state.insert(key.clone(), value.into());
        self.commit(&mut state, &key, previous)
    }

    /// Serializes `value` to JSON and stores it under `key`.
    pub fn put_as<T: Serialize + ?Sized>(
        &self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), StateError> {
        let value = to_value(value)?;
        self.put(key, value)
    }

    /// Removes `key`. Returns `false` without touching the file if it was absent.
    pub fn delete(&self, key: &str) -> Result<bool, StateError> {
        let mut state = self.lock();
        match state.remove(key) {
            Some(previous) => {
                self.commit(&mut state, key, Some(previous))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns `true` if `key` has a value.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns all keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Returns a copy of all entries in key order.
    pub fn entries(&self) -> StateMap {
        self.lock().clone()
    }

    /// Replaces the value under `key` with `new` only if the current value
    /// equals `expected` (`None` meaning absent).
    ///
    /// Returns whether the swap happened. The comparison and the write happen
    /// under one lock acquisition.
    pub fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&Value>,
        new: impl Into<Value>,
    ) -> Result<bool, StateError> {
        let mut state = self.lock();
        if state.get(key) != expected {
            return Ok(false);
        }
        let previous = state.insert(key.to_string(), new.into());
        self.commit(&mut state, key, previous)?;
        Ok(true)
    }

    /// Stores `value` under `key` unless the key already exists.
    pub fn insert_if_absent(
        &self,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<bool, StateError> {
        self.compare_and_swap(key, None, value)
    }

    /// Atomically rewrites the value under `key`.
    ///
    /// `f` sees the current value and returns the replacement; returning
    /// `None` removes the key. Nothing is written when the value is unchanged.
    /// Returns the new value.
    ///
    /// `f` runs while the store lock is held. It must not call back into this
    /// store, directly or through a [`StageNamespace`](crate::StageNamespace)
    /// over it: the lock is not reentrant and the call deadlocks.
    pub fn update<F>(&self, key: &str, f: F) -> Result<Option<Value>, StateError>
    where
        F: FnOnce(Option<&Value>) -> Option<Value>,
    {
        let mut state = self.lock();
        let next = f(state.get(key));
        if state.get(key) == next.as_ref() {
            return Ok(next);
        }
        let previous = match &next {
            Some(value) => state.insert(key.to_string(), value.clone()),
            None => state.remove(key),
        };
        self.commit(&mut state, key, previous)?;
        Ok(next)
    }

    /// Removes every entry and writes the empty snapshot.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&self) -> Result<usize, StateError> {
        let mut state = self.lock();
        let previous = std::mem::take(&mut *state);
        if let Err(e) = self.persist(&state) {
            *state = previous;
            return Err(e);
        }
        tracing::info!(
            path = %self.path.display(),
            removed = previous.len(),
            "cleared pipeline state"
        );
        Ok(previous.len())
    }

    /// Rewrites the snapshot from memory.
    ///
    /// Mutations already persist before returning; this is for shutdown hooks
    /// and for replacing a corrupt file that was recovered from.
    pub fn flush(&self) -> Result<(), StateError> {
        let state = self.lock();
        self.persist(&state)
    }
}

pub(crate) fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, StateError> {
    serde_json::to_value(value).map_err(|e| StateError::Serialization {
        reason: e.to_string(),
    })
}
