//! Per-stage key namespaces over a shared [`StateStore`].
//!
//! Every key a stage writes is qualified as `"<stage>##<descriptor>"`. Stage
//! names may not contain the separator, so splitting at the first `##`
//! always recovers the stage, while descriptors are free to use `##`
//! themselves (loaders record `"df##train"`).

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StateError;
use crate::store::{StateStore, Value};

/// Separator between the stage name and the descriptor in a qualified key.
pub const KEY_SEPARATOR: &str = "##";

/// Builds the qualified key `"<stage>##<descriptor>"`.
pub fn qualify(stage: &str, descriptor: &str) -> String {
    format!("{stage}{KEY_SEPARATOR}{descriptor}")
}

/// Splits a qualified key into `(stage, descriptor)` at the first separator.
pub fn split_qualified(key: &str) -> Option<(&str, &str)> {
    key.split_once(KEY_SEPARATOR)
}

/// Identity of a pipeline stage type.
///
/// The default name is the type's own name without module path or generic
/// arguments, so `loaders::WintonStockData` records under
/// `"WintonStockData##..."`.
pub trait Stage {
    /// Name used as the key prefix for this stage's entries.
    fn stage_name() -> String {
        short_type_name::<Self>()
    }
}

fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// A stage's view of the shared store.
///
/// All operations delegate to the [`StateStore`] with the descriptor
/// qualified by the stage name.
#[derive(Debug, Clone)]
pub struct StageNamespace {
    store: Arc<StateStore>,
    stage: String,
}

impl StageNamespace {
    /// Creates a namespace for `stage` over `store`.
    ///
    /// Fails with [`StateError::InvalidStageName`] if the name is empty or
    /// contains [`KEY_SEPARATOR`].
    pub fn new(store: Arc<StateStore>, stage: impl Into<String>) -> Result<Self, StateError> {
        let stage = stage.into();
        if stage.is_empty() {
            return Err(StateError::InvalidStageName {
                name: stage,
                reason: "stage name is empty".to_string(),
            });
        }
        if stage.contains(KEY_SEPARATOR) {
            return Err(StateError::InvalidStageName {
                name: stage,
                reason: format!("contains the key separator '{KEY_SEPARATOR}'"),
            });
        }
        Ok(Self { store, stage })
    }

    /// Creates the namespace of stage type `S`.
    pub fn for_stage<S: Stage + ?Sized>(store: Arc<StateStore>) -> Result<Self, StateError> {
        Self::new(store, S::stage_name())
    }

    /// Returns the stage name.
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Returns the qualified key for `descriptor`.
    pub fn qualify(&self, descriptor: &str) -> String {
        qualify(&self.stage, descriptor)
    }

    /// Stores `value` under the qualified `descriptor`.
    pub fn put(&self, descriptor: &str, value: impl Into<Value>) -> Result<(), StateError> {
        self.store.put(self.qualify(descriptor), value)
    }

    /// Serializes `value` and stores it under the qualified `descriptor`.
    pub fn put_as<T: Serialize + ?Sized>(
        &self,
        descriptor: &str,
        value: &T,
    ) -> Result<(), StateError> {
        self.store.put_as(self.qualify(descriptor), value)
    }

    /// Returns the value under the qualified `descriptor`.
    pub fn get(&self, descriptor: &str) -> Option<Value> {
        self.store.get(&self.qualify(descriptor))
    }

    /// Returns the value, or an empty JSON object if absent.
    pub fn get_or_empty(&self, descriptor: &str) -> Value {
        self.store.get_or_empty(&self.qualify(descriptor))
    }

    /// Returns the value deserialized as `T`.
    pub fn get_as<T: DeserializeOwned>(&self, descriptor: &str) -> Result<Option<T>, StateError> {
        self.store.get_as(&self.qualify(descriptor))
    }

    /// Removes the entry; absent entries are a no-op.
    pub fn delete(&self, descriptor: &str) -> Result<bool, StateError> {
        self.store.delete(&self.qualify(descriptor))
    }

    /// Returns `true` if the entry exists.
    pub fn contains(&self, descriptor: &str) -> bool {
        self.store.contains(&self.qualify(descriptor))
    }

    /// See [`StateStore::compare_and_swap`].
    pub fn compare_and_swap(
        &self,
        descriptor: &str,
        expected: Option<&Value>,
        new: impl Into<Value>,
    ) -> Result<bool, StateError> {
        self.store
            .compare_and_swap(&self.qualify(descriptor), expected, new)
    }

    /// See [`StateStore::update`]. `f` runs under the store lock and must not
    /// use this namespace or any other over the same store.
    pub fn update<F>(&self, descriptor: &str, f: F) -> Result<Option<Value>, StateError>
    where
        F: FnOnce(Option<&Value>) -> Option<Value>,
    {
        self.store.update(&self.qualify(descriptor), f)
    }
}
