#[cfg(test)]
use std::cell::RefCell;
#[cfg(test)]
use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::StoreError;

/// Persistent key/value storage with whole-value reads and writes.
pub trait KvStore {
    /// Values for the requested keys. Missing keys are absent from the map.
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError>;

    /// Write every entry of `entries` in one step.
    fn set(&self, entries: Map<String, Value>) -> Result<(), StoreError>;

    fn get_one(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.get(&[key])?.remove(key))
    }

    fn set_one(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = Map::new();
        entries.insert(key.to_string(), value);
        self.set(entries)
    }
}

impl<S: KvStore + ?Sized> KvStore for &S {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        (**self).get(keys)
    }

    fn set(&self, entries: Map<String, Value>) -> Result<(), StoreError> {
        (**self).set(entries)
    }
}

/// Process-local store for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, Value>>,
    fail_writes: bool,
    fail_key: Option<String>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every write fails, for exercising the data-loss path.
    pub fn failing() -> Self {
        MemoryStore {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// A store that rejects any write touching `key` and accepts the rest.
    pub fn failing_on(key: &str) -> Self {
        MemoryStore {
            fail_key: Some(key.to_string()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
impl KvStore for MemoryStore {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let values = self.values.borrow();
        Ok(keys
            .iter()
            .filter_map(|k| values.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn set(&self, entries: Map<String, Value>) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Backend("writes disabled".into()));
        }
        if let Some(key) = self.fail_key.as_deref().filter(|k| entries.contains_key(*k)) {
            return Err(StoreError::Backend(format!("writes to {} disabled", key)));
        }
        self.values.borrow_mut().extend(entries);
        Ok(())
    }
}
