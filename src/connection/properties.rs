//! Type-erased, connection-scoped property storage.
//!
//! Values are stored as `Arc<dyn Any + Send + Sync>` under string keys so
//! hooks running on different workers can share per-connection state (a
//! player name, an auth token) without the framework knowing its type.

use std::{any::Any, sync::Arc};

use dashmap::DashMap;

/// Concurrent string-keyed property bag.
///
/// # Examples
///
/// ```
/// use wirework::connection::PropertyBag;
///
/// let bag = PropertyBag::default();
/// bag.set("player", String::from("ada"));
/// let name = bag.get::<String>("player").expect("property set");
/// assert_eq!(name.as_str(), "ada");
/// assert!(bag.get::<u32>("player").is_none());
/// ```
#[derive(Default)]
pub struct PropertyBag {
    values: DashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl PropertyBag {
    /// Store `value` under `key`, replacing any previous value.
    pub fn set<T>(&self, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.values
            .insert(key.into(), Arc::new(value) as Arc<dyn Any + Send + Sync>);
    }

    /// Fetch the value under `key` if present and of type `T`.
    #[must_use]
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let value = self.values.get(key).map(|entry| Arc::clone(entry.value()))?;
        value.downcast::<T>().ok()
    }

    /// Remove the value under `key`, returning whether one existed.
    pub fn remove(&self, key: &str) -> bool { self.values.remove(key).is_some() }

    /// Whether a value is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool { self.values.contains_key(key) }

    /// Number of stored properties.
    #[must_use]
    pub fn len(&self) -> usize { self.values.len() }

    /// Whether the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
}
