//! Typed, identity-keyed attribute storage.
//!
//! Collaborators (auth, docs generation, metrics) need to hang their own
//! metadata on a route without this crate knowing their types. They create an
//! [`AttributeKey<T>`] once, usually in a `static` or a `LazyLock`, and use it
//! to set and read values of type `T`.
//!
//! Keys are compared by identity, not by name: two keys created with the same
//! name are two independent entries.
//!
//! ```rust
//! use waypost::{AttributeBag, AttributeKey};
//!
//! let scopes = AttributeKey::<Vec<&'static str>>::new("scopes");
//! let mut bag = AttributeBag::new();
//! bag.set(&scopes, vec!["read"]);
//! assert_eq!(bag.get(&scopes), Some(&vec!["read"]));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_KEY: AtomicU64 = AtomicU64::new(0);

/// An opaque key for values of type `T`.
pub struct AttributeKey<T> {
    id: u64,
    name: &'static str,
    // fn() -> T keeps the key Send + Sync regardless of T.
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> AttributeKey<T> {
    /// Creates a new key. Every call returns a distinct key, even for the
    /// same `name`.
    pub fn new(name: &'static str) -> Self {
        let id = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        Self { id, name, _marker: PhantomData }
    }
}

impl<T> AttributeKey<T> {
    /// Display name, for diagnostics only.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for AttributeKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AttributeKey<T> {}

impl<T> fmt::Debug for AttributeKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeKey({}#{})", self.name, self.id)
    }
}

/// A heterogeneous map from [`AttributeKey`]s to values.
#[derive(Default)]
pub struct AttributeBag {
    entries: HashMap<u64, Entry>,
}

struct Entry {
    name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

impl AttributeBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, returning the previous value if any.
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &AttributeKey<T>, value: T) -> Option<T> {
        let previous = self.entries.insert(key.id, Entry { name: key.name, value: Box::new(value) })?;
        previous.value.downcast::<T>().ok().map(|boxed| *boxed)
    }

    pub fn get<T: Send + Sync + 'static>(&self, key: &AttributeKey<T>) -> Option<&T> {
        self.entries.get(&key.id)?.value.downcast_ref::<T>()
    }

    pub fn contains<T>(&self, key: &AttributeKey<T>) -> bool {
        self.entries.contains_key(&key.id)
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self, key: &AttributeKey<T>) -> Option<T> {
        let entry = self.entries.remove(&key.id)?;
        entry.value.downcast::<T>().ok().map(|boxed| *boxed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for AttributeBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.values().map(|e| e.name).collect();
        names.sort_unstable();
        f.debug_struct("AttributeBag").field("keys", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_keys_are_independent() {
        let first = AttributeKey::<u32>::new("limit");
        let second = AttributeKey::<u32>::new("limit");
        let mut bag = AttributeBag::new();

        bag.set(&first, 1);
        bag.set(&second, 2);

        assert_eq!(bag.get(&first), Some(&1));
        assert_eq!(bag.get(&second), Some(&2));
        assert_eq!(bag.len(), 2);
    }

    #[test]
    fn set_returns_previous_value() {
        let key = AttributeKey::<String>::new("owner");
        let mut bag = AttributeBag::new();
        assert_eq!(bag.set(&key, "alice".to_owned()), None);
        assert_eq!(bag.set(&key, "bob".to_owned()), Some("alice".to_owned()));
        assert_eq!(bag.remove(&key), Some("bob".to_owned()));
        assert!(bag.is_empty());
    }

    #[test]
    fn copied_key_reads_the_same_entry() {
        let key = AttributeKey::<bool>::new("public");
        let copy = key;
        let mut bag = AttributeBag::new();
        bag.set(&key, true);
        assert!(bag.contains(&copy));
        assert_eq!(bag.get(&copy), Some(&true));
    }
}
