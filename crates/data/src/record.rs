use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::Value;

/// Shared, mutable, insertion-ordered record used by [`Value::Record`] and
/// [`Value::Namespace`].
///
/// Cloning a record clones the handle. Equality is identity first, then
/// structural and order-insensitive.
#[derive(Clone, Default)]
pub struct Record {
	inner: Arc<RwLock<IndexMap<String, Value>>>,
}

impl Record {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.inner.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.read().is_empty()
	}

	/// Inserts or replaces `key`, returning the previous value.
	pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
		self.inner.write().insert(key.into(), value.into())
	}

	pub fn remove(&self, key: &str) -> Option<Value> {
		self.inner.write().shift_remove(key)
	}

	pub fn get(&self, key: &str) -> Option<Value> {
		self.inner.read().get(key).cloned()
	}

	pub fn contains(&self, key: &str) -> bool {
		self.inner.read().contains_key(key)
	}

	pub fn keys(&self) -> Vec<String> {
		self.inner.read().keys().cloned().collect()
	}

	/// Snapshot of the entries in insertion order.
	pub fn entries(&self) -> Vec<(String, Value)> {
		self.inner.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl PartialEq for Record {
	fn eq(&self, other: &Self) -> bool {
		if self.ptr_eq(other) {
			return true;
		}
		let lhs = self.inner.read();
		let rhs = other.inner.read();
		*lhs == *rhs
	}
}

impl<K, V> FromIterator<(K, V)> for Record
where
	K: Into<String>,
	V: Into<Value>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let map = iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
		Self {
			inner: Arc::new(RwLock::new(map)),
		}
	}
}

impl fmt::Debug for Record {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// Nested records are summarized: module records may reference themselves.
		let entries = self.inner.read();
		let mut map = f.debug_map();
		for (key, value) in entries.iter() {
			match value {
				Value::Record(nested) | Value::Namespace(nested) => map.entry(key, &format_args!("{{..{} keys}}", nested.len())),
				other => map.entry(key, other),
			};
		}
		map.finish()
	}
}
