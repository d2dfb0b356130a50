//! In-process [`AuthStore`] for tests, demos, and single-process hosts.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	store::{AuthStore, ChangeFeed, OriginId, StorageEvent, StorageEvents, StoreError},
};

#[derive(Debug)]
struct Shared {
	values: RwLock<HashMap<String, String>>,
	feed: ChangeFeed,
	available: AtomicBool,
}

/// Keyspace held in memory; each [`attach`](MemoryStore::attach)ed handle acts as another
/// window of the same origin. Clones stay in the same window.
#[derive(Clone, Debug)]
pub struct MemoryStore {
	shared: Arc<Shared>,
	origin: OriginId,
}
impl MemoryStore {
	/// Creates an empty keyspace with a single handle.
	pub fn new() -> Self {
		let shared = Arc::new(Shared {
			values: RwLock::new(HashMap::new()),
			feed: ChangeFeed::default(),
			available: AtomicBool::new(true),
		});
		let origin = shared.feed.new_origin();

		Self { shared, origin }
	}

	/// Returns a handle for another window sharing this keyspace.
	pub fn attach(&self) -> Self {
		Self { shared: self.shared.clone(), origin: self.shared.feed.new_origin() }
	}

	/// Toggles [`AuthStore::is_available`] to simulate hosts without durable storage.
	pub fn set_available(&self, available: bool) {
		self.shared.available.store(available, Ordering::Relaxed);
	}

	/// Copies the current contents.
	pub fn snapshot(&self) -> HashMap<String, String> {
		self.shared.values.read().clone()
	}

	/// Number of live change listeners across all handles.
	pub fn listener_count(&self) -> usize {
		self.shared.feed.listener_count()
	}
}
impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}
impl AuthStore for MemoryStore {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.shared.values.read().get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
		let old_value = self.shared.values.write().insert(key.to_owned(), value.to_owned());

		if old_value.as_deref() != Some(value) {
			self.shared.feed.publish(
				self.origin,
				StorageEvent { key: key.to_owned(), old_value, new_value: Some(value.to_owned()) },
			);
		}

		Ok(())
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		let old_value = self.shared.values.write().remove(key);

		if old_value.is_some() {
			self.shared
				.feed
				.publish(self.origin, StorageEvent { key: key.to_owned(), old_value, new_value: None });
		}

		Ok(())
	}

	fn subscribe(&self) -> StorageEvents {
		self.shared.feed.subscribe(self.origin)
	}

	fn is_available(&self) -> bool {
		self.shared.available.load(Ordering::Relaxed)
	}
}
