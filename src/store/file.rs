//! File-backed [`AuthStore`] so a session survives process restarts.

// std
use std::{
	collections::BTreeMap,
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{AuthStore, ChangeFeed, OriginId, StorageEvent, StorageEvents, StoreError},
};

#[derive(Debug)]
struct Shared {
	path: PathBuf,
	values: RwLock<BTreeMap<String, String>>,
	feed: ChangeFeed,
}

/// Persists the keyspace to a JSON object after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	shared: Arc<Shared>,
	origin: OriginId,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		let values = load_snapshot(&path)?;
		let shared = Arc::new(Shared { path, values: RwLock::new(values), feed: ChangeFeed::default() });
		let origin = shared.feed.new_origin();

		Ok(Self { shared, origin })
	}

	/// Returns a handle for another window sharing this file.
	pub fn attach(&self) -> Self {
		Self { shared: self.shared.clone(), origin: self.shared.feed.new_origin() }
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.shared.path
	}

	fn persist(&self, contents: &BTreeMap<String, String>) -> Result<(), StoreError> {
		let path = &self.shared.path;

		ensure_parent_exists(path)?;

		let serialized = serde_json::to_vec_pretty(contents).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to serialize store snapshot: {e}") }
		})?;
		let mut tmp_path = path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", path.display()),
		})
	}

	fn mutate(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
		let old_value = {
			let mut guard = self.shared.values.write();
			let old_value = match value {
				Some(value) => guard.insert(key.to_owned(), value.to_owned()),
				None => guard.remove(key),
			};

			if old_value.as_deref() == value {
				return Ok(());
			}

			self.persist(&guard)?;

			old_value
		};

		self.shared.feed.publish(
			self.origin,
			StorageEvent { key: key.to_owned(), old_value, new_value: value.map(str::to_owned) },
		);

		Ok(())
	}
}
impl AuthStore for FileStore {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.shared.values.read().get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
		self.mutate(key, Some(value))
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		self.mutate(key, None)
	}

	fn subscribe(&self) -> StorageEvents {
		self.shared.feed.subscribe(self.origin)
	}
}

fn load_snapshot(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
	if !path.exists() {
		return Ok(BTreeMap::new());
	}

	let bytes = fs::read(path).map_err(|e| StoreError::Backend {
		message: format!("Failed to read {}: {e}", path.display()),
	})?;

	if bytes.is_empty() {
		return Ok(BTreeMap::new());
	}

	serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
		message: format!("Failed to parse {}: {e}", path.display()),
	})
}

fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
			message: format!("Failed to create store directory {}: {e}", parent.display()),
		})?;
	}

	Ok(())
}
