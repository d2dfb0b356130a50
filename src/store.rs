//! Durable key-value contract backing the sign-in state machine.
//!
//! The provider keeps no hidden state beyond what lives in an [`AuthStore`]: the in-flight
//! status, the one-time authorization code, the persisted PKCE verifier, and the token set.
//! Each store handle stands for one window of an origin. Handles created through a backend's
//! `attach` share data and observe each other's writes through [`AuthStore::subscribe`],
//! mirroring how same-origin windows see `storage` events: asynchronously, and never for
//! their own writes.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
// self
use crate::_prelude::*;

/// String-keyed store shared by every window of an origin.
pub trait AuthStore
where
	Self: Send + Sync,
{
	/// Reads a value.
	fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Writes a value, notifying other handles when it changed.
	fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

	/// Deletes a value, notifying other handles when it existed.
	fn remove(&self, key: &str) -> Result<(), StoreError>;

	/// Subscribes to writes made through *other* handles of the same store.
	///
	/// Dropping the returned stream deregisters it.
	fn subscribe(&self) -> StorageEvents;

	/// Reports whether durable storage is usable in this environment.
	fn is_available(&self) -> bool {
		true
	}
}

/// Durable slots owned by the sign-in state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreKey {
	/// Which transport is in flight ([`AuthStatus`]).
	Status,
	/// Authorization code handed from the popup to its opener.
	Code,
	/// PKCE verifier persisted across a full-page redirect.
	Verifier,
	/// Identity token.
	IdToken,
	/// Access token.
	AccessToken,
	/// Refresh token.
	RefreshToken,
	/// Access token expiry in Unix seconds.
	ExpiryTimestamp,
}
impl StoreKey {
	/// Slots describing an in-flight sign-in attempt.
	pub const TEMPORARY: [StoreKey; 3] = [StoreKey::Status, StoreKey::Code, StoreKey::Verifier];
	/// Slots describing an established session.
	pub const SESSION: [StoreKey; 4] = [
		StoreKey::IdToken,
		StoreKey::RefreshToken,
		StoreKey::AccessToken,
		StoreKey::ExpiryTimestamp,
	];

	/// Stable storage key name; consumers may read these for interop and debugging.
	pub const fn as_str(self) -> &'static str {
		match self {
			StoreKey::Status => "ms365_status",
			StoreKey::Code => "ms365_code",
			StoreKey::Verifier => "ms365_verifier",
			StoreKey::IdToken => "ms365_id_token",
			StoreKey::AccessToken => "ms365_access_token",
			StoreKey::RefreshToken => "ms365_refresh_token",
			StoreKey::ExpiryTimestamp => "ms365_token_expiry_timestamp",
		}
	}
}
impl Display for StoreKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Value of the status slot; an absent slot means no attempt is in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthStatus {
	/// A popup (or host-app tab) is open at the authorize URL.
	PopupPending,
	/// The window navigated away to the authorize URL.
	RedirectPending,
	/// The window came back from the provider and is redeeming the code.
	ResolvingRedirect,
	/// The opener received the popup's code and is redeeming it.
	ResolvingPopup,
}
impl AuthStatus {
	/// Stored representation.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthStatus::PopupPending => "popup-pending",
			AuthStatus::RedirectPending => "redirect-pending",
			AuthStatus::ResolvingRedirect => "resolving-redirect",
			AuthStatus::ResolvingPopup => "resolving-popup",
		}
	}

	/// Parses a stored value; unknown values read as no status.
	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"popup-pending" => Some(AuthStatus::PopupPending),
			"redirect-pending" => Some(AuthStatus::RedirectPending),
			"resolving-redirect" => Some(AuthStatus::ResolvingRedirect),
			"resolving-popup" => Some(AuthStatus::ResolvingPopup),
			_ => None,
		}
	}
}
impl Display for AuthStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Error type produced by [`AuthStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Change notification delivered to other handles of a store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
	/// Key that changed.
	pub key: String,
	/// Value before the write.
	pub old_value: Option<String>,
	/// Value after the write (`None` for removals).
	pub new_value: Option<String>,
}

/// Stream of [`StorageEvent`]s; dropping it deregisters the listener.
#[derive(Debug)]
pub struct StorageEvents(UnboundedReceiver<StorageEvent>);
impl StorageEvents {
	/// Waits for the next change. Returns `None` once the store is gone.
	pub async fn next(&mut self) -> Option<StorageEvent> {
		self.0.recv().await
	}

	/// Returns an already-delivered change without waiting.
	pub fn try_next(&mut self) -> Option<StorageEvent> {
		match self.0.try_recv() {
			Ok(event) => Some(event),
			Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
		}
	}
}

/// Identifies the window a store handle belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OriginId(u64);

/// Fan-out of change notifications shared by sibling store handles.
///
/// Backends keep one feed per shared keyspace, hand every handle its own [`OriginId`], and
/// call [`ChangeFeed::publish`] after each effective write.
#[derive(Debug, Default)]
pub struct ChangeFeed {
	next_origin: AtomicU64,
	subscribers: Mutex<Vec<(OriginId, UnboundedSender<StorageEvent>)>>,
}
impl ChangeFeed {
	/// Allocates an origin for a new handle.
	pub fn new_origin(&self) -> OriginId {
		OriginId(self.next_origin.fetch_add(1, Ordering::Relaxed))
	}

	/// Registers a listener that receives writes from every origin except `origin`.
	pub fn subscribe(&self, origin: OriginId) -> StorageEvents {
		let (tx, rx) = mpsc::unbounded_channel();

		self.subscribers.lock().push((origin, tx));

		StorageEvents(rx)
	}

	/// Delivers `event` to listeners of other origins, pruning dropped ones.
	pub fn publish(&self, writer: OriginId, event: StorageEvent) {
		self.subscribers.lock().retain(|(origin, tx)| {
			if *origin == writer {
				return !tx.is_closed();
			}

			tx.send(event.clone()).is_ok()
		});
	}

	/// Number of live listeners.
	pub fn listener_count(&self) -> usize {
		let mut subscribers = self.subscribers.lock();

		subscribers.retain(|(_, tx)| !tx.is_closed());

		subscribers.len()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn key_names_are_stable() {
		let names = [StoreKey::TEMPORARY.as_slice(), StoreKey::SESSION.as_slice()]
			.concat()
			.into_iter()
			.map(StoreKey::as_str)
			.collect::<Vec<_>>();

		assert_eq!(
			names,
			[
				"ms365_status",
				"ms365_code",
				"ms365_verifier",
				"ms365_id_token",
				"ms365_refresh_token",
				"ms365_access_token",
				"ms365_token_expiry_timestamp",
			]
		);
	}

	#[test]
	fn status_round_trips_through_storage_representation() {
		for status in [
			AuthStatus::PopupPending,
			AuthStatus::RedirectPending,
			AuthStatus::ResolvingRedirect,
			AuthStatus::ResolvingPopup,
		] {
			assert_eq!(AuthStatus::parse(status.as_str()), Some(status));
		}

		assert_eq!(AuthStatus::parse(""), None);
		assert_eq!(AuthStatus::parse("popup"), None);
	}

	#[test]
	fn feed_skips_the_writer_and_prunes_dropped_listeners() {
		let feed = ChangeFeed::default();
		let writer = feed.new_origin();
		let reader = feed.new_origin();
		let mut own = feed.subscribe(writer);
		let mut other = feed.subscribe(reader);
		let event =
			StorageEvent { key: "k".into(), old_value: None, new_value: Some("v".into()) };

		feed.publish(writer, event.clone());

		assert_eq!(other.try_next(), Some(event.clone()));
		assert_eq!(own.try_next(), None);

		drop(other);
		feed.publish(writer, event);

		assert_eq!(feed.listener_count(), 1);
	}
}
