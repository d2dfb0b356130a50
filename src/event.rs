//! Window-wide sign-in events and one-shot subscriptions.
//!
//! Every provider in a window dispatches on one shared [`EventBus`]; UI wrappers subscribe to
//! learn about sign-in, cancelled sign-in, and sign-out without holding provider state.

// std
use std::sync::{
	Weak,
	atomic::{AtomicU64, Ordering},
};
// self
use crate::_prelude::*;

/// Listener callback registered on an [`EventBus`].
pub type Listener = Arc<dyn Fn(AuthEvent) + Send + Sync>;

/// Events broadcast to every listener in the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthEvent {
	/// Tokens were redeemed and persisted.
	SignIn,
	/// The sign-in popup closed before a code came back.
	SignInCancelled,
	/// The session was cleared.
	SignOut,
}
impl AuthEvent {
	/// Global event name.
	pub const fn name(self) -> &'static str {
		match self {
			AuthEvent::SignIn => "ms365-sign-in",
			AuthEvent::SignInCancelled => "ms365-sign-in-cancelled",
			AuthEvent::SignOut => "ms365-sign-out",
		}
	}
}
impl Display for AuthEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.name())
	}
}

/// Identifier returned by [`EventBus::add_listener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entry {
	id: ListenerId,
	event: AuthEvent,
	once: bool,
	listener: Listener,
}

/// Dispatcher for [`AuthEvent`]s.
#[derive(Default)]
pub struct EventBus {
	next_id: AtomicU64,
	entries: Mutex<Vec<Entry>>,
}
impl EventBus {
	/// Creates an empty bus.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Registers `listener` for `event`; `once` listeners detach before their first call.
	pub fn add_listener(&self, event: AuthEvent, once: bool, listener: Listener) -> ListenerId {
		let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));

		self.entries.lock().push(Entry { id, event, once, listener });

		id
	}

	/// Detaches a listener. Returns `false` if it was already gone.
	pub fn remove_listener(&self, id: ListenerId) -> bool {
		let mut entries = self.entries.lock();
		let before = entries.len();

		entries.retain(|entry| entry.id != id);

		entries.len() != before
	}

	/// Invokes every listener registered for `event` and returns how many ran.
	///
	/// Listeners run after the registry lock is released, so they may subscribe or dispatch.
	pub fn dispatch(&self, event: AuthEvent) -> usize {
		let listeners = {
			let mut entries = self.entries.lock();
			let listeners = entries
				.iter()
				.filter(|entry| entry.event == event)
				.map(|entry| entry.listener.clone())
				.collect::<Vec<_>>();

			entries.retain(|entry| !(entry.event == event && entry.once));

			listeners
		};

		for listener in &listeners {
			listener(event);
		}

		listeners.len()
	}

	/// Number of listeners currently registered for `event`.
	pub fn listener_count(&self, event: AuthEvent) -> usize {
		self.entries.lock().iter().filter(|entry| entry.event == event).count()
	}

	/// Attaches a one-shot callback and returns a handle that can detach it early.
	pub fn once<F>(self: &Arc<Self>, event: AuthEvent, callback: F) -> Subscription
	where
		F: 'static + FnOnce() + Send,
	{
		let slot = Mutex::new(Some(callback));
		let listener: Listener = Arc::new(move |_| {
			if let Some(callback) = slot.lock().take() {
				callback();
			}
		});
		let id = self.add_listener(event, true, listener);

		Subscription { bus: Arc::downgrade(self), event, id }
	}
}
impl Debug for EventBus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EventBus").field("listeners", &self.entries.lock().len()).finish()
	}
}

/// Handle returned by the `do_on_*` helpers.
#[derive(Debug)]
#[must_use = "dropping a Subscription keeps the listener attached; call `unsubscribe` to detach it"]
pub struct Subscription {
	bus: Weak<EventBus>,
	event: AuthEvent,
	id: ListenerId,
}
impl Subscription {
	/// Event this subscription listens for.
	pub fn event(&self) -> AuthEvent {
		self.event
	}

	/// Detaches the listener if it has not fired yet.
	pub fn unsubscribe(self) {
		if let Some(bus) = self.bus.upgrade() {
			bus.remove_listener(self.id);
		}
	}
}
