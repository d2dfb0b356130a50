//! Interactive sign-in over the popup, redirect, and host-app transports.
//!
//! [`AuthProvider::login`] resolves a [`LoginTransport`] from the environment and returns at
//! once; the rest of the attempt runs on background tasks. The popup transport hands the code
//! back through the shared store: the opener listens for the popup's write, while a
//! [`RepeatingTask`] watches for the user closing the popup early.

// std
use std::ops::ControlFlow;
// crates.io
use tokio::task::{AbortHandle, JoinHandle};
// self
use crate::{
	_prelude::*,
	env::{HostTabs, LoginTransport, PopupWindow},
	event::AuthEvent,
	flows::{AuthProvider, RedeemOutcome, common},
	http::TokenHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::{AuthStatus, StoreKey},
	task::RepeatingTask,
};

/// Handle on a login started by [`AuthProvider::login`].
#[derive(Debug)]
pub struct LoginAttempt {
	/// Transport actually used (a blocked popup falls back to [`LoginTransport::Redirect`]).
	pub transport: LoginTransport,
	/// Popup-closed watcher, for popup logins.
	pub watcher: Option<RepeatingTask>,
	redemption: Option<JoinHandle<Option<RedeemOutcome>>>,
}
impl LoginAttempt {
	fn new(transport: LoginTransport) -> Self {
		Self { transport, watcher: None, redemption: None }
	}

	/// Waits for the background redemption of this attempt.
	///
	/// Returns `None` for redirects (the page navigates away), when the user dismissed the
	/// popup or host tab, or when the attempt was cancelled.
	pub async fn outcome(&mut self) -> Option<RedeemOutcome> {
		let handle = self.redemption.take()?;

		handle.await.ok().flatten()
	}
}

impl<C> AuthProvider<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Starts an interactive sign-in.
	///
	/// Host app first, then a full-page redirect for legacy browsers, and a popup otherwise.
	/// Never fails; the outcome surfaces through [`AuthEvent`]s. A previous attempt that is
	/// still waiting for its popup or host tab is abandoned without a cancellation event.
	pub fn login(&self) -> LoginAttempt {
		const KIND: FlowKind = FlowKind::Login;

		let transport = self.environment.login_transport();
		let _span = FlowSpan::new(KIND, transport.as_str()).entered();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.abandon_pending_login();

		let attempt = match (transport, self.environment.host.clone()) {
			(LoginTransport::HostMediated, Some(host)) => self.login_via_host(host),
			(LoginTransport::Redirect, _) | (LoginTransport::HostMediated, None) => {
				self.login_redirect();

				LoginAttempt::new(LoginTransport::Redirect)
			},
			(LoginTransport::Popup, _) => self.login_popup(),
		};

		obs::transition(KIND, "login", attempt.transport.as_str());
		obs::record_flow_outcome(KIND, FlowOutcome::Success);

		attempt
	}

	fn login_popup(&self) -> LoginAttempt {
		self.set_status(AuthStatus::PopupPending);

		let mut changes = self.store.subscribe();
		let provider = self.clone();
		let listener = self.runtime.spawn(async move {
			while changes.next().await.is_some() {
				if provider.status() != Some(AuthStatus::PopupPending) {
					continue;
				}

				let Some(code) = provider.read_slot(StoreKey::Code) else {
					continue;
				};

				drop(changes);
				provider.set_status(AuthStatus::ResolvingPopup);

				return Some(provider.acquire_token_via_code(&code).await);
			}

			None
		});
		let url = self.authorize_url();
		let Some(popup) = self.window.open_popup(&url, &self.config.popup_features) else {
			obs::absorbed_failure(
				FlowKind::Login,
				"login_popup",
				&"couldn't open popup, trying redirect instead",
			);
			listener.abort();
			self.login_redirect();

			return LoginAttempt::new(LoginTransport::Redirect);
		};
		let watcher = self.watch_popup(popup, listener.abort_handle());

		self.track_pending_login([listener.abort_handle(), watcher.abort_handle()]);

		LoginAttempt {
			transport: LoginTransport::Popup,
			watcher: Some(watcher),
			redemption: Some(listener),
		}
	}

	// Polling stops as soon as the popup is closed. Closing it before any code arrived counts as
	// a cancellation.
	fn watch_popup(
		&self,
		popup: Arc<dyn PopupWindow>,
		listener: AbortHandle,
	) -> RepeatingTask {
		let provider = self.clone();

		RepeatingTask::spawn(&self.runtime, self.config.popup_poll_interval, move || {
			if !popup.is_closed() {
				return ControlFlow::Continue(());
			}

			let cancelled = provider.status() == Some(AuthStatus::PopupPending)
				&& provider.read_slot(StoreKey::Code).is_none();

			if cancelled {
				listener.abort();
				provider.clear_temp_auth_state();
				obs::transition(FlowKind::Login, "watch_popup", "cancelled");
				provider.events.dispatch(AuthEvent::SignInCancelled);
			}

			ControlFlow::Break(())
		})
	}

	fn login_redirect(&self) {
		let url = self.authorize_url();

		self.set_status(AuthStatus::RedirectPending);
		self.write_slot(StoreKey::Verifier, &self.current_verifier());
		self.window.replace_location(&url);
	}

	fn login_via_host(&self, host: Arc<dyn HostTabs>) -> LoginAttempt {
		self.set_status(AuthStatus::PopupPending);

		let url = self.authorize_url();
		let pattern = self.config.host_callback_pattern();
		let provider = self.clone();
		let redemption = self.runtime.spawn(async move {
			let code = host
				.open_with_callback(&url, &pattern)
				.await
				.and_then(|callback| common::code_from_url(&callback));
			let Some(code) = code else {
				provider.clear_temp_auth_state();

				return None;
			};

			provider.set_status(AuthStatus::ResolvingPopup);

			Some(provider.acquire_token_via_code(&code).await)
		});

		self.track_pending_login([redemption.abort_handle()]);

		LoginAttempt {
			transport: LoginTransport::HostMediated,
			watcher: None,
			redemption: Some(redemption),
		}
	}

	fn track_pending_login<I>(&self, handles: I)
	where
		I: IntoIterator<Item = AbortHandle>,
	{
		self.pending_login.lock().extend(handles);
	}

	fn abandon_pending_login(&self) {
		let handles = std::mem::take(&mut *self.pending_login.lock());

		if !handles.is_empty() {
			obs::transition(FlowKind::Login, "login", "superseded");
		}

		for handle in handles {
			handle.abort();
		}
	}
}
