//! Session accessors, logout, and event subscriptions.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	event::{AuthEvent, Subscription},
	flows::AuthProvider,
	http::TokenHttpClient,
	obs::{self, FlowKind},
	store::StoreKey,
};

impl<C> AuthProvider<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Identity token of the current session.
	///
	/// When there is none and no attempt is in flight, this performs a broadcasting logout so
	/// listeners fall back to the signed-out state.
	pub fn id_token(&self) -> Option<TokenSecret> {
		let token = self.read_secret(StoreKey::IdToken);

		if token.is_none() && self.status().is_none() {
			self.logout(true);
		}

		token
	}

	/// Access token as stored, without checking its expiry.
	pub fn access_token(&self) -> Option<TokenSecret> {
		self.read_secret(StoreKey::AccessToken)
	}

	/// Stored access token expiry.
	pub fn access_token_expires_at(&self) -> Option<OffsetDateTime> {
		self.read_slot(StoreKey::ExpiryTimestamp)
			.and_then(|raw| raw.trim().parse::<i64>().ok())
			.and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
	}

	/// Clears every temporary and session slot, then fires [`AuthEvent::SignOut`] when
	/// `broadcast` is set.
	pub fn logout(&self, broadcast: bool) {
		self.clear_temp_auth_state();

		for key in StoreKey::SESSION {
			self.erase_slot(key);
		}

		obs::transition(FlowKind::Login, "logout", if broadcast { "broadcast" } else { "silent" });

		if broadcast {
			self.events.dispatch(AuthEvent::SignOut);
		}
	}

	/// Runs `callback` once on the next sign-in.
	pub fn do_on_sign_in<F>(&self, callback: F) -> Subscription
	where
		F: 'static + FnOnce() + Send,
	{
		self.events.once(AuthEvent::SignIn, callback)
	}

	/// Runs `callback` once when the next popup sign-in is cancelled.
	pub fn do_on_sign_in_cancelled<F>(&self, callback: F) -> Subscription
	where
		F: 'static + FnOnce() + Send,
	{
		self.events.once(AuthEvent::SignInCancelled, callback)
	}

	/// Runs `callback` once on the next sign-out.
	pub fn do_on_sign_out<F>(&self, callback: F) -> Subscription
	where
		F: 'static + FnOnce() + Send,
	{
		self.events.once(AuthEvent::SignOut, callback)
	}
}
