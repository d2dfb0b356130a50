//! Refresh-token orchestration.
//!
//! [`AuthProvider::get_valid_access_token`] hands out the cached access token until it is
//! inside the configured refresh window, then performs a `grant_type=refresh_token` call
//! first. Concurrent callers share one refresh through an async guard and re-check the
//! expiry after acquiring it. A rejected refresh signs the user out; a refresh that never
//! reached a verdict (transport or malformed response) starts a new login instead.

// std
use std::sync::atomic::Ordering;
// self
use crate::{
	_prelude::*,
	auth::{ScopeList, TokenSecret},
	flows::{AuthProvider, LoginAttempt},
	http::TokenHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::StoreKey,
};

/// Result of a refresh attempt.
#[derive(Debug)]
pub enum RefreshOutcome {
	/// All token slots were overwritten with the new grant.
	Refreshed,
	/// The session was cleared and the sign-out event fired.
	SignedOut,
	/// The refresh never reached a verdict, so a new interactive login was started.
	LoginRestarted(LoginAttempt),
}

impl<C> AuthProvider<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Returns the access token, refreshing it first when it expires within the refresh window.
	///
	/// A missing expiry counts as expired. Returns `None` once no session is left. Callers that
	/// queue up behind an in-flight refresh reuse its result, even a failed one, instead of
	/// issuing their own.
	pub async fn get_valid_access_token(&self) -> Option<TokenSecret> {
		if self.needs_refresh() {
			let observed = self.refresh_generation.load(Ordering::Acquire);
			let _singleflight = self.refresh_guard.lock().await;

			// A refresh that finished while waiting settles this call too, whatever its outcome.
			let settled = self.refresh_generation.load(Ordering::Acquire) != observed;

			if !settled && self.needs_refresh() {
				self.refresh_access_token().await;
			}
		}

		self.access_token()
	}

	/// Whether the stored access token is inside the refresh window (or past expiry).
	pub fn needs_refresh(&self) -> bool {
		let expiry = self
			.read_slot(StoreKey::ExpiryTimestamp)
			.and_then(|raw| raw.trim().parse::<i64>().ok())
			.unwrap_or(0);

		expiry <= self.clock.unix_seconds() + self.config.refresh_window.whole_seconds()
	}

	/// Refreshes the session with the configured scopes.
	pub async fn refresh_access_token(&self) -> RefreshOutcome {
		self.refresh_access_token_for(&self.config.scopes).await
	}

	/// Refreshes the session, requesting `scopes` instead of the configured set.
	///
	/// Without a stored refresh token this signs out without any network call.
	pub async fn refresh_access_token_for(&self, scopes: &ScopeList) -> RefreshOutcome {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_access_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let Some(refresh_token) = self.read_slot(StoreKey::RefreshToken) else {
			obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			self.logout(true);
			self.refresh_generation.fetch_add(1, Ordering::AcqRel);

			return RefreshOutcome::SignedOut;
		};
		let result = span.instrument(self.token_client.refresh(&refresh_token, scopes)).await;
		let persisted = result.and_then(|grant| self.persist_grant(&grant, true));

		self.refresh_generation.fetch_add(1, Ordering::AcqRel);

		match persisted {
			Ok(()) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				RefreshOutcome::Refreshed
			},
			Err(e) if e.is_transport_failure() => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				obs::absorbed_failure(KIND, "refresh_relogin", &e);

				RefreshOutcome::LoginRestarted(self.login())
			},
			Err(e) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				obs::absorbed_failure(KIND, "refresh_rejected", &e);
				self.logout(true);

				RefreshOutcome::SignedOut
			},
		}
	}
}
