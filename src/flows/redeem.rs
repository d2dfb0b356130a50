//! Authorization code redemption.

// self
use crate::{
	_prelude::*,
	event::AuthEvent,
	flows::AuthProvider,
	http::TokenHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::{AuthStatus, StoreKey},
};

/// Result of [`AuthProvider::acquire_token_via_code`].
///
/// Redemption never raises: temporary state is cleared either way and only a successful
/// redemption fires [`AuthEvent::SignIn`].
#[derive(Debug)]
pub enum RedeemOutcome {
	/// Tokens were persisted and the sign-in event fired.
	SignedIn,
	/// The attempt was dropped; the error says why.
	Abandoned(Error),
}
impl RedeemOutcome {
	/// Whether tokens were persisted.
	pub fn is_signed_in(&self) -> bool {
		matches!(self, Self::SignedIn)
	}
}

impl<C> AuthProvider<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Exchanges `code` for tokens.
	///
	/// The verifier comes from the store when resuming a redirect (the page that generated it
	/// is gone) and from the in-memory PKCE pair otherwise.
	pub async fn acquire_token_via_code(&self, code: &str) -> RedeemOutcome {
		const KIND: FlowKind = FlowKind::Redeem;

		let span = FlowSpan::new(KIND, "acquire_token_via_code");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<()> = span
			.instrument(async move {
				let verifier = match self.status() {
					Some(AuthStatus::ResolvingRedirect) =>
						self.read_slot(StoreKey::Verifier).unwrap_or_default(),
					_ => self.current_verifier(),
				};

				if !self.store.is_available() {
					return Err(Error::StorageUnavailable);
				}

				let grant = self
					.token_client
					.exchange_code(code, &verifier, &self.config.scopes, &self.config.redirect_uri)
					.await?;

				match self.persist_grant(&grant, false) {
					Ok(()) => {},
					// A failed write may leave a mix of old and new tokens behind.
					Err(e @ Error::Storage(_)) => {
						self.logout(false);

						return Err(e);
					},
					Err(e) => return Err(e),
				}

				self.clear_temp_auth_state();

				Ok(())
			})
			.await;

		match result {
			Ok(()) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				self.events.dispatch(AuthEvent::SignIn);

				RedeemOutcome::SignedIn
			},
			Err(e) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				obs::absorbed_failure(KIND, "acquire_token_via_code", &e);
				self.clear_temp_auth_state();

				RedeemOutcome::Abandoned(e)
			},
		}
	}
}
