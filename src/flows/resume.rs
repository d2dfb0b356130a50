//! Page-load resumption of an in-flight sign-in.

// self
use crate::{
	_prelude::*,
	flows::{AuthProvider, RedeemOutcome, common},
	http::TokenHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::{AuthStatus, StoreKey},
};

/// What [`AuthProvider::resume`] found on the current page.
#[derive(Debug)]
pub enum ResumeOutcome {
	/// No code in the URL; stale temporary state was cleared.
	Idle,
	/// This window is the sign-in popup: the code was handed to the opener and the window closed.
	HandedOff,
	/// This window came back from a redirect and redeemed the code.
	Redeemed(RedeemOutcome),
}

impl<C> AuthProvider<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Inspects the current location for an authorization code and continues the attempt.
	///
	/// Call once per page load. A redirect return rewrites the visible URL before redeeming,
	/// so a reload never replays the code; redemption failures are absorbed.
	pub async fn resume(&self) -> ResumeOutcome {
		const KIND: FlowKind = FlowKind::Resume;

		let span = FlowSpan::new(KIND, "resume");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let outcome = span
			.instrument(async move {
				let location = self.window.location();
				let Some(code) = common::code_from_url(&location) else {
					self.clear_temp_auth_state();

					return ResumeOutcome::Idle;
				};

				if self.status() == Some(AuthStatus::PopupPending) {
					self.write_slot(StoreKey::Code, &code);
					self.window.close();

					return ResumeOutcome::HandedOff;
				}

				self.set_status(AuthStatus::ResolvingRedirect);
				self.window.push_state(&common::strip_callback_params(&location));

				ResumeOutcome::Redeemed(self.acquire_token_via_code(&code).await)
			})
			.await;
		let flow_outcome = match &outcome {
			ResumeOutcome::Redeemed(RedeemOutcome::Abandoned(_)) => FlowOutcome::Failure,
			_ => FlowOutcome::Success,
		};

		obs::record_flow_outcome(KIND, flow_outcome);

		outcome
	}
}
