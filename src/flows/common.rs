//! Shared helpers for flow implementations (durable slots, authorize URL, temp-state cleanup).

// self
use crate::{
	_prelude::*,
	auth::{PkcePair, TokenSecret},
	error::ConfigError,
	flows::AuthProvider,
	http::TokenHttpClient,
	oauth::TokenGrant,
	obs::{self, FlowKind},
	store::{AuthStatus, StoreKey},
};

/// Query parameters the identity platform appends when redirecting back with a code.
const CALLBACK_PARAMS: [&str; 3] = ["code", "state", "session_state"];

impl<C> AuthProvider<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Builds the `/authorize` URL for a new attempt.
	///
	/// Every call rotates the in-memory PKCE pair, so the verifier used at redemption always
	/// matches the challenge carried by the most recent URL.
	pub fn authorize_url(&self) -> Url {
		let pkce = PkcePair::generate();
		let mut url = self.config.endpoints.authorize.clone();

		url.query_pairs_mut()
			.append_pair("client_id", &self.config.client_id)
			.append_pair("scope", &self.config.scopes.joined())
			.append_pair("redirect_uri", self.config.redirect_uri.as_str())
			.append_pair("state", &format!("originUrl=[{}]", self.window.location()))
			.append_pair("response_type", "code")
			.append_pair("response_mode", "query")
			.append_pair("code_challenge", pkce.challenge())
			.append_pair("code_challenge_method", pkce.method().as_str());

		*self.pkce.write() = pkce;

		url
	}

	/// Status slot; `None` when no attempt is in flight.
	pub fn status(&self) -> Option<AuthStatus> {
		self.read_slot(StoreKey::Status).as_deref().and_then(AuthStatus::parse)
	}

	pub(crate) fn current_verifier(&self) -> String {
		self.pkce.read().verifier().to_owned()
	}

	pub(crate) fn set_status(&self, status: AuthStatus) {
		self.write_slot(StoreKey::Status, status.as_str());
	}

	/// Reads a slot, reporting backend failures as an empty slot.
	pub(crate) fn read_slot(&self, key: StoreKey) -> Option<String> {
		match self.store.get(key.as_str()) {
			Ok(value) => value.filter(|value| !value.is_empty()),
			Err(e) => {
				obs::absorbed_failure(FlowKind::Login, key.as_str(), &e);

				None
			},
		}
	}

	pub(crate) fn write_slot(&self, key: StoreKey, value: &str) {
		if let Err(e) = self.store.set(key.as_str(), value) {
			obs::absorbed_failure(FlowKind::Login, key.as_str(), &e);
		}
	}

	pub(crate) fn erase_slot(&self, key: StoreKey) {
		if let Err(e) = self.store.remove(key.as_str()) {
			obs::absorbed_failure(FlowKind::Login, key.as_str(), &e);
		}
	}

	/// Removes every trace of an in-flight attempt (status, code, verifier).
	pub fn clear_temp_auth_state(&self) {
		for key in StoreKey::TEMPORARY {
			self.erase_slot(key);
		}
	}

	/// Persists a token grant.
	///
	/// Fields the grant omits are removed, unless `keep_missing` is set, in which case the
	/// previously stored value stays (refresh responses may skip the refresh or id token).
	/// An expiry that does not fit the timestamp range fails before anything is written.
	pub(crate) fn persist_grant(&self, grant: &TokenGrant, keep_missing: bool) -> Result<()> {
		let expiry = self
			.clock
			.unix_seconds()
			.checked_add(grant.expires_in.whole_seconds())
			.ok_or(ConfigError::ExpiresInOutOfRange)?;
		let optional = [
			(StoreKey::IdToken, grant.id_token.as_ref()),
			(StoreKey::RefreshToken, grant.refresh_token.as_ref()),
		];

		for (key, value) in optional {
			match value {
				Some(secret) => self.store.set(key.as_str(), secret.expose())?,
				None if !keep_missing => self.store.remove(key.as_str())?,
				None => {},
			}
		}

		self.store.set(StoreKey::AccessToken.as_str(), grant.access_token.expose())?;
		self.store.set(StoreKey::ExpiryTimestamp.as_str(), &expiry.to_string())?;

		Ok(())
	}

	pub(crate) fn read_secret(&self, key: StoreKey) -> Option<TokenSecret> {
		self.read_slot(key).map(TokenSecret::new)
	}
}

/// Extracts the `code` query parameter from a callback URL.
pub fn code_from_url(url: &Url) -> Option<String> {
	url.query_pairs()
		.find(|(name, _)| name == "code")
		.map(|(_, value)| value.into_owned())
		.filter(|code| !code.is_empty())
}

/// Returns `url` without the parameters the identity platform appended on the way back.
pub fn strip_callback_params(url: &Url) -> Url {
	let mut stripped = url.clone();
	let kept = url
		.query_pairs()
		.filter(|(name, _)| !CALLBACK_PARAMS.contains(&name.as_ref()))
		.map(|(name, value)| (name.into_owned(), value.into_owned()))
		.collect::<Vec<_>>();

	if kept.is_empty() {
		stripped.set_query(None);
	} else {
		stripped.query_pairs_mut().clear().extend_pairs(kept);
	}

	stripped
}
