// self
use crate::{
	_prelude::*,
	auth::ScopeList,
	config::{
		AuthConfig, AuthEndpoints, DEFAULT_AUTHORIZE_ENDPOINT, DEFAULT_GRAPH_ENDPOINT,
		DEFAULT_HOST_CALLBACK_URL, DEFAULT_POPUP_FEATURES, DEFAULT_POPUP_POLL_INTERVAL_MS,
		DEFAULT_REFRESH_WINDOW_SECS, DEFAULT_TOKEN_ENDPOINT,
	},
	error::ConfigError,
};

/// Builder (and serde shape) for [`AuthConfig`] values.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthConfigBuilder {
	/// Application (client) identifier.
	pub client_id: String,
	/// Requested scopes.
	#[serde(default)]
	pub scopes: Vec<String>,
	/// Redirect URI registered for the application.
	#[serde(default)]
	pub redirect_uri: Option<String>,
	/// Authorize endpoint override.
	#[serde(default)]
	pub authorize_endpoint: Option<String>,
	/// Token endpoint override.
	#[serde(default)]
	pub token_endpoint: Option<String>,
	/// Microsoft Graph base URL override.
	#[serde(default)]
	pub graph_endpoint: Option<String>,
	/// Refresh window in seconds.
	#[serde(default = "default_refresh_window_secs")]
	pub refresh_window_secs: i64,
	/// Popup poll interval in milliseconds.
	#[serde(default = "default_popup_poll_interval_ms")]
	pub popup_poll_interval_ms: u64,
	/// Popup window features override.
	#[serde(default)]
	pub popup_features: Option<String>,
	/// Host-app callback page override.
	#[serde(default)]
	pub host_callback_url: Option<String>,
}
impl AuthConfigBuilder {
	/// Creates a new builder seeded with the provided client identifier.
	pub fn new(client_id: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			scopes: Vec::new(),
			redirect_uri: None,
			authorize_endpoint: None,
			token_endpoint: None,
			graph_endpoint: None,
			refresh_window_secs: DEFAULT_REFRESH_WINDOW_SECS,
			popup_poll_interval_ms: DEFAULT_POPUP_POLL_INTERVAL_MS,
			popup_features: None,
			host_callback_url: None,
		}
	}

	/// Appends requested scopes.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes.extend(scopes.into_iter().map(Into::into));

		self
	}

	/// Sets the redirect URI.
	pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
		self.redirect_uri = Some(uri.into());

		self
	}

	/// Overrides the authorize endpoint.
	pub fn authorize_endpoint(mut self, url: impl Into<String>) -> Self {
		self.authorize_endpoint = Some(url.into());

		self
	}

	/// Overrides the token endpoint.
	pub fn token_endpoint(mut self, url: impl Into<String>) -> Self {
		self.token_endpoint = Some(url.into());

		self
	}

	/// Overrides the Microsoft Graph base URL.
	pub fn graph_endpoint(mut self, url: impl Into<String>) -> Self {
		self.graph_endpoint = Some(url.into());

		self
	}

	/// Overrides the refresh window (negative values clamp to zero).
	pub fn refresh_window(mut self, window: Duration) -> Self {
		self.refresh_window_secs = window.whole_seconds().max(0);

		self
	}

	/// Overrides the popup poll interval.
	pub fn popup_poll_interval(mut self, interval: std::time::Duration) -> Self {
		self.popup_poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);

		self
	}

	/// Overrides the popup window features.
	pub fn popup_features(mut self, features: impl Into<String>) -> Self {
		self.popup_features = Some(features.into());

		self
	}

	/// Overrides the host-app callback page.
	pub fn host_callback_url(mut self, url: impl Into<String>) -> Self {
		self.host_callback_url = Some(url.into());

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<AuthConfig, ConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingClientId);
		}

		let scopes = ScopeList::new(self.scopes)?;
		let redirect_uri = Url::parse(&self.redirect_uri.ok_or(ConfigError::MissingRedirectUri)?)
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let authorize = parse_endpoint(
			"authorize",
			self.authorize_endpoint.as_deref().unwrap_or(DEFAULT_AUTHORIZE_ENDPOINT),
		)?;
		let token =
			parse_endpoint("token", self.token_endpoint.as_deref().unwrap_or(DEFAULT_TOKEN_ENDPOINT))?;
		let mut graph =
			parse_endpoint("graph", self.graph_endpoint.as_deref().unwrap_or(DEFAULT_GRAPH_ENDPOINT))?;

		// `Url::join` drops the last path segment unless it ends with a slash.
		if !graph.path().ends_with('/') {
			let path = format!("{}/", graph.path());

			graph.set_path(&path);
		}

		let host_callback_url = Url::parse(
			self.host_callback_url.as_deref().unwrap_or(DEFAULT_HOST_CALLBACK_URL),
		)
		.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "host callback", source })?;

		Ok(AuthConfig {
			client_id: self.client_id,
			scopes,
			redirect_uri,
			endpoints: AuthEndpoints { authorize, token, graph },
			refresh_window: Duration::seconds(self.refresh_window_secs.max(0)),
			popup_poll_interval: std::time::Duration::from_millis(self.popup_poll_interval_ms.max(1)),
			popup_features: self.popup_features.unwrap_or_else(|| DEFAULT_POPUP_FEATURES.into()),
			host_callback_url,
		})
	}
}

fn default_refresh_window_secs() -> i64 {
	DEFAULT_REFRESH_WINDOW_SECS
}

fn default_popup_poll_interval_ms() -> u64 {
	DEFAULT_POPUP_POLL_INTERVAL_MS
}

fn parse_endpoint(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
	let url =
		Url::parse(raw).map_err(|source| ConfigError::InvalidEndpoint { endpoint: name, source })?;

	validate_endpoint(name, &url)?;

	Ok(url)
}

// Loopback hosts may use plain HTTP so local mock servers can stand in for Microsoft.
fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	let loopback = match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	};

	if url.scheme() == "https" || (loopback && url.scheme() == "http") {
		Ok(())
	} else {
		Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}
