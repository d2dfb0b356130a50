//! Validated client configuration for the Microsoft identity platform.
//!
//! [`AuthConfig`] pins the application registration (client id, redirect URI, scopes), the
//! endpoint set, and the timing knobs used by the sign-in flows. Build one with
//! [`AuthConfig::builder`] or deserialize it from JSON; both paths run the same validation.

/// Builder API for assembling configurations.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, auth::ScopeList};

/// Microsoft identity platform authorize endpoint (multi-tenant `common` authority).
pub const DEFAULT_AUTHORIZE_ENDPOINT: &str =
	"https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
/// Microsoft identity platform token endpoint (multi-tenant `common` authority).
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";
/// Microsoft Graph base URL used to resolve the default SharePoint site.
pub const DEFAULT_GRAPH_ENDPOINT: &str = "https://graph.microsoft.com/v1.0/";
/// Origin the embedding host app serves the callback page from.
pub const DEFAULT_HOST_CALLBACK_URL: &str = "https://localhost:9360/src/index.html";
/// Window features requested for the sign-in popup.
pub const DEFAULT_POPUP_FEATURES: &str =
	"status=no,location=no,toolbar=no,menubar=no,width=400,height=600";
/// Seconds before expiry at which an access token is considered stale.
pub const DEFAULT_REFRESH_WINDOW_SECS: i64 = 300;
/// Milliseconds between two popup-closed checks.
pub const DEFAULT_POPUP_POLL_INTERVAL_MS: u64 = 300;

/// Endpoint set used by the flows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthEndpoints {
	/// `/authorize` endpoint the user is sent to.
	pub authorize: Url,
	/// `/token` endpoint used for code redemption and refreshes.
	pub token: Url,
	/// Microsoft Graph base URL (with trailing slash).
	pub graph: Url,
}

/// Immutable, validated client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "AuthConfigBuilder")]
pub struct AuthConfig {
	/// Application (client) identifier from the app registration.
	pub client_id: String,
	/// Scopes requested at sign-in and on every refresh.
	pub scopes: ScopeList,
	/// Redirect URI registered for the application.
	pub redirect_uri: Url,
	/// Endpoint set.
	pub endpoints: AuthEndpoints,
	/// Tokens expiring within this window are refreshed before use.
	pub refresh_window: Duration,
	/// Interval between popup-closed checks.
	pub popup_poll_interval: std::time::Duration,
	/// Window features passed when opening the popup.
	pub popup_features: String,
	/// Callback page served by the embedding host app.
	pub host_callback_url: Url,
}
impl AuthConfig {
	/// Creates a new builder for the provided client identifier.
	pub fn builder(client_id: impl Into<String>) -> AuthConfigBuilder {
		AuthConfigBuilder::new(client_id)
	}

	/// URL pattern handed to the host app so it knows which navigation ends the flow.
	pub fn host_callback_pattern(&self) -> String {
		format!("{}*", self.host_callback_url)
	}
}
impl TryFrom<AuthConfigBuilder> for AuthConfig {
	type Error = crate::error::ConfigError;

	fn try_from(builder: AuthConfigBuilder) -> Result<Self, Self::Error> {
		builder.build()
	}
}
