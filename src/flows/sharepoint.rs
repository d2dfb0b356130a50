//! SharePoint token acquisition and bearer helpers.

// self
use crate::{
	_prelude::*,
	auth::ScopeList,
	error::ConfigError,
	flows::AuthProvider,
	http::TokenHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	sharepoint::{self as site, SharePointConnection},
	store::StoreKey,
};

impl<C> AuthProvider<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Obtains a `Sites.Read.All` token for a SharePoint tenant.
	///
	/// Without `tenant_url` the default site collection is resolved through the configured
	/// [`SiteResolver`](crate::sharepoint::SiteResolver). The token comes from a refresh-token
	/// grant and is returned without being persisted. Every failure is reported as
	/// [`Error::SharePoint`].
	pub async fn connect_to_sharepoint(
		&self,
		tenant_url: Option<Url>,
	) -> Result<SharePointConnection> {
		const KIND: FlowKind = FlowKind::SharePoint;

		let span = FlowSpan::new(KIND, "connect_to_sharepoint");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<SharePointConnection> = span
			.instrument(async move {
				let url = match tenant_url {
					Some(url) => url,
					None => self.resolve_default_site().await?,
				};
				let refresh_token = self.read_slot(StoreKey::RefreshToken).ok_or_else(|| {
					Error::SharePoint { reason: "no refresh token is stored".into() }
				})?;
				let scopes =
					ScopeList::new([site::sites_read_scope(&url)]).map_err(ConfigError::from)?;
				let grant = self.token_client.refresh(&refresh_token, &scopes).await?;

				Ok(SharePointConnection { url, token: grant.access_token })
			})
			.await;
		let result = result.map_err(|e| match e {
			Error::SharePoint { .. } => e,
			other => Error::SharePoint { reason: other.to_string() },
		});

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn resolve_default_site(&self) -> Result<Url> {
		let resolver = self.site_resolver.clone().ok_or_else(|| Error::SharePoint {
			reason: "no site resolver is configured".into(),
		})?;
		let access_token = self.get_valid_access_token().await.ok_or(Error::NotSignedIn)?;
		let site = resolver.resolve_root_site(&access_token).await?;

		Ok(site.url)
	}

	/// Attaches the current valid access token to an outgoing request.
	#[cfg(feature = "reqwest")]
	pub async fn authorize_request(
		&self,
		request: reqwest::RequestBuilder,
	) -> Result<reqwest::RequestBuilder> {
		let token = self.get_valid_access_token().await.ok_or(Error::NotSignedIn)?;

		Ok(request.bearer_auth(token.expose()))
	}
}
