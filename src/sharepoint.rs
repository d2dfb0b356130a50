//! SharePoint site resolution used by [`AuthProvider::connect_to_sharepoint`].
//!
//! [`AuthProvider::connect_to_sharepoint`]: crate::flows::AuthProvider::connect_to_sharepoint

// self
use crate::{_prelude::*, auth::TokenSecret};
#[cfg(feature = "reqwest")] use crate::error::TransportError;

/// Boxed future returned by [`SiteResolver::resolve_root_site`].
pub type SiteFuture<'a> = Pin<Box<dyn Future<Output = Result<SharePointSite>> + 'a + Send>>;

/// Root site collection of the signed-in user's tenant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharePointSite {
	/// Site collection hostname, e.g. `contoso.sharepoint.com`.
	pub hostname: String,
	/// Root site web URL.
	pub url: Url,
}

/// Token scoped to a SharePoint tenant.
#[derive(Clone, Debug)]
pub struct SharePointConnection {
	/// Tenant root URL the token was issued for.
	pub url: Url,
	/// Access token carrying `Sites.Read.All` for that tenant.
	pub token: TokenSecret,
}

/// Resolves the default site collection for the signed-in user.
pub trait SiteResolver: Send + Sync {
	/// Looks up the root site using a Microsoft Graph access token.
	fn resolve_root_site<'a>(&'a self, access_token: &'a TokenSecret) -> SiteFuture<'a>;
}

/// Scope requesting read access to every site of `tenant`.
pub(crate) fn sites_read_scope(tenant: &Url) -> String {
	format!("{}/Sites.Read.All", tenant.as_str().trim_end_matches('/'))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphSite {
	web_url: Option<String>,
	site_collection: Option<GraphSiteCollection>,
}

#[derive(Deserialize)]
struct GraphSiteCollection {
	hostname: Option<String>,
}

/// [`SiteResolver`] backed by Microsoft Graph `GET sites/root`.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct GraphSiteResolver {
	client: ReqwestClient,
	graph: Url,
}
#[cfg(feature = "reqwest")]
impl GraphSiteResolver {
	/// Creates a resolver issuing requests against `graph` (a base URL ending in `/`).
	pub fn new(client: ReqwestClient, graph: Url) -> Self {
		Self { client, graph }
	}
}
#[cfg(feature = "reqwest")]
impl SiteResolver for GraphSiteResolver {
	fn resolve_root_site<'a>(&'a self, access_token: &'a TokenSecret) -> SiteFuture<'a> {
		Box::pin(async move {
			let url = self
				.graph
				.join("sites/root?select=webUrl,siteCollection/hostname")
				.map_err(|e| Error::SharePoint { reason: format!("invalid Graph URL: {e}") })?;
			let response = self
				.client
				.get(url)
				.bearer_auth(access_token.expose())
				.send()
				.await
				.map_err(TransportError::graph)?;
			let status = response.status();

			if !status.is_success() {
				return Err(Error::SharePoint {
					reason: format!("Microsoft Graph answered {status}"),
				});
			}

			let body = response.bytes().await.map_err(TransportError::graph)?;

			parse_site(&body)
		})
	}
}

fn parse_site(body: &[u8]) -> Result<SharePointSite> {
	let site: GraphSite = serde_json::from_slice(body)
		.map_err(|e| Error::SharePoint { reason: format!("malformed site response: {e}") })?;
	let unresolved =
		|| Error::SharePoint { reason: "could not resolve default SharePoint tenant".into() };
	let hostname = site.site_collection.and_then(|collection| collection.hostname);
	let (Some(hostname), Some(web_url)) = (hostname, site.web_url) else {
		return Err(unresolved());
	};
	let url = Url::parse(&web_url).map_err(|_| unresolved())?;

	Ok(SharePointSite { hostname, url })
}
