//! Token endpoint facade built on the `oauth2` crate.
//!
//! [`TokenClient`] speaks the two grants the provider needs (authorization code with a PKCE
//! verifier, and refresh token) and turns every outcome into a [`TokenGrant`] or a crate
//! [`Error`]. The Microsoft identity platform returns an `id_token` alongside the standard
//! fields, so responses are parsed with [`IdTokenFields`] as the extra-field set.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthorizationCode, Client, ClientId, EndpointNotSet, EndpointSet, ExtraTokenFields,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError, Scope,
	StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
		BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::{ScopeList, TokenSecret},
	error::{ConfigError, TransientError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};

/// Token response carrying the Microsoft identity platform `id_token`.
pub type IdTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

type ConfiguredClient = Client<
	BasicErrorResponse,
	IdTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Extra token response fields returned by the Microsoft identity platform.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenFields {
	/// OpenID Connect identity token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

/// Tokens returned by a successful grant.
#[derive(Clone, Debug)]
pub struct TokenGrant {
	/// Bearer access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, when the endpoint issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Identity token, when the endpoint issued one.
	pub id_token: Option<TokenSecret>,
	/// Lifetime of the access token.
	pub expires_in: Duration,
}

#[derive(Deserialize)]
struct OAuthErrorBody {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
}

/// Public-client facade over the token endpoint.
pub struct TokenClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	oauth_client: ConfiguredClient,
	http_client: Arc<C>,
}
impl<C> TokenClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Builds a facade for `client_id` against `token_endpoint`.
	pub fn new(client_id: &str, token_endpoint: &Url, http_client: Arc<C>) -> Result<Self> {
		let token_url = TokenUrl::new(token_endpoint.to_string()).map_err(|source| {
			ConfigError::InvalidEndpoint { endpoint: "token", source }
		})?;
		let oauth_client = Client::new(ClientId::new(client_id.to_owned()))
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self { oauth_client, http_client })
	}

	/// Redeems an authorization code with its PKCE verifier.
	///
	/// Posts `client_id`, `scope`, `code`, `redirect_uri`, `grant_type=authorization_code`, and
	/// `code_verifier`.
	pub fn exchange_code<'a>(
		&'a self,
		code: &'a str,
		verifier: &'a str,
		scopes: &'a ScopeList,
		redirect_uri: &'a Url,
	) -> FacadeFuture<'a, TokenGrant> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let redirect_url = RedirectUrl::new(redirect_uri.to_string())
				.map_err(|source| ConfigError::InvalidRedirect { source })?;
			let mut request = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_owned()))
				.set_redirect_uri(Cow::Owned(redirect_url));

			if !scopes.is_empty() {
				request = request.add_extra_param("scope", scopes.joined());
			}

			let response = request
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(meta.take(), err))?;

			map_token_response(response)
		})
	}

	/// Exchanges a refresh token for a new token set.
	///
	/// Posts `client_id`, `scope`, `refresh_token`, and `grant_type=refresh_token`.
	pub fn refresh<'a>(
		&'a self,
		refresh_token: &'a str,
		scopes: &'a ScopeList,
	) -> FacadeFuture<'a, TokenGrant> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let secret = RefreshToken::new(refresh_token.to_owned());
			let mut request = self.oauth_client.exchange_refresh_token(&secret);

			for scope in scopes {
				request = request.add_scope(Scope::new(scope.to_owned()));
			}

			let response = request
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(meta.take(), err))?;

			map_token_response(response)
		})
	}
}
impl<C> Debug for TokenClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenClient").field("token_url", &self.oauth_client.token_uri()).finish()
	}
}

fn map_token_response(response: IdTokenResponse) -> Result<TokenGrant> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	Ok(TokenGrant {
		access_token: TokenSecret::new(response.access_token().secret().to_owned()),
		refresh_token: response
			.refresh_token()
			.map(|token| TokenSecret::new(token.secret().to_owned())),
		id_token: response.extra_fields().id_token.clone().map(TokenSecret::new),
		expires_in: Duration::seconds(expires_in),
	})
}

fn map_request_error<E>(
	meta: Option<ResponseMetadata>,
	err: RequestTokenError<HttpClientError<E>, BasicErrorResponse>,
) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => Error::InvalidGrant {
			reason: describe_oauth_error(
				response.error().as_ref(),
				response.error_description().map(String::as_str),
			),
		},
		RequestTokenError::Request(error) => map_transport_error(status, error),
		// A 2xx body that carries `error` instead of tokens is still a provider verdict.
		RequestTokenError::Parse(source, body) =>
			match serde_json::from_slice::<OAuthErrorBody>(&body) {
				Ok(body) => Error::InvalidGrant {
					reason: describe_oauth_error(&body.error, body.error_description.as_deref()),
				},
				Err(_) => TransientError::TokenResponseParse { source, status }.into(),
			},
		RequestTokenError::Other(message) =>
			TransientError::TokenEndpoint { message, status }.into(),
	}
}

fn map_transport_error<E>(status: Option<u16>, err: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) =>
			TransportError::Network { target: "the token endpoint", source: inner }.into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint {
			message: format!(
				"HTTP client error occurred while calling the token endpoint: {message}"
			),
			status,
		}
		.into(),
		_ => TransientError::TokenEndpoint {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status,
		}
		.into(),
	}
}

fn describe_oauth_error(error: &str, description: Option<&str>) -> String {
	match description {
		Some(description) => format!("{error}: {description}"),
		None => error.to_owned(),
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;
	use crate::http::ReqwestHttpClient;

	fn client(server: &MockServer) -> TokenClient<ReqwestHttpClient> {
		let token_url = Url::parse(&server.url("/token")).expect("Mock token URL should parse.");

		TokenClient::new("client-unit", &token_url, Arc::new(ReqwestHttpClient::default()))
			.expect("Token client should build.")
	}

	fn scopes() -> ScopeList {
		ScopeList::new(["openid", "offline_access"]).expect("Scope list should be valid.")
	}

	#[tokio::test]
	async fn exchange_code_posts_pkce_form_and_reads_id_token() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST)
					.path("/token")
					.form_urlencoded_tuple("client_id", "client-unit")
					.form_urlencoded_tuple("grant_type", "authorization_code")
					.form_urlencoded_tuple("code", "code-1")
					.form_urlencoded_tuple("code_verifier", "verifier-1")
					.form_urlencoded_tuple("scope", "openid offline_access")
					.form_urlencoded_tuple("redirect_uri", "https://app.example.com/");
				then.status(200).header("content-type", "application/json").body(
					"{\"access_token\":\"access-1\",\"refresh_token\":\"refresh-1\",\"id_token\":\"id-1\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
				);
			})
			.await;
		let redirect = Url::parse("https://app.example.com/").expect("Redirect URI should parse.");
		let scopes = scopes();
		let grant = client(&server)
			.exchange_code("code-1", "verifier-1", &scopes, &redirect)
			.await
			.expect("Code exchange should succeed.");

		mock.assert_async().await;

		assert_eq!(grant.access_token.expose(), "access-1");
		assert_eq!(grant.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-1"));
		assert_eq!(grant.id_token.as_ref().map(TokenSecret::expose), Some("id-1"));
		assert_eq!(grant.expires_in, Duration::seconds(3600));
	}

	#[tokio::test]
	async fn error_bodies_become_invalid_grant() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/token");
				then.status(200)
					.header("content-type", "application/json")
					.body("{\"error\":\"invalid_grant\",\"error_description\":\"AADSTS70008\"}");
			})
			.await;
		let scopes = scopes();
		let err = client(&server)
			.refresh("refresh-1", &scopes)
			.await
			.expect_err("Error bodies must not yield tokens.");

		mock.assert_async().await;

		assert!(
			matches!(&err, Error::InvalidGrant { reason } if reason == "invalid_grant: AADSTS70008")
		);
	}

	#[tokio::test]
	async fn rejected_refresh_is_invalid_grant() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST)
					.path("/token")
					.form_urlencoded_tuple("grant_type", "refresh_token")
					.form_urlencoded_tuple("refresh_token", "stale");
				then.status(400)
					.header("content-type", "application/json")
					.body("{\"error\":\"invalid_grant\"}");
			})
			.await;
		let scopes = scopes();
		let err = client(&server).refresh("stale", &scopes).await.expect_err("Refresh should fail.");

		mock.assert_async().await;

		assert!(matches!(err, Error::InvalidGrant { .. }));
		assert!(!err.is_transport_failure());
	}

	#[tokio::test]
	async fn malformed_success_bodies_are_transient() {
		let server = MockServer::start_async().await;

		server
			.mock_async(|when, then| {
				when.method(POST).path("/token");
				then.status(200).header("content-type", "application/json").body("{\"nope\":1}");
			})
			.await;

		let scopes = scopes();
		let err = client(&server).refresh("r", &scopes).await.expect_err("Refresh should fail.");

		assert!(matches!(err, Error::Transient(TransientError::TokenResponseParse { .. })));
	}

	#[tokio::test]
	async fn unreachable_endpoints_are_transport_failures() {
		let token_url =
			Url::parse("http://127.0.0.1:9/token").expect("Unreachable token URL should parse.");
		let client = <TokenClient<ReqwestHttpClient>>::new(
			"client-unit",
			&token_url,
			Arc::new(ReqwestHttpClient::default()),
		)
		.expect("Token client should build.");
		let scopes = scopes();
		let err = client.refresh("r", &scopes).await.expect_err("Refresh should fail.");

		assert!(err.is_transport_failure());
	}
}
