//! The sign-in state machine.
//!
//! [`AuthProvider`] owns the in-memory PKCE pair and drives every transition of the durable
//! status slot. Each operation lives in its own submodule: page-load [`resume`], interactive
//! [`login`], code [`redeem`]ption, token [`refresh`], the [`session`] accessors and logout,
//! and the [`sharepoint`] helpers.

pub mod common;
pub mod login;
pub mod redeem;
pub mod refresh;
pub mod resume;
pub mod session;
pub mod sharepoint;

pub use login::*;
pub use redeem::*;
pub use refresh::*;
pub use resume::*;

// std
use std::sync::atomic::AtomicU64;
// crates.io
use tokio::{runtime::Handle, task::AbortHandle};
// self
use crate::{
	_prelude::*,
	auth::PkcePair,
	clock::{Clock, SystemClock},
	config::AuthConfig,
	env::{BrowserWindow, Environment},
	error::ConfigError,
	event::EventBus,
	http::TokenHttpClient,
	oauth::TokenClient,
	sharepoint::SiteResolver,
	store::{AuthStore, MemoryStore},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, sharepoint::GraphSiteResolver};

#[cfg(feature = "reqwest")]
/// Provider specialized for the crate's default reqwest transport.
pub type ReqwestAuthProvider = AuthProvider<ReqwestHttpClient>;

/// Microsoft identity platform sign-in for one window.
///
/// Clones share every piece of state, so a clone handed to a background task observes the
/// same PKCE pair, store, and event bus as the provider it was cloned from.
pub struct AuthProvider<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Validated client configuration.
	pub config: Arc<AuthConfig>,
	/// Durable state shared with the other windows of the origin.
	pub store: Arc<dyn AuthStore>,
	/// The window this provider lives in.
	pub window: Arc<dyn BrowserWindow>,
	/// Host capabilities used to pick a login transport.
	pub environment: Environment,
	/// Window-wide event bus.
	pub events: Arc<EventBus>,
	/// Time source for expiry arithmetic.
	pub clock: Arc<dyn Clock>,
	token_client: Arc<TokenClient<C>>,
	site_resolver: Option<Arc<dyn SiteResolver>>,
	runtime: Handle,
	pkce: Arc<RwLock<PkcePair>>,
	refresh_guard: Arc<AsyncMutex<()>>,
	refresh_generation: Arc<AtomicU64>,
	pending_login: Arc<Mutex<Vec<AbortHandle>>>,
}
impl<C> AuthProvider<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Starts a builder that uses the caller-provided token transport.
	pub fn with_http_client(
		config: AuthConfig,
		http_client: impl Into<Arc<C>>,
	) -> AuthProviderBuilder<C> {
		AuthProviderBuilder::new(config, http_client.into())
	}
}
#[cfg(feature = "reqwest")]
impl AuthProvider<ReqwestHttpClient> {
	/// Starts a builder backed by a default reqwest client, resolving SharePoint sites through
	/// the configured Graph endpoint.
	pub fn builder(config: AuthConfig) -> AuthProviderBuilder<ReqwestHttpClient> {
		Self::builder_with_client(config, ReqwestHttpClient::default())
	}

	/// Same as [`builder`](Self::builder) with a caller-configured reqwest client.
	pub fn builder_with_client(
		config: AuthConfig,
		http_client: ReqwestHttpClient,
	) -> AuthProviderBuilder<ReqwestHttpClient> {
		let resolver = GraphSiteResolver::new(http_client.0.clone(), config.endpoints.graph.clone());

		AuthProviderBuilder::new(config, Arc::new(http_client)).site_resolver(Arc::new(resolver))
	}
}
impl<C> Clone for AuthProvider<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			store: self.store.clone(),
			window: self.window.clone(),
			environment: self.environment.clone(),
			events: self.events.clone(),
			clock: self.clock.clone(),
			token_client: self.token_client.clone(),
			site_resolver: self.site_resolver.clone(),
			runtime: self.runtime.clone(),
			pkce: self.pkce.clone(),
			refresh_guard: self.refresh_guard.clone(),
			refresh_generation: self.refresh_generation.clone(),
			pending_login: self.pending_login.clone(),
		}
	}
}
impl<C> Debug for AuthProvider<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthProvider")
			.field("client_id", &self.config.client_id)
			.field("environment", &self.environment)
			.field("site_resolver_set", &self.site_resolver.is_some())
			.finish()
	}
}

/// Assembles an [`AuthProvider`] from its capabilities.
pub struct AuthProviderBuilder<C>
where
	C: ?Sized + TokenHttpClient,
{
	config: AuthConfig,
	http_client: Arc<C>,
	store: Option<Arc<dyn AuthStore>>,
	window: Option<Arc<dyn BrowserWindow>>,
	environment: Environment,
	events: Option<Arc<EventBus>>,
	clock: Option<Arc<dyn Clock>>,
	site_resolver: Option<Arc<dyn SiteResolver>>,
	runtime: Option<Handle>,
}
impl<C> AuthProviderBuilder<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn new(config: AuthConfig, http_client: Arc<C>) -> Self {
		Self {
			config,
			http_client,
			store: None,
			window: None,
			environment: Environment::default(),
			events: None,
			clock: None,
			site_resolver: None,
			runtime: None,
		}
	}

	/// Durable store; defaults to a fresh [`MemoryStore`].
	pub fn store(mut self, store: Arc<dyn AuthStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// The window the provider lives in (required).
	pub fn window(mut self, window: Arc<dyn BrowserWindow>) -> Self {
		self.window = Some(window);

		self
	}

	/// Host capability descriptor used for transport selection.
	pub fn environment(mut self, environment: Environment) -> Self {
		self.environment = environment;

		self
	}

	/// Event bus shared with the rest of the window; defaults to a private bus.
	pub fn events(mut self, events: Arc<EventBus>) -> Self {
		self.events = Some(events);

		self
	}

	/// Time source; defaults to [`SystemClock`].
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = Some(clock);

		self
	}

	/// Collaborator resolving the default SharePoint site.
	pub fn site_resolver(mut self, resolver: Arc<dyn SiteResolver>) -> Self {
		self.site_resolver = Some(resolver);

		self
	}

	/// Runtime for background tasks; defaults to the runtime of the building thread.
	pub fn runtime(mut self, runtime: Handle) -> Self {
		self.runtime = Some(runtime);

		self
	}

	/// Validates the capabilities and creates the provider without touching the store.
	pub fn build(self) -> Result<AuthProvider<C>> {
		let window = self.window.ok_or(ConfigError::MissingCapability { capability: "window" })?;
		let runtime = match self.runtime {
			Some(runtime) => runtime,
			None => Handle::try_current().map_err(|_| ConfigError::MissingRuntime)?,
		};
		let token_client = TokenClient::new(
			&self.config.client_id,
			&self.config.endpoints.token,
			self.http_client,
		)?;

		Ok(AuthProvider {
			config: Arc::new(self.config),
			store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
			window,
			environment: self.environment,
			events: self.events.unwrap_or_else(EventBus::new),
			clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
			token_client: Arc::new(token_client),
			site_resolver: self.site_resolver,
			runtime,
			pkce: Arc::new(RwLock::new(PkcePair::generate())),
			refresh_guard: Arc::new(AsyncMutex::new(())),
			refresh_generation: Arc::new(AtomicU64::new(0)),
			pending_login: Arc::new(Mutex::new(Vec::new())),
		})
	}

	/// Builds the provider and runs [`AuthProvider::resume`] for the current page load.
	pub async fn start(self) -> Result<(AuthProvider<C>, ResumeOutcome)> {
		let provider = self.build()?;
		let outcome = provider.resume().await;

		Ok((provider, outcome))
	}
}
impl<C> Debug for AuthProviderBuilder<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthProviderBuilder")
			.field("client_id", &self.config.client_id)
			.field("store_set", &self.store.is_some())
			.field("window_set", &self.window.is_some())
			.finish()
	}
}
