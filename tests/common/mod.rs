//! Fakes shared by the integration tests: a scriptable window, popup, and host app.

#![allow(dead_code)]

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use httpmock::MockServer;
use parking_lot::Mutex;
use time::{OffsetDateTime, macros::datetime};
use url::Url;
// self
use ms365_auth::{
	AuthConfig, AuthEvent, AuthStore, EventBus, ReqwestAuthProvider, StoreKey,
	clock::ManualClock,
	env::{BrowserWindow, HostTabFuture, HostTabs, PopupWindow},
	flows::AuthProviderBuilder,
	http::ReqwestHttpClient,
};

pub const APP_URL: &str = "https://app.example.com/";
pub const CLIENT_ID: &str = "client-it";
pub const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const IE11_UA: &str = "Mozilla/5.0 (Windows NT 10.0; WOW64; Trident/7.0; rv:11.0) like Gecko";
pub const UNREACHABLE_TOKEN_URL: &str = "http://127.0.0.1:9/token";

pub fn url(raw: &str) -> Url {
	Url::parse(raw).expect("Test URL should parse.")
}

pub fn config_with_token_url(token_url: &str, graph_url: &str) -> AuthConfig {
	AuthConfig::builder(CLIENT_ID)
		.scopes(["openid", "offline_access", "User.Read"])
		.redirect_uri(APP_URL)
		.token_endpoint(token_url)
		.graph_endpoint(graph_url)
		.popup_poll_interval(StdDuration::from_millis(300))
		.build()
		.expect("Test configuration should be valid.")
}

pub fn config(server: &MockServer) -> AuthConfig {
	config_with_token_url(&server.url("/token"), &server.url("/graph/v1.0/"))
}

pub fn offline_config() -> AuthConfig {
	config_with_token_url(UNREACHABLE_TOKEN_URL, "https://graph.microsoft.com/v1.0/")
}

pub fn epoch() -> OffsetDateTime {
	datetime!(2025-11-10 12:00 UTC)
}

pub fn builder(
	config: AuthConfig,
	store: Arc<dyn AuthStore>,
	window: Arc<FakeWindow>,
) -> AuthProviderBuilder<ReqwestHttpClient> {
	ReqwestAuthProvider::builder(config)
		.store(store)
		.window(window)
		.clock(Arc::new(ManualClock::new(epoch())))
}

pub fn token_body(access: &str, refresh: Option<&str>, id: Option<&str>, expires_in: i64) -> String {
	let mut body = serde_json::json!({
		"access_token": access,
		"token_type": "Bearer",
		"expires_in": expires_in,
	});

	if let Some(refresh) = refresh {
		body["refresh_token"] = refresh.into();
	}
	if let Some(id) = id {
		body["id_token"] = id.into();
	}

	body.to_string()
}

pub fn seed_session(store: &dyn AuthStore, access: &str, refresh: &str, id: &str, expiry: i64) {
	for (key, value) in [
		(StoreKey::AccessToken, access.to_owned()),
		(StoreKey::RefreshToken, refresh.to_owned()),
		(StoreKey::IdToken, id.to_owned()),
		(StoreKey::ExpiryTimestamp, expiry.to_string()),
	] {
		store.set(key.as_str(), &value).expect("Seeding the store should succeed.");
	}
}

pub fn slot(store: &dyn AuthStore, key: StoreKey) -> Option<String> {
	store.get(key.as_str()).expect("Store reads should succeed.")
}

/// Counts every dispatch of `event` without detaching.
pub fn count_events(bus: &EventBus, event: AuthEvent) -> Arc<AtomicUsize> {
	let count = Arc::new(AtomicUsize::new(0));
	let seen = count.clone();

	bus.add_listener(
		event,
		false,
		Arc::new(move |_| {
			seen.fetch_add(1, Ordering::SeqCst);
		}),
	);

	count
}

pub fn read(count: &AtomicUsize) -> usize {
	count.load(Ordering::SeqCst)
}

#[derive(Debug, Default)]
pub struct FakePopup {
	closed: AtomicBool,
}
impl FakePopup {
	pub fn close(&self) {
		self.closed.store(true, Ordering::SeqCst);
	}
}
impl PopupWindow for FakePopup {
	fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}
}

#[derive(Debug)]
pub struct FakeWindow {
	location: Mutex<Url>,
	pushed: Mutex<Vec<Url>>,
	replaced: Mutex<Vec<Url>>,
	opened: Mutex<Vec<(Url, String)>>,
	popup: Mutex<Option<Arc<FakePopup>>>,
	block_popups: AtomicBool,
	closed: AtomicBool,
}
impl FakeWindow {
	pub fn at(location: &str) -> Arc<Self> {
		Arc::new(Self {
			location: Mutex::new(url(location)),
			pushed: Mutex::default(),
			replaced: Mutex::default(),
			opened: Mutex::default(),
			popup: Mutex::default(),
			block_popups: AtomicBool::new(false),
			closed: AtomicBool::new(false),
		})
	}

	pub fn blocking_popups(location: &str) -> Arc<Self> {
		let window = Self::at(location);

		window.block_popups.store(true, Ordering::SeqCst);

		window
	}

	pub fn location_now(&self) -> Url {
		self.location.lock().clone()
	}

	pub fn pushed(&self) -> Vec<Url> {
		self.pushed.lock().clone()
	}

	pub fn replaced(&self) -> Vec<Url> {
		self.replaced.lock().clone()
	}

	pub fn opened(&self) -> Vec<(Url, String)> {
		self.opened.lock().clone()
	}

	pub fn popup(&self) -> Option<Arc<FakePopup>> {
		self.popup.lock().clone()
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}
}
impl BrowserWindow for FakeWindow {
	fn location(&self) -> Url {
		self.location.lock().clone()
	}

	fn replace_location(&self, url: &Url) {
		self.replaced.lock().push(url.clone());
		*self.location.lock() = url.clone();
	}

	fn push_state(&self, url: &Url) {
		self.pushed.lock().push(url.clone());
		*self.location.lock() = url.clone();
	}

	fn open_popup(&self, url: &Url, features: &str) -> Option<Arc<dyn PopupWindow>> {
		if self.block_popups.load(Ordering::SeqCst) {
			return None;
		}

		let popup = Arc::new(FakePopup::default());

		self.opened.lock().push((url.clone(), features.to_owned()));
		*self.popup.lock() = Some(popup.clone());

		Some(popup)
	}

	fn close(&self) {
		self.closed.store(true, Ordering::SeqCst);
	}
}

#[derive(Debug, Default)]
pub struct FakeHost {
	callback: Option<Url>,
	requests: Mutex<Vec<(Url, String)>>,
}
impl FakeHost {
	pub fn answering(callback: Option<&str>) -> Arc<Self> {
		Arc::new(Self { callback: callback.map(url), requests: Mutex::default() })
	}

	pub fn requests(&self) -> Vec<(Url, String)> {
		self.requests.lock().clone()
	}
}
impl HostTabs for FakeHost {
	fn open_with_callback<'a>(&'a self, url: &'a Url, pattern: &'a str) -> HostTabFuture<'a> {
		self.requests.lock().push((url.clone(), pattern.to_owned()));

		let callback = self.callback.clone();

		Box::pin(async move { callback })
	}
}
