#![cfg(feature = "reqwest")]

mod common;

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use httpmock::prelude::*;
// self
use common::*;
use ms365_auth::{
	AuthEvent, AuthStatus, AuthStore, RedeemOutcome, StoreKey,
	error::{ConfigError, Error},
	store::{MemoryStore, StorageEvents, StoreError},
};

// Rejects writes to one slot so a grant can only be half persisted.
struct FailingStore {
	inner: MemoryStore,
	rejected: StoreKey,
}
impl AuthStore for FailingStore {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		self.inner.get(key)
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
		if key == self.rejected.as_str() {
			return Err(StoreError::Backend { message: format!("{key} is read-only") });
		}

		self.inner.set(key, value)
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		self.inner.remove(key)
	}

	fn subscribe(&self) -> StorageEvents {
		self.inner.subscribe()
	}
}

fn token_mock_body() -> String {
	token_body("access-1", Some("refresh-1"), Some("id-1"), 3_600)
}

#[tokio::test]
async fn redeemed_code_persists_the_session_and_signs_in_once() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "XYZ")
				.form_urlencoded_tuple("client_id", CLIENT_ID);
			then.status(200).header("content-type", "application/json").body(token_mock_body());
		})
		.await;
	let store = Arc::new(MemoryStore::new());
	let provider = builder(config(&server), store.clone(), FakeWindow::at(APP_URL))
		.build()
		.expect("Provider should build.");
	let sign_ins = count_events(&provider.events, AuthEvent::SignIn);

	store.set(StoreKey::Code.as_str(), "XYZ").expect("Seeding the code should succeed.");
	store
		.set(StoreKey::Status.as_str(), AuthStatus::ResolvingPopup.as_str())
		.expect("Seeding the status should succeed.");

	let outcome = provider.acquire_token_via_code("XYZ").await;

	mock.assert_async().await;

	assert!(outcome.is_signed_in(), "Redemption should succeed, got {outcome:?}.");
	assert_eq!(slot(store.as_ref(), StoreKey::AccessToken).as_deref(), Some("access-1"));
	assert_eq!(slot(store.as_ref(), StoreKey::RefreshToken).as_deref(), Some("refresh-1"));
	assert_eq!(slot(store.as_ref(), StoreKey::IdToken).as_deref(), Some("id-1"));

	let expected_expiry = epoch().unix_timestamp() + 3_600;

	assert_eq!(
		slot(store.as_ref(), StoreKey::ExpiryTimestamp),
		Some(expected_expiry.to_string())
	);
	assert_eq!(
		provider.access_token_expires_at().map(|at| at.unix_timestamp()),
		Some(expected_expiry)
	);

	for key in StoreKey::TEMPORARY {
		assert_eq!(slot(store.as_ref(), key), None, "{key} should be cleared after redemption.");
	}

	assert_eq!(read(&sign_ins), 1);
}

#[tokio::test]
async fn redirect_redemption_uses_the_stored_verifier() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("code", "XYZ")
				.form_urlencoded_tuple("code_verifier", "v-1");
			then.status(200).header("content-type", "application/json").body(token_mock_body());
		})
		.await;
	let store = Arc::new(MemoryStore::new());
	let provider = builder(config(&server), store.clone(), FakeWindow::at(APP_URL))
		.build()
		.expect("Provider should build.");

	store.set(StoreKey::Verifier.as_str(), "v-1").expect("Seeding the verifier should succeed.");
	store
		.set(StoreKey::Status.as_str(), AuthStatus::ResolvingRedirect.as_str())
		.expect("Seeding the status should succeed.");

	let outcome = provider.acquire_token_via_code("XYZ").await;

	mock.assert_async().await;

	assert!(outcome.is_signed_in(), "Redemption should succeed, got {outcome:?}.");
	assert_eq!(slot(store.as_ref(), StoreKey::Verifier), None);
}

#[tokio::test]
async fn error_responses_leave_existing_tokens_untouched() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"error\":\"invalid_grant\",\"error_description\":\"AADSTS70008: expired code\"}",
			);
		})
		.await;
	let store = Arc::new(MemoryStore::new());
	let provider = builder(config(&server), store.clone(), FakeWindow::at(APP_URL))
		.build()
		.expect("Provider should build.");
	let sign_ins = count_events(&provider.events, AuthEvent::SignIn);

	seed_session(store.as_ref(), "access-old", "refresh-old", "id-old", 1_000);
	store
		.set(StoreKey::Status.as_str(), AuthStatus::ResolvingPopup.as_str())
		.expect("Seeding the status should succeed.");

	let outcome = provider.acquire_token_via_code("XYZ").await;

	mock.assert_async().await;

	match outcome {
		RedeemOutcome::Abandoned(Error::InvalidGrant { reason }) =>
			assert!(reason.starts_with("invalid_grant"), "Unexpected reason {reason}."),
		other => panic!("Expected an invalid grant, got {other:?}."),
	}

	assert_eq!(slot(store.as_ref(), StoreKey::AccessToken).as_deref(), Some("access-old"));
	assert_eq!(slot(store.as_ref(), StoreKey::RefreshToken).as_deref(), Some("refresh-old"));
	assert_eq!(slot(store.as_ref(), StoreKey::Status), None);
	assert_eq!(read(&sign_ins), 0);
}

#[tokio::test]
async fn unavailable_storage_abandons_before_any_request() {
	let store = Arc::new(MemoryStore::new());
	let provider = builder(offline_config(), store.clone(), FakeWindow::at(APP_URL))
		.build()
		.expect("Provider should build.");
	let sign_ins = count_events(&provider.events, AuthEvent::SignIn);

	store.set_available(false);

	let outcome = provider.acquire_token_via_code("XYZ").await;

	assert!(
		matches!(outcome, RedeemOutcome::Abandoned(Error::StorageUnavailable)),
		"Unavailable storage should abandon the attempt, got {outcome:?}."
	);
	assert_eq!(slot(store.as_ref(), StoreKey::AccessToken), None);
	assert_eq!(read(&sign_ins), 0);
}

#[tokio::test]
async fn sign_in_callbacks_run_once_and_can_be_detached() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(token_mock_body());
		})
		.await;

	let provider = builder(config(&server), Arc::new(MemoryStore::new()), FakeWindow::at(APP_URL))
		.build()
		.expect("Provider should build.");
	let fired = Arc::new(AtomicUsize::new(0));
	let detached = {
		let fired = fired.clone();

		provider.do_on_sign_in(move || {
			fired.fetch_add(100, Ordering::SeqCst);
		})
	};
	let _kept = {
		let fired = fired.clone();

		provider.do_on_sign_in(move || {
			fired.fetch_add(1, Ordering::SeqCst);
		})
	};

	detached.unsubscribe();

	assert!(provider.acquire_token_via_code("first").await.is_signed_in());
	assert!(provider.acquire_token_via_code("second").await.is_signed_in());
	assert_eq!(read(&fired), 1);
	assert_eq!(provider.events.listener_count(AuthEvent::SignIn), 0);
}

#[tokio::test]
async fn out_of_range_lifetimes_abandon_without_touching_the_session() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-1", Some("refresh-1"), Some("id-1"), i64::MAX));
		})
		.await;
	let store = Arc::new(MemoryStore::new());
	let provider = builder(config(&server), store.clone(), FakeWindow::at(APP_URL))
		.build()
		.expect("Provider should build.");
	let sign_ins = count_events(&provider.events, AuthEvent::SignIn);

	seed_session(store.as_ref(), "access-old", "refresh-old", "id-old", 1_000);

	let outcome = provider.acquire_token_via_code("XYZ").await;

	mock.assert_async().await;

	match outcome {
		RedeemOutcome::Abandoned(Error::Config(ConfigError::ExpiresInOutOfRange)) => {},
		other => panic!("Expected an out-of-range lifetime, got {other:?}."),
	}

	assert_eq!(slot(store.as_ref(), StoreKey::AccessToken).as_deref(), Some("access-old"));
	assert_eq!(slot(store.as_ref(), StoreKey::IdToken).as_deref(), Some("id-old"));
	assert_eq!(slot(store.as_ref(), StoreKey::ExpiryTimestamp).as_deref(), Some("1000"));
	assert_eq!(read(&sign_ins), 0);
}

#[tokio::test]
async fn failed_writes_leave_no_partial_session() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(token_mock_body());
		})
		.await;

	let store =
		Arc::new(FailingStore { inner: MemoryStore::new(), rejected: StoreKey::AccessToken });
	let provider = builder(config(&server), store.clone(), FakeWindow::at(APP_URL))
		.build()
		.expect("Provider should build.");
	let sign_ins = count_events(&provider.events, AuthEvent::SignIn);

	store
		.set(StoreKey::Status.as_str(), AuthStatus::ResolvingPopup.as_str())
		.expect("Seeding the status should succeed.");

	let outcome = provider.acquire_token_via_code("XYZ").await;

	assert!(
		matches!(outcome, RedeemOutcome::Abandoned(Error::Storage(_))),
		"Unexpected outcome {outcome:?}."
	);

	for key in StoreKey::SESSION.into_iter().chain(StoreKey::TEMPORARY) {
		assert_eq!(slot(store.as_ref(), key), None, "{key} should not survive a failed write.");
	}

	assert_eq!(read(&sign_ins), 0);
}
