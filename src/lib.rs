//! Microsoft identity platform sign-in for browser-style hosts: PKCE authorization code over a
//! popup, a full-page redirect, or a host-app tab, with durable token state, cross-window
//! hand-off, and transparent refresh.
//!
//! The crate never touches a real browser. Hosts plug in a [`BrowserWindow`](env::BrowserWindow),
//! an [`AuthStore`] shared by the windows of one origin, and optionally a
//! [`HostTabs`](env::HostTabs) capability; [`AuthProvider`] drives the rest.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod clock;
pub mod config;
pub mod env;
pub mod error;
pub mod event;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod sharepoint;
pub mod store;
pub mod task;

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};

pub use crate::{
	config::AuthConfig,
	event::{AuthEvent, EventBus, Subscription},
	flows::{AuthProvider, LoginAttempt, RedeemOutcome, RefreshOutcome, ResumeOutcome},
	store::{AuthStatus, AuthStore, StoreKey},
};
#[cfg(feature = "reqwest")] pub use crate::flows::ReqwestAuthProvider;
