//! Host capabilities the sign-in flows drive, and transport selection over them.
//!
//! The provider never touches a browser directly. It talks to a [`BrowserWindow`] (location,
//! history, popups), optionally to a [`HostTabs`] capability exposed by an embedding app, and
//! picks a [`LoginTransport`] from an [`Environment`] descriptor once per login.

// self
use crate::_prelude::*;

/// Boxed future returned by [`HostTabs::open_with_callback`].
pub type HostTabFuture<'a> = Pin<Box<dyn Future<Output = Option<Url>> + 'a + Send>>;

/// The window the provider lives in.
pub trait BrowserWindow: Send + Sync {
	/// Current location (including query string).
	fn location(&self) -> Url;

	/// Navigates the window away, replacing the current history entry.
	fn replace_location(&self, url: &Url);

	/// Rewrites the visible URL without navigating.
	fn push_state(&self, url: &Url);

	/// Opens a secondary window; `None` when the host blocked it.
	fn open_popup(&self, url: &Url, features: &str) -> Option<Arc<dyn PopupWindow>>;

	/// Closes this window (used by the popup once it captured the code).
	fn close(&self);
}

/// Handle to a popup opened through [`BrowserWindow::open_popup`].
pub trait PopupWindow: Send + Sync {
	/// Whether the popup has been closed, by the user or by itself.
	fn is_closed(&self) -> bool;
}

/// Native tab-opening capability of an embedding host app.
pub trait HostTabs: Send + Sync {
	/// Opens `url` in a host-managed tab and resolves with the first navigated URL matching
	/// `pattern` (a prefix followed by `*`), or `None` if the user dismissed the tab.
	fn open_with_callback<'a>(&'a self, url: &'a Url, pattern: &'a str) -> HostTabFuture<'a>;
}

/// Sign-in transport, resolved once per login.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoginTransport {
	/// Host-app tab with a callback pattern.
	HostMediated,
	/// Full-page redirect.
	Redirect,
	/// Secondary popup window coordinated through storage events.
	Popup,
}
impl LoginTransport {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LoginTransport::HostMediated => "host_mediated",
			LoginTransport::Redirect => "redirect",
			LoginTransport::Popup => "popup",
		}
	}
}
impl Display for LoginTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Capability descriptor for the current host.
#[derive(Clone, Default)]
pub struct Environment {
	/// Browser user agent, when known.
	pub user_agent: Option<String>,
	/// Embedding host app capability, when running inside one.
	pub host: Option<Arc<dyn HostTabs>>,
}
impl Environment {
	/// Describes a plain browser identified by its user agent.
	pub fn browser(user_agent: impl Into<String>) -> Self {
		Self { user_agent: Some(user_agent.into()), host: None }
	}

	/// Describes an embedding host app.
	pub fn hosted(host: Arc<dyn HostTabs>) -> Self {
		Self { user_agent: None, host: Some(host) }
	}

	/// Whether the user agent is Internet Explorer or EdgeHTML, where popups cannot rely on
	/// storage events reaching the opener.
	pub fn is_legacy_browser(&self) -> bool {
		self.user_agent.as_deref().is_some_and(|ua| {
			ua.contains("MSIE ") || ua.contains("Trident/") || ua.contains("Edge/")
		})
	}

	/// Picks the transport: host app first, then redirect for legacy browsers, popup otherwise.
	pub fn login_transport(&self) -> LoginTransport {
		if self.host.is_some() {
			LoginTransport::HostMediated
		} else if self.is_legacy_browser() {
			LoginTransport::Redirect
		} else {
			LoginTransport::Popup
		}
	}
}
impl Debug for Environment {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Environment")
			.field("user_agent", &self.user_agent)
			.field("host", &self.host.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	struct NeverHost;
	impl HostTabs for NeverHost {
		fn open_with_callback<'a>(&'a self, _url: &'a Url, _pattern: &'a str) -> HostTabFuture<'a> {
			Box::pin(async { None })
		}
	}

	const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
	const IE11: &str = "Mozilla/5.0 (Windows NT 10.0; WOW64; Trident/7.0; rv:11.0) like Gecko";
	const EDGE_HTML: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/70.0.3538.102 Safari/537.36 Edge/18.19582";
	const IE10: &str = "Mozilla/5.0 (compatible; MSIE 10.0; Windows NT 6.1; Trident/6.0)";

	#[test]
	fn modern_browsers_use_popups() {
		assert_eq!(Environment::browser(CHROME).login_transport(), LoginTransport::Popup);
		assert_eq!(Environment::default().login_transport(), LoginTransport::Popup);
	}

	#[test]
	fn legacy_browsers_use_redirects() {
		for ua in [IE11, EDGE_HTML, IE10] {
			let env = Environment::browser(ua);

			assert!(env.is_legacy_browser(), "{ua} should count as legacy.");
			assert_eq!(env.login_transport(), LoginTransport::Redirect);
		}
	}

	#[test]
	fn host_capability_wins_over_user_agent() {
		let mut env = Environment::hosted(Arc::new(NeverHost));

		env.user_agent = Some(IE11.into());

		assert_eq!(env.login_transport(), LoginTransport::HostMediated);
	}
}
