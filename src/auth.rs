//! PKCE material, scope lists, and redacted token secrets.

pub mod pkce;
pub mod scope;
pub mod secret;

pub use pkce::*;
pub use scope::*;
pub use secret::*;
