//! Proof Key for Code Exchange (RFC 7636) verifier/challenge pairs.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Secret verifier plus the challenge derived from it.
#[derive(Clone)]
pub struct PkcePair {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	/// Generates a fresh random verifier and its S256 challenge.
	pub fn generate() -> Self {
		let verifier = rand::rng()
			.sample_iter(Alphanumeric)
			.take(PKCE_VERIFIER_LEN)
			.map(char::from)
			.collect::<String>();

		Self::from_verifier(verifier)
	}

	/// Rebuilds a pair from a previously persisted verifier.
	pub fn from_verifier(verifier: impl Into<String>) -> Self {
		let verifier = verifier.into();
		let challenge = compute_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}

	/// Secret verifier sent when redeeming the authorization code.
	pub fn verifier(&self) -> &str {
		&self.verifier
	}

	/// Challenge sent on the authorize URL.
	pub fn challenge(&self) -> &str {
		&self.challenge
	}

	/// Challenge method (currently always `S256`).
	pub fn method(&self) -> PkceCodeChallengeMethod {
		self.method
	}
}
impl Debug for PkcePair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkcePair")
			.field("verifier", &"<redacted>")
			.field("challenge", &self.challenge)
			.field("method", &self.method)
			.finish()
	}
}

fn compute_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn challenge_matches_rfc_7636_appendix_b() {
		let pair = PkcePair::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");

		assert_eq!(pair.challenge(), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
		assert_eq!(pair.method().as_str(), "S256");
	}

	#[test]
	fn generated_pairs_are_unique_and_alphanumeric() {
		let a = PkcePair::generate();
		let b = PkcePair::generate();

		assert_eq!(a.verifier().len(), PKCE_VERIFIER_LEN);
		assert!(a.verifier().chars().all(|c| c.is_ascii_alphanumeric()));
		assert_ne!(a.verifier(), b.verifier());
		assert_eq!(PkcePair::from_verifier(a.verifier()).challenge(), a.challenge());
	}

	#[test]
	fn debug_redacts_verifier() {
		let pair = PkcePair::from_verifier("top-secret-verifier");

		assert!(!format!("{pair:?}").contains("top-secret-verifier"));
	}
}
