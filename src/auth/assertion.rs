//! RS256-signed JWT assertion presented to the token endpoint.

// crates.io
use jsonwebtoken::{Algorithm, EncodingKey, Header};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, IssuanceError},
};

/// Lifetime of every assertion.
pub const ASSERTION_TTL: Duration = Duration::hours(1);

/// Claims carried by the assertion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
	/// Issuer; the OAuth client identifier.
	pub iss: String,
	/// Subject; the service account the token is issued for.
	pub sub: String,
	/// Issued-at, seconds since the Unix epoch.
	pub iat: i64,
	/// Expiry, seconds since the Unix epoch.
	pub exp: i64,
}
impl AssertionClaims {
	/// Builds claims issued at `now` and expiring [`ASSERTION_TTL`] later.
	pub fn new(client_id: &str, service_account: &str, now: OffsetDateTime) -> Self {
		Self {
			iss: client_id.to_owned(),
			sub: service_account.to_owned(),
			iat: now.unix_timestamp(),
			exp: (now + ASSERTION_TTL).unix_timestamp(),
		}
	}
}

/// Signs assertions with an RSA private key.
#[derive(Clone)]
pub struct AssertionSigner {
	key: Arc<EncodingKey>,
}
impl AssertionSigner {
	/// Parses a PEM-encoded RSA private key (PKCS#1 or PKCS#8).
	pub fn from_rsa_pem(pem: &[u8]) -> Result<Self, ConfigError> {
		let key = EncodingKey::from_rsa_pem(pem)
			.map_err(|source| ConfigError::InvalidPrivateKey { source })?;

		Ok(Self { key: Arc::new(key) })
	}

	/// Produces the compact JWS for the provided claims.
	pub fn sign(&self, claims: &AssertionClaims) -> Result<String, IssuanceError> {
		jsonwebtoken::encode(&Header::new(Algorithm::RS256), claims, &self.key)
			.map_err(IssuanceError::Sign)
	}
}
impl Debug for AssertionSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("AssertionSigner(RS256, <redacted>)")
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::_preludet::TEST_PRIVATE_KEY_PEM;

	#[test]
	fn claims_expire_one_hour_after_issuance() {
		let now = macros::datetime!(2025-03-01 09:00 UTC);
		let claims = AssertionClaims::new("client", "svc@example", now);

		assert_eq!(claims.iss, "client");
		assert_eq!(claims.sub, "svc@example");
		assert_eq!(claims.exp - claims.iat, 3_600);
		assert_eq!(claims.iat, now.unix_timestamp());
	}

	#[test]
	fn signed_assertion_uses_rs256_header() {
		let signer = AssertionSigner::from_rsa_pem(TEST_PRIVATE_KEY_PEM.as_bytes())
			.expect("Fixture key should parse.");
		let claims = AssertionClaims::new("client", "svc", OffsetDateTime::now_utc());
		let jwt = signer.sign(&claims).expect("Signing with the fixture key should succeed.");
		let header = jsonwebtoken::decode_header(&jwt).expect("Signed JWT header should decode.");

		assert_eq!(jwt.split('.').count(), 3);
		assert_eq!(header.alg, Algorithm::RS256);
	}

	#[test]
	fn malformed_key_is_a_config_error() {
		let err = AssertionSigner::from_rsa_pem(b"not a pem")
			.expect_err("Garbage input must not parse as a key.");

		assert!(matches!(err, ConfigError::InvalidPrivateKey { .. }));
	}
}
