//! Credential issuance via the JWT-bearer grant.
//!
//! [`CredentialIssuer::issue_token`] signs a one-hour assertion for the configured service
//! account and exchanges it at the token endpoint. The issuer never consults or populates the
//! token cache; [`Relay`](crate::relay::Relay) decides when issuance is needed and persists
//! the result.

// crates.io
use reqwest::header::CONTENT_TYPE;
// self
use crate::{
	_prelude::*,
	auth::{AssertionClaims, AssertionSigner, BearerToken},
	config::ServiceCredentials,
	error::{ConfigError, IssuanceError, TransportError},
	http::{DEFAULT_TIMEOUT, ReqwestHttpClient},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Grant type sent with every exchange.
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

const ENDPOINT: &str = "token endpoint";

/// Success or error body returned by the token endpoint. Both shapes share one struct since
/// the provider signals errors with a `code` field.
#[derive(Debug, Default, Deserialize)]
struct TokenResponse {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	token_type: Option<String>,
	#[serde(default)]
	expires_in: Option<ExpiresIn>,
	#[serde(default)]
	code: Option<String>,
	#[serde(default)]
	message: Option<String>,
	#[serde(default)]
	detail: Option<String>,
}

/// The provider sends `expires_in` as a string; standard servers send a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
	Seconds(i64),
	Text(String),
}
impl ExpiresIn {
	fn seconds(&self) -> Option<i64> {
		match self {
			Self::Seconds(secs) => Some(*secs),
			Self::Text(raw) => raw.trim().parse().ok(),
		}
	}
}

/// Exchanges signed assertions for bearer tokens.
#[derive(Clone, Debug)]
pub struct CredentialIssuer {
	http_client: ReqwestHttpClient,
	token_endpoint: Url,
	credentials: ServiceCredentials,
	signer: AssertionSigner,
	timeout: std::time::Duration,
}
impl CredentialIssuer {
	/// Creates an issuer; fails if `private_key_pem` is not an RSA private key.
	pub fn new(
		http_client: ReqwestHttpClient,
		token_endpoint: Url,
		credentials: ServiceCredentials,
		private_key_pem: &[u8],
	) -> Result<Self, ConfigError> {
		Ok(Self {
			http_client,
			token_endpoint,
			credentials,
			signer: AssertionSigner::from_rsa_pem(private_key_pem)?,
			timeout: DEFAULT_TIMEOUT,
		})
	}

	/// Overrides the exchange timeout (defaults to 30 seconds).
	pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Token endpoint this issuer posts to.
	pub fn token_endpoint(&self) -> &Url {
		&self.token_endpoint
	}

	/// Signs a fresh assertion and exchanges it for a bearer token.
	pub async fn issue_token(&self) -> Result<BearerToken> {
		const KIND: FlowKind = FlowKind::Issue;

		let span = FlowSpan::new(KIND, "issue_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.exchange()).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(e) => {
				tracing::warn!(error = %e, "Token issuance failed.");
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	async fn exchange(&self) -> Result<BearerToken> {
		let now = OffsetDateTime::now_utc();
		let claims = AssertionClaims::new(
			&self.credentials.client_id,
			&self.credentials.service_account,
			now,
		);
		let assertion = self.signer.sign(&claims)?;
		let form = [
			("grant_type", JWT_BEARER_GRANT),
			("assertion", assertion.as_str()),
			("client_id", self.credentials.client_id.as_str()),
			("client_secret", self.credentials.client_secret.expose()),
			("scope", self.credentials.scope.as_str()),
		];
		let response = self
			.http_client
			.post(self.token_endpoint.clone())
			.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
			.form(&form)
			.timeout(self.timeout)
			.send()
			.await
			.map_err(|e| TransportError::from_reqwest(ENDPOINT, e))?;
		let status = response.status();
		let bytes =
			response.bytes().await.map_err(|e| TransportError::from_reqwest(ENDPOINT, e))?;

		if !status.is_success() {
			return Err(IssuanceError::Status {
				status: status.as_u16(),
				body: String::from_utf8_lossy(&bytes).into_owned(),
			}
			.into());
		}

		let parsed = parse_token_response(&bytes, status.as_u16())?;
		let access_token = parsed
			.access_token
			.filter(|token| !token.is_empty())
			.ok_or(IssuanceError::MissingAccessToken)?;

		tracing::debug!(
			token_type = parsed.token_type.as_deref().unwrap_or_default(),
			expires_in = parsed.expires_in.as_ref().and_then(ExpiresIn::seconds),
			"Bearer token issued."
		);

		Ok(BearerToken::new(access_token, OffsetDateTime::now_utc()))
	}
}

fn parse_token_response(bytes: &[u8], status: u16) -> Result<TokenResponse, IssuanceError> {
	let mut de = serde_json::Deserializer::from_slice(bytes);
	let parsed: TokenResponse = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| IssuanceError::ResponseParse { source, status })?;

	match parsed.code.as_deref() {
		Some(code) if !code.is_empty() => Err(IssuanceError::Rejected {
			code: code.to_owned(),
			message: parsed.message.unwrap_or_default(),
			detail: parsed.detail.unwrap_or_default(),
		}),
		_ => Ok(parsed),
	}
}
