//! Transport primitives shared by the credential issuer and the message dispatcher.
//!
//! Both outbound calls go through [`ReqwestHttpClient`], and both apply a per-request timeout
//! so a stalled upstream cannot pin an inbound request forever. Failure diagnostics are
//! rendered with [`dump_request`] and [`dump_response`], which produce plain-text dumps with
//! credentials redacted.

// std
use std::ops::Deref;
// crates.io
use reqwest::{
	Method, StatusCode,
	header::{AUTHORIZATION, HeaderMap},
	redirect::Policy,
};
// self
use crate::{_prelude::*, error::ConfigError};

/// Default deadline applied to each outbound call.
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token and messaging endpoints answer directly, so the client built by
/// [`ReqwestHttpClient::new`] does not follow redirects.
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Builds a client that refuses redirects.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

/// Renders an outgoing request for diagnostics. The `Authorization` value is redacted.
pub fn dump_request(method: &Method, url: &Url, headers: &HeaderMap, body: &str) -> String {
	let mut out = format!("{method} {url}\n");

	for (name, value) in headers {
		let value = if name == AUTHORIZATION {
			"<redacted>"
		} else {
			value.to_str().unwrap_or("<binary>")
		};

		out.push_str(&format!("{name}: {value}\n"));
	}

	out.push('\n');
	out.push_str(body);

	out
}

/// Renders a received response for diagnostics.
pub fn dump_response(status: StatusCode, headers: &HeaderMap, body: &str) -> String {
	let mut out = format!("HTTP {status}\n");

	for (name, value) in headers {
		out.push_str(&format!("{name}: {}\n", value.to_str().unwrap_or("<binary>")));
	}

	out.push('\n');
	out.push_str(body);

	out
}
