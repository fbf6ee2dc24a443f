//! Relay-level error types shared across the issuer, dispatcher, stores, and HTTP surface.

// self
use crate::_prelude::*;

/// Relay-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical relay error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token endpoint refused or garbled the credential exchange.
	#[error(transparent)]
	Issuance(#[from] IssuanceError),
	/// Messaging endpoint rejected the message.
	#[error(transparent)]
	Dispatch(#[from] DispatchError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Inbound request carried a malformed identifier.
	#[error("Invalid request: {0}")]
	InvalidRequest(#[from] crate::auth::IdentifierError),
}

/// Configuration and validation failures raised while assembling the relay.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Environment-backed settings could not be loaded.
	#[error("Configuration could not be loaded: {0}.")]
	Load(#[from] ::config::ConfigError),
	/// Neither an inline key nor a key path was configured.
	#[error("Either PRIVATE_KEY or PRIVATE_KEY_PATH must be set.")]
	MissingPrivateKey,
	/// Private key file could not be read.
	#[error("Private key could not be read from {path}.")]
	PrivateKeyRead {
		/// Path that was attempted.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Private key is not a usable RSA PEM.
	#[error("Private key is not a valid RSA PEM.")]
	InvalidPrivateKey {
		/// Underlying key parsing failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// A configured endpoint is not a valid absolute URL.
	#[error("Endpoint `{value}` is invalid.")]
	InvalidEndpoint {
		/// Offending value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A configured identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Listen address could not be parsed.
	#[error("Bind address `{0}` is invalid.")]
	InvalidBindAddr(String),
	/// Listener could not be bound or served.
	#[error("Server failed: {0}.")]
	Serve(#[source] std::io::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<reqwest::Error> for ConfigError {
	fn from(e: reqwest::Error) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures raised while exchanging a signed assertion for a bearer token.
#[derive(Debug, ThisError)]
pub enum IssuanceError {
	/// The assertion could not be signed.
	#[error("Assertion could not be signed.")]
	Sign(#[source] jsonwebtoken::errors::Error),
	/// Token endpoint answered with a non-success status.
	#[error("Token endpoint returned status {status}: {body}")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Raw response body for diagnostics.
		body: String,
	},
	/// Token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code.
		status: u16,
	},
	/// Token endpoint reported an error payload.
	#[error(
		"Token endpoint rejected the assertion: code={code}, message={message}, detail={detail}."
	)]
	Rejected {
		/// Provider error code.
		code: String,
		/// Provider error message.
		message: String,
		/// Provider error detail.
		detail: String,
	},
	/// Success response omitted the access token.
	#[error("Token endpoint response is missing access_token.")]
	MissingAccessToken,
}

/// Failures raised while posting a message to the messaging endpoint.
#[derive(Debug, ThisError)]
pub enum DispatchError {
	/// Messaging endpoint answered with anything other than `201 Created`.
	#[error("Message dispatch failed with status {status}.\n\n{request}\n\n{response}")]
	UnexpectedStatus {
		/// HTTP status code.
		status: u16,
		/// Dump of the outgoing request (bearer redacted).
		request: String,
		/// Dump of the response status line, headers, and body.
		response: String,
	},
	/// Payload could not be serialized.
	#[error("Message payload could not be serialized.")]
	Encode(#[source] serde_json::Error),
}

/// Transport-level failures (network, IO, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {endpoint}.")]
	Network {
		/// Logical endpoint label.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Outbound call exceeded its deadline.
	#[error("Request to {endpoint} timed out.")]
	Timeout {
		/// Logical endpoint label.
		endpoint: &'static str,
	},
}
impl TransportError {
	/// Wraps a reqwest failure, classifying timeouts separately.
	pub fn from_reqwest(endpoint: &'static str, e: ReqwestError) -> Self {
		if e.is_timeout() {
			Self::Timeout { endpoint }
		} else {
			Self::network(endpoint, e)
		}
	}

	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn issuance_rejection_lists_provider_fields() {
		let err: Error = IssuanceError::Rejected {
			code: "invalid_client".into(),
			message: "bad client".into(),
			detail: "client_secret mismatch".into(),
		}
		.into();
		let text = err.to_string();

		assert!(text.contains("invalid_client"));
		assert!(text.contains("client_secret mismatch"));
	}

	#[test]
	fn dispatch_error_embeds_dumps() {
		let err: Error = DispatchError::UnexpectedStatus {
			status: 403,
			request: "POST /bots/b/channels/c/messages".into(),
			response: "HTTP 403 Forbidden".into(),
		}
		.into();

		assert!(matches!(err, Error::Dispatch(_)));
		assert!(err.to_string().contains("POST /bots/b/channels/c/messages"));
		assert!(err.to_string().contains("HTTP 403 Forbidden"));
	}
}
