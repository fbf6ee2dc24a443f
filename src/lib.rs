//! Bot notification relay: accepts a channel + text over HTTP, resolves a bearer token through a
//! windowed token cache backed by JWT-bearer issuance, suppresses duplicate retries with a
//! windowed retry ledger, and forwards the message to the chat platform's messaging API.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod issuer;
pub mod ledger;
pub mod obs;
pub mod relay;
pub mod server;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{BotId, TokenSecret},
		cache::TokenCache,
		config::ServiceCredentials,
		dispatch::MessageDispatcher,
		http::ReqwestHttpClient,
		issuer::CredentialIssuer,
		ledger::RetryLedger,
		relay::Relay,
		store::{MemoryStore, RelayStore},
	};

	/// RSA key used to sign assertions in tests.
	pub const TEST_PRIVATE_KEY_PEM: &str = include_str!("../tests/fixtures/test_rsa.pem");
	/// Bot identifier used by test relays.
	pub const TEST_BOT_ID: &str = "bot-test";
	/// Client identifier used by test relays.
	pub const TEST_CLIENT_ID: &str = "client-test";
	/// Client secret used by test relays.
	pub const TEST_CLIENT_SECRET: &str = "secret-test";
	/// Service account used by test relays.
	pub const TEST_SERVICE_ACCOUNT: &str = "svc@test.example";
	/// Token collection used by test relays.
	pub const TEST_TOKEN_COLLECTION: &str = "AccessToken";
	/// Retry collection used by test relays.
	pub const TEST_RETRY_COLLECTION: &str = "RetryKey";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Credentials matching the `TEST_*` constants.
	pub fn test_credentials() -> ServiceCredentials {
		ServiceCredentials {
			client_id: TEST_CLIENT_ID.into(),
			client_secret: TokenSecret::new(TEST_CLIENT_SECRET),
			service_account: TEST_SERVICE_ACCOUNT.into(),
			scope: "bot".into(),
		}
	}

	/// Builds a credential issuer pointed at `{base}/token`.
	pub fn build_test_issuer(base: &str) -> CredentialIssuer {
		let token_endpoint =
			Url::parse(&format!("{base}/token")).expect("Mock token endpoint should parse.");

		CredentialIssuer::new(
			test_reqwest_http_client(),
			token_endpoint,
			test_credentials(),
			TEST_PRIVATE_KEY_PEM.as_bytes(),
		)
		.expect("Test issuer should accept the fixture key.")
	}

	/// Builds a message dispatcher pointed at `{base}/v1.0`.
	pub fn build_test_dispatcher(base: &str) -> MessageDispatcher {
		let api_base = Url::parse(&format!("{base}/v1.0")).expect("Mock API base should parse.");
		let bot_id = BotId::new(TEST_BOT_ID).expect("Test bot identifier should be valid.");

		MessageDispatcher::new(test_reqwest_http_client(), api_base, bot_id)
	}

	/// Constructs a [`Relay`] backed by an in-memory store whose token and messaging endpoints
	/// both live under `base` (typically an `httpmock` server URL).
	pub fn build_test_relay(base: &str) -> (Relay, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let relay = build_test_relay_with_store(base, store_backend.clone());

		(relay, store_backend)
	}

	/// Same as [`build_test_relay`] over a caller-provided store.
	pub fn build_test_relay_with_store(base: &str, store: Arc<dyn RelayStore>) -> Relay {
		Relay::new(
			build_test_issuer(base),
			TokenCache::new(store.clone(), TEST_TOKEN_COLLECTION),
			RetryLedger::new(store, TEST_RETRY_COLLECTION),
			build_test_dispatcher(base),
		)
	}
}

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

	pub use parking_lot::RwLock;
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tower as _};
