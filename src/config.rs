//! Environment-driven configuration for the relay process.
//!
//! Every setting is read through the `config` crate from plain, unprefixed environment
//! variables (`BOT_ID`, `CLIENT_ID`, `COLLECTION_ID`, ...). Only the bot identity, client
//! credentials, service account, and one of `PRIVATE_KEY` / `PRIVATE_KEY_PATH` are required.

// std
use std::{fs, net::SocketAddr, path::PathBuf};
// self
use crate::{
	_prelude::*,
	auth::{BotId, TokenSecret},
	error::ConfigError,
	store::{FileStore, MemoryStore, RelayStore},
};

/// Default token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://auth.worksmobile.com/oauth2/v2.0/token";
/// Default messaging API base.
pub const DEFAULT_API_BASE_URL: &str = "https://www.worksapis.com/v1.0";

/// Client credentials and assertion subject used by the issuer.
#[derive(Clone, Debug)]
pub struct ServiceCredentials {
	/// OAuth client identifier; also the assertion issuer.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
	/// Service account the assertion is issued for.
	pub service_account: String,
	/// Scope requested at the token endpoint.
	pub scope: String,
}

/// Process configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct RelayConfig {
	/// Bot that posts the messages.
	pub bot_id: String,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
	/// Assertion subject.
	pub service_account: String,
	/// Inline PEM; literal `\n` sequences are expanded. Takes precedence over the path.
	#[serde(default)]
	pub private_key: Option<TokenSecret>,
	/// Path to a PEM file.
	#[serde(default)]
	pub private_key_path: Option<PathBuf>,
	/// Collection holding issued tokens.
	#[serde(rename = "collection_id", default = "default_token_collection")]
	pub token_collection: String,
	/// Collection holding retry keys.
	#[serde(rename = "retry_collection_id", default = "default_retry_collection")]
	pub retry_collection: String,
	/// JSON file store location; the in-memory store is used when unset.
	#[serde(default)]
	pub store_path: Option<PathBuf>,
	/// Listen address for the inbound endpoint.
	#[serde(default = "default_bind_addr")]
	pub bind_addr: String,
	/// Token endpoint.
	#[serde(default = "default_token_url")]
	pub token_url: String,
	/// Messaging API base, without a trailing `/bots`.
	#[serde(default = "default_api_base_url")]
	pub api_base_url: String,
	/// Scope requested at the token endpoint.
	#[serde(default = "default_scope")]
	pub scope: String,
	/// Seconds a cached token stays reusable.
	#[serde(default = "default_token_cache_window_secs")]
	pub token_cache_window_secs: u64,
	/// Seconds a retry key suppresses duplicates.
	#[serde(default = "default_retry_window_secs")]
	pub retry_window_secs: u64,
	/// Deadline for the credential exchange.
	#[serde(default = "default_timeout_secs")]
	pub issuer_timeout_secs: u64,
	/// Deadline for message dispatch.
	#[serde(default = "default_timeout_secs")]
	pub dispatch_timeout_secs: u64,
}
impl RelayConfig {
	/// Loads configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_source(::config::Environment::default())
	}

	/// Loads configuration from an arbitrary `config` source.
	pub fn from_source(
		source: impl 'static + ::config::Source + Send + Sync,
	) -> Result<Self, ConfigError> {
		Ok(::config::Config::builder().add_source(source).build()?.try_deserialize()?)
	}

	/// Validated bot identifier.
	pub fn bot_id(&self) -> Result<BotId, ConfigError> {
		Ok(BotId::new(&self.bot_id)?)
	}

	/// Parsed token endpoint.
	pub fn token_endpoint(&self) -> Result<Url, ConfigError> {
		parse_endpoint(&self.token_url)
	}

	/// Parsed messaging API base.
	pub fn api_base(&self) -> Result<Url, ConfigError> {
		parse_endpoint(&self.api_base_url)
	}

	/// Parsed listen address.
	pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
		self.bind_addr.parse().map_err(|_| ConfigError::InvalidBindAddr(self.bind_addr.clone()))
	}

	/// Credentials handed to the issuer.
	pub fn credentials(&self) -> ServiceCredentials {
		ServiceCredentials {
			client_id: self.client_id.clone(),
			client_secret: self.client_secret.clone(),
			service_account: self.service_account.clone(),
			scope: self.scope.clone(),
		}
	}

	/// Token cache window.
	pub fn token_cache_window(&self) -> Duration {
		Duration::seconds(saturating_secs(self.token_cache_window_secs))
	}

	/// Retry ledger window.
	pub fn retry_window(&self) -> Duration {
		Duration::seconds(saturating_secs(self.retry_window_secs))
	}

	/// Credential exchange deadline.
	pub fn issuer_timeout(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.issuer_timeout_secs)
	}

	/// Dispatch deadline.
	pub fn dispatch_timeout(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.dispatch_timeout_secs)
	}

	/// Reads the PEM private key, preferring the inline value over the file path.
	pub fn load_private_key(&self) -> Result<Vec<u8>, ConfigError> {
		if let Some(inline) = &self.private_key {
			return Ok(inline.expose().replace("\\n", "\n").into_bytes());
		}

		let path = self.private_key_path.as_ref().ok_or(ConfigError::MissingPrivateKey)?;

		fs::read(path).map_err(|source| ConfigError::PrivateKeyRead {
			path: path.display().to_string(),
			source,
		})
	}

	/// Opens the configured store backend.
	pub fn open_store(&self) -> Result<Arc<dyn RelayStore>, Error> {
		match &self.store_path {
			Some(path) => Ok(Arc::new(FileStore::open(path)?)),
			None => Ok(Arc::new(MemoryStore::default())),
		}
	}
}

fn parse_endpoint(value: &str) -> Result<Url, ConfigError> {
	Url::parse(value)
		.map_err(|source| ConfigError::InvalidEndpoint { value: value.to_owned(), source })
}

fn saturating_secs(secs: u64) -> i64 {
	i64::try_from(secs).unwrap_or(i64::MAX)
}

fn default_token_collection() -> String {
	"AccessToken".into()
}

fn default_retry_collection() -> String {
	"RetryKey".into()
}

fn default_bind_addr() -> String {
	"0.0.0.0:8080".into()
}

fn default_token_url() -> String {
	DEFAULT_TOKEN_URL.into()
}

fn default_api_base_url() -> String {
	DEFAULT_API_BASE_URL.into()
}

fn default_scope() -> String {
	"bot".into()
}

fn default_token_cache_window_secs() -> u64 {
	20 * 60 * 60
}

fn default_retry_window_secs() -> u64 {
	60 * 60
}

fn default_timeout_secs() -> u64 {
	30
}
