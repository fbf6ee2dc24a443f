//! Storage contracts and built-in store implementations for tokens and retry keys.
//!
//! Stores are append-only. Nothing is ever updated or deleted; callers express validity as a
//! cutoff instant and the store returns only entries stamped strictly after it. Stale entries
//! therefore accumulate until an operator prunes the backend out of band.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{BearerToken, RetryKey},
};

/// Boxed future returned by [`RelayStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract shared by the token cache and the retry ledger.
///
/// Implementations must tolerate concurrent readers and writers without transactional
/// exclusivity: two concurrent appends for the same retry key are both kept.
pub trait RelayStore
where
	Self: Send + Sync,
{
	/// Appends a token to `collection`.
	fn append_token<'a>(&'a self, collection: &'a str, token: BearerToken) -> StoreFuture<'a, ()>;

	/// Returns a token from `collection` issued strictly after `cutoff`, if any.
	///
	/// Any qualifying entry is acceptable; the built-in backends return the latest append.
	fn token_issued_after<'a>(
		&'a self,
		collection: &'a str,
		cutoff: OffsetDateTime,
	) -> StoreFuture<'a, Option<BearerToken>>;

	/// Appends a retry key to `collection`.
	fn append_retry_key<'a>(&'a self, collection: &'a str, key: RetryKey) -> StoreFuture<'a, ()>;

	/// Returns the most recent entry for `id` in `collection` created strictly after `cutoff`.
	fn retry_key_created_after<'a>(
		&'a self,
		collection: &'a str,
		id: &'a str,
		cutoff: OffsetDateTime,
	) -> StoreFuture<'a, Option<RetryKey>>;
}

/// Error type produced by [`RelayStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Append-only contents of every collection held by a backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collections {
	/// Token collections keyed by name.
	#[serde(default)]
	pub tokens: HashMap<String, Vec<BearerToken>>,
	/// Retry-key collections keyed by name.
	#[serde(default)]
	pub retry_keys: HashMap<String, Vec<RetryKey>>,
}
impl Collections {
	pub(crate) fn push_token(&mut self, collection: &str, token: BearerToken) {
		self.tokens.entry(collection.to_owned()).or_default().push(token);
	}

	pub(crate) fn push_retry_key(&mut self, collection: &str, key: RetryKey) {
		self.retry_keys.entry(collection.to_owned()).or_default().push(key);
	}

	pub(crate) fn token_after(
		&self,
		collection: &str,
		cutoff: OffsetDateTime,
	) -> Option<BearerToken> {
		self.tokens.get(collection)?.iter().rev().find(|token| token.issued_at > cutoff).cloned()
	}

	pub(crate) fn retry_key_after(
		&self,
		collection: &str,
		id: &str,
		cutoff: OffsetDateTime,
	) -> Option<RetryKey> {
		self.retry_keys
			.get(collection)?
			.iter()
			.filter(|key| key.id == id && key.created_at > cutoff)
			.max_by_key(|key| key.created_at)
			.cloned()
	}
}
