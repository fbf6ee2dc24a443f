//! Thread-safe in-memory [`RelayStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{BearerToken, RetryKey},
	store::{Collections, RelayStore, StoreFuture},
};

type StoreMap = Arc<RwLock<Collections>>;

/// Thread-safe storage backend that keeps every append in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of tokens physically held in `collection`, stale ones included.
	pub fn token_count(&self, collection: &str) -> usize {
		self.0.read().tokens.get(collection).map_or(0, Vec::len)
	}

	/// Number of retry keys physically held in `collection`, stale ones included.
	pub fn retry_key_count(&self, collection: &str) -> usize {
		self.0.read().retry_keys.get(collection).map_or(0, Vec::len)
	}
}
impl RelayStore for MemoryStore {
	fn append_token<'a>(&'a self, collection: &'a str, token: BearerToken) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().push_token(collection, token);

			Ok(())
		})
	}

	fn token_issued_after<'a>(
		&'a self,
		collection: &'a str,
		cutoff: OffsetDateTime,
	) -> StoreFuture<'a, Option<BearerToken>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().token_after(collection, cutoff)) })
	}

	fn append_retry_key<'a>(&'a self, collection: &'a str, key: RetryKey) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().push_retry_key(collection, key);

			Ok(())
		})
	}

	fn retry_key_created_after<'a>(
		&'a self,
		collection: &'a str,
		id: &'a str,
		cutoff: OffsetDateTime,
	) -> StoreFuture<'a, Option<RetryKey>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().retry_key_after(collection, id, cutoff)) })
	}
}
