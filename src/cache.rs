//! Windowed token cache layered over a [`RelayStore`] collection.
//!
//! Tokens are appended on every issuance and never removed. A lookup only sees tokens whose
//! age is below the window, so superseded and expired entries stay in the collection until
//! the backend is pruned out of band.

// self
use crate::{
	_prelude::*,
	auth::{self, BearerToken, TokenSecret},
	store::RelayStore,
};

/// Default reuse window for issued tokens.
pub const DEFAULT_TOKEN_CACHE_WINDOW: Duration = Duration::hours(20);

/// Time-windowed store of issued bearer tokens.
#[derive(Clone)]
pub struct TokenCache {
	store: Arc<dyn RelayStore>,
	collection: String,
	window: Duration,
}
impl TokenCache {
	/// Creates a cache over `collection` using [`DEFAULT_TOKEN_CACHE_WINDOW`].
	pub fn new(store: Arc<dyn RelayStore>, collection: impl Into<String>) -> Self {
		Self { store, collection: collection.into(), window: DEFAULT_TOKEN_CACHE_WINDOW }
	}

	/// Overrides the reuse window.
	pub fn with_window(mut self, window: Duration) -> Self {
		self.window = if window.is_negative() { Duration::ZERO } else { window };

		self
	}

	/// Reuse window currently applied.
	pub fn window(&self) -> Duration {
		self.window
	}

	/// Returns a reusable token, if one was issued within the window.
	pub async fn load(&self) -> Result<Option<TokenSecret>> {
		self.load_at(OffsetDateTime::now_utc()).await
	}

	/// Same as [`load`](Self::load) with an explicit notion of "now".
	pub async fn load_at(&self, now: OffsetDateTime) -> Result<Option<TokenSecret>> {
		let cutoff = auth::window_cutoff(now, self.window);
		let token = self.store.token_issued_after(&self.collection, cutoff).await?;

		Ok(token.filter(|token| token.is_fresh_at(now, self.window)).map(|token| token.value))
	}

	/// Appends a freshly issued token. Earlier entries are left in place.
	pub async fn store(&self, token: BearerToken) -> Result<()> {
		self.store.append_token(&self.collection, token).await?;

		Ok(())
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("collection", &self.collection)
			.field("window", &self.window)
			.finish()
	}
}
