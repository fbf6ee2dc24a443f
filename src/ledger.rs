//! Windowed retry ledger used to short-circuit duplicate deliveries.
//!
//! The ledger is a check-then-record guard, not a reservation: two concurrent requests carrying
//! the same key can both miss in [`RetryLedger::find`] and both proceed. Closing that window
//! would need a unique insert or compare-and-swap on the key, which the store contract does
//! not offer.

// self
use crate::{
	_prelude::*,
	auth::{self, RetryKey},
	store::RelayStore,
};

/// Default suppression window for retry keys.
pub const DEFAULT_RETRY_WINDOW: Duration = Duration::hours(1);

/// Time-windowed store of observed idempotency keys.
#[derive(Clone)]
pub struct RetryLedger {
	store: Arc<dyn RelayStore>,
	collection: String,
	window: Duration,
}
impl RetryLedger {
	/// Creates a ledger over `collection` using [`DEFAULT_RETRY_WINDOW`].
	pub fn new(store: Arc<dyn RelayStore>, collection: impl Into<String>) -> Self {
		Self { store, collection: collection.into(), window: DEFAULT_RETRY_WINDOW }
	}

	/// Overrides the suppression window.
	pub fn with_window(mut self, window: Duration) -> Self {
		self.window = if window.is_negative() { Duration::ZERO } else { window };

		self
	}

	/// Suppression window currently applied.
	pub fn window(&self) -> Duration {
		self.window
	}

	/// Returns the most recent record of `id` inside the window.
	pub async fn find(&self, id: &str) -> Result<Option<RetryKey>> {
		self.find_at(id, OffsetDateTime::now_utc()).await
	}

	/// Same as [`find`](Self::find) with an explicit notion of "now".
	pub async fn find_at(&self, id: &str, now: OffsetDateTime) -> Result<Option<RetryKey>> {
		let cutoff = auth::window_cutoff(now, self.window);
		let key = self.store.retry_key_created_after(&self.collection, id, cutoff).await?;

		Ok(key.filter(|key| key.is_live_at(now, self.window)))
	}

	/// Appends `id` stamped with the current time.
	pub async fn record(&self, id: &str) -> Result<()> {
		self.record_at(id, OffsetDateTime::now_utc()).await
	}

	/// Appends `id` stamped with `now`. Duplicates are kept.
	pub async fn record_at(&self, id: &str, now: OffsetDateTime) -> Result<()> {
		self.store.append_retry_key(&self.collection, RetryKey::new(id, now)).await?;

		Ok(())
	}
}
impl Debug for RetryLedger {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RetryLedger")
			.field("collection", &self.collection)
			.field("window", &self.window)
			.finish()
	}
}
