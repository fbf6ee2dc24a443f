//! Append-only records persisted by the token cache and the retry ledger.
//!
//! Neither record carries an expiry of its own. Validity is a query-time predicate: a record
//! counts only while its age is strictly below the window the caller supplies.

// crates.io
use time::PrimitiveDateTime;
// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Earliest instant a record may carry and still count at `now`. Windows reaching past the
/// representable range clamp to its start instead of overflowing.
pub fn window_cutoff(now: OffsetDateTime, window: Duration) -> OffsetDateTime {
	now.checked_sub(window).unwrap_or(PrimitiveDateTime::MIN.assume_utc())
}

/// Returns `true` while `now - stamped < window`.
fn within_window(stamped: OffsetDateTime, now: OffsetDateTime, window: Duration) -> bool {
	now - stamped < window
}

/// Bearer token issued by the token endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerToken {
	/// Access token value; callers must avoid logging it.
	pub value: TokenSecret,
	/// Instant the relay received the token.
	#[serde(with = "time::serde::rfc3339")]
	pub issued_at: OffsetDateTime,
}
impl BearerToken {
	/// Wraps a freshly issued token value stamped with the provided instant.
	pub fn new(value: impl Into<String>, issued_at: OffsetDateTime) -> Self {
		Self { value: TokenSecret::new(value), issued_at }
	}

	/// Returns `true` if the token may be reused at `now` under the given cache window.
	pub fn is_fresh_at(&self, now: OffsetDateTime, window: Duration) -> bool {
		within_window(self.issued_at, now, window)
	}
}

/// Idempotency key observed on an inbound request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryKey {
	/// Caller-supplied opaque identifier.
	pub id: String,
	/// Instant the key was first recorded.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}
impl RetryKey {
	/// Creates a key observed at the provided instant.
	pub fn new(id: impl Into<String>, created_at: OffsetDateTime) -> Self {
		Self { id: id.into(), created_at }
	}

	/// Returns `true` if the key still counts as seen at `now` under the given retry window.
	pub fn is_live_at(&self, now: OffsetDateTime, window: Duration) -> bool {
		within_window(self.created_at, now, window)
	}
}
