//! Request orchestration: retry suppression, token resolution, and dispatch.
//!
//! [`Relay::notify`] drives one inbound notification to a terminal [`NotifyOutcome`]:
//!
//! 1. A non-empty retry key is looked up in the [`RetryLedger`]. A live match ends the request
//!    as [`NotifyOutcome::Skipped`]; otherwise the key is recorded (best-effort).
//! 2. A bearer token comes from the [`TokenCache`], or from the [`CredentialIssuer`] on a miss,
//!    after which it is appended to the cache (best-effort).
//! 3. The [`MessageDispatcher`] posts the text.
//!
//! Store failures never fail a request. Issuance and dispatch failures end it as
//! [`NotifyOutcome::Failed`].

// crates.io
use time::format_description::well_known::Rfc3339;
// self
use crate::{
	_prelude::*,
	auth::{ChannelId, TokenSecret},
	cache::TokenCache,
	config::RelayConfig,
	dispatch::MessageDispatcher,
	error::ConfigError,
	http::ReqwestHttpClient,
	issuer::CredentialIssuer,
	ledger::RetryLedger,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::RelayStore,
};

/// Inbound notification fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct NotifyRequest {
	/// Destination channel.
	#[serde(default)]
	pub channel_id: String,
	/// Message text.
	#[serde(default)]
	pub text: String,
	/// Optional idempotency key; empty is treated as absent.
	#[serde(default)]
	pub retry_key: Option<String>,
}
impl NotifyRequest {
	/// Creates a request without a retry key.
	pub fn new(channel_id: impl Into<String>, text: impl Into<String>) -> Self {
		Self { channel_id: channel_id.into(), text: text.into(), retry_key: None }
	}

	/// Attaches an idempotency key.
	pub fn with_retry_key(mut self, key: impl Into<String>) -> Self {
		self.retry_key = Some(key.into());

		self
	}

	fn retry_key(&self) -> Option<&str> {
		self.retry_key.as_deref().filter(|key| !key.is_empty())
	}
}

/// Terminal state of one notification.
#[derive(Debug)]
pub enum NotifyOutcome {
	/// The messaging endpoint accepted the message.
	Delivered,
	/// A live retry key matched; nothing was sent.
	Skipped {
		/// When the original attempt was recorded.
		recorded_at: OffsetDateTime,
	},
	/// Token resolution or dispatch failed.
	Failed(Error),
}
impl NotifyOutcome {
	/// HTTP status code reported to the caller.
	pub fn status_code(&self) -> u16 {
		match self {
			Self::Delivered | Self::Skipped { .. } => 200,
			Self::Failed(_) => 500,
		}
	}

	/// Plain-text body reported to the caller.
	pub fn body(&self) -> String {
		match self {
			Self::Delivered => "success".into(),
			Self::Skipped { recorded_at } => format!("skip {}", skip_stamp(*recorded_at)),
			Self::Failed(e) => format!("error: {}", error_chain(e)),
		}
	}

	/// Stable label for logs and metrics.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Delivered => "delivered",
			Self::Skipped { .. } => "skipped",
			Self::Failed(_) => "failed",
		}
	}
}

/// RFC 3339 at whole-second precision; the sub-second part is dropped, not rounded.
fn skip_stamp(recorded_at: OffsetDateTime) -> String {
	let whole = recorded_at.replace_nanosecond(0).unwrap_or(recorded_at);

	whole.format(&Rfc3339).unwrap_or_else(|_| whole.to_string())
}

/// Renders an error with its source chain, joined by `: `.
fn error_chain(e: &Error) -> String {
	let mut rendered = e.to_string();
	let mut source = StdError::source(e);

	while let Some(inner) = source {
		let text = inner.to_string();

		if !rendered.contains(&text) {
			rendered.push_str(": ");
			rendered.push_str(&text);
		}

		source = inner.source();
	}

	rendered
}

/// Notification relay for a single bot identity.
///
/// The relay is immutable once built and is shared across requests behind an [`Arc`]; all
/// cross-request coordination happens in the backing [`RelayStore`].
#[derive(Clone, Debug)]
pub struct Relay {
	issuer: CredentialIssuer,
	token_cache: TokenCache,
	retry_ledger: RetryLedger,
	dispatcher: MessageDispatcher,
}
impl Relay {
	/// Assembles a relay from its components.
	pub fn new(
		issuer: CredentialIssuer,
		token_cache: TokenCache,
		retry_ledger: RetryLedger,
		dispatcher: MessageDispatcher,
	) -> Self {
		Self { issuer, token_cache, retry_ledger, dispatcher }
	}

	/// Builds a relay from process configuration over the provided store.
	pub fn from_config(
		config: &RelayConfig,
		store: Arc<dyn RelayStore>,
	) -> Result<Self, ConfigError> {
		let http_client = ReqwestHttpClient::new()?;
		let private_key = config.load_private_key()?;
		let issuer = CredentialIssuer::new(
			http_client.clone(),
			config.token_endpoint()?,
			config.credentials(),
			&private_key,
		)?
		.with_timeout(config.issuer_timeout());
		let dispatcher = MessageDispatcher::new(http_client, config.api_base()?, config.bot_id()?)
			.with_timeout(config.dispatch_timeout());
		let token_cache = TokenCache::new(store.clone(), config.token_collection.clone())
			.with_window(config.token_cache_window());
		let retry_ledger = RetryLedger::new(store, config.retry_collection.clone())
			.with_window(config.retry_window());

		Ok(Self::new(issuer, token_cache, retry_ledger, dispatcher))
	}

	/// Token cache used by this relay.
	pub fn token_cache(&self) -> &TokenCache {
		&self.token_cache
	}

	/// Retry ledger used by this relay.
	pub fn retry_ledger(&self) -> &RetryLedger {
		&self.retry_ledger
	}

	/// Drives one notification to its terminal state.
	pub async fn notify(&self, request: NotifyRequest) -> NotifyOutcome {
		const KIND: FlowKind = FlowKind::Notify;

		let span = FlowSpan::new(KIND, "notify");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let outcome = span.instrument(self.run(request)).await;

		match &outcome {
			NotifyOutcome::Delivered => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			NotifyOutcome::Skipped { .. } => obs::record_flow_outcome(KIND, FlowOutcome::Skipped),
			NotifyOutcome::Failed(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		tracing::info!(outcome = outcome.as_str(), "Notification finished.");

		outcome
	}

	async fn run(&self, request: NotifyRequest) -> NotifyOutcome {
		if let Some(key) = request.retry_key() {
			if let Some(recorded_at) = self.check_retry_key(key).await {
				return NotifyOutcome::Skipped { recorded_at };
			}
		}

		match self.deliver(&request.channel_id, &request.text).await {
			Ok(()) => NotifyOutcome::Delivered,
			Err(e) => NotifyOutcome::Failed(e),
		}
	}

	/// Returns the original timestamp for a live key; otherwise records the key.
	async fn check_retry_key(&self, key: &str) -> Option<OffsetDateTime> {
		match self.retry_ledger.find(key).await {
			Ok(Some(seen)) => {
				tracing::info!(
					retry_key = key,
					recorded_at = %seen.created_at,
					"Duplicate retry key."
				);

				return Some(seen.created_at);
			},
			Ok(None) => {},
			Err(e) => tracing::warn!(retry_key = key, error = %e, "Retry ledger lookup failed."),
		}

		if let Err(e) = self.retry_ledger.record(key).await {
			tracing::warn!(retry_key = key, error = %e, "Retry key could not be recorded.");
		}

		None
	}

	async fn deliver(&self, channel_id: &str, text: &str) -> Result<()> {
		let channel_id = ChannelId::new(channel_id)?;
		let token = self.resolve_token().await?;

		self.dispatcher.send(&token, &channel_id, text).await
	}

	/// Cached token when available, otherwise a freshly issued one.
	pub async fn resolve_token(&self) -> Result<TokenSecret> {
		match self.token_cache.load().await {
			Ok(Some(token)) => {
				tracing::debug!("Token cache hit.");

				return Ok(token);
			},
			Ok(None) => tracing::debug!("Token cache miss."),
			Err(e) => tracing::warn!(error = %e, "Token cache lookup failed; issuing a new token."),
		}

		let token = self.issuer.issue_token().await?;
		let value = token.value.clone();

		if let Err(e) = self.token_cache.store(token).await {
			tracing::warn!(error = %e, "Issued token could not be cached.");
		}

		Ok(value)
	}
}
