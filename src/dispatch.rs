//! Message dispatch to `{api_base}/bots/{bot_id}/channels/{channel_id}/messages`.

// crates.io
use reqwest::{
	StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	auth::{BotId, ChannelId, TokenSecret},
	error::{ConfigError, DispatchError, TransportError},
	http::{self, DEFAULT_TIMEOUT, ReqwestHttpClient},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

const ENDPOINT: &str = "messaging endpoint";

/// Text message addressed to one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
	/// Destination channel.
	pub channel_id: ChannelId,
	/// Plain-text body.
	pub text: String,
}
impl OutboundMessage {
	/// Creates a text message for `channel_id`.
	pub fn new(channel_id: ChannelId, text: impl Into<String>) -> Self {
		Self { channel_id, text: text.into() }
	}

	/// Wire body posted to the messaging endpoint.
	pub fn payload(&self) -> MessagePayload<'_> {
		MessagePayload { content: MessageContent { kind: "text", text: &self.text } }
	}
}

/// JSON body: `{"content":{"type":"text","text":...}}`.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct MessagePayload<'a> {
	/// Message content.
	pub content: MessageContent<'a>,
}

/// Content block of a [`MessagePayload`].
#[derive(Clone, Copy, Debug, Serialize)]
pub struct MessageContent<'a> {
	/// Content type; always `text`.
	#[serde(rename = "type")]
	pub kind: &'static str,
	/// Message text.
	pub text: &'a str,
}

/// Posts messages on behalf of a single bot.
#[derive(Clone, Debug)]
pub struct MessageDispatcher {
	http_client: ReqwestHttpClient,
	api_base: Url,
	bot_id: BotId,
	timeout: std::time::Duration,
}
impl MessageDispatcher {
	/// Creates a dispatcher for `bot_id` under `api_base`.
	pub fn new(http_client: ReqwestHttpClient, api_base: Url, bot_id: BotId) -> Self {
		Self { http_client, api_base, bot_id, timeout: DEFAULT_TIMEOUT }
	}

	/// Overrides the dispatch timeout (defaults to 30 seconds).
	pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Endpoint a message for `channel_id` is posted to. Identifiers are percent-encoded as
	/// single path segments.
	pub fn message_url(&self, channel_id: &ChannelId) -> Result<Url, ConfigError> {
		let mut url = self.api_base.clone();

		url.path_segments_mut()
			.map_err(|_| ConfigError::InvalidEndpoint {
				value: self.api_base.to_string(),
				source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
			})?
			.pop_if_empty()
			.extend(["bots", self.bot_id.as_ref(), "channels", channel_id.as_ref(), "messages"]);

		Ok(url)
	}

	/// Sends `text` to `channel_id`. Only `201 Created` counts as delivered; nothing is retried.
	pub async fn send(
		&self,
		token: &TokenSecret,
		channel_id: &ChannelId,
		text: &str,
	) -> Result<()> {
		const KIND: FlowKind = FlowKind::Dispatch;

		let span = FlowSpan::new(KIND, "send");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let message = OutboundMessage::new(channel_id.clone(), text);
		let result = span.instrument(self.post(token, &message)).await;

		match &result {
			Ok(()) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(e) => {
				tracing::warn!(channel_id = %channel_id, error = %e, "Message dispatch failed.");
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	async fn post(&self, token: &TokenSecret, message: &OutboundMessage) -> Result<()> {
		let url = self.message_url(&message.channel_id)?;
		let body = serde_json::to_string(&message.payload()).map_err(DispatchError::Encode)?;
		let request = self
			.http_client
			.post(url)
			.header(AUTHORIZATION, token.bearer_header())
			.header(CONTENT_TYPE, "application/json")
			.body(body.clone())
			.timeout(self.timeout)
			.build()
			.map_err(|e| TransportError::from_reqwest(ENDPOINT, e))?;
		let request_dump =
			http::dump_request(request.method(), request.url(), request.headers(), &body);
		let response = self
			.http_client
			.execute(request)
			.await
			.map_err(|e| TransportError::from_reqwest(ENDPOINT, e))?;
		let status = response.status();

		if status == StatusCode::CREATED {
			return Ok(());
		}

		let headers = response.headers().to_owned();
		let response_body = response.text().await.unwrap_or_default();

		Err(DispatchError::UnexpectedStatus {
			status: status.as_u16(),
			request: request_dump,
			response: http::dump_response(status, &headers, &response_body),
		}
		.into())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn dispatcher(base: &str) -> MessageDispatcher {
		MessageDispatcher::new(
			ReqwestHttpClient::default(),
			Url::parse(base).expect("Fixture base should parse."),
			BotId::new("bot-1").expect("Fixture bot should be valid."),
		)
	}

	#[test]
	fn payload_matches_wire_shape() {
		let channel = ChannelId::new("C1").expect("Fixture channel should be valid.");
		let message = OutboundMessage::new(channel, "hello");
		let json = serde_json::to_string(&message.payload()).expect("Payload should serialize.");

		assert_eq!(json, r#"{"content":{"type":"text","text":"hello"}}"#);
	}

	#[test]
	fn message_url_appends_bot_and_channel_segments() {
		let channel = ChannelId::new("C1").expect("Fixture channel should be valid.");
		let with_slash = dispatcher("https://api.example/v1.0/").message_url(&channel);
		let without_slash = dispatcher("https://api.example/v1.0").message_url(&channel);

		assert_eq!(
			with_slash.expect("URL should build.").as_str(),
			"https://api.example/v1.0/bots/bot-1/channels/C1/messages"
		);
		assert_eq!(
			without_slash.expect("URL should build.").as_str(),
			"https://api.example/v1.0/bots/bot-1/channels/C1/messages"
		);
	}

	#[test]
	fn channel_identifiers_cannot_escape_their_segment() {
		let channel = ChannelId::new("a/../b").expect("Slashes are not whitespace.");
		let url = dispatcher("https://api.example/v1.0")
			.message_url(&channel)
			.expect("URL should build.");

		assert_eq!(
			url.as_str(),
			"https://api.example/v1.0/bots/bot-1/channels/a%2F..%2Fb/messages"
		);
	}
}
