// crates.io
use httpmock::prelude::*;
use time::format_description::well_known::Rfc3339;
// self
use notify_relay::{
	_preludet::*,
	auth::BearerToken,
	relay::{NotifyOutcome, NotifyRequest},
	store::RelayStore,
};

const TOKEN_BODY: &str =
	"{\"access_token\":\"fresh-token\",\"token_type\":\"Bearer\",\"expires_in\":\"86400\"}";

fn message_path(channel: &str) -> String {
	format!("/v1.0/bots/{TEST_BOT_ID}/channels/{channel}/messages")
}

#[tokio::test]
async fn empty_cache_issues_caches_and_delivers() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let path = message_path("C1");
	let message_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(path.as_str()).header("authorization", "Bearer fresh-token");
			then.status(201);
		})
		.await;
	let (relay, store) = build_test_relay(&server.base_url());
	let outcome = relay.notify(NotifyRequest::new("C1", "hello")).await;

	assert!(matches!(outcome, NotifyOutcome::Delivered));
	assert_eq!(outcome.status_code(), 200);
	assert_eq!(outcome.body(), "success");

	token_mock.assert_calls_async(1).await;
	message_mock.assert_calls_async(1).await;

	assert_eq!(store.token_count(TEST_TOKEN_COLLECTION), 1);
}

#[tokio::test]
async fn cached_token_skips_issuance() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let path = message_path("C1");
	let message_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(path.as_str()).header("authorization", "Bearer cached-token");
			then.status(201);
		})
		.await;
	let (relay, store) = build_test_relay(&server.base_url());

	store
		.append_token(
			TEST_TOKEN_COLLECTION,
			BearerToken::new("cached-token", OffsetDateTime::now_utc() - Duration::hours(2)),
		)
		.await
		.expect("Seeding the token collection should succeed.");

	let outcome = relay.notify(NotifyRequest::new("C1", "hello")).await;

	assert!(matches!(outcome, NotifyOutcome::Delivered));

	token_mock.assert_calls_async(0).await;
	message_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn stale_cached_token_triggers_issuance() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let message_mock = server
		.mock_async(|when, then| {
			when.method(POST).header("authorization", "Bearer fresh-token");
			then.status(201);
		})
		.await;
	let (relay, store) = build_test_relay(&server.base_url());

	store
		.append_token(
			TEST_TOKEN_COLLECTION,
			BearerToken::new("stale-token", OffsetDateTime::now_utc() - Duration::hours(21)),
		)
		.await
		.expect("Seeding the token collection should succeed.");

	let outcome = relay.notify(NotifyRequest::new("C1", "hello")).await;

	assert!(matches!(outcome, NotifyOutcome::Delivered));

	token_mock.assert_calls_async(1).await;
	message_mock.assert_calls_async(1).await;

	assert_eq!(store.token_count(TEST_TOKEN_COLLECTION), 2);
}

#[tokio::test]
async fn dispatch_rejection_reports_error() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path(message_path("C1"));
			then.status(400).body("{\"code\":\"INVALID_PARAMETER\"}");
		})
		.await;

	let (relay, _) = build_test_relay(&server.base_url());
	let outcome = relay.notify(NotifyRequest::new("C1", "hello")).await;

	assert_eq!(outcome.status_code(), 500);
	assert!(outcome.body().starts_with("error: "));
	assert!(outcome.body().contains("INVALID_PARAMETER"));
}

#[tokio::test]
async fn issuance_failure_reports_error_without_dispatch() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"code\":\"invalid_grant\",\"message\":\"expired assertion\"}");
		})
		.await;

	let message_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(message_path("C1"));
			then.status(201);
		})
		.await;
	let (relay, store) = build_test_relay(&server.base_url());
	let outcome = relay.notify(NotifyRequest::new("C1", "hello")).await;

	assert_eq!(outcome.status_code(), 500);
	assert!(outcome.body().contains("invalid_grant"));

	message_mock.assert_calls_async(0).await;

	assert_eq!(store.token_count(TEST_TOKEN_COLLECTION), 0);
}

#[tokio::test]
async fn repeated_retry_key_is_skipped() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;

	let message_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(message_path("C1"));
			then.status(201);
		})
		.await;
	let (relay, store) = build_test_relay(&server.base_url());
	let request = NotifyRequest::new("C1", "hello").with_retry_key("abc");
	let first = relay.notify(request.clone()).await;
	let second = relay.notify(request).await;

	assert!(matches!(first, NotifyOutcome::Delivered));
	assert!(matches!(second, NotifyOutcome::Skipped { .. }));
	assert_eq!(second.status_code(), 200);
	assert!(second.body().starts_with("skip "));

	message_mock.assert_calls_async(1).await;

	assert_eq!(store.retry_key_count(TEST_RETRY_COLLECTION), 1);
}

#[tokio::test]
async fn recent_retry_key_skips_with_original_timestamp() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let message_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(message_path("C1"));
			then.status(201);
		})
		.await;
	let (relay, _) = build_test_relay(&server.base_url());
	let recorded = OffsetDateTime::now_utc() - Duration::minutes(10);

	relay
		.retry_ledger()
		.record_at("abc", recorded)
		.await
		.expect("Seeding the retry ledger should succeed.");

	let outcome = relay.notify(NotifyRequest::new("C1", "hello").with_retry_key("abc")).await;
	let expected = recorded
		.replace_nanosecond(0)
		.expect("Zero nanoseconds are always valid.")
		.format(&Rfc3339)
		.expect("Timestamp should format.");

	assert_eq!(outcome.body(), format!("skip {expected}"));

	token_mock.assert_calls_async(0).await;
	message_mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn expired_retry_key_delivers_again() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;

	let message_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(message_path("C1"));
			then.status(201);
		})
		.await;
	let (relay, store) = build_test_relay(&server.base_url());

	relay
		.retry_ledger()
		.record_at("abc", OffsetDateTime::now_utc() - Duration::hours(2))
		.await
		.expect("Seeding the retry ledger should succeed.");

	let outcome = relay.notify(NotifyRequest::new("C1", "hello").with_retry_key("abc")).await;

	assert!(matches!(outcome, NotifyOutcome::Delivered));

	message_mock.assert_calls_async(1).await;

	assert_eq!(store.retry_key_count(TEST_RETRY_COLLECTION), 2);
}

#[tokio::test]
async fn failed_delivery_still_records_retry_key() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(500).body("boom");
		})
		.await;

	let (relay, store) = build_test_relay(&server.base_url());
	let first = relay.notify(NotifyRequest::new("C1", "hello").with_retry_key("k1")).await;
	let second = relay.notify(NotifyRequest::new("C1", "hello").with_retry_key("k1")).await;

	assert!(matches!(first, NotifyOutcome::Failed(_)));
	assert!(matches!(second, NotifyOutcome::Skipped { .. }));
	assert_eq!(store.retry_key_count(TEST_RETRY_COLLECTION), 1);
}

#[tokio::test]
async fn empty_channel_is_rejected_before_any_call() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let (relay, _) = build_test_relay(&server.base_url());
	let outcome = relay.notify(NotifyRequest::new("", "hello")).await;

	assert!(matches!(outcome, NotifyOutcome::Failed(Error::InvalidRequest(_))));
	assert_eq!(outcome.status_code(), 500);

	token_mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn skip_body_uses_whole_seconds_for_live_clock_keys() {
	let server = MockServer::start_async().await;
	let message_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(message_path("C1"));
			then.status(201);
		})
		.await;
	let (relay, _) = build_test_relay(&server.base_url());

	relay.retry_ledger().record("live").await.expect("Recording should succeed.");

	let seen = relay
		.retry_ledger()
		.find("live")
		.await
		.expect("Lookup should succeed.")
		.expect("Recorded key should be found.");
	let outcome = relay.notify(NotifyRequest::new("C1", "hello").with_retry_key("live")).await;
	let body = outcome.body();
	let stamp = body.strip_prefix("skip ").expect("Body should start with `skip `.");
	let parsed = OffsetDateTime::parse(stamp, &Rfc3339).expect("Stamp should be RFC 3339.");

	assert!(!stamp.contains('.'));
	assert!(stamp.ends_with('Z'));
	assert_eq!(parsed.unix_timestamp(), seen.created_at.unix_timestamp());

	message_mock.assert_calls_async(0).await;
}
