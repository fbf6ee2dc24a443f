//! Inbound HTTP surface.
//!
//! `POST /` and `POST /notify` accept `channel_id`, `text`, and an optional `retry_key`, read
//! from the query string and an urlencoded body (body values win). `GET /healthz` answers `ok`.
//!
//! Only `application/x-www-form-urlencoded` bodies are parsed. Any other body, including
//! `multipart/form-data`, is ignored and the query string alone supplies the fields.

// std
use std::net::SocketAddr;
// crates.io
use axum::{
	Router,
	extract::{Form, Query, State, rejection::FormRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use tokio::net::TcpListener;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	relay::{NotifyOutcome, NotifyRequest, Relay},
};

/// Builds the router around a shared relay.
pub fn router(relay: Arc<Relay>) -> Router {
	Router::new()
		.route("/", post(notify))
		.route("/notify", post(notify))
		.route("/healthz", get(healthz))
		.with_state(relay)
}

/// Binds `addr` and serves until Ctrl-C or SIGTERM.
pub async fn serve(relay: Arc<Relay>, addr: SocketAddr) -> Result<(), ConfigError> {
	let listener = TcpListener::bind(addr).await.map_err(ConfigError::Serve)?;

	tracing::info!(addr = %addr, "Relay listening.");

	axum::serve(listener, router(relay))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.map_err(ConfigError::Serve)
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "Ctrl-C handler failed.");
			std::future::pending::<()>().await;
		}
	};
	#[cfg(unix)]
	let terminate = async {
		use tokio::signal::unix::{SignalKind, signal};

		match signal(SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			},
			Err(e) => {
				tracing::error!(error = %e, "SIGTERM handler failed.");
				std::future::pending::<()>().await;
			},
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	tracing::info!("Shutdown requested.");
}

async fn notify(
	State(relay): State<Arc<Relay>>,
	Query(query): Query<NotifyRequest>,
	body: Result<Form<NotifyRequest>, FormRejection>,
) -> NotifyOutcome {
	let request = match body {
		Ok(Form(body)) => merge(query, body),
		Err(e) => {
			tracing::debug!(error = %e, "Request body is not a form; using query parameters.");

			query
		},
	};

	relay.notify(request).await
}

async fn healthz() -> &'static str {
	"ok"
}

fn merge(query: NotifyRequest, body: NotifyRequest) -> NotifyRequest {
	fn pick(body: String, query: String) -> String {
		if body.is_empty() { query } else { body }
	}

	NotifyRequest {
		channel_id: pick(body.channel_id, query.channel_id),
		text: pick(body.text, query.text),
		retry_key: body.retry_key.filter(|key| !key.is_empty()).or(query.retry_key),
	}
}

impl IntoResponse for NotifyOutcome {
	fn into_response(self) -> Response {
		let status =
			StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

		(status, self.body()).into_response()
	}
}
