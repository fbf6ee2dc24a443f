//! Relay process entry point.

// std
use std::sync::Arc;
// self
use notify_relay::{config::RelayConfig, obs, relay::Relay, server};

#[tokio::main]
async fn main() -> notify_relay::error::Result<()> {
	obs::init_subscriber();

	let config = RelayConfig::from_env()?;
	let store = config.open_store()?;
	let relay = Relay::from_config(&config, store)?;

	tracing::info!(
		bot_id = %config.bot_id,
		token_collection = %config.token_collection,
		retry_collection = %config.retry_collection,
		persistent = config.store_path.is_some(),
		"Relay configured."
	);

	server::serve(Arc::new(relay), config.bind_addr()?).await?;

	Ok(())
}
