//! Bearer-token and retry-key records plus the redacting secret wrapper.

pub mod record;
pub mod secret;
