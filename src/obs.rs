//! Observability helpers for relay flows.
//!
//! Every flow runs inside a span named `notify_relay.flow` carrying the `flow` and `stage`
//! fields. With the `metrics` feature enabled, the `notify_relay_flow_total` counter is
//! incremented for every attempt and outcome, labeled by `flow` + `outcome`.

mod recorder;
mod span;

pub use recorder::*;
pub use span::*;

// crates.io
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
// self
use crate::_prelude::*;

/// Relay flow kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// One inbound notification, end to end.
	Notify,
	/// Assertion exchange at the token endpoint.
	Issue,
	/// Message post to the messaging endpoint.
	Dispatch,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Notify => "notify",
			FlowKind::Issue => "issue_token",
			FlowKind::Dispatch => "dispatch",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure reported back to the caller.
	Failure,
	/// Duplicate request short-circuited by the retry ledger.
	Skipped,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Skipped => "skipped",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Installs the global `fmt` subscriber, filtered by `RUST_LOG` (defaults to `info`).
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_subscriber() -> bool {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::registry().with(filter).with(fmt::layer()).try_init().is_ok()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn labels_are_stable() {
		assert_eq!(FlowKind::Issue.to_string(), "issue_token");
		assert_eq!(FlowKind::Notify.as_str(), "notify");
		assert_eq!(FlowOutcome::Skipped.to_string(), "skipped");
	}

	#[test]
	fn second_subscriber_install_is_rejected() {
		init_subscriber();

		assert!(!init_subscriber());
	}
}
