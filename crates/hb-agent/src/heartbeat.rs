//! Heartbeat Loop state machine (spec.md §4.5) and lifecycle notifications.

use std::fmt;

/// `NEW -> INITIALIZING -> RUNNING -> STOPPING -> STOPPED`, with a
/// `CRASHED` branch reachable from `INITIALIZING` or `RUNNING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
	New,
	Initializing,
	Running,
	Stopping,
	Stopped,
	Crashed,
}

/// Lifecycle notifications published by the Supervisor (spec.md §4.6).
#[derive(Debug, Clone)]
pub enum AgentEvent {
	Started,
	Stopped,
	Crashed(String),
}

impl fmt::Display for AgentEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AgentEvent::Started => write!(f, "started"),
			AgentEvent::Stopped => write!(f, "stopped"),
			AgentEvent::Crashed(e) => write!(f, "crashed: {}", e),
		}
	}
}
