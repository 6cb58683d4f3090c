//! Service-presence agent: discovery, registration, merging, and the
//! lifecycle that ties them to a heartbeat loop.

pub mod agent;
pub mod config_pusher;
pub mod discovery;
pub mod generator;
pub mod heartbeat;
pub mod liveness;
pub mod merger;
pub mod registrar;

pub use agent::{AgentOptions, ServicePresenceAgent};
pub use generator::{ServiceDataGenerator, ServiceUpdate};
pub use heartbeat::{AgentEvent, AgentPhase};
