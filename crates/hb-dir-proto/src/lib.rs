//! DIR RPC surface (spec.md §6): wire types, the `DirClient` contract, a
//! test-oriented in-memory implementation, and a minimal real transport.

pub mod client;
pub mod mock;
pub mod tcp;
pub mod types;

pub use client::{DirClient, AUTH_GROUPS, AUTH_USER};
pub use mock::MockDirClient;
pub use tcp::TcpJsonDirClient;
pub use types::*;
