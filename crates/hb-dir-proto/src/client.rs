//! The DIR RPC surface consumed by the agent (spec.md §6).
//!
//! spec.md treats the concrete transport as an external collaborator
//! ("assumed to provide a typed client"); `DirClient` is that contract.
//! Anything that can satisfy it — the in-memory `MockDirClient` used in
//! tests, or `hb_dir_proto::tcp::TcpJsonDirClient` used by `hb-cli` — can
//! drive the agent.

use async_trait::async_trait;
use hb_util::error::Result;

use crate::types::*;

/// Synthetic caller identity used for every DIR call (spec.md §6: anonymous
/// auth, `{user: "hb-thread", groups: ["xtreemfs-services"]}`).
pub const AUTH_USER: &str = "hb-thread";
pub const AUTH_GROUPS: &[&str] = &["xtreemfs-services"];

#[async_trait]
pub trait DirClient: Send + Sync {
	async fn mappings_get(&self, uuid: &ServiceIdentity) -> Result<AddressMappingSet>;
	async fn mappings_set(&self, set: &AddressMappingSet) -> Result<()>;

	async fn service_get_by_uuid(&self, uuid: &ServiceIdentity) -> Result<ServiceSet>;
	async fn service_register(&self, reg: &ServiceRecord) -> Result<()>;
	async fn service_deregister(&self, uuid: &ServiceIdentity) -> Result<()>;

	async fn configuration_get(&self, uuid: &ServiceIdentity) -> Result<ConfigurationGetResponse>;
	async fn configuration_set(&self, cfg: &ConfigurationBlob) -> Result<()>;
}
