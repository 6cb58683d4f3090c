//! The Service Data Generator callback (spec.md §2/§4.3): owned by the
//! embedder, invoked once per refresh cycle by the Service Record Merger.

use async_trait::async_trait;
use hb_util::error::Result;
use indexmap::IndexMap;

use hb_dir_proto::ServiceIdentity;

/// One service registration the generator wants refreshed this cycle.
/// `data` carries only the keys the local service currently knows about;
/// the Merger is responsible for folding in static and MRC-replica keys
/// preserved from the prior record.
#[derive(Debug, Clone)]
pub struct ServiceUpdate {
	pub uuid: ServiceIdentity,
	pub service_type: String,
	pub name: String,
	pub data: IndexMap<String, String>,
}

/// Supplies fresh status data for the local service(s) on every refresh.
///
/// Owned by the embedder; the agent holds only a non-owning `Arc` whose
/// lifetime is guaranteed by the embedder to exceed the agent's (spec.md
/// §9, "cyclic dependency avoidance").
#[async_trait]
pub trait ServiceDataGenerator: Send + Sync {
	async fn generate(&self) -> Result<Vec<ServiceUpdate>>;
}
