//! A minimal `ServiceDataGenerator` for standalone CLI use.
//!
//! The real generator is an embedder collaborator (spec.md §6) that knows
//! how to read live status off the local service; this binary has no such
//! service of its own; it refreshes the DIR record with nothing beyond
//! the identity the Merger needs to preserve static attributes across
//! cycles, matching `ServiceDataGenerator`'s contract.

use async_trait::async_trait;
use indexmap::IndexMap;

use hb_agent::{ServiceDataGenerator, ServiceUpdate};
use hb_dir_proto::ServiceIdentity;
use hb_util::error::Result;

pub struct LocalServiceGenerator {
	uuid: ServiceIdentity,
	service_type: String,
	name: String,
}

impl LocalServiceGenerator {
	pub fn new(config: &hb_util::config::Config) -> Self {
		LocalServiceGenerator {
			uuid: ServiceIdentity::new(config.service_uuid.clone()),
			service_type: config.service_type.clone(),
			name: config.service_name.clone(),
		}
	}
}

#[async_trait]
impl ServiceDataGenerator for LocalServiceGenerator {
	async fn generate(&self) -> Result<Vec<ServiceUpdate>> {
		Ok(vec![ServiceUpdate {
			uuid: self.uuid.clone(),
			service_type: self.service_type.clone(),
			name: self.name.clone(),
			data: IndexMap::new(),
		}])
	}
}
