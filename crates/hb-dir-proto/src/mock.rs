//! In-memory `DirClient` used by `hb-agent`'s tests and by spec.md §8's
//! worked scenarios (S1-S6).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hb_util::error::{HbError, Result};
use tokio::sync::Mutex;

use crate::client::DirClient;
use crate::types::*;

#[derive(Default)]
struct State {
	mappings: HashMap<ServiceIdentity, AddressMappingSet>,
	services: HashMap<ServiceIdentity, ServiceRecord>,
	configs: HashMap<ServiceIdentity, ConfigurationGetResponse>,
	deregistered: Vec<ServiceIdentity>,
	register_calls: Vec<ServiceRecord>,
}

/// An in-memory stand-in for the Directory Service.
///
/// Every call can be made to fail once via the `fail_*` flags, so tests can
/// exercise spec.md §7's error-handling table (logged-and-swallowed vs.
/// startup-aborting failures) without a real network dependency.
pub struct MockDirClient {
	state: Mutex<State>,
	pub fail_mappings_set: AtomicBool,
	pub fail_service_register: AtomicBool,
	pub fail_service_get: AtomicBool,
	pub fail_configuration_set: AtomicBool,
	pub fail_service_deregister: AtomicBool,
}

impl Default for MockDirClient {
	fn default() -> Self {
		MockDirClient {
			state: Mutex::new(State::default()),
			fail_mappings_set: AtomicBool::new(false),
			fail_service_register: AtomicBool::new(false),
			fail_service_get: AtomicBool::new(false),
			fail_configuration_set: AtomicBool::new(false),
			fail_service_deregister: AtomicBool::new(false),
		}
	}
}

impl MockDirClient {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub async fn seed_service(&self, record: ServiceRecord) {
		self.state
			.lock()
			.await
			.services
			.insert(record.uuid.clone(), record);
	}

	pub async fn seed_mappings(&self, uuid: ServiceIdentity, set: AddressMappingSet) {
		self.state.lock().await.mappings.insert(uuid, set);
	}

	pub async fn seed_configuration(&self, uuid: ServiceIdentity, resp: ConfigurationGetResponse) {
		self.state.lock().await.configs.insert(uuid, resp);
	}

	pub async fn last_register(&self) -> Option<ServiceRecord> {
		self.state.lock().await.register_calls.last().cloned()
	}

	pub async fn register_call_count(&self) -> usize {
		self.state.lock().await.register_calls.len()
	}

	pub async fn was_deregistered(&self, uuid: &ServiceIdentity) -> bool {
		self.state.lock().await.deregistered.contains(uuid)
	}

	pub async fn stored_service(&self, uuid: &ServiceIdentity) -> Option<ServiceRecord> {
		self.state.lock().await.services.get(uuid).cloned()
	}

	fn consume(flag: &AtomicBool) -> bool {
		flag.swap(false, Ordering::SeqCst)
	}
}

#[async_trait]
impl DirClient for MockDirClient {
	async fn mappings_get(&self, uuid: &ServiceIdentity) -> Result<AddressMappingSet> {
		Ok(self
			.state
			.lock()
			.await
			.mappings
			.get(uuid)
			.cloned()
			.unwrap_or_default())
	}

	async fn mappings_set(&self, set: &AddressMappingSet) -> Result<()> {
		if Self::consume(&self.fail_mappings_set) {
			return Err(HbError::rpc("mappings_set: injected failure"));
		}
		if let Some(first) = set.mappings.first() {
			self.state
				.lock()
				.await
				.mappings
				.insert(first.uuid.clone(), set.clone());
		}
		Ok(())
	}

	async fn service_get_by_uuid(&self, uuid: &ServiceIdentity) -> Result<ServiceSet> {
		if Self::consume(&self.fail_service_get) {
			return Err(HbError::rpc("service_get_by_uuid: injected failure"));
		}
		let services = self
			.state
			.lock()
			.await
			.services
			.get(uuid)
			.cloned()
			.into_iter()
			.collect();
		Ok(ServiceSet { services })
	}

	async fn service_register(&self, reg: &ServiceRecord) -> Result<()> {
		if Self::consume(&self.fail_service_register) {
			return Err(HbError::rpc("service_register: injected failure"));
		}
		let mut state = self.state.lock().await;
		state.register_calls.push(reg.clone());
		state.services.insert(reg.uuid.clone(), reg.clone());
		Ok(())
	}

	async fn service_deregister(&self, uuid: &ServiceIdentity) -> Result<()> {
		if Self::consume(&self.fail_service_deregister) {
			return Err(HbError::rpc("service_deregister: injected failure"));
		}
		let mut state = self.state.lock().await;
		state.services.remove(uuid);
		state.deregistered.push(uuid.clone());
		Ok(())
	}

	async fn configuration_get(&self, uuid: &ServiceIdentity) -> Result<ConfigurationGetResponse> {
		Ok(self
			.state
			.lock()
			.await
			.configs
			.get(uuid)
			.cloned()
			.unwrap_or_default())
	}

	async fn configuration_set(&self, cfg: &ConfigurationBlob) -> Result<()> {
		if Self::consume(&self.fail_configuration_set) {
			return Err(HbError::rpc("configuration_set: injected failure"));
		}
		self.state.lock().await.configs.insert(
			cfg.uuid.clone(),
			ConfigurationGetResponse {
				version: cfg.version,
				parameters: cfg.parameters.clone(),
			},
		);
		Ok(())
	}
}
