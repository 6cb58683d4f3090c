//! Address Mapping Registrar (spec.md §4.2).

use hb_dir_proto::{AddressMappingSet, DirClient, Endpoint, ServiceIdentity};
use hb_util::error::{ErrorContext, Result};

/// Fetches the DIR's current mapping version for `uuid`, stamps the first
/// produced endpoint with it (leaving the rest at version 0), and writes
/// the set back. No retry at this layer: the DIR Liveness Waiter is
/// responsible for gating startup before this runs.
pub async fn register_mappings(
	client: &dyn DirClient,
	uuid: &ServiceIdentity,
	mut endpoints: Vec<Endpoint>,
) -> Result<()> {
	if endpoints.is_empty() {
		return Ok(());
	}

	let prior = client
		.mappings_get(uuid)
		.await
		.err_context("mappings_get failed during startup registration")?;
	let version = prior.version();

	endpoints[0].version = version;

	let set = AddressMappingSet {
		mappings: endpoints,
	};
	client
		.mappings_set(&set)
		.await
		.err_context("mappings_set failed during startup registration")
}
