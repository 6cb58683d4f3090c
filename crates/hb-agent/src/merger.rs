//! Service Record Merger (spec.md §4.3) — the heart of the agent.
//!
//! Preserves DIR-owned static attributes across refreshes and, for VOLUME
//! records, folds a generator's own MRC replica into the set of MRCs
//! already known to the DIR without evicting siblings the generator
//! doesn't know about.

use indexmap::IndexMap;

use hb_dir_proto::{
	DirClient, ServiceIdentity, ServiceRecord, MRC_KEY, SERVICE_STATUS_AVAIL, STATIC_ATTR_PREFIX,
	STATIC_STATUS_KEY, VOLUME_TYPE,
};
use hb_util::error::{ErrorContext, HbError, Result};

use crate::generator::ServiceUpdate;

/// Runs one merge cycle for a single generator-supplied update and writes
/// the result back to the DIR. Returns an error for RPC failures and for
/// the VOLUME precondition violation (spec.md §7's "missing `mrc` key");
/// callers decide whether that is fatal (initial cycle) or merely logged
/// (refresh cycle), per spec.md's error policy table.
pub async fn merge_and_register(client: &dyn DirClient, reg: &ServiceUpdate) -> Result<()> {
	let prior = client
		.service_get_by_uuid(&reg.uuid)
		.await
		.err_context("service_get_by_uuid failed during merge")?
		.first();

	let current_version = prior.as_ref().map(|p| p.version).unwrap_or(0);

	let static_attrs = build_static_attrs(prior.as_ref());

	let mut data: IndexMap<String, String> = IndexMap::new();
	for (k, v) in static_attrs {
		data.insert(k, v);
	}

	let is_volume_merge = reg.service_type == VOLUME_TYPE
		&& prior.as_ref().is_some_and(|p| p.uuid == reg.uuid);

	if is_volume_merge {
		merge_volume_replicas(&mut data, reg, prior.as_ref().unwrap())?;
	} else {
		for (k, v) in reg.data.iter() {
			data.insert(k.clone(), v.clone());
		}
	}

	let out = ServiceRecord {
		uuid: reg.uuid.clone(),
		service_type: reg.service_type.clone(),
		name: reg.name.clone(),
		version: current_version,
		data,
	};

	client
		.service_register(&out)
		.await
		.err_context("service_register failed during merge")
}

/// Static attributes preserved from the prior record (step 3), with
/// `static.status` defaulted in if nobody has set it yet (invariant S1).
fn build_static_attrs(prior: Option<&ServiceRecord>) -> IndexMap<String, String> {
	let mut attrs: IndexMap<String, String> = prior
		.map(|p| {
			p.data
				.iter()
				.filter(|(k, _)| k.starts_with(STATIC_ATTR_PREFIX))
				.map(|(k, v)| (k.clone(), v.clone()))
				.collect()
		})
		.unwrap_or_default();

	attrs
		.entry(STATIC_STATUS_KEY.to_string())
		.or_insert_with(|| SERVICE_STATUS_AVAIL.to_string());

	attrs
}

/// Steps 5a-5d: volume-replica merge branch.
fn merge_volume_replicas(
	data: &mut IndexMap<String, String>,
	reg: &ServiceUpdate,
	prior: &ServiceRecord,
) -> Result<()> {
	let mrc_uuid = reg
		.data
		.get(MRC_KEY)
		.ok_or_else(|| {
			HbError::message(format!(
				"VOLUME registration for {} is missing the required `mrc` key",
				reg.uuid
			))
		})?
		.clone();

	let mut contained = false;
	let mut max_n: u32 = 0;

	for (k, v) in prior.data.iter().filter(|(k, _)| k.starts_with(MRC_KEY)) {
		data.insert(k.clone(), v.clone());
		if *v == mrc_uuid {
			contained = true;
		}
		if let Some(n) = mrc_suffix(k) {
			max_n = max_n.max(n);
		}
	}

	if !contained {
		data.insert(format!("{}{}", MRC_KEY, max_n + 1), mrc_uuid);
	}

	for (k, v) in reg.data.iter().filter(|(k, _)| !k.starts_with(MRC_KEY)) {
		data.insert(k.clone(), v.clone());
	}

	Ok(())
}

/// `mrc` itself counts as N=1; `mrcN` counts as N. Returns `None` for keys
/// that start with `mrc` but aren't one of those two shapes.
fn mrc_suffix(key: &str) -> Option<u32> {
	if key == MRC_KEY {
		return Some(1);
	}
	key.strip_prefix(MRC_KEY).and_then(|rest| rest.parse().ok())
}

#[cfg(test)]
mod tests {
	use super::*;
	use hb_dir_proto::MockDirClient;

	fn update(uuid: &str, service_type: &str, data: &[(&str, &str)]) -> ServiceUpdate {
		ServiceUpdate {
			uuid: ServiceIdentity::new(uuid),
			service_type: service_type.to_string(),
			name: "svc".to_string(),
			data: data.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
		}
	}

	fn record(
		uuid: &str,
		service_type: &str,
		version: u64,
		data: &[(&str, &str)],
	) -> ServiceRecord {
		ServiceRecord {
			uuid: ServiceIdentity::new(uuid),
			service_type: service_type.to_string(),
			name: "svc".to_string(),
			version,
			data: data.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
		}
	}

	// S3 — refresh with prior static attribute.
	#[tokio::test]
	async fn preserves_static_attributes_across_refresh() {
		let client = MockDirClient::new();
		client
			.seed_service(record(
				"U1",
				"OSD",
				7,
				&[("static.status", "AVAILABLE"), ("static.load", "0.3")],
			))
			.await;

		let reg = update("U1", "OSD", &[("free_bytes", "1000")]);
		merge_and_register(client.as_ref(), &reg).await.unwrap();

		let written = client.last_register().await.unwrap();
		assert_eq!(written.version, 7);
		assert_eq!(written.data.get("static.status").unwrap(), "AVAILABLE");
		assert_eq!(written.data.get("static.load").unwrap(), "0.3");
		assert_eq!(written.data.get("free_bytes").unwrap(), "1000");
	}

	// Invariant S1 / S2 — status defaulting on first-ever registration.
	#[tokio::test]
	async fn defaults_static_status_when_absent() {
		let client = MockDirClient::new();
		let reg = update("U1", "OSD", &[]);
		merge_and_register(client.as_ref(), &reg).await.unwrap();

		let written = client.last_register().await.unwrap();
		assert_eq!(written.version, 0);
		assert_eq!(written.data.get("static.status").unwrap(), "AVAILABLE");
	}

	// S4 — volume MRC replica extension.
	#[tokio::test]
	async fn extends_volume_mrc_replicas() {
		let client = MockDirClient::new();
		client
			.seed_service(record(
				"Vol1",
				"VOLUME",
				3,
				&[("mrc", "M1"), ("static.status", "AVAILABLE")],
			))
			.await;

		let reg = update("Vol1", "VOLUME", &[("mrc", "M2"), ("uuid", "Vol1")]);
		merge_and_register(client.as_ref(), &reg).await.unwrap();

		let written = client.last_register().await.unwrap();
		assert_eq!(written.data.get("mrc").unwrap(), "M1");
		assert_eq!(written.data.get("mrc2").unwrap(), "M2");
		assert_eq!(written.data.get("uuid").unwrap(), "Vol1");
	}

	// S5 — volume MRC already present: no new key added.
	#[tokio::test]
	async fn does_not_duplicate_known_mrc_replica() {
		let client = MockDirClient::new();
		client
			.seed_service(record(
				"Vol1",
				"VOLUME",
				3,
				&[("mrc", "M1"), ("mrc2", "M2")],
			))
			.await;

		let reg = update("Vol1", "VOLUME", &[("mrc", "M1")]);
		merge_and_register(client.as_ref(), &reg).await.unwrap();

		let written = client.last_register().await.unwrap();
		let mrc_values: std::collections::BTreeSet<_> = written
			.data
			.iter()
			.filter(|(k, _)| k.starts_with("mrc"))
			.map(|(_, v)| v.clone())
			.collect();
		assert_eq!(mrc_values.len(), 2);
		assert!(mrc_values.contains("M1"));
		assert!(mrc_values.contains("M2"));
		assert!(!written.data.contains_key("mrc3"));
	}

	// Invariant 5 — MRC idempotence across two identical cycles.
	#[tokio::test]
	async fn two_identical_cycles_do_not_grow_mrc_set() {
		let client = MockDirClient::new();
		client
			.seed_service(record("Vol1", "VOLUME", 1, &[("mrc", "M1")]))
			.await;

		let reg = update("Vol1", "VOLUME", &[("mrc", "M2")]);
		merge_and_register(client.as_ref(), &reg).await.unwrap();
		merge_and_register(client.as_ref(), &reg).await.unwrap();

		let written = client.last_register().await.unwrap();
		let mrc_count = written
			.data
			.iter()
			.filter(|(k, _)| k.starts_with("mrc"))
			.count();
		assert_eq!(mrc_count, 2);
	}

	#[tokio::test]
	async fn missing_mrc_key_on_volume_registration_is_an_error() {
		let client = MockDirClient::new();
		client
			.seed_service(record("Vol1", "VOLUME", 1, &[("mrc", "M1")]))
			.await;

		let reg = update("Vol1", "VOLUME", &[("uuid", "Vol1")]);
		let err = merge_and_register(client.as_ref(), &reg).await.unwrap_err();
		assert!(err.to_string().contains("missing the required `mrc` key"));
	}

	#[tokio::test]
	async fn non_volume_registration_replaces_non_static_keys_wholesale() {
		let client = MockDirClient::new();
		client
			.seed_service(record(
				"U1",
				"OSD",
				2,
				&[("static.status", "AVAILABLE"), ("stale_key", "old")],
			))
			.await;

		let reg = update("U1", "OSD", &[("fresh_key", "new")]);
		merge_and_register(client.as_ref(), &reg).await.unwrap();

		let written = client.last_register().await.unwrap();
		assert!(!written.data.contains_key("stale_key"));
		assert_eq!(written.data.get("fresh_key").unwrap(), "new");
	}
}
