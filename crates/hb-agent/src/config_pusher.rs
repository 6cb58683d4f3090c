//! Configuration Pusher (spec.md §4.4).

use std::sync::atomic::{AtomicU64, Ordering};

use hb_dir_proto::{ConfigurationBlob, DirClient, KeyValuePair, ServiceIdentity};

/// Tracks configuration-push outcomes so best-effort failures (spec.md §4.4:
/// "errors are logged but do not abort startup") are still observable,
/// resolving spec.md §9's open question about surfacing them as a counter.
#[derive(Default)]
pub struct ConfigPushOutcome {
	pub pushed: AtomicU64,
	pub failed: AtomicU64,
}

/// Uploads the agent's flat configuration for `uuid`. Never returns an
/// error: a failed push is logged at `warn!` and counted, not propagated,
/// matching spec.md's error table.
pub async fn push_configuration(
	client: &dyn DirClient,
	uuid: &ServiceIdentity,
	parameters: &std::collections::BTreeMap<String, String>,
	outcome: &ConfigPushOutcome,
) {
	let current = match client.configuration_get(uuid).await {
		Ok(resp) => resp.version,
		Err(e) => {
			tracing::warn!(uuid = %uuid, error = %e, "configuration_get failed; pushing with version 0");
			0
		}
	};

	let params = parameters
		.iter()
		.map(|(k, v)| KeyValuePair {
			key: k.clone(),
			value: v.clone(),
		})
		.collect();

	let blob = ConfigurationBlob {
		uuid: uuid.clone(),
		version: current,
		parameters: params,
	};

	match client.configuration_set(&blob).await {
		Ok(()) => {
			outcome.pushed.fetch_add(1, Ordering::Relaxed);
		}
		Err(e) => {
			outcome.failed.fetch_add(1, Ordering::Relaxed);
			tracing::warn!(uuid = %uuid, error = %e, "configuration_set failed; continuing startup");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use hb_dir_proto::MockDirClient;
	use std::sync::atomic::Ordering;

	#[tokio::test]
	async fn push_success_increments_pushed_counter() {
		let client = MockDirClient::new();
		let uuid = ServiceIdentity::new("U1");
		let mut params = std::collections::BTreeMap::new();
		params.insert("max_clients".to_string(), "128".to_string());
		let outcome = ConfigPushOutcome::default();

		push_configuration(client.as_ref(), &uuid, &params, &outcome).await;

		assert_eq!(outcome.pushed.load(Ordering::Relaxed), 1);
		assert_eq!(outcome.failed.load(Ordering::Relaxed), 0);
		let stored = client.configuration_get(&uuid).await.unwrap();
		assert_eq!(stored.parameters[0].key, "max_clients");
	}

	#[tokio::test]
	async fn push_failure_is_swallowed_and_counted() {
		let client = MockDirClient::new();
		client
			.fail_configuration_set
			.store(true, Ordering::SeqCst);
		let uuid = ServiceIdentity::new("U1");
		let outcome = ConfigPushOutcome::default();

		push_configuration(
			client.as_ref(),
			&uuid,
			&std::collections::BTreeMap::new(),
			&outcome,
		)
		.await;

		assert_eq!(outcome.failed.load(Ordering::Relaxed), 1);
	}
}
