//! Embedder-facing configuration.
//!
//! `garage_util::config::Config` is read from a TOML file and handed to
//! `garage_rpc::system::System::new` as a `&Config`; `Config` fields are
//! referenced directly (`config.metadata_dir`, `config.rpc_bind_addr`, ...)
//! rather than through accessors. This module follows the same shape for
//! the values spec.md §6 says the agent consumes.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ErrorContext, HbError, Result};

fn default_refresh_interval_secs() -> u64 {
	60
}

fn default_dir_wait_secs() -> u64 {
	60
}

fn default_advertise_datagram() -> bool {
	false
}

/// Configuration consumed by the service-presence agent.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	/// Host:port of the Directory Service.
	pub dir_address: String,

	/// Stable UUID identifying the local service instance.
	pub service_uuid: String,

	/// Service record type, e.g. `MRC`, `OSD`, `VOLUME`.
	pub service_type: String,

	/// Human-readable service name stored on the DIR record.
	#[serde(default)]
	pub service_name: String,

	/// Port the local service listens on.
	pub port: u16,

	/// Overrides endpoint enumeration with a fixed hostname.
	#[serde(default)]
	pub hostname_override: Option<String>,

	/// Overrides endpoint enumeration with a fixed bind address.
	#[serde(default)]
	pub bind_address_override: Option<String>,

	/// Whether TLS is enabled on the advertised endpoint.
	#[serde(default)]
	pub ssl_enabled: bool,

	/// Whether GRID-SSL is enabled (only meaningful if `ssl_enabled`).
	#[serde(default)]
	pub grid_ssl_enabled: bool,

	/// Whether to also advertise a UDP (`pbrpcu`) endpoint.
	#[serde(default = "default_advertise_datagram")]
	pub advertise_datagram: bool,

	/// Refresh cadence for the heartbeat loop, in seconds. Defaults to
	/// spec.md's fixed 60s cadence if unset.
	#[serde(default = "default_refresh_interval_secs")]
	pub refresh_interval_secs: u64,

	/// Maximum time to wait for the DIR to become reachable at startup.
	#[serde(default = "default_dir_wait_secs")]
	pub dir_wait_secs: u64,

	/// Flat key/value configuration pushed by the Configuration Pusher.
	#[serde(default)]
	pub parameters: std::collections::BTreeMap<String, String>,
}

pub fn read_config<P: AsRef<Path>>(path: P) -> Result<Config> {
	let path = path.as_ref();
	let data = std::fs::read_to_string(path)
		.err_context(format!("unable to read configuration file {:?}", path))?;
	toml::from_str(&data)
		.map_err(|e| HbError::Config(format!("invalid configuration file {:?}: {}", path, e)))
}

pub fn default_config_path() -> PathBuf {
	PathBuf::from("/etc/xtreemfs-hb.toml")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_minimal_config() -> Result<()> {
		let toml = r#"
			dir_address = "dir.example:32638"
			service_uuid = "11111111-1111-1111-1111-111111111111"
			service_type = "OSD"
			port = 32640
		"#;
		let cfg: Config = toml::from_str(toml).unwrap();
		assert_eq!(cfg.refresh_interval_secs, 60);
		assert_eq!(cfg.dir_wait_secs, 60);
		assert!(!cfg.advertise_datagram);
		Ok(())
	}
}
