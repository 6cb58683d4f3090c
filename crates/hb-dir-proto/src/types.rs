//! Wire types exchanged with the Directory Service (DIR).
//!
//! These mirror spec.md §3 exactly; nothing here is invented beyond what
//! the Address Mapping Registrar, Service Record Merger and Configuration
//! Pusher need to talk to `DirClient`.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Prefix identifying DIR/operator-owned attributes that must survive a
/// refresh even if the generator does not re-supply them.
pub const STATIC_ATTR_PREFIX: &str = "static.";
/// Key used for the mandatory status attribute (invariant S1).
pub const STATIC_STATUS_KEY: &str = "static.status";
/// Default value inserted for `static.status` when neither the prior
/// record nor the generator supplied one. spec.md calls this "the numeric
/// ordinal of SERVICE_STATUS_AVAIL"; we carry it as the symbolic name used
/// throughout spec.md's own worked examples (S3, S4).
pub const SERVICE_STATUS_AVAIL: &str = "AVAILABLE";

/// Advisory freshness hint attached to every address mapping.
pub const ADDRESS_MAPPING_TTL_S: u32 = 3600;
/// The only match-network selector this core ever emits.
pub const MATCH_NETWORK_ANY: &str = "*";
/// Fixed heartbeat cadence (spec.md §6).
pub const UPDATE_INTERVAL_MS: u64 = 60_000;

/// A stable, opaque identifier for one service instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceIdentity(pub String);

impl ServiceIdentity {
	pub fn new(uuid: impl Into<String>) -> Self {
		ServiceIdentity(uuid.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ServiceIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for ServiceIdentity {
	fn from(s: &str) -> Self {
		ServiceIdentity(s.to_string())
	}
}

impl From<String> for ServiceIdentity {
	fn from(s: String) -> Self {
		ServiceIdentity(s)
	}
}

/// RPC transport scheme tag (spec.md §3/§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
	Pbrpc,
	Pbrpcs,
	Pbrpcg,
	Pbrpcu,
}

impl Protocol {
	pub fn tag(self) -> &'static str {
		match self {
			Protocol::Pbrpc => "pbrpc",
			Protocol::Pbrpcs => "pbrpcs",
			Protocol::Pbrpcg => "pbrpcg",
			Protocol::Pbrpcu => "pbrpcu",
		}
	}

	/// Scheme selection rule from spec.md §6: no-SSL -> pbrpc,
	/// SSL+GRID -> pbrpcg, SSL only -> pbrpcs.
	pub fn from_ssl_flags(ssl_enabled: bool, grid_ssl_enabled: bool) -> Self {
		match (ssl_enabled, grid_ssl_enabled) {
			(false, _) => Protocol::Pbrpc,
			(true, true) => Protocol::Pbrpcg,
			(true, false) => Protocol::Pbrpcs,
		}
	}
}

impl fmt::Display for Protocol {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.tag())
	}
}

/// One reachable network endpoint for a service, as registered with the DIR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
	pub uuid: ServiceIdentity,
	pub version: u64,
	pub protocol: Protocol,
	pub address: String,
	pub port: u16,
	pub match_network: String,
	pub ttl_s: u32,
	pub uri: String,
}

impl Endpoint {
	pub fn new(uuid: ServiceIdentity, protocol: Protocol, address: &str, port: u16) -> Self {
		let uri = format!("{}://{}:{}", protocol.tag(), address, port);
		Endpoint {
			uuid,
			version: 0,
			protocol,
			address: address.to_string(),
			port,
			match_network: MATCH_NETWORK_ANY.to_string(),
			ttl_s: ADDRESS_MAPPING_TTL_S,
			uri,
		}
	}
}

/// Response to `mappings_get`: the DIR's current set of endpoints for a UUID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressMappingSet {
	pub mappings: Vec<Endpoint>,
}

impl AddressMappingSet {
	/// version = mappings[0].version if non-empty, else 0 (spec.md §4.2 step 1).
	pub fn version(&self) -> u64 {
		self.mappings.first().map(|m| m.version).unwrap_or(0)
	}
}

/// The DIR-side entity refreshed by the Service Record Merger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
	pub uuid: ServiceIdentity,
	#[serde(rename = "type")]
	pub service_type: String,
	pub name: String,
	pub version: u64,
	pub data: IndexMap<String, String>,
}

/// Response to `service_get_by_uuid`: 0 or 1 matching records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSet {
	pub services: Vec<ServiceRecord>,
}

impl ServiceSet {
	pub fn first(self) -> Option<ServiceRecord> {
		self.services.into_iter().next()
	}
}

/// An ordered key/value pair, as pushed by the Configuration Pusher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
	pub key: String,
	pub value: String,
}

/// A versioned, flat configuration blob for one UUID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationBlob {
	pub uuid: ServiceIdentity,
	pub version: u64,
	pub parameters: Vec<KeyValuePair>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigurationGetResponse {
	pub version: u64,
	pub parameters: Vec<KeyValuePair>,
}

pub const VOLUME_TYPE: &str = "VOLUME";
/// Key under which a VOLUME registration's own MRC replica is carried.
pub const MRC_KEY: &str = "mrc";
