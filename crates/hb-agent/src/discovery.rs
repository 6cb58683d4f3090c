//! Endpoint Discoverer (spec.md §4.1).
//!
//! Enumerates reachable local endpoints the same way teacher's
//! `garage_rpc::system::get_default_ip` does (via `pnet_datalink`), but
//! produces one `Endpoint` per interface rather than picking a single
//! default address, per spec.md's decision rule 1.

use hb_dir_proto::{Endpoint, Protocol, ServiceIdentity};

/// Inputs the Discoverer needs (spec.md §4.1).
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
	pub port: u16,
	pub primary_scheme: Protocol,
	pub advertise_datagram: bool,
	pub hostname_override: Option<String>,
	pub bind_address_override: Option<String>,
}

/// Output of one discovery pass: the endpoints to register, plus the host
/// that becomes `AgentState.advertisedHost`.
#[derive(Debug, Clone)]
pub struct DiscoveryResult {
	pub endpoints: Vec<Endpoint>,
	pub advertised_host: Option<String>,
}

pub fn discover(uuid: &ServiceIdentity, opts: &DiscoveryOptions) -> DiscoveryResult {
	let hostname_override = opts.hostname_override.as_deref().filter(|s| !s.is_empty());
	let bind_override = opts
		.bind_address_override
		.as_deref()
		.filter(|s| !s.is_empty());

	if hostname_override.is_none() && bind_override.is_none() {
		discover_multihomed(uuid, opts)
	} else {
		discover_override(uuid, opts, hostname_override, bind_override)
	}
}

/// Decision rule 1: enumerate all locally reachable, non-loopback-only
/// interface addresses; one Endpoint per (address, primary_scheme), plus
/// one per address under `pbrpcu` if datagram advertisement is requested.
fn discover_multihomed(uuid: &ServiceIdentity, opts: &DiscoveryOptions) -> DiscoveryResult {
	let addrs = local_addresses();
	if addrs.is_empty() {
		// spec.md §4.1 guarantee: registration of the mapping set is
		// skipped downstream, but startup still proceeds to the Merger.
		tracing::warn!(uuid = %uuid, "endpoint discovery found no non-loopback interfaces");
		return DiscoveryResult {
			endpoints: vec![],
			advertised_host: None,
		};
	}

	let mut endpoints = Vec::with_capacity(addrs.len() * 2);
	for addr in &addrs {
		endpoints.push(Endpoint::new(
			uuid.clone(),
			opts.primary_scheme,
			addr,
			opts.port,
		));
	}
	if opts.advertise_datagram {
		for addr in &addrs {
			endpoints.push(Endpoint::new(uuid.clone(), Protocol::Pbrpcu, addr, opts.port));
		}
	}

	DiscoveryResult {
		endpoints,
		advertised_host: addrs.into_iter().next(),
	}
}

/// Decision rule 2: a hostname or bind-address override pins the agent to
/// exactly one advertised endpoint.
fn discover_override(
	uuid: &ServiceIdentity,
	opts: &DiscoveryOptions,
	hostname_override: Option<&str>,
	bind_override: Option<&str>,
) -> DiscoveryResult {
	let host = if let Some(h) = hostname_override {
		h.strip_prefix('/').unwrap_or(h).to_string()
	} else {
		let raw = bind_override.unwrap_or_default();
		let raw = raw.strip_prefix('/').unwrap_or(raw);
		host_name_of(raw).to_string()
	};

	if resolve_best_effort(&host).is_none() {
		tracing::warn!(uuid = %uuid, host = %host, "could not resolve override host, proceeding anyway");
	}

	let mut endpoints = vec![Endpoint::new(
		uuid.clone(),
		opts.primary_scheme,
		&host,
		opts.port,
	)];
	if opts.advertise_datagram {
		endpoints.push(Endpoint::new(uuid.clone(), Protocol::Pbrpcu, &host, opts.port));
	}

	DiscoveryResult {
		endpoints,
		advertised_host: Some(host),
	}
}

/// Extracts the host component of a bind address, stripping a trailing
/// `:<port>` (spec.md's `bindAddressOverride.hostName`). An unbracketed
/// address with more than one `:` (bare IPv6) has no port to strip and is
/// returned unchanged.
fn host_name_of(addr: &str) -> &str {
	if let Some(rest) = addr.strip_prefix('[') {
		if let Some((host, _)) = rest.split_once(']') {
			return host;
		}
	}
	match addr.rsplit_once(':') {
		Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => host,
		_ => addr,
	}
}

fn resolve_best_effort(host: &str) -> Option<std::net::IpAddr> {
	use std::net::ToSocketAddrs;
	(host, 0u16)
		.to_socket_addrs()
		.ok()
		.and_then(|mut it| it.next())
		.map(|a| a.ip())
}

/// All addresses of interfaces that are up and not loopback. Falls back to
/// loopback addresses if no non-loopback interface exists, per spec.md
/// ("not loopback-only unless no non-loopback exists").
fn local_addresses() -> Vec<String> {
	let interfaces = pnet_datalink::interfaces();

	let non_loopback: Vec<String> = interfaces
		.iter()
		.filter(|i| i.is_up() && !i.is_loopback())
		.flat_map(|i| i.ips.iter().map(|ip| ip.ip().to_string()))
		.collect();

	if !non_loopback.is_empty() {
		return non_loopback;
	}

	interfaces
		.iter()
		.filter(|i| i.is_up())
		.flat_map(|i| i.ips.iter().map(|ip| ip.ip().to_string()))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn opts() -> DiscoveryOptions {
		DiscoveryOptions {
			port: 32636,
			primary_scheme: Protocol::Pbrpc,
			advertise_datagram: false,
			hostname_override: None,
			bind_address_override: None,
		}
	}

	#[test]
	fn hostname_override_strips_leading_slash_and_emits_one_endpoint() {
		let uuid = ServiceIdentity::new("U1");
		let mut o = opts();
		o.hostname_override = Some("/node7.example".to_string());
		let res = discover_override(&uuid, &o, Some("/node7.example"), None);
		assert_eq!(res.advertised_host.as_deref(), Some("node7.example"));
		assert_eq!(res.endpoints.len(), 1);
		assert_eq!(res.endpoints[0].uri, "pbrpc://node7.example:32636");
	}

	#[test]
	fn hostname_override_with_datagram_emits_two_endpoints() {
		let uuid = ServiceIdentity::new("U1");
		let mut o = opts();
		o.advertise_datagram = true;
		let res = discover_override(&uuid, &o, Some("node7.example"), None);
		assert_eq!(res.endpoints.len(), 2);
		assert_eq!(res.endpoints[1].protocol, Protocol::Pbrpcu);
	}

	#[test]
	fn bind_address_used_when_hostname_absent() {
		let uuid = ServiceIdentity::new("U1");
		let o = opts();
		let res = discover_override(&uuid, &o, None, Some("10.1.2.3"));
		assert_eq!(res.advertised_host.as_deref(), Some("10.1.2.3"));
	}

	#[test]
	fn bind_address_with_port_yields_host_only() {
		let uuid = ServiceIdentity::new("U1");
		let o = opts();
		let res = discover_override(&uuid, &o, None, Some("0.0.0.0:32640"));
		assert_eq!(res.advertised_host.as_deref(), Some("0.0.0.0"));
		assert_eq!(res.endpoints[0].uri, "pbrpc://0.0.0.0:32636");
	}

	#[test]
	fn host_name_of_strips_trailing_port_only() {
		assert_eq!(host_name_of("0.0.0.0:32640"), "0.0.0.0");
		assert_eq!(host_name_of("node7.example"), "node7.example");
		assert_eq!(host_name_of("[::1]:32640"), "::1");
	}
}
