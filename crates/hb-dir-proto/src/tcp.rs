//! A minimal line-delimited JSON realization of `DirClient` over TCP.
//!
//! spec.md leaves the DIR transport framing as an external collaborator;
//! this gives the workspace a real, runnable client (rather than only a
//! test mock) without inventing a binary protocol. Each call opens a fresh
//! connection, writes one JSON request line, and reads one JSON response
//! line — adequate for a heartbeat agent that issues at most one RPC at a
//! time per component.

use std::net::SocketAddr;

use async_trait::async_trait;
use hb_util::error::{ErrorContext, HbError, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::client::{DirClient, AUTH_GROUPS, AUTH_USER};
use crate::types::*;

#[derive(Serialize, Deserialize)]
enum DirRequest {
	MappingsGet(ServiceIdentity),
	MappingsSet(AddressMappingSet),
	ServiceGetByUuid(ServiceIdentity),
	ServiceRegister(ServiceRecord),
	ServiceDeregister(ServiceIdentity),
	ConfigurationGet(ServiceIdentity),
	ConfigurationSet(ConfigurationBlob),
}

/// Every request is stamped with the synthetic caller identity spec.md §6
/// describes (`AUTH_USER`/`AUTH_GROUPS`) so a real DIR implementation has
/// something to authorize against, even though this core treats auth as
/// out of scope beyond the anonymous marker.
#[derive(Serialize, Deserialize)]
struct DirEnvelope {
	user: String,
	groups: Vec<String>,
	request: DirRequest,
}

impl DirEnvelope {
	fn new(request: DirRequest) -> Self {
		DirEnvelope {
			user: AUTH_USER.to_string(),
			groups: AUTH_GROUPS.iter().map(|g| g.to_string()).collect(),
			request,
		}
	}
}

#[derive(Serialize, Deserialize)]
enum DirResponse {
	Mappings(AddressMappingSet),
	Services(ServiceSet),
	Configuration(ConfigurationGetResponse),
	Ok,
	Err(String),
}

pub struct TcpJsonDirClient {
	addr: SocketAddr,
}

impl TcpJsonDirClient {
	pub fn new(addr: SocketAddr) -> Self {
		TcpJsonDirClient { addr }
	}

	async fn call(&self, req: DirRequest) -> Result<DirResponse> {
		let mut stream = TcpStream::connect(self.addr)
			.await
			.err_context(format!("connecting to DIR at {}", self.addr))?;

		let envelope = DirEnvelope::new(req);
		let mut line = serde_json::to_string(&envelope).map_err(|e| HbError::rpc(e))?;
		line.push('\n');
		stream
			.write_all(line.as_bytes())
			.await
			.err_context("writing DIR request")?;
		stream.flush().await.err_context("flushing DIR request")?;

		let mut reader = BufReader::new(stream);
		let mut resp_line = String::new();
		reader
			.read_line(&mut resp_line)
			.await
			.err_context("reading DIR response")?;
		if resp_line.is_empty() {
			return Err(HbError::rpc("DIR closed the connection without a response"));
		}

		let resp: DirResponse =
			serde_json::from_str(resp_line.trim_end()).map_err(|e| HbError::rpc(e))?;
		if let DirResponse::Err(msg) = &resp {
			return Err(HbError::rpc(msg.clone()));
		}
		Ok(resp)
	}
}

#[async_trait]
impl DirClient for TcpJsonDirClient {
	async fn mappings_get(&self, uuid: &ServiceIdentity) -> Result<AddressMappingSet> {
		match self.call(DirRequest::MappingsGet(uuid.clone())).await? {
			DirResponse::Mappings(m) => Ok(m),
			_ => Err(HbError::rpc("unexpected response to mappings_get")),
		}
	}

	async fn mappings_set(&self, set: &AddressMappingSet) -> Result<()> {
		match self.call(DirRequest::MappingsSet(set.clone())).await? {
			DirResponse::Ok => Ok(()),
			_ => Err(HbError::rpc("unexpected response to mappings_set")),
		}
	}

	async fn service_get_by_uuid(&self, uuid: &ServiceIdentity) -> Result<ServiceSet> {
		match self
			.call(DirRequest::ServiceGetByUuid(uuid.clone()))
			.await?
		{
			DirResponse::Services(s) => Ok(s),
			_ => Err(HbError::rpc("unexpected response to service_get_by_uuid")),
		}
	}

	async fn service_register(&self, reg: &ServiceRecord) -> Result<()> {
		match self
			.call(DirRequest::ServiceRegister(reg.clone()))
			.await?
		{
			DirResponse::Ok => Ok(()),
			_ => Err(HbError::rpc("unexpected response to service_register")),
		}
	}

	async fn service_deregister(&self, uuid: &ServiceIdentity) -> Result<()> {
		match self
			.call(DirRequest::ServiceDeregister(uuid.clone()))
			.await?
		{
			DirResponse::Ok => Ok(()),
			_ => Err(HbError::rpc("unexpected response to service_deregister")),
		}
	}

	async fn configuration_get(&self, uuid: &ServiceIdentity) -> Result<ConfigurationGetResponse> {
		match self
			.call(DirRequest::ConfigurationGet(uuid.clone()))
			.await?
		{
			DirResponse::Configuration(c) => Ok(c),
			_ => Err(HbError::rpc("unexpected response to configuration_get")),
		}
	}

	async fn configuration_set(&self, cfg: &ConfigurationBlob) -> Result<()> {
		match self
			.call(DirRequest::ConfigurationSet(cfg.clone()))
			.await?
		{
			DirResponse::Ok => Ok(()),
			_ => Err(HbError::rpc("unexpected response to configuration_set")),
		}
	}
}
