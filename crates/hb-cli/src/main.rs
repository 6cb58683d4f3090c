//! Command-line launcher for the service-presence agent.

#[macro_use]
extern crate tracing;

use std::net::ToSocketAddrs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use structopt::StructOpt;

use hb_agent::{AgentOptions, ServicePresenceAgent};
use hb_dir_proto::TcpJsonDirClient;
use hb_util::config::read_config;
use hb_util::error::{ErrorContext, Result};

mod generator;

#[derive(StructOpt, Debug)]
#[structopt(
	name = "xtreemfs-hb",
	about = "Registers and refreshes a local service's presence with the Directory Service"
)]
struct Opt {
	/// Path to the agent's configuration file.
	#[structopt(
		short = "c",
		long = "config",
		env = "XTREEMFS_HB_CONFIG",
		default_value = "/etc/xtreemfs-hb.toml"
	)]
	pub config_file: PathBuf,
}

#[tokio::main]
async fn main() {
	let opt = Opt::from_args();

	if std::env::var("RUST_LOG").is_err() {
		std::env::set_var("RUST_LOG", "hb_agent=info,hb_cli=info");
	}
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
		.init();

	std::panic::set_hook(Box::new(move |panic_info| {
		eprintln!("======== PANIC (internal agent error) ========");
		eprintln!("{}", panic_info);
		eprintln!();
		eprintln!("This agent task panicked and the process is aborting to avoid running in");
		eprintln!("an unknown state. If this looks like a bug, please include the log output");
		eprintln!("above when reporting it.");
		std::process::abort();
	}));

	if let Err(e) = run(opt).await {
		error!("{}", e);
		std::process::exit(1);
	}
}

async fn run(opt: Opt) -> Result<()> {
	let config = read_config(&opt.config_file).err_context(format!(
		"unable to read configuration file {:?}",
		opt.config_file
	))?;

	let dir_addr = resolve_dir_address(&config.dir_address)?;
	let client: Arc<dyn hb_dir_proto::DirClient> = Arc::new(TcpJsonDirClient::new(dir_addr));
	let identity = hb_dir_proto::ServiceIdentity::new(config.service_uuid.clone());
	let gen = Arc::new(generator::LocalServiceGenerator::new(&config));

	let options = AgentOptions {
		dir_address: config.dir_address.clone(),
		port: config.port,
		hostname_override: config.hostname_override.clone(),
		bind_address_override: config.bind_address_override.clone(),
		ssl_enabled: config.ssl_enabled,
		grid_ssl_enabled: config.grid_ssl_enabled,
		advertise_datagram: config.advertise_datagram,
		refresh_interval: Duration::from_secs(config.refresh_interval_secs),
		dir_wait: Duration::from_secs(config.dir_wait_secs),
		parameters: config.parameters.clone(),
	};

	let agent = ServicePresenceAgent::new(
		config.service_name.clone(),
		client,
		identity,
		gen,
		options,
	);

	info!(uuid = %agent.identity(), "initializing service presence");
	agent.clone().initialize().await?;

	agent.clone().run().await;
	info!(uuid = %agent.identity(), "heartbeat loop running");

	wait_for_shutdown_signal().await;
	info!(uuid = %agent.identity(), "shutdown requested, deregistering");
	agent.shutdown().await;

	Ok(())
}

fn resolve_dir_address(dir_address: &str) -> Result<std::net::SocketAddr> {
	dir_address
		.to_socket_addrs()
		.err_context(format!("unable to resolve DIR address {}", dir_address))?
		.next()
		.ok_or_else(|| {
			hb_util::error::HbError::message(format!(
				"DIR address {} resolved to no known address",
				dir_address
			))
		})
}

async fn wait_for_shutdown_signal() {
	use tokio::signal::unix::{signal, SignalKind};

	let mut sigterm = match signal(SignalKind::terminate()) {
		Ok(s) => s,
		Err(e) => {
			warn!("unable to install SIGTERM handler: {}", e);
			let _ = tokio::signal::ctrl_c().await;
			return;
		}
	};

	tokio::select! {
		_ = sigterm.recv() => {}
		_ = tokio::signal::ctrl_c() => {}
	}
}
