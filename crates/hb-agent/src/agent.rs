//! Lifecycle Supervisor (spec.md §4.6) and `AgentState` (spec.md §3).
//!
//! Orchestrates initialize -> run -> shutdown, serializes shutdown against
//! an in-flight merge cycle via a critical region (spec.md §5), and
//! publishes `started` / `stopped` / `crashed` notifications the way
//! `garage_rpc::system::System` publishes ring updates over a
//! `tokio::sync::watch` channel — here over a `tokio::sync::broadcast`
//! channel since there may be more than one interested observer.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;

use hb_dir_proto::{DirClient, Protocol, ServiceIdentity};
use hb_util::error::{HbError, Result};

use crate::config_pusher::{self, ConfigPushOutcome};
use crate::discovery::{self, DiscoveryOptions};
use crate::generator::ServiceDataGenerator;
use crate::heartbeat::{AgentEvent, AgentPhase};
use crate::liveness;
use crate::merger;
use crate::registrar;

/// Embedder-facing options (spec.md §6: "Configuration values used").
#[derive(Debug, Clone)]
pub struct AgentOptions {
	pub dir_address: String,
	pub port: u16,
	pub hostname_override: Option<String>,
	pub bind_address_override: Option<String>,
	pub ssl_enabled: bool,
	pub grid_ssl_enabled: bool,
	pub advertise_datagram: bool,
	pub refresh_interval: Duration,
	pub dir_wait: Duration,
	pub parameters: BTreeMap<String, String>,
}

impl AgentOptions {
	fn primary_scheme(&self) -> Protocol {
		Protocol::from_ssl_flags(self.ssl_enabled, self.grid_ssl_enabled)
	}
}

/// The service-presence agent. `quit` is the only field that changes after
/// construction, transitioning `false -> true` exactly once (spec.md §3).
pub struct ServicePresenceAgent {
	name: String,
	identity: ServiceIdentity,
	client: Arc<dyn DirClient>,
	generator: Arc<dyn ServiceDataGenerator>,
	options: AgentOptions,

	quit: AtomicBool,
	advertised_host: RwLock<Option<String>>,

	/// Serializes the loop body against `shutdown()` (spec.md §5).
	critical_region: Mutex<()>,

	cancel_tx: watch::Sender<bool>,
	cancel_rx: watch::Receiver<bool>,
	loop_handle: Mutex<Option<JoinHandle<()>>>,

	events: broadcast::Sender<AgentEvent>,
	phase: RwLock<AgentPhase>,

	pub config_push_outcome: ConfigPushOutcome,
}

impl ServicePresenceAgent {
	pub fn new(
		name: impl Into<String>,
		client: Arc<dyn DirClient>,
		identity: ServiceIdentity,
		generator: Arc<dyn ServiceDataGenerator>,
		options: AgentOptions,
	) -> Arc<Self> {
		let (cancel_tx, cancel_rx) = watch::channel(false);
		let (events, _) = broadcast::channel(16);

		Arc::new(ServicePresenceAgent {
			name: name.into(),
			identity,
			client,
			generator,
			options,
			quit: AtomicBool::new(false),
			advertised_host: RwLock::new(None),
			critical_region: Mutex::new(()),
			cancel_tx,
			cancel_rx,
			loop_handle: Mutex::new(None),
			events,
			phase: RwLock::new(AgentPhase::New),
			config_push_outcome: ConfigPushOutcome::default(),
		})
	}

	pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
		self.events.subscribe()
	}

	pub async fn advertised_host_name(&self) -> Option<String> {
		self.advertised_host.read().await.clone()
	}

	pub async fn phase(&self) -> AgentPhase {
		*self.phase.read().await
	}

	/// Blocks until the DIR is reachable (spec.md §4.7), then runs the
	/// discovery -> registrar -> merger -> pusher sequence once.
	pub async fn initialize(self: Arc<Self>) -> Result<()> {
		*self.phase.write().await = AgentPhase::Initializing;

		liveness::wait_for_dir(
			&self.options.dir_address,
			self.options.dir_wait.as_secs(),
			self.cancel_rx.clone(),
		)
		.await?;

		let discovery = discovery::discover(
			&self.identity,
			&DiscoveryOptions {
				port: self.options.port,
				primary_scheme: self.options.primary_scheme(),
				advertise_datagram: self.options.advertise_datagram,
				hostname_override: self.options.hostname_override.clone(),
				bind_address_override: self.options.bind_address_override.clone(),
			},
		);
		*self.advertised_host.write().await = discovery.advertised_host;

		registrar::register_mappings(
			self.client.as_ref(),
			&self.identity,
			discovery.endpoints,
		)
		.await?;

		self.run_merge_cycle_fatal().await?;

		config_pusher::push_configuration(
			self.client.as_ref(),
			&self.identity,
			&self.options.parameters,
			&self.config_push_outcome,
		)
		.await;

		Ok(())
	}

	/// Enters the Heartbeat Loop. Publishes `started` strictly before the
	/// loop's first (post-initialization) merge cycle, per spec.md §5.
	pub async fn run(self: Arc<Self>) {
		*self.phase.write().await = AgentPhase::Running;
		let _ = self.events.send(AgentEvent::Started);

		let cancel_rx = self.cancel_rx.clone();
		let agent = self.clone();
		let handle = tokio::spawn(async move {
			agent.heartbeat_loop(cancel_rx).await;
		});
		*self.loop_handle.lock().await = Some(handle);
	}

	async fn heartbeat_loop(self: Arc<Self>, mut stop_signal: watch::Receiver<bool>) {
		while !self.quit.load(Ordering::SeqCst) {
			{
				let _guard = self.critical_region.lock().await;
				if self.quit.load(Ordering::SeqCst) {
					break;
				}
				if let Err(e) = self.run_merge_cycle_soft().await {
					if matches!(e, HbError::Cancelled) {
						self.quit.store(true, Ordering::SeqCst);
						break;
					}
					tracing::error!(uuid = %self.identity, error = %e, "refresh cycle failed; retrying next interval");
				}
			}

			tokio::select! {
				_ = tokio::time::sleep(self.options.refresh_interval) => {}
				_ = stop_signal.changed() => {}
			}
		}

		*self.phase.write().await = AgentPhase::Stopped;
		let _ = self.events.send(AgentEvent::Stopped);
	}

	/// One merge cycle across every service the generator returns. Used
	/// both by `initialize()` (where a failure is fatal) and by the loop
	/// body (where it is logged and retried next cycle).
	async fn run_merge_cycle(&self) -> Result<()> {
		let updates = self.generator.generate().await?;
		for update in &updates {
			merger::merge_and_register(self.client.as_ref(), update).await?;
		}
		Ok(())
	}

	async fn run_merge_cycle_fatal(&self) -> Result<()> {
		self.run_merge_cycle().await
	}

	async fn run_merge_cycle_soft(&self) -> Result<()> {
		self.run_merge_cycle().await
	}

	/// Idempotent in effect: issues a best-effort deregister, then cancels
	/// the loop and waits for it to observe `quit`. Serialized against an
	/// in-flight merge cycle by the critical region (spec.md §7:
	/// "shutdown() returns only after any in-flight merge has completed").
	pub async fn shutdown(self: Arc<Self>) {
		*self.phase.write().await = AgentPhase::Stopping;

		let guard = self.critical_region.lock().await;
		if let Err(e) = self.client.service_deregister(&self.identity).await {
			tracing::warn!(uuid = %self.identity, error = %e, "service_deregister failed during shutdown");
		}
		self.quit.store(true, Ordering::SeqCst);
		drop(guard);

		let _ = self.cancel_tx.send(true);

		let handle = self.loop_handle.lock().await.take();
		if let Some(handle) = handle {
			if let Err(e) = handle.await {
				tracing::error!(uuid = %self.identity, error = %e, "heartbeat loop task panicked");
				*self.phase.write().await = AgentPhase::Crashed;
				let _ = self.events.send(AgentEvent::Crashed(e.to_string()));
			}
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn identity(&self) -> &ServiceIdentity {
		&self.identity
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::generator::ServiceUpdate;
	use async_trait::async_trait;
	use hb_dir_proto::MockDirClient;
	use indexmap::IndexMap;

	struct FixedGenerator(Vec<ServiceUpdate>);

	#[async_trait]
	impl ServiceDataGenerator for FixedGenerator {
		async fn generate(&self) -> Result<Vec<ServiceUpdate>> {
			Ok(self.0.clone())
		}
	}

	fn opts(dir_address: String) -> AgentOptions {
		AgentOptions {
			dir_address,
			port: 32640,
			hostname_override: Some("node1.example".to_string()),
			bind_address_override: None,
			ssl_enabled: false,
			grid_ssl_enabled: false,
			advertise_datagram: false,
			refresh_interval: Duration::from_millis(50),
			dir_wait: Duration::from_secs(5),
			parameters: BTreeMap::new(),
		}
	}

	async fn spawn_fake_dir() -> String {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			loop {
				if let Ok((_s, _)) = listener.accept().await {
					continue;
				} else {
					break;
				}
			}
		});
		addr.to_string()
	}

	// S6 — shutdown during the heartbeat wait completes promptly and
	// deregisters.
	#[tokio::test]
	async fn shutdown_during_sleep_is_prompt_and_deregisters() {
		let dir_addr = spawn_fake_dir().await;
		let client = MockDirClient::new();
		let uuid = ServiceIdentity::new("U1");
		let generator = Arc::new(FixedGenerator(vec![ServiceUpdate {
			uuid: uuid.clone(),
			service_type: "OSD".to_string(),
			name: "osd".to_string(),
			data: IndexMap::new(),
		}]));

		let mut agent_opts = opts(dir_addr);
		agent_opts.refresh_interval = Duration::from_secs(60);

		let agent =
			ServicePresenceAgent::new("test-agent", client.clone(), uuid.clone(), generator, agent_opts);

		agent.clone().initialize().await.unwrap();
		agent.clone().run().await;

		tokio::time::sleep(Duration::from_millis(50)).await;

		let start = std::time::Instant::now();
		agent.clone().shutdown().await;
		assert!(start.elapsed() < Duration::from_secs(1));

		assert!(client.was_deregistered(&uuid).await);
		assert_eq!(agent.phase().await, AgentPhase::Stopped);
	}

	#[tokio::test]
	async fn started_and_stopped_events_are_published() {
		let dir_addr = spawn_fake_dir().await;
		let client = MockDirClient::new();
		let uuid = ServiceIdentity::new("U2");
		let generator = Arc::new(FixedGenerator(vec![]));
		let agent = ServicePresenceAgent::new(
			"test-agent",
			client,
			uuid,
			generator,
			opts(dir_addr),
		);

		let mut events = agent.subscribe();
		agent.clone().initialize().await.unwrap();
		agent.clone().run().await;
		assert!(matches!(events.recv().await.unwrap(), AgentEvent::Started));

		agent.clone().shutdown().await;
		assert!(matches!(events.recv().await.unwrap(), AgentEvent::Stopped));
	}
}
