//! UDP listener behind the `listen` command.
//!
//! Each datagram whose first byte is the marker counts as one event and
//! triggers every indicator through its debouncer. Delivery is best effort;
//! nothing is acknowledged.

use crate::indicator::RateLimited;
use anyhow::{Context, Result};
use std::future::Future;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerSummary {
    /// Marker datagrams received
    pub markers: u64,
    /// Datagrams with any other payload
    pub ignored: u64,
    /// Indicator pulses that passed the debouncer
    pub fired: u64,
}

/// Receive markers until `shutdown` completes.
///
/// LED write failures are logged and the loop keeps running.
pub async fn run_listener<F>(
    socket: UdpSocket,
    marker: u8,
    mut indicators: Vec<RateLimited>,
    shutdown: F,
) -> Result<ListenerSummary>
where
    F: Future<Output = ()>,
{
    info!(
        local = %socket.local_addr().context("Listener socket has no local address")?,
        indicators = indicators.len(),
        "Listening for bass markers"
    );

    let mut summary = ListenerSummary::default();
    let mut buf = [0u8; 1];
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(markers = summary.markers, fired = summary.fired, "Listener stopping");
                break;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, from) = match received {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(error = %e, "Marker receive failed");
                        continue;
                    }
                };

                if len == 0 || buf[0] != marker {
                    summary.ignored += 1;
                    debug!(from = %from, len = len, "Ignoring non-marker datagram");
                    continue;
                }

                summary.markers += 1;
                for indicator in indicators.iter_mut() {
                    match indicator.trigger() {
                        Ok(true) => summary.fired += 1,
                        Ok(false) => {}
                        Err(e) => warn!(indicator = %indicator.name(), error = %e, "Indicator write failed"),
                    }
                }
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::Indicator;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct Counter(Arc<AtomicUsize>);

    impl Indicator for Counter {
        fn name(&self) -> String {
            "counter".to_string()
        }

        fn turn_on(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn turn_off(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn toggle(&mut self) -> io::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_markers_trigger_indicators() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        let pulses = Arc::new(AtomicUsize::new(0));
        let indicators = vec![RateLimited::new(
            Box::new(Counter(Arc::clone(&pulses))),
            Duration::ZERO,
        )];

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(run_listener(socket, b'A', indicators, async {
            stop_rx.await.ok();
        }));

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"B", addr).await.unwrap();
        for _ in 0..3 {
            sender.send_to(b"A", addr).await.unwrap();
        }

        for _ in 0..200 {
            if pulses.load(Ordering::SeqCst) == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        stop_tx.send(()).unwrap();
        let summary = handle.await.unwrap().unwrap();

        assert_eq!(pulses.load(Ordering::SeqCst), 3);
        assert_eq!(summary.markers, 3);
        assert_eq!(summary.fired, 3);
        assert_eq!(summary.ignored, 1);
    }
}
