//! # Event Notification
//!
//! Delivers "a bass hit happened now" to the actuation side as a single
//! marker byte over UDP.
//!
//! ## Delivery Contract:
//! - **Non-blocking**: the socket is in non-blocking mode; a full send buffer
//!   drops the marker instead of stalling the audio callback
//! - **Fire-and-forget**: no acknowledgment, no retry, no sequence number
//! - **Loss-tolerant**: failures are logged and counted here and never reach
//!   the caller

use crate::state::PipelineStats;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Anything that can be told that one event occurred.
pub trait EventNotifier: Send {
    fn notify(&mut self);
}

/// Sends the marker datagram to every configured destination.
pub struct UdpNotifier {
    socket: UdpSocket,
    destinations: Vec<Destination>,
    marker: [u8; 1],
    stats: Arc<PipelineStats>,
}

/// One receiver and whether its previous send failed. Failures are logged at
/// `warn` only on the transition into the failing state.
#[derive(Debug, Clone, Copy)]
struct Destination {
    addr: SocketAddr,
    failing: bool,
}

impl Destination {
    fn record_sent(&mut self, stats: &PipelineStats) {
        stats.record_notification_sent();
        if self.failing {
            info!(destination = %self.addr, "Marker datagrams delivered again");
            self.failing = false;
        }
    }

    fn record_failure(&mut self, stats: &PipelineStats, err: &io::Error) {
        stats.record_notification_failed();
        if self.failing {
            debug!(destination = %self.addr, error = %err, "Marker datagram dropped");
        } else {
            warn!(destination = %self.addr, error = %err, "Marker datagram dropped; continuing");
            self.failing = true;
        }
    }
}

impl UdpNotifier {
    /// Bind the sending socket and switch it to non-blocking mode.
    pub fn new(
        bind: SocketAddr,
        destinations: Vec<SocketAddr>,
        marker: u8,
        stats: Arc<PipelineStats>,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(bind)?;
        socket.set_nonblocking(true)?;

        info!(
            local = %socket.local_addr()?,
            destinations = ?destinations,
            marker = marker,
            "UDP notifier ready"
        );

        Ok(Self {
            socket,
            destinations: destinations
                .into_iter()
                .map(|addr| Destination { addr, failing: false })
                .collect(),
            marker: [marker],
            stats,
        })
    }
}

impl EventNotifier for UdpNotifier {
    fn notify(&mut self) {
        for dest in &mut self.destinations {
            match self.socket.send_to(&self.marker, dest.addr) {
                Ok(_) => dest.record_sent(&self.stats),
                Err(err) => dest.record_failure(&self.stats, &err),
            }
        }
    }
}
