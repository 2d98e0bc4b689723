//! udp_tx.rs — UDP transmitter for telemetry envelopes
//!
//! Sends one JSON datagram per motion epoch to the backend location hub
//! (127.0.0.1:5555 by default). Send errors are logged but never crash the
//! sim; the hub catches up from the sequence numbers.

use std::net::UdpSocket;

use fleet_types::TelemetryEnvelope;
use tracing::{debug, warn};

pub struct UdpTransmitter {
    socket: UdpSocket,
    hub_addr: String,
}

impl UdpTransmitter {
    pub fn new(hub_addr: &str) -> Result<Self, std::io::Error> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(false)?;
        Ok(Self { socket, hub_addr: hub_addr.to_string() })
    }

    /// Send one envelope to the hub. Errors are logged, never returned.
    pub fn send(&self, envelope: &TelemetryEnvelope) {
        let bytes = match serde_json::to_vec(envelope) {
            Ok(b) => b,
            Err(e) => {
                warn!("UDP: serialize failed: {e}");
                return;
            }
        };

        if let Err(e) = self.socket.send_to(&bytes, &self.hub_addr) {
            warn!("UDP: send to {} failed: {e}", self.hub_addr);
        } else {
            debug!(
                "UDP → {} bus={} seq={} speed={:.1}km/h",
                self.hub_addr, envelope.bus_id, envelope.seq_num, envelope.speed_kmh
            );
        }
    }
}
