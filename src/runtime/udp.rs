//! UDP listener feeding datagrams into a [`QueueManager`].

use std::io;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core::{Disposition, QueueManager};

/// Receive buffer size; one byte over the largest IPv4 payload so oversized
/// datagrams reach admission instead of being silently cut.
pub const RECV_BUFFER_SIZE: usize = 65_536;

/// Receive on `socket` and call [`QueueManager::ingest`] for each datagram
/// until `shutdown` turns true, its sender is dropped, or the manager stops.
///
/// Returns the number of datagrams received.
///
/// # Errors
///
/// Returns the socket error that ended the loop.
pub async fn serve_datagrams(
    socket: UdpSocket,
    manager: Arc<QueueManager>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<u64> {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    let mut received = 0u64;
    info!(local_addr = ?socket.local_addr().ok(), "udp listener started");

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                let (len, peer) = match result {
                    Ok(ok) => ok,
                    // ICMP port-unreachable from an earlier send surfaces here on some platforms
                    Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                        warn!(error = %e, "udp receive reset; continuing");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                received += 1;
                match manager.ingest(&buf[..len]) {
                    Disposition::Closed => {
                        debug!("manager stopped, udp listener exiting");
                        break;
                    }
                    Disposition::Dropped(reason) => debug!(%peer, %reason, len, "datagram dropped"),
                    Disposition::Queued => {}
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!(received, "udp listener stopped");
    Ok(received)
}
