//! Multicast UDP link adapter.
//!
//! Carries discovery datagrams over IPv6 link-local multicast (ff02::1).
//! A receive task pushes inbound datagrams into a bounded queue, dropping
//! the oldest entry on overflow, and signals the main loop through a
//! [`Notify`]. The [`Transport`] implementation is a plain non-blocking
//! pop against that queue, so `poll()` never waits on the socket.

use std::collections::VecDeque;
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::Notify;

use lantern_services::Transport;

/// IPv6 link-local multicast group for discovery traffic.
pub const MULTICAST_ADDR: &str = "ff02::1";

/// Peer id that `send` routes to the multicast group.
pub const BROADCAST_PEER: &str = "broadcast";

/// Inbound datagrams kept while the main loop is busy. Oldest dropped first.
const MAX_RX_QUEUE: usize = 32;

type RxQueue = Arc<Mutex<VecDeque<(String, Vec<u8>)>>>;

/// One multicast link, exclusively owned by the endpoint that uses it.
pub struct UdpLink {
    socket: Socket,
    multicast_dest: SocketAddrV6,
    rx: RxQueue,
    wakeup: Arc<Notify>,
}

impl UdpLink {
    /// Open the link on one interface: a send socket scoped to that
    /// interface and a receive task joined to the multicast group.
    pub async fn open(interface_index: u32, port: u16) -> Result<Self> {
        let socket = make_send_socket(interface_index)
            .context("failed to create multicast send socket")?;
        let listener = make_listener_socket(interface_index, port)
            .context("failed to create multicast listener socket")?;
        let listener =
            UdpSocket::from_std(listener).context("failed to convert to tokio UdpSocket")?;

        let multicast: Ipv6Addr = MULTICAST_ADDR.parse().context("bad multicast address")?;
        let multicast_dest = SocketAddrV6::new(multicast, port, 0, interface_index);

        let rx: RxQueue = Arc::new(Mutex::new(VecDeque::new()));
        let wakeup = Arc::new(Notify::new());
        tokio::spawn(rx_loop(listener, rx.clone(), wakeup.clone()));

        tracing::info!(port, interface_index, "multicast link up");

        Ok(Self {
            socket,
            multicast_dest,
            rx,
            wakeup,
        })
    }

    /// Handle the main loop can await to learn a datagram arrived.
    pub fn wakeup(&self) -> Arc<Notify> {
        self.wakeup.clone()
    }
}

impl Transport for UdpLink {
    fn send(&mut self, peer_id: &str, payload: &[u8]) {
        let dest: SocketAddrV6 = if peer_id == BROADCAST_PEER || peer_id == "*" {
            self.multicast_dest
        } else {
            match peer_id.parse() {
                Ok(addr) => addr,
                Err(_) => {
                    tracing::warn!(peer_id, "unroutable peer id, dropping payload");
                    return;
                }
            }
        };

        match self.socket.send_to(payload, &dest.into()) {
            Ok(n) => tracing::trace!(bytes = n, "datagram sent"),
            Err(e) => tracing::warn!(error = %e, "datagram send failed"),
        }
    }

    fn recv(&mut self) -> Option<(String, Vec<u8>)> {
        lock_queue(&self.rx).pop_front()
    }
}

/// Receive datagrams forever, feeding the bounded queue.
async fn rx_loop(socket: UdpSocket, rx: RxQueue, wakeup: Arc<Notify>) {
    let mut buf = vec![0u8; 2048];
    loop {
        let (len, peer_addr) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "recv_from failed");
                continue;
            }
        };

        // The datagram source address doubles as the opaque peer id.
        let peer_id = match peer_addr {
            SocketAddr::V6(v6) => v6.to_string(),
            SocketAddr::V4(_) => {
                tracing::warn!("received IPv4 datagram on IPv6 socket, ignoring");
                continue;
            }
        };

        push_bounded(&rx, MAX_RX_QUEUE, (peer_id, buf[..len].to_vec()));
        wakeup.notify_one();
    }
}

/// Push onto the bounded queue, dropping the oldest entry when full.
fn push_bounded(queue: &RxQueue, cap: usize, item: (String, Vec<u8>)) {
    let mut q = lock_queue(queue);
    if q.len() >= cap {
        q.pop_front();
    }
    q.push_back(item);
}

fn lock_queue(queue: &RxQueue) -> std::sync::MutexGuard<'_, VecDeque<(String, Vec<u8>)>> {
    match queue.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Create a UDP socket suitable for sending IPv6 multicast.
fn make_send_socket(interface_index: u32) -> Result<Socket> {
    let socket =
        Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket
        .set_multicast_if_v6(interface_index)
        .context("IPV6_MULTICAST_IF")?;
    // Hop limit 1 — link-local only, never routed beyond this link.
    socket.set_multicast_hops_v6(1).context("IPV6_MULTICAST_HOPS")?;

    Ok(socket)
}

/// Create a UDP socket joined to the ff02::1 multicast group.
fn make_listener_socket(interface_index: u32, port: u16) -> Result<std::net::UdpSocket> {
    let socket =
        Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket.set_only_v6(true).context("IPV6_V6ONLY")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;

    let bind_addr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, port, 0, 0);
    socket.bind(&bind_addr.into()).context("bind()")?;

    let multicast: Ipv6Addr = MULTICAST_ADDR.parse().context("bad multicast address")?;
    socket
        .join_multicast_v6(&multicast, interface_index)
        .context("IPV6_JOIN_GROUP")?;

    Ok(socket.into())
}

/// Get the OS interface index for a named network interface.
pub fn if_index(name: &str) -> Result<u32> {
    let name_cstr =
        std::ffi::CString::new(name).context("interface name contains null byte")?;
    let index = unsafe { libc::if_nametoindex(name_cstr.as_ptr()) };
    if index == 0 {
        anyhow::bail!("interface '{}' not found", name);
    }
    Ok(index)
}
