//! Blocking UDP sender and receiver
//!
//! The receiver owns one OS thread per socket. The thread blocks in
//! `recv_from`, decodes each datagram and dispatches it inline, so a slow
//! listener delays further receives on that socket. There is no queue.
//!
//! Stopping is cooperative: the stop flag is checked before every read and
//! a blocked read is released by shutting the socket down.

use std::net::{Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use oscpack_core::{codec, DecodeOptions, Dispatcher, EncodeOptions, Packet, ShortcutTable};
use parking_lot::Mutex;
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tracing::{debug, error, info, warn};

use crate::config::{resolve, ReceiverConfig, SenderConfig, MAX_DATAGRAM_SIZE};
use crate::error::{Result, TransportError};

fn bind_socket(addr: SocketAddr, reuse_address: bool, broadcast: bool) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    if reuse_address {
        socket.set_reuse_address(true)?;
    }
    if broadcast {
        socket.set_broadcast(true)?;
    }
    socket.bind(&addr.into())?;
    Ok(socket.into())
}

// ============================================================================
// SENDER
// ============================================================================

/// Encodes packets and writes each as one datagram
pub struct OscSender {
    socket: UdpSocket,
    target: SocketAddr,
    config: SenderConfig,
    shortcuts: Option<Arc<ShortcutTable>>,
    send_lock: Mutex<()>,
}

impl OscSender {
    pub fn bind(config: SenderConfig) -> Result<Self> {
        let local = resolve(&config.bind_addr)?;
        let target = resolve(&config.target)?;
        let socket = bind_socket(local, false, config.broadcast)?;

        info!("OSC sender bound to {}, target {}", socket.local_addr()?, target);

        Ok(Self {
            socket,
            target,
            config,
            shortcuts: None,
            send_lock: Mutex::new(()),
        })
    }

    /// Compress outgoing messages with this table
    pub fn with_shortcuts(mut self, shortcuts: Arc<ShortcutTable>) -> Self {
        self.shortcuts = Some(shortcuts);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Send to the configured target
    pub fn send(&self, packet: &Packet) -> Result<usize> {
        self.send_to(packet, self.target)
    }

    pub fn send_to(&self, packet: &Packet, target: SocketAddr) -> Result<usize> {
        let bytes = self.encode(packet)?;
        self.send_bytes(&bytes, target)
    }

    fn encode(&self, packet: &Packet) -> Result<Bytes> {
        let plain_call =
            self.shortcuts.is_none() && self.config.encoding.is_none() && self.config.charset.is_none();
        if plain_call {
            return Ok(codec::encode(packet)?);
        }

        let opts = EncodeOptions {
            encoding: self.config.encoding,
            shortcuts: self.shortcuts.as_deref(),
            charset: self.config.charset,
        };
        Ok(codec::encode_with(packet, &opts)?)
    }

    fn send_bytes(&self, bytes: &[u8], target: SocketAddr) -> Result<usize> {
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(TransportError::PacketTooLarge(bytes.len()));
        }

        let sent = {
            let _guard = self.send_lock.lock();
            self.socket.send_to(bytes, target)?
        };
        if sent != bytes.len() {
            return Err(TransportError::ShortSend {
                sent,
                len: bytes.len(),
            });
        }

        debug!("Sent {} bytes to {}", sent, target);
        Ok(sent)
    }
}

// ============================================================================
// RECEIVER
// ============================================================================

/// Counters updated by the receive thread
#[derive(Debug, Default)]
pub struct ReceiveStats {
    datagrams: AtomicU64,
    bytes: AtomicU64,
    decode_errors: AtomicU64,
}

impl ReceiveStats {
    /// Datagrams decoded successfully
    pub fn datagrams(&self) -> u64 {
        self.datagrams.load(Ordering::Relaxed)
    }

    /// Bytes of successfully decoded datagrams
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    fn record(&self, len: usize) {
        self.datagrams.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
    }
}

/// Listens on one UDP socket and feeds a [`Dispatcher`]
pub struct OscReceiver {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    config: ReceiverConfig,
    running: Arc<AtomicBool>,
    stats: Arc<ReceiveStats>,
    handle: Option<JoinHandle<()>>,
}

impl OscReceiver {
    pub fn bind(config: ReceiverConfig) -> Result<Self> {
        let addr = resolve(&config.bind_addr)?;
        let socket = bind_socket(addr, config.reuse_address, false)?;
        let local_addr = socket.local_addr()?;

        info!("OSC receiver bound to {}", local_addr);

        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
            config,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(ReceiveStats::default()),
            handle: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &ReceiveStats {
        &self.stats
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Spawn the receive thread
    pub fn start(&mut self, dispatcher: Arc<Dispatcher>) -> Result<()> {
        if self.handle.is_some() {
            return Err(TransportError::AlreadyRunning);
        }

        self.running.store(true, Ordering::Release);

        let socket = Arc::clone(&self.socket);
        let running = Arc::clone(&self.running);
        let stats = Arc::clone(&self.stats);
        let buffer_size = self.config.buffer_size.max(1);
        let opts = self.config.decode_options();

        let handle = thread::Builder::new()
            .name(format!("osc-recv-{}", self.local_addr.port()))
            .spawn(move || receive_loop(&socket, &dispatcher, &running, &stats, buffer_size, &opts))?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Stop the receive thread and wait for it. The socket cannot be
    /// restarted afterwards.
    pub fn close(&mut self) {
        let handle = match self.handle.take() {
            Some(h) => h,
            None => return,
        };
        self.running.store(false, Ordering::Release);

        // Wakes a blocked recv_from; unconnected UDP sockets report
        // NotConnected but are still shut down.
        if let Err(e) = SockRef::from(&*self.socket).shutdown(Shutdown::Both) {
            if e.kind() != std::io::ErrorKind::NotConnected {
                debug!("Socket shutdown failed: {}", e);
            }
        }
        // Platforms that ignore shutdown on UDP need a datagram instead
        if let Err(e) = self.socket.send_to(&[], wake_addr(self.local_addr)) {
            debug!("Wake datagram failed: {}", e);
        }

        if handle.join().is_err() {
            error!("OSC receive thread panicked");
        }
        info!("OSC receiver on {} closed", self.local_addr);
    }
}

impl Drop for OscReceiver {
    fn drop(&mut self) {
        self.close();
    }
}

fn wake_addr(local: SocketAddr) -> SocketAddr {
    match local {
        SocketAddr::V4(a) if a.ip().is_unspecified() => (Ipv4Addr::LOCALHOST, a.port()).into(),
        SocketAddr::V6(a) if a.ip().is_unspecified() => (Ipv6Addr::LOCALHOST, a.port()).into(),
        other => other,
    }
}

/// Consecutive receive errors tolerated before the loop gives up
const MAX_RECV_ERRORS: u32 = 8;

/// Sleep schedule after failed reads: 1ms, doubling, capped at 250ms
#[derive(Debug, Default)]
struct RecvBackoff {
    failures: u32,
}

impl RecvBackoff {
    /// Record a failure. `None` once the limit is reached.
    fn failed(&mut self) -> Option<Duration> {
        self.failures += 1;
        if self.failures >= MAX_RECV_ERRORS {
            return None;
        }
        let millis = (1u64 << (self.failures - 1)).min(250);
        Some(Duration::from_millis(millis))
    }

    fn reset(&mut self) {
        self.failures = 0;
    }
}

fn receive_loop(
    socket: &UdpSocket,
    dispatcher: &Dispatcher,
    running: &AtomicBool,
    stats: &ReceiveStats,
    buffer_size: usize,
    opts: &DecodeOptions,
) {
    let mut buf = vec![0u8; buffer_size];
    let mut backoff = RecvBackoff::default();

    while running.load(Ordering::Acquire) {
        let (len, peer) = match socket.recv_from(&mut buf) {
            Ok(r) => {
                backoff.reset();
                r
            }
            Err(e) => {
                if !running.load(Ordering::Acquire) {
                    break;
                }
                error!("UDP receive error: {}", e);
                match backoff.failed() {
                    Some(delay) => thread::sleep(delay),
                    None => {
                        error!("{} consecutive receive errors, stopping", MAX_RECV_ERRORS);
                        running.store(false, Ordering::Release);
                        break;
                    }
                }
                continue;
            }
        };

        if len == 0 {
            continue;
        }
        debug!("Received {} bytes from {}", len, peer);

        match codec::decode_from(&buf[..len], peer, opts) {
            Ok(packet) => {
                stats.record(len);
                let delivered = dispatcher.dispatch(&packet);
                debug!("Datagram from {} reached {} listeners", peer, delivered);
            }
            Err(e) => {
                stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Failed to decode datagram from {}: {}", peer, e);
            }
        }
    }

    debug!("OSC receive loop exiting");
}
