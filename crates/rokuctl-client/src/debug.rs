//! Live debug-log streaming from the device's telnet-style log ports.
//!
//! On every fresh connection the device replays the last chunk of log
//! history. That backlog is meaningless to a fresh test run, so the channel
//! connects, discards everything that arrives during a fixed grace window,
//! and only then starts surfacing lines to subscribers.
//!
//! Both the connect step and the grace-window timer are pushed through the
//! shared [`CommandQueue`], so log-channel setup participates in global
//! command ordering relative to other actions issued around construction.
//!
//! ## Phases
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──socket up──▶ DrainingBacklog
//!                                                        │ grace elapses
//! Disconnected ◀──destroy / EOF / error── Live ◀─────────┘
//! ```
//!
//! The phase is an explicit tagged state consulted by the reader task for
//! every chunk of bytes; nothing swaps callbacks at runtime. A connection
//! drop leaves the channel `Disconnected` -- there is no automatic
//! reconnect; call [`DebugChannel::connect`] again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot};

use rokuctl_core::prelude::*;

use crate::queue::{CommandHandle, CommandQueue};

/// How long after connect the device's replayed history is discarded.
pub const DEFAULT_GRACE: Duration = Duration::from_millis(1000);

/// Capacity of the line broadcast channel (lines can be bursty).
const LINE_CHANNEL_CAPACITY: usize = 256;

/// Read buffer size for the socket reader task.
const READ_CHUNK_SIZE: usize = 4096;

/// Lifecycle phase of a [`DebugChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    /// No socket; connect has not been requested (or the last one ended).
    Disconnected,
    /// Connect requested; TCP handshake in progress.
    Connecting,
    /// Socket up; replayed history is being discarded.
    DrainingBacklog,
    /// Live lines are surfaced to subscribers.
    Live,
}

/// Manages one socket connection to a device log port and republishes live
/// log lines as discrete events.
///
/// At most one live socket exists per channel instance; connecting again
/// force-closes the previous socket first.
#[derive(Clone)]
pub struct DebugChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    host: String,
    grace: Duration,
    phase: RwLock<ChannelPhase>,
    /// Bumped on every connect/destroy. Lets a teardown during the grace
    /// window invalidate the pending Live transition, and lets a stale
    /// reader task detect it has been superseded.
    generation: AtomicU64,
    /// Force-close signal for the current reader task, consumed on use.
    kill_tx: Mutex<Option<oneshot::Sender<()>>>,
    line_tx: broadcast::Sender<String>,
}

impl std::fmt::Debug for DebugChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugChannel")
            .field("host", &self.inner.host)
            .field("phase", &self.phase())
            .finish()
    }
}

impl DebugChannel {
    /// Create a disconnected channel for the given device host.
    pub fn new(host: impl Into<String>, grace: Duration) -> Self {
        let (line_tx, _) = broadcast::channel(LINE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(ChannelInner {
                host: host.into(),
                grace,
                phase: RwLock::new(ChannelPhase::Disconnected),
                generation: AtomicU64::new(0),
                kill_tx: Mutex::new(None),
                line_tx,
            }),
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ChannelPhase {
        *self.inner.phase.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe to live log lines (trimmed, empty lines suppressed).
    ///
    /// Nothing is delivered during the backlog grace window. There is no
    /// ordering guarantee between log lines and command completions.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.inner.line_tx.subscribe()
    }

    /// Connect to a log port, tearing down any previous socket first.
    ///
    /// Two operations are pushed onto `queue`: the TCP connect, and the
    /// grace-window delay after which the channel goes live. The returned
    /// handle completes when the connect step finishes (successfully or
    /// not); the live transition follows one grace interval later.
    pub fn connect(&self, queue: &CommandQueue, port: u16) -> CommandHandle<()> {
        self.destroy();

        let generation = self.inner.generation.load(Ordering::Acquire);
        self.inner.set_phase(ChannelPhase::Connecting);

        let inner = Arc::clone(&self.inner);
        let handle = queue.submit(format!("log connect :{}", port), async move {
            inner.open_socket(generation, port).await
        });

        let inner = Arc::clone(&self.inner);
        queue.enqueue("log grace window", async move {
            tokio::time::sleep(inner.grace).await;
            inner.go_live(generation);
        });

        handle
    }

    /// Force-close the current socket, if any, and reset to `Disconnected`.
    ///
    /// Safe to call at any time, including when never connected or while the
    /// grace window is still pending (the stale Live transition is
    /// cancelled). Idempotent.
    pub fn destroy(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        let kill = self
            .inner
            .kill_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(kill) = kill {
            let _ = kill.send(());
        }
        self.inner.set_phase(ChannelPhase::Disconnected);
    }
}

impl ChannelInner {
    fn set_phase(&self, phase: ChannelPhase) {
        *self.phase.write().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    fn current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    /// Queued connect step: open the socket and hand it to a reader task in
    /// backlog-discard mode.
    async fn open_socket(self: Arc<Self>, generation: u64, port: u16) -> Result<()> {
        let address = (self.host.as_str(), port);
        let stream = match TcpStream::connect(address).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("log port {} connect failed: {}", port, e);
                if self.current(generation) {
                    self.set_phase(ChannelPhase::Disconnected);
                }
                return Err(e.into());
            }
        };

        if !self.current(generation) {
            // Torn down while the handshake was in flight; the socket is
            // dropped here and the operation completes without effect.
            debug!("log port {} connected after teardown, dropping", port);
            return Ok(());
        }

        debug!("log port {} connected, draining backlog", port);

        let (kill_tx, kill_rx) = oneshot::channel();
        *self.kill_tx.lock().unwrap_or_else(|e| e.into_inner()) = Some(kill_tx);
        self.set_phase(ChannelPhase::DrainingBacklog);

        tokio::spawn(Arc::clone(&self).read_loop(stream, generation, kill_rx));
        Ok(())
    }

    /// Queued grace step: flip to Live unless the channel was re-created or
    /// torn down in the meantime.
    fn go_live(&self, generation: u64) {
        if !self.current(generation) {
            debug!("grace window elapsed for a torn-down channel, ignoring");
            return;
        }
        let mut phase = self.phase.write().unwrap_or_else(|e| e.into_inner());
        if *phase == ChannelPhase::DrainingBacklog {
            debug!("backlog window over, log channel live");
            *phase = ChannelPhase::Live;
        }
    }

    /// Reader task: owns the socket for its lifetime. The current phase
    /// selects the handling branch for every chunk.
    async fn read_loop(
        self: Arc<Self>,
        mut stream: TcpStream,
        generation: u64,
        mut kill_rx: oneshot::Receiver<()>,
    ) {
        let mut pending: Vec<u8> = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];

        loop {
            tokio::select! {
                _ = &mut kill_rx => {
                    debug!("log socket force-closed");
                    return;
                }
                read = stream.read(&mut chunk) => {
                    if !self.current(generation) {
                        // Superseded by a reconnect; stop touching shared state.
                        return;
                    }
                    match read {
                        Ok(0) => {
                            self.finish(generation, &mut pending, "closed by device");
                            return;
                        }
                        Ok(n) => self.handle_bytes(&chunk[..n], &mut pending),
                        Err(e) => {
                            warn!("log socket read error: {}", e);
                            self.finish(generation, &mut pending, "read error");
                            return;
                        }
                    }
                }
            }
        }
    }

    fn handle_bytes(&self, bytes: &[u8], pending: &mut Vec<u8>) {
        match *self.phase.read().unwrap_or_else(|e| e.into_inner()) {
            ChannelPhase::DrainingBacklog => {
                trace!("discarding {} bytes of replayed log history", bytes.len());
            }
            ChannelPhase::Live => {
                pending.extend_from_slice(bytes);
                for line in split_complete_lines(pending) {
                    let _ = self.line_tx.send(line);
                }
            }
            // Connecting/Disconnected while the socket is up means a
            // teardown is racing us; the kill signal or generation check
            // ends the loop shortly.
            _ => {}
        }
    }

    /// End of stream: flush a trailing unterminated line if we were live,
    /// then fall back to `Disconnected`. No automatic reconnect.
    fn finish(&self, generation: u64, pending: &mut Vec<u8>, why: &str) {
        debug!("log socket finished: {}", why);
        if *self.phase.read().unwrap_or_else(|e| e.into_inner()) == ChannelPhase::Live {
            let tail = String::from_utf8_lossy(pending);
            let tail = tail.trim();
            if !tail.is_empty() {
                let _ = self.line_tx.send(tail.to_string());
            }
        }
        pending.clear();
        if self.current(generation) {
            self.set_phase(ChannelPhase::Disconnected);
        }
    }
}

/// Split the accumulated buffer on `\r\n`, returning each complete segment
/// trimmed and with empties dropped, in arrival order. Bytes after the last
/// terminator stay in the buffer.
fn split_complete_lines(pending: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = pending.windows(2).position(|w| w == b"\r\n") {
        let segment: Vec<u8> = pending.drain(..pos + 2).take(pos).collect();
        let line = String::from_utf8_lossy(&segment);
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    lines
}
