use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

use pipelink_frame::{FrameConfig, FrameError, FrameReader, FrameWriter, DEFAULT_MAX_PAYLOAD};
use pipelink_transport::{platform_transport, Endpoint, IpcStream, PlatformTransport};

use crate::error::{ChannelError, Result};
use crate::message::WireMessage;
use crate::queue::{MessageQueue, PushError};

/// Configuration for a [`Channel`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Where the manager endpoint lives. Defaults to the well-known
    /// platform path.
    pub endpoint: Endpoint,
    /// Bounded outbound queue capacity. A full queue rejects `send` with
    /// [`ChannelError::QueueFull`] instead of growing without limit.
    pub outbound_capacity: usize,
    /// Bounded inbound queue capacity. A full queue blocks the reader
    /// loop, pushing backpressure onto the wire instead of dropping
    /// delivered messages.
    pub inbound_capacity: usize,
    /// Maximum frame payload size in either direction.
    pub max_payload_size: usize,
    /// Per-call deadline for blocking reads in the reader loop. `None`
    /// (the default) blocks indefinitely; a timeout that fires tears the
    /// session down like any other transport error.
    pub read_timeout: Option<std::time::Duration>,
    /// Per-call deadline for blocking writes in the writer loop.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::resolve(),
            outbound_capacity: 1024,
            inbound_capacity: 1024,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// A duplex framed channel to the manager process.
///
/// Owns at most one live platform connection. While connected, a dedicated
/// writer thread drains the outbound queue onto the wire and a dedicated
/// reader thread fills the inbound queue; the caller only ever touches the
/// two queues, never the OS handle.
///
/// A channel survives its connection: after a transport failure or an
/// explicit [`disconnect`], [`connect`] may be called again on the same
/// instance and opens a fresh session (messages queued in the previous
/// session are discarded).
///
/// [`connect`]: Channel::connect
/// [`disconnect`]: Channel::disconnect
pub struct Channel<M: WireMessage = bytes::Bytes> {
    client_id: String,
    config: ChannelConfig,
    transport: Box<dyn PlatformTransport>,
    session: Mutex<Option<Session<M>>>,
}

struct Session<M> {
    shared: Arc<Shared<M>>,
    /// Control clone of the stream, used only to unblock the loops.
    stream: Option<IpcStream>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

struct Shared<M> {
    /// Whether the loops should keep running. Distinct from `connected`:
    /// cleared first during shutdown so the loops can tell a deliberate
    /// stop from a dead handle.
    running: AtomicBool,
    /// Whether the platform handle is currently live.
    connected: AtomicBool,
    outbound: MessageQueue<M>,
    inbound: MessageQueue<M>,
}

impl<M> Shared<M> {
    /// Loop-initiated teardown on transport failure or peer close. The
    /// caller-facing handle observes this via `is_connected()`.
    fn disconnect_from_loop(&self, stream: &IpcStream) {
        self.running.store(false, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.outbound.close();
        self.inbound.close();
        // Unblock the sibling loop if it is parked in a read or write.
        let _ = stream.shutdown();
    }
}

impl<M: WireMessage> Channel<M> {
    /// Create a disconnected channel for the well-known manager endpoint.
    ///
    /// `client_id` appears only in diagnostics; it is never transmitted.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self::with_config(client_id, ChannelConfig::default())
    }

    /// Create a disconnected channel with explicit configuration.
    pub fn with_config(client_id: impl Into<String>, config: ChannelConfig) -> Self {
        Self::with_transport(client_id, config, platform_transport())
    }

    /// Create a channel with an injected transport (tests, alternative
    /// connection strategies).
    pub fn with_transport(
        client_id: impl Into<String>,
        config: ChannelConfig,
        transport: Box<dyn PlatformTransport>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            config,
            transport,
            session: Mutex::new(None),
        }
    }

    /// Attempt exactly one connection to the manager endpoint.
    ///
    /// On success, spawns the writer and reader threads and returns `Ok`.
    /// Already connected is a no-op `Ok`. On failure the channel stays
    /// disconnected and usable for a later retry; the error exists for
    /// logging, not for dispatch.
    pub fn connect(&self) -> Result<()> {
        let mut session = self.session.lock().expect("channel lock poisoned");

        if let Some(existing) = session.as_ref() {
            if existing.shared.connected.load(Ordering::SeqCst) {
                debug!(client_id = %self.client_id, "already connected");
                return Ok(());
            }
        }
        // A previous session may have died on a transport error; reap it
        // before opening a new one.
        if let Some(mut dead) = session.take() {
            teardown(&mut dead);
        }

        info!(
            client_id = %self.client_id,
            endpoint = %self.config.endpoint,
            transport = self.transport.name(),
            "connecting to manager"
        );

        let stream = self
            .transport
            .connect(&self.config.endpoint)
            .map_err(ChannelError::Connect)?;
        let reader_stream = stream.try_clone()?;
        let control_stream = stream.try_clone()?;

        let shared = Arc::new(Shared {
            running: AtomicBool::new(true),
            connected: AtomicBool::new(true),
            outbound: MessageQueue::new(self.config.outbound_capacity),
            inbound: MessageQueue::new(self.config.inbound_capacity),
        });

        let frame_config = FrameConfig {
            max_payload_size: self.config.max_payload_size,
            read_timeout: self.config.read_timeout,
            write_timeout: self.config.write_timeout,
        };

        // Build both halves before spawning anything so a setup failure
        // cannot leave a half-started session behind.
        let frame_writer = FrameWriter::with_config_ipc(stream, frame_config.clone())?;
        let frame_reader = FrameReader::with_config_ipc(reader_stream, frame_config)?;

        let writer = {
            let shared = Arc::clone(&shared);
            let client_id = self.client_id.clone();
            std::thread::Builder::new()
                .name("pipelink-writer".to_string())
                .spawn(move || writer_loop(shared, frame_writer, client_id))
                .map_err(|e| ChannelError::Transport(e.into()))?
        };

        let reader = {
            let shared = Arc::clone(&shared);
            let client_id = self.client_id.clone();
            std::thread::Builder::new()
                .name("pipelink-reader".to_string())
                .spawn(move || reader_loop(shared, frame_reader, client_id))
                .map_err(|e| ChannelError::Transport(e.into()))?
        };

        *session = Some(Session {
            shared,
            stream: Some(control_stream),
            writer: Some(writer),
            reader: Some(reader),
        });

        info!(client_id = %self.client_id, "connected to manager");
        Ok(())
    }

    /// Disconnect and release the OS handle. Idempotent.
    ///
    /// Closes both queues, unblocks any pending read or write, waits for
    /// both loops to confirm termination, then drops the handle. By the
    /// time this returns no thread of the old session is alive and the
    /// handle is closed.
    pub fn disconnect(&self) {
        let mut slot = self.session.lock().expect("channel lock poisoned");
        let Some(mut session) = slot.take() else {
            return;
        };

        if session.shared.connected.swap(false, Ordering::SeqCst) {
            info!(client_id = %self.client_id, "disconnecting from manager");
        }
        session.shared.running.store(false, Ordering::SeqCst);
        teardown(&mut session);
    }

    /// Whether the platform handle is currently live.
    pub fn is_connected(&self) -> bool {
        self.session
            .lock()
            .expect("channel lock poisoned")
            .as_ref()
            .map(|s| s.shared.connected.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Enqueue one message for asynchronous transmission.
    ///
    /// Fails fast with [`ChannelError::NotConnected`] when disconnected;
    /// messages are never silently buffered for a connection that does
    /// not exist. Fails with [`ChannelError::QueueFull`] when the bounded
    /// outbound queue is at capacity.
    pub fn send(&self, message: M) -> Result<()> {
        let shared = self.connected_shared().ok_or(ChannelError::NotConnected)?;
        match shared.outbound.try_push(message) {
            Ok(()) => Ok(()),
            Err(PushError::Full(_)) => Err(ChannelError::QueueFull {
                capacity: self.config.outbound_capacity,
            }),
            Err(PushError::Closed(_)) => Err(ChannelError::NotConnected),
        }
    }

    /// Take the oldest received message, if any. Never blocks.
    pub fn try_recv(&self) -> Option<M> {
        self.shared().and_then(|shared| shared.inbound.try_pop())
    }

    /// Block until a message is available.
    ///
    /// Disconnection (local or remote) unblocks the wait: buffered
    /// messages are still delivered first, then
    /// [`ChannelError::Disconnected`] is returned.
    pub fn recv_blocking(&self) -> Result<M> {
        let shared = self.shared().ok_or(ChannelError::NotConnected)?;
        shared.inbound.pop().ok_or(ChannelError::Disconnected)
    }

    /// Whether any received messages are waiting. Never blocks.
    pub fn has_messages(&self) -> bool {
        self.shared()
            .map(|shared| !shared.inbound.is_empty())
            .unwrap_or(false)
    }

    /// Number of messages enqueued but not yet written to the wire.
    pub fn pending_outbound(&self) -> usize {
        self.shared().map(|shared| shared.outbound.len()).unwrap_or(0)
    }

    /// Identifier used in this channel's diagnostics.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The endpoint this channel connects to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.config.endpoint
    }

    fn shared(&self) -> Option<Arc<Shared<M>>> {
        self.session
            .lock()
            .expect("channel lock poisoned")
            .as_ref()
            .map(|s| Arc::clone(&s.shared))
    }

    fn connected_shared(&self) -> Option<Arc<Shared<M>>> {
        self.shared()
            .filter(|shared| shared.connected.load(Ordering::SeqCst))
    }
}

impl<M: WireMessage> Drop for Channel<M> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Close queues, unblock and join both loops, drop the handle.
fn teardown<M>(session: &mut Session<M>) {
    session.shared.outbound.close();
    session.shared.inbound.close();
    if let Some(stream) = &session.stream {
        let _ = stream.shutdown();
    }
    if let Some(writer) = session.writer.take() {
        join_loop(writer, session.stream.as_ref());
    }
    if let Some(reader) = session.reader.take() {
        join_loop(reader, session.stream.as_ref());
    }
    session.stream = None;
}

/// Join one loop thread, re-issuing the shutdown until it confirms exit.
///
/// On Unix a single `shutdown(2)` is sticky and the plain join suffices.
/// On Windows `CancelIoEx` only cancels I/O pending at the instant of the
/// call: a loop that was between two blocking calls when the first
/// shutdown landed would re-park and never observe it, so the shutdown is
/// repeated until the thread is gone.
fn join_loop(handle: JoinHandle<()>, stream: Option<&IpcStream>) {
    #[cfg(windows)]
    while !handle.is_finished() {
        if let Some(stream) = stream {
            let _ = stream.shutdown();
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    #[cfg(not(windows))]
    let _ = stream;
    let _ = handle.join();
}

/// Drains the outbound queue onto the wire, one frame per message, in
/// enqueue order. Runs until the queue closes.
fn writer_loop<M: WireMessage>(
    shared: Arc<Shared<M>>,
    mut writer: FrameWriter<IpcStream>,
    client_id: String,
) {
    debug!(client_id = %client_id, "writer loop started");

    while let Some(message) = shared.outbound.pop() {
        let payload = message.encode();
        if let Err(err) = writer.send(payload.as_ref()) {
            // A single failed write does not kill the loop; the reader
            // notices a dead transport and tears the session down.
            warn!(client_id = %client_id, error = %err, "failed to write message");
        }
    }

    debug!(client_id = %client_id, "writer loop exited");
}

/// Fills the inbound queue from the wire. Partial frames never surface;
/// undecodable payloads are dropped; transport errors end the session.
fn reader_loop<M: WireMessage>(
    shared: Arc<Shared<M>>,
    mut reader: FrameReader<IpcStream>,
    client_id: String,
) {
    debug!(client_id = %client_id, "reader loop started");

    while shared.running.load(Ordering::SeqCst) {
        match reader.read_frame() {
            Ok(payload) => match M::decode(payload.as_ref()) {
                Ok(message) => {
                    if shared.inbound.push(message).is_err() {
                        break; // queue closed mid-push: shutting down
                    }
                }
                Err(err) => {
                    // Soft failure: drop the frame, keep the connection.
                    warn!(
                        client_id = %client_id,
                        payload_len = payload.len(),
                        error = %err,
                        "dropping undecodable message"
                    );
                }
            },
            Err(FrameError::ConnectionClosed) => {
                if shared.running.load(Ordering::SeqCst) {
                    info!(client_id = %client_id, "manager closed the connection");
                    shared.disconnect_from_loop(reader.get_ref());
                }
                break;
            }
            Err(err) => {
                if shared.running.load(Ordering::SeqCst) {
                    warn!(client_id = %client_id, error = %err, "transport error, disconnecting");
                    shared.disconnect_from_loop(reader.get_ref());
                }
                break;
            }
        }
    }

    debug!(client_id = %client_id, "reader loop exited");
}
