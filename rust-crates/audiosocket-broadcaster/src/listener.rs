use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::codec::encode_frame;
use crate::error::{BroadcasterError, Result};
use crate::events::Event;
use crate::registry::{Frame, Subscriber, SubscriberId, SubscriberRegistry};

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// TCP server that streams sound events to every connected consumer
pub struct SoundBroadcaster {
    bind_addr: String,
    registry: SubscriberRegistry,
    local_addr: parking_lot::Mutex<Option<SocketAddr>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl SoundBroadcaster {
    /// Create a broadcaster with its own subscriber registry
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self::with_registry(bind_addr, SubscriberRegistry::new())
    }

    /// Create a broadcaster that registers consumers in `registry`
    pub fn with_registry(bind_addr: impl Into<String>, registry: SubscriberRegistry) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            registry,
            local_addr: parking_lot::Mutex::new(None),
            accept_task: Mutex::new(None),
        }
    }

    /// Bind and start accepting consumers; returns the bound address
    pub async fn start(&self) -> Result<SocketAddr> {
        let mut accept_task = self.accept_task.lock().await;
        if accept_task.is_some() {
            return Err(BroadcasterError::AlreadyRunning);
        }

        let listener = TcpListener::bind(&self.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock() = Some(local_addr);

        tracing::info!("Sound broadcaster listening on {}", local_addr);

        let registry = self.registry.clone();
        *accept_task = Some(tokio::spawn(accept_loop(listener, registry)));

        Ok(local_addr)
    }

    /// Stop accepting consumers and close every open subscriber
    pub async fn stop(&self) -> Result<()> {
        let task = self
            .accept_task
            .lock()
            .await
            .take()
            .ok_or(BroadcasterError::NotStarted)?;

        task.abort();
        self.registry.clear();
        *self.local_addr.lock() = None;

        tracing::info!("Sound broadcaster stopped");
        Ok(())
    }

    /// Encode `event` and queue it for every subscriber.
    ///
    /// Never fails: encoding problems are logged and nothing is sent.
    pub fn broadcast_event(&self, event: &Event) -> usize {
        match encode_frame(event) {
            Ok(line) => self.broadcast_frame(&Frame::from(line)),
            Err(e) => {
                tracing::error!("Failed to encode sound {}: {}", event.sound_id, e);
                0
            }
        }
    }

    pub fn broadcast_frame(&self, frame: &Frame) -> usize {
        self.registry.broadcast(frame)
    }

    /// Bound address while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }
}

impl Drop for SoundBroadcaster {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.get_mut().take() {
            task.abort();
        }
    }
}

async fn accept_loop(listener: TcpListener, registry: SubscriberRegistry) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => attach(stream, peer, &registry),
            Err(e) => {
                tracing::error!("Failed to accept client: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

/// Register a new consumer and start its writer and monitor tasks
fn attach(stream: TcpStream, peer: SocketAddr, registry: &SubscriberRegistry) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
    }

    let (read_half, write_half) = stream.into_split();
    let (subscriber, frames) = Subscriber::channel(peer.to_string());
    let id = subscriber.id();
    let (writer_done, writer_gone) = oneshot::channel();

    registry.add(subscriber);
    tracing::info!("Client connected: {} ({})", peer, id);

    tokio::spawn(write_frames(
        write_half,
        frames,
        writer_done,
        registry.clone(),
        id,
        peer,
    ));
    tokio::spawn(monitor(read_half, writer_gone, registry.clone(), id, peer));
}

/// Drain the subscriber's queue into its socket, one whole frame at a time.
///
/// Ends when the queue closes (the subscriber was removed) or a write fails;
/// dropping `_done` tells the monitor to let go of the read half.
async fn write_frames(
    mut writer: OwnedWriteHalf,
    mut frames: mpsc::UnboundedReceiver<Frame>,
    _done: oneshot::Sender<()>,
    registry: SubscriberRegistry,
    id: SubscriberId,
    peer: SocketAddr,
) {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = writer.write_all(frame.as_bytes()).await {
            tracing::warn!("Failed to send to client {}: {}", peer, e);
            registry.remove(id);
            break;
        }
    }

    let _ = writer.shutdown().await;
}

/// Block on reads until the consumer goes away, then deregister it.
///
/// Anything the consumer sends is discarded.
async fn monitor(
    mut reader: OwnedReadHalf,
    mut writer_gone: oneshot::Receiver<()>,
    registry: SubscriberRegistry,
    id: SubscriberId,
    peer: SocketAddr,
) {
    let mut discard = [0u8; 1024];
    loop {
        tokio::select! {
            read = reader.read(&mut discard) => match read {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!("Read error from {}: {}", peer, e);
                    break;
                }
            },
            _ = &mut writer_gone => break,
        }
    }

    registry.remove(id);
    tracing::info!("Client disconnected: {} ({})", peer, id);
}
