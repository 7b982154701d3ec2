//! [`SyncChannel`] over a tokio-tungstenite WebSocket.
//!
//! Two background tasks own the socket halves. Outbound frames go through an
//! unbounded queue so [`SyncChannel::send`] never blocks the frame loop.
//! Inbound frames are decoded on the reader task and either handed to the
//! registered handler or parked in a backlog for [`WsChannel::recv`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::{SinkExt, StreamExt};
use tokio::sync::{Notify, mpsc};
use tokio_tungstenite::tungstenite::Message;

use netpong_core::net::channel::{ChannelError, MessageHandler, SyncChannel};
use netpong_core::net::messages::WireMessage;
use netpong_core::net::protocol::{ProtocolError, decode_message, encode_message};

#[derive(Debug)]
pub enum ConnectError {
    WebSocket(tokio_tungstenite::tungstenite::Error),
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WebSocket(e) => write!(f, "websocket connect failed: {e}"),
        }
    }
}

impl std::error::Error for ConnectError {}

impl From<tokio_tungstenite::tungstenite::Error> for ConnectError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(e)
    }
}

#[derive(Default)]
struct Endpoint {
    handler: Option<MessageHandler>,
    backlog: VecDeque<WireMessage>,
}

struct Shared {
    endpoint: Mutex<Endpoint>,
    connected: AtomicBool,
    notify: Notify,
}

impl Shared {
    fn endpoint(&self) -> MutexGuard<'_, Endpoint> {
        self.endpoint
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn deliver(&self, msg: WireMessage) {
        let mut endpoint = self.endpoint();
        match endpoint.handler.as_mut() {
            Some(handler) => handler(msg),
            None => {
                endpoint.backlog.push_back(msg);
                drop(endpoint);
                self.notify.notify_one();
            },
        }
    }

    fn mark_closed(&self) {
        self.connected.store(false, Ordering::Release);
        self.notify.notify_one();
    }
}

pub struct WsChannel {
    shared: Arc<Shared>,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

impl WsChannel {
    /// Open a WebSocket to `url` and start the reader and writer tasks.
    /// Must be called from inside a tokio runtime.
    pub async fn connect(url: &str) -> Result<Self, ConnectError> {
        let (stream, _) = tokio_tungstenite::connect_async(url).await?;
        let (mut sink, mut source) = stream.split();
        tracing::info!(url, "Connected");

        let shared = Arc::new(Shared {
            endpoint: Mutex::new(Endpoint::default()),
            connected: AtomicBool::new(true),
            notify: Notify::new(),
        });

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::debug!(error = %e, "WebSocket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::debug!(error = %e, "WebSocket read failed");
                        break;
                    },
                };
                match decode_message(text.as_str()) {
                    Ok(msg) => reader_shared.deliver(msg),
                    Err(ProtocolError::UnknownMessageType(kind)) => {
                        tracing::warn!(%kind, "Dropping unknown message type");
                    },
                    Err(e) => tracing::warn!(error = %e, "Dropping malformed frame"),
                }
            }
            tracing::info!("Connection closed");
            reader_shared.mark_closed();
        });

        Ok(Self {
            shared,
            outbound: Some(tx),
        })
    }

    /// Next backlogged message, waiting for one if needed. `None` once the
    /// connection is closed and the backlog is empty. Only meaningful while no
    /// handler is registered.
    pub async fn recv(&self) -> Option<WireMessage> {
        loop {
            if let Some(msg) = self.shared.endpoint().backlog.pop_front() {
                return Some(msg);
            }
            if !self.is_connected() {
                return None;
            }
            self.shared.notify.notified().await;
        }
    }
}

impl SyncChannel for WsChannel {
    fn send(&mut self, msg: &WireMessage) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Closed);
        }
        let Some(tx) = self.outbound.as_ref() else {
            return Err(ChannelError::Closed);
        };
        let text = encode_message(msg)?;
        tx.send(text).map_err(|_| ChannelError::Closed)
    }

    fn disconnect(&mut self) {
        // Dropping the sender lets the writer flush and close the socket.
        if self.outbound.take().is_some() {
            tracing::debug!("Disconnecting");
        }
        self.shared.mark_closed();
    }

    fn is_connected(&self) -> bool {
        self.outbound.is_some() && self.shared.connected.load(Ordering::Acquire)
    }

    fn set_on_message(&mut self, mut handler: MessageHandler) {
        let mut endpoint = self.shared.endpoint();
        for msg in endpoint.backlog.drain(..) {
            handler(msg);
        }
        endpoint.handler = Some(handler);
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}
