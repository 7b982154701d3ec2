use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::Side;
use crate::geometry::Vec2;

use super::messages::{SyncSnapshot, WireMessage};
use super::protocol::{ProtocolError, decode_message, encode_message};

/// Single assignable receive callback.
pub type MessageHandler = Box<dyn FnMut(WireMessage) + Send>;

#[derive(Debug)]
pub enum ChannelError {
    /// The connection is gone. Fatal to the match using it.
    Closed,
    Protocol(ProtocolError),
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "channel closed"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
        }
    }
}

impl std::error::Error for ChannelError {}

impl From<ProtocolError> for ChannelError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

/// Bidirectional message pipe to the other participants of a match.
///
/// Connecting is each implementation's constructor. There is exactly one
/// receive callback; setting a new one replaces the old.
pub trait SyncChannel: Send {
    fn send(&mut self, msg: &WireMessage) -> Result<(), ChannelError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    fn set_on_message(&mut self, handler: MessageHandler);
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One-slot snapshot cache. Last write wins; snapshots that are not newer
/// than the newest one already seen are dropped.
#[derive(Default)]
pub struct SnapshotSlot {
    inner: Mutex<SlotInner>,
}

#[derive(Default)]
struct SlotInner {
    latest: Option<SyncSnapshot>,
    newest_seq: Option<u64>,
}

impl SnapshotSlot {
    /// Store a snapshot. Returns false if it was stale and dropped.
    pub fn offer(&self, snapshot: SyncSnapshot) -> bool {
        let mut inner = lock(&self.inner);
        if inner.newest_seq.is_some_and(|seq| snapshot.seq <= seq) {
            return false;
        }
        inner.newest_seq = Some(snapshot.seq);
        inner.latest = Some(snapshot);
        true
    }

    /// Take the cached snapshot, leaving the slot empty.
    pub fn take(&self) -> Option<SyncSnapshot> {
        lock(&self.inner).latest.take()
    }
}

#[derive(Default)]
struct InboxState {
    velocity: Option<Vec2>,
    did_reset: bool,
    last_winner: Option<Side>,
    last_loser: Option<Side>,
    game_over: Option<Side>,
    paddle_moves: Vec<(Side, f32)>,
    score_claims: Vec<Side>,
    closed_reason: Option<String>,
}

/// Receiver-side state shared between the channel callback and the frame loop.
#[derive(Default)]
pub struct SyncInbox {
    snapshots: SnapshotSlot,
    state: Mutex<InboxState>,
}

impl SyncInbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Callback that feeds this inbox, for [`SyncChannel::set_on_message`].
    pub fn handler(self: &Arc<Self>) -> MessageHandler {
        let inbox = Arc::clone(self);
        Box::new(move |msg| inbox.handle(msg))
    }

    pub fn handle(&self, msg: WireMessage) {
        match msg {
            WireMessage::GameStateUpdate { snapshot } => {
                let seq = snapshot.seq;
                if !self.snapshots.offer(snapshot) {
                    tracing::trace!(seq, "Dropping stale snapshot");
                }
            },
            WireMessage::SetBallVelocity { x, y } => {
                lock(&self.state).velocity = Some(Vec2::new(x, y));
            },
            WireMessage::ResetRound {
                last_winner,
                last_loser,
            } => {
                let winner = Side::from_wire_code(last_winner);
                let loser = Side::from_wire_code(last_loser);
                if winner.is_none() || loser.is_none() {
                    tracing::warn!(last_winner, last_loser, "reset_round with bad side code");
                    return;
                }
                let mut state = lock(&self.state);
                state.did_reset = true;
                state.last_winner = winner;
                state.last_loser = loser;
            },
            WireMessage::GameOver { winner, .. } => {
                lock(&self.state).game_over = Some(winner);
            },
            WireMessage::PaddleMove { delta, side, .. } => match side {
                Some(side) => lock(&self.state).paddle_moves.push((side, delta)),
                None => tracing::warn!("paddle_move without a side, dropping"),
            },
            WireMessage::UpdateScore { side } => {
                lock(&self.state).score_claims.push(side);
            },
            WireMessage::SessionClosed { reason } => {
                lock(&self.state).closed_reason = Some(reason);
            },
            other => {
                tracing::debug!(kind = other.type_name(), "Ignoring lobby message during match");
            },
        }
    }

    pub fn take_snapshot(&self) -> Option<SyncSnapshot> {
        self.snapshots.take()
    }

    pub fn take_velocity(&self) -> Option<Vec2> {
        lock(&self.state).velocity.take()
    }

    /// Consume the reset gate. Returns the winner and loser of the round just played.
    pub fn take_reset(&self) -> Option<(Side, Side)> {
        let mut state = lock(&self.state);
        if !state.did_reset {
            return None;
        }
        state.did_reset = false;
        state.last_winner.zip(state.last_loser)
    }

    pub fn game_over(&self) -> Option<Side> {
        lock(&self.state).game_over
    }

    pub fn drain_paddle_moves(&self) -> Vec<(Side, f32)> {
        std::mem::take(&mut lock(&self.state).paddle_moves)
    }

    pub fn drain_score_claims(&self) -> Vec<Side> {
        std::mem::take(&mut lock(&self.state).score_claims)
    }

    /// Reason given by the server if it closed the session.
    pub fn closed_reason(&self) -> Option<String> {
        lock(&self.state).closed_reason.clone()
    }
}

struct Endpoint {
    handler: Option<MessageHandler>,
    backlog: Vec<WireMessage>,
}

/// In-process channel pair. Every message is encoded to JSON and decoded
/// again so the wire format is exercised without a socket.
pub struct LoopbackChannel {
    peer: Arc<Mutex<Endpoint>>,
    local: Arc<Mutex<Endpoint>>,
    link: Arc<AtomicBool>,
}

impl LoopbackChannel {
    pub fn pair() -> (Self, Self) {
        let a = Arc::new(Mutex::new(Endpoint {
            handler: None,
            backlog: Vec::new(),
        }));
        let b = Arc::new(Mutex::new(Endpoint {
            handler: None,
            backlog: Vec::new(),
        }));
        let link = Arc::new(AtomicBool::new(true));
        (
            Self {
                peer: Arc::clone(&b),
                local: Arc::clone(&a),
                link: Arc::clone(&link),
            },
            Self {
                peer: a,
                local: b,
                link,
            },
        )
    }
}

impl SyncChannel for LoopbackChannel {
    fn send(&mut self, msg: &WireMessage) -> Result<(), ChannelError> {
        if !self.link.load(Ordering::Acquire) {
            return Err(ChannelError::Closed);
        }
        let text = encode_message(msg)?;
        let decoded = decode_message(&text)?;
        let mut peer = lock(&self.peer);
        match peer.handler.as_mut() {
            Some(handler) => handler(decoded),
            None => peer.backlog.push(decoded),
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.link.store(false, Ordering::Release);
    }

    fn is_connected(&self) -> bool {
        self.link.load(Ordering::Acquire)
    }

    fn set_on_message(&mut self, mut handler: MessageHandler) {
        let mut local = lock(&self.local);
        for msg in local.backlog.drain(..) {
            handler(msg);
        }
        local.handler = Some(handler);
    }
}
