//! Room state machine and signaling router
//!
//! Each room runs its own event loop. Registration, deregistration and
//! signaling events arrive on one unbounded inbox and are applied one at a
//! time; the loop is the only code that touches the member list.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::client::ClientHandle;
use crate::error::AppError;
use crate::message::{Message, MessageType, RoomInfo};
use crate::registry::RoomRegistry;
use crate::types::{ClientId, RoomId};

/// Events consumed by the room's event loop
///
/// Events from a client carry its connection token, so a client that lost
/// an id collision can never act as the member holding that id.
#[derive(Debug)]
pub enum RoomEvent {
    /// Client connected to this room
    Register(ClientHandle),
    /// Client's transport failed
    Unregister { client_id: ClientId, token: u64 },
    /// Inbound signaling message, `from` already stamped
    Signal { token: u64, msg: Message },
    /// Shut the room down
    Close,
}

/// Room lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// No members, expiry timer running
    Waiting,
    /// At least one member
    Active,
    /// Terminal
    Closing,
}

/// Cloneable handle used to feed a room's inbox
///
/// Every method is non-blocking. Methods fail only once the room has closed.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: RoomId,
    events: mpsc::UnboundedSender<RoomEvent>,
    member_count: Arc<AtomicUsize>,
    next_token: Arc<AtomicU64>,
    seq: u64,
}

impl RoomHandle {
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Member count as last published by the room loop
    pub fn member_count(&self) -> usize {
        self.member_count.load(Ordering::Acquire)
    }

    /// Creation sequence number assigned by the registry
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id.clone(),
            member_count: self.member_count(),
        }
    }

    /// Allocate a connection token, unique within this room
    pub fn next_token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    pub fn register(&self, client: ClientHandle) -> Result<(), AppError> {
        self.send(RoomEvent::Register(client))
    }

    pub fn unregister(&self, client_id: ClientId, token: u64) -> Result<(), AppError> {
        self.send(RoomEvent::Unregister { client_id, token })
    }

    pub fn signal(&self, token: u64, msg: Message) -> Result<(), AppError> {
        self.send(RoomEvent::Signal { token, msg })
    }

    pub fn close(&self) -> Result<(), AppError> {
        self.send(RoomEvent::Close)
    }

    fn send(&self, event: RoomEvent) -> Result<(), AppError> {
        self.events
            .send(event)
            .map_err(|_| AppError::RoomClosed(self.id.clone()))
    }
}

/// Members whose outbox refused a message during one event
type Stalled = Vec<(ClientId, u64)>;

/// A signaling room
///
/// Owns the member list in join order. See [`Room::run`].
pub struct Room {
    id: RoomId,
    members: Vec<ClientHandle>,
    state: RoomState,
    events: mpsc::UnboundedReceiver<RoomEvent>,
    member_count: Arc<AtomicUsize>,
    expiry: Duration,
}

impl Room {
    /// Create a room in `Waiting` state together with its inbox handle
    pub fn new(id: RoomId, expiry: Duration, seq: u64) -> (Self, RoomHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let member_count = Arc::new(AtomicUsize::new(0));

        let handle = RoomHandle {
            id: id.clone(),
            events: tx,
            member_count: member_count.clone(),
            next_token: Arc::new(AtomicU64::new(0)),
            seq,
        };
        let room = Self {
            id,
            members: Vec::new(),
            state: RoomState::Waiting,
            events: rx,
            member_count,
            expiry,
        };
        (room, handle)
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    /// Member ids in join order
    pub fn member_ids(&self) -> Vec<ClientId> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }

    /// Run the room event loop
    ///
    /// Returns once the room is closed, either because it stayed empty for
    /// the whole expiry period or because a `Close` event arrived. The room
    /// removes itself from `registry` on the way out.
    pub async fn run(mut self, registry: RoomRegistry) {
        info!("Room {} started", self.id);

        let expiry = time::sleep(self.expiry);
        tokio::pin!(expiry);

        loop {
            tokio::select! {
                _ = &mut expiry, if self.state == RoomState::Waiting => {
                    info!("Room {} expired with no members", self.id);
                    break;
                }
                event = self.events.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    let was_waiting = self.state == RoomState::Waiting;
                    self.handle_event(event);

                    match self.state {
                        RoomState::Closing => break,
                        RoomState::Waiting if !was_waiting => {
                            debug!("Room {} is empty, expiry re-armed", self.id);
                            expiry.as_mut().reset(Instant::now() + self.expiry);
                        }
                        _ => {}
                    }
                }
            }
        }

        self.close(&registry);
    }

    /// Apply a single event
    pub fn handle_event(&mut self, event: RoomEvent) {
        if self.state == RoomState::Closing {
            return;
        }

        match event {
            RoomEvent::Register(client) => self.handle_register(client),
            RoomEvent::Unregister { client_id, token } => {
                if let Some(index) = self.position(client_id.as_str(), token) {
                    self.remove_at(index);
                }
            }
            RoomEvent::Signal { token, msg } => {
                if self.position(&msg.from, token).is_none() {
                    debug!("{:?} from non-member {} dropped", msg.kind, msg.from);
                    return;
                }
                let stalled = self.route(msg);
                self.evict(stalled);
            }
            RoomEvent::Close => self.state = RoomState::Closing,
        }
    }

    fn handle_register(&mut self, client: ClientHandle) {
        if self.index_of(client.id.as_str()).is_some() {
            // Dropping the handle closes the newcomer's outbox
            debug!("Client {} already in room {}, refused", client.id, self.id);
            return;
        }

        debug!("Client {} registered in room {}", client.id, self.id);
        self.members.push(client);
        self.state = RoomState::Active;
        self.publish_member_count();
    }

    /// Remove a member and tell everyone left
    fn remove_at(&mut self, index: usize) {
        let departed = self.members.remove(index);
        self.publish_member_count();
        debug!("Client {} removed from room {}", departed.id, self.id);

        let mut stalled = Stalled::new();
        let notice = Message::remove_peer(&departed.id);
        for member in &self.members {
            deliver(member, notice.clone(), &mut stalled);
        }

        if self.members.is_empty() {
            self.state = RoomState::Waiting;
        }
        self.evict(stalled);
    }

    /// Remove members that failed a send as if they had left
    fn evict(&mut self, stalled: Stalled) {
        for (client_id, token) in stalled {
            if let Some(index) = self.position(client_id.as_str(), token) {
                info!("Client {} stalled, evicted from room {}", client_id, self.id);
                self.remove_at(index);
            }
        }
    }

    /// Route one signaling message from a current member
    fn route(&self, msg: Message) -> Stalled {
        let mut stalled = Stalled::new();

        match msg.kind {
            MessageType::Join => {
                let Some(index) = self.index_of(&msg.from) else {
                    return stalled;
                };
                // Later joiners receive offers from everyone before them
                if self.members.len() > 1 {
                    let offer = Message::create_offer(&msg.from);
                    for member in &self.members[..index] {
                        deliver(member, offer.clone(), &mut stalled);
                    }
                }
            }
            MessageType::Offer => {
                let relay = Message::new(MessageType::SetOffer)
                    .with_data(msg.data)
                    .with_from(msg.from);
                self.forward(&msg.to, relay, &mut stalled);
            }
            MessageType::Answer => {
                let relay = Message::new(MessageType::SetAnswer)
                    .with_data(msg.data)
                    .with_from(msg.from);
                self.forward(&msg.to, relay, &mut stalled);
            }
            MessageType::NewIceCandidate => {
                let relay = Message::new(MessageType::AddIceCandidate)
                    .with_data(msg.data)
                    .with_from(msg.from.clone());
                for member in self.members.iter().filter(|m| m.id.as_str() != msg.from) {
                    deliver(member, relay.clone(), &mut stalled);
                }
            }
            MessageType::CreateOffer
            | MessageType::SetOffer
            | MessageType::SetAnswer
            | MessageType::AddIceCandidate
            | MessageType::RemovePeer
            | MessageType::RoomClosed => {
                debug!("Server-only {:?} from {} dropped", msg.kind, msg.from);
            }
        }

        stalled
    }

    /// Deliver to the member named `to`; unknown recipients are dropped
    fn forward(&self, to: &str, msg: Message, stalled: &mut Stalled) {
        match self.index_of(to) {
            Some(index) => deliver(&self.members[index], msg, stalled),
            None => debug!("Recipient {} not in room {}, {:?} dropped", to, self.id, msg.kind),
        }
    }

    fn close(&mut self, registry: &RoomRegistry) {
        self.state = RoomState::Closing;
        self.events.close();
        registry.remove(&self.id);

        // Dropping the handles lets each writer flush RoomClosed and close
        for member in self.members.drain(..) {
            let _ = member.send(Message::room_closed());
        }
        self.publish_member_count();

        info!("Room {} closed", self.id);
    }

    fn index_of(&self, client_id: &str) -> Option<usize> {
        self.members.iter().position(|m| m.id.as_str() == client_id)
    }

    /// Index of the member with this id and connection token
    fn position(&self, client_id: &str, token: u64) -> Option<usize> {
        self.members
            .iter()
            .position(|m| m.id.as_str() == client_id && m.token == token)
    }

    fn publish_member_count(&self) {
        self.member_count
            .store(self.members.len(), Ordering::Release);
    }
}

/// Fire-and-forget send; a member whose outbox refuses is treated as gone
fn deliver(member: &ClientHandle, msg: Message, stalled: &mut Stalled) {
    if let Err(e) = member.send(msg) {
        debug!("Client {} outbox refused message: {}", member.id, e);
        stalled.push((member.id.clone(), member.token));
    }
}
