//! Client pump and room-side client handle
//!
//! A [`Client`] binds one connection to one room. It forwards every inbound
//! message to the room's inbox and delivers outbound messages through a
//! dedicated writer task fed by a bounded outbox, so the room never waits on
//! a slow peer.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::connection::{Connection, ConnectionSink, ConnectionStream};
use crate::error::{SendError, TransportError};
use crate::message::Message;
use crate::room::RoomHandle;
use crate::types::ClientId;

/// Messages a client may have queued before it counts as stalled
pub const OUTBOX_CAPACITY: usize = 64;

/// Room-side reference to a connected client
///
/// Held in the room's member list. Sending never blocks: messages are queued
/// on the client's outbox and written by its writer task.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    /// Unique identifier within the room
    pub id: ClientId,
    /// Identifies this connection; distinguishes clients that share an id
    pub token: u64,
    /// Room → client outbox
    outbox: mpsc::Sender<Message>,
}

impl ClientHandle {
    pub fn new(id: ClientId, token: u64, outbox: mpsc::Sender<Message>) -> Self {
        Self { id, token, outbox }
    }

    /// Queue a message for this client
    ///
    /// Returns an error if the writer is gone (client disconnected) or the
    /// outbox is full (client stalled).
    pub fn send(&self, msg: Message) -> Result<(), SendError> {
        self.outbox.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }
}

/// Connected client bound to one room
pub struct Client<C> {
    id: ClientId,
    room: RoomHandle,
    connection: C,
}

impl<C: Connection> Client<C> {
    pub fn new(id: ClientId, room: RoomHandle, connection: C) -> Self {
        Self {
            id,
            room,
            connection,
        }
    }

    /// Run the client until its transport fails
    ///
    /// Registers with the room, then pumps inbound messages into the room's
    /// inbox. A receive failure deregisters the client and releases the
    /// connection.
    pub async fn run(self) -> Result<(), TransportError> {
        let Client {
            id,
            room,
            connection,
        } = self;
        let (mut sink, mut stream) = connection.split();
        let (outbox_tx, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);
        let token = room.next_token();

        if room
            .register(ClientHandle::new(id.clone(), token, outbox_tx))
            .is_err()
        {
            debug!("Room {} closed before client {} registered", room.id(), id);
            sink.close().await;
            return Err(TransportError::Closed);
        }
        info!("Client {} joined room {}", id, room.id());

        let writer = tokio::spawn(write_loop(sink, outbox_rx));

        let result = loop {
            match stream.receive().await {
                Ok(mut msg) => {
                    if !msg.kind.is_inbound() {
                        debug!("Server-only {:?} from {} dropped", msg.kind, id);
                        continue;
                    }
                    // Sender identity is always the server's view
                    msg.from = id.to_string();
                    if room.signal(token, msg).is_err() {
                        debug!("Room {} closed, ending read loop for {}", room.id(), id);
                        break Ok(());
                    }
                }
                Err(TransportError::Closed) => break Ok(()),
                Err(e) => {
                    debug!("Transport error for {}: {}", id, e);
                    break Err(e);
                }
            }
        };

        let _ = room.unregister(id.clone(), token);
        // Dropping the stream and aborting the writer releases the connection
        writer.abort();
        drop(stream);

        info!("Client {} left room {}", id, room.id());
        result
    }
}

/// Drain the outbox into the connection until either side is gone
async fn write_loop<S: ConnectionSink>(mut sink: S, mut outbox: mpsc::Receiver<Message>) {
    while let Some(msg) = outbox.recv().await {
        if let Err(e) = sink.send(msg).await {
            debug!("Send failed, ending write task: {}", e);
            break;
        }
    }
    sink.close().await;
}
