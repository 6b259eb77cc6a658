//! Process-wide collection of live rooms
//!
//! The registry only maps room ids to room handles. Room state itself lives
//! inside each room's event loop; rooms remove themselves when they close.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::error::AppError;
use crate::message::RoomInfo;
use crate::room::{Room, RoomHandle};
use crate::types::{ClientId, IdGenerator, RandomIdGenerator, RoomId};

/// Default waiting-room expiry
pub const DEFAULT_ROOM_EXPIRY: Duration = Duration::from_secs(5 * 60);

/// Default length of generated ids
pub const DEFAULT_ID_LENGTH: usize = 8;

/// Room ids drawn per `create` before giving up
pub const MAX_ID_ATTEMPTS: usize = 8;

/// Room construction settings
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// How long a room may stay empty before it closes
    pub expiry: Duration,
    pub room_id_length: usize,
    pub client_id_length: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            expiry: DEFAULT_ROOM_EXPIRY,
            room_id_length: DEFAULT_ID_LENGTH,
            client_id_length: DEFAULT_ID_LENGTH,
        }
    }
}

struct RegistryInner {
    rooms: DashMap<RoomId, RoomHandle>,
    ids: Arc<dyn IdGenerator>,
    settings: RoomSettings,
    /// Creation sequence for `list` ordering
    next_seq: AtomicU64,
}

/// Shared handle to the room registry
#[derive(Clone)]
pub struct RoomRegistry {
    inner: Arc<RegistryInner>,
}

impl RoomRegistry {
    pub fn new(settings: RoomSettings) -> Self {
        Self::with_generator(settings, Arc::new(RandomIdGenerator))
    }

    pub fn with_generator(settings: RoomSettings, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                rooms: DashMap::new(),
                ids,
                settings,
                next_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Create a room and start its event loop
    ///
    /// Must be called from within a tokio runtime. Gives up after
    /// [`MAX_ID_ATTEMPTS`] ids that all collide with live rooms.
    pub fn create(&self) -> Result<RoomInfo, AppError> {
        let id = self.unused_room_id()?;
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);

        let (room, handle) = Room::new(id.clone(), self.inner.settings.expiry, seq);
        let info = handle.info();
        self.insert(handle);
        tokio::spawn(room.run(self.clone()));

        info!("Room {} created", id);
        debug!("Total rooms: {}", self.inner.rooms.len());
        Ok(info)
    }

    fn unused_room_id(&self) -> Result<RoomId, AppError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = RoomId(self.inner.ids.generate(self.inner.settings.room_id_length)?);
            if !self.inner.rooms.contains_key(&id) {
                return Ok(id);
            }
            debug!("Room id {} already taken", id);
        }
        Err(AppError::RoomIdsExhausted(MAX_ID_ATTEMPTS))
    }

    /// Snapshot of live rooms, oldest first
    pub fn list(&self) -> Vec<RoomInfo> {
        let mut rooms: Vec<RoomHandle> = self
            .inner
            .rooms
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        rooms.sort_by_key(RoomHandle::seq);
        rooms.iter().map(RoomHandle::info).collect()
    }

    pub fn find(&self, id: &str) -> Option<RoomHandle> {
        self.inner
            .rooms
            .get(&RoomId::from(id))
            .map(|entry| entry.value().clone())
    }

    /// Drop a room from the registry. Removing an unknown id is a no-op.
    pub fn remove(&self, id: &RoomId) {
        if self.inner.rooms.remove(id).is_some() {
            debug!("Room {} removed, total rooms: {}", id, self.inner.rooms.len());
        }
    }

    /// Generate an id for a client joining a room
    pub fn new_client_id(&self) -> Result<ClientId, AppError> {
        let id = self.inner.ids.generate(self.inner.settings.client_id_length)?;
        Ok(ClientId(id))
    }

    /// Ask every live room to close
    pub fn shutdown(&self) {
        let rooms: Vec<RoomHandle> = self
            .inner
            .rooms
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        info!("Closing {} rooms", rooms.len());
        for room in rooms {
            // Already closing rooms have dropped their inbox
            let _ = room.close();
        }
    }

    pub(crate) fn insert(&self, handle: RoomHandle) {
        self.inner.rooms.insert(handle.id().clone(), handle);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::mpsc;

    use super::*;
    use crate::client::{ClientHandle, OUTBOX_CAPACITY};

    /// Replays a fixed id sequence, then fails
    struct ScriptedIds {
        ids: Vec<&'static str>,
        next: AtomicUsize,
    }

    impl IdGenerator for ScriptedIds {
        fn generate(&self, _len: usize) -> Result<String, AppError> {
            let i = self.next.fetch_add(1, Ordering::SeqCst);
            match self.ids.get(i) {
                Some(id) => Ok(id.to_string()),
                None => Err(AppError::IdGenerator(rand::Error::new(
                    std::io::Error::other("entropy exhausted"),
                ))),
            }
        }
    }

    fn scripted(ids: Vec<&'static str>) -> RoomRegistry {
        RoomRegistry::with_generator(
            RoomSettings::default(),
            Arc::new(ScriptedIds {
                ids,
                next: AtomicUsize::new(0),
            }),
        )
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let registry = RoomRegistry::new(RoomSettings::default());
        let info = registry.create().unwrap();

        assert_eq!(info.id.as_str().len(), DEFAULT_ID_LENGTH);
        assert_eq!(info.member_count, 0);

        let room = registry.find(info.id.as_str()).unwrap();
        assert_eq!(room.id(), &info.id);
        assert!(registry.find("missing").is_none());
    }

    #[tokio::test]
    async fn test_list_in_creation_order() {
        let registry = scripted(vec!["first", "second", "third"]);
        registry.create().unwrap();
        registry.create().unwrap();
        registry.create().unwrap();

        let ids: Vec<String> = registry.list().into_iter().map(|r| r.id.0).collect();
        assert_eq!(ids, ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_create_retries_on_collision() {
        let registry = scripted(vec!["same", "same", "other"]);
        registry.create().unwrap();
        let info = registry.create().unwrap();
        assert_eq!(info.id.as_str(), "other");
    }

    #[tokio::test]
    async fn test_create_gives_up_when_every_id_collides() {
        let registry = scripted(vec!["same"; MAX_ID_ATTEMPTS + 2]);
        registry.create().unwrap();

        let result = registry.create();
        assert!(matches!(
            result,
            Err(AppError::RoomIdsExhausted(MAX_ID_ATTEMPTS))
        ));
        assert_eq!(registry.list().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_order_survives_paused_clock() {
        // Same instant for every room; order comes from the creation sequence
        let registry = scripted(vec!["zeta", "alpha", "mid"]);
        for _ in 0..3 {
            registry.create().unwrap();
        }

        let ids: Vec<String> = registry.list().into_iter().map(|r| r.id.0).collect();
        assert_eq!(ids, ["zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn test_generator_failure_creates_nothing() {
        let registry = scripted(vec![]);
        let result = registry.create();

        assert!(matches!(result, Err(AppError::IdGenerator(_))));
        assert!(registry.list().is_empty());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = RoomRegistry::new(RoomSettings::default());
        let info = registry.create().unwrap();

        registry.remove(&info.id);
        registry.remove(&info.id);
        assert!(registry.list().is_empty());
    }

    #[tokio::test]
    async fn test_list_reports_member_count() {
        let registry = RoomRegistry::new(RoomSettings::default());
        let info = registry.create().unwrap();
        let room = registry.find(info.id.as_str()).unwrap();

        let (tx, _rx) = mpsc::channel(OUTBOX_CAPACITY);
        let token = room.next_token();
        room.register(ClientHandle::new(ClientId::from("a"), token, tx))
            .unwrap();

        for _ in 0..100 {
            if registry.list()[0].member_count == 1 {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("member count never updated");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_room_expires() {
        let registry = RoomRegistry::new(RoomSettings::default());
        let info = registry.create().unwrap();

        tokio::time::sleep(DEFAULT_ROOM_EXPIRY - Duration::from_secs(1)).await;
        assert!(registry.find(info.id.as_str()).is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(registry.find(info.id.as_str()).is_none());
        assert!(registry.list().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_occupied_room_does_not_expire() {
        let registry = RoomRegistry::new(RoomSettings::default());
        let info = registry.create().unwrap();
        let room = registry.find(info.id.as_str()).unwrap();

        let (tx, _rx) = mpsc::channel(OUTBOX_CAPACITY);
        let token = room.next_token();
        room.register(ClientHandle::new(ClientId::from("a"), token, tx))
            .unwrap();

        tokio::time::sleep(DEFAULT_ROOM_EXPIRY * 3).await;
        assert!(registry.find(info.id.as_str()).is_some());
        assert_eq!(room.member_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_emptied_room_expires_after_rearm() {
        let registry = RoomRegistry::new(RoomSettings::default());
        let info = registry.create().unwrap();
        let room = registry.find(info.id.as_str()).unwrap();

        let (tx, _rx) = mpsc::channel(OUTBOX_CAPACITY);
        let token = room.next_token();
        room.register(ClientHandle::new(ClientId::from("a"), token, tx))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(600)).await;

        room.unregister(ClientId::from("a"), token).unwrap();
        tokio::time::sleep(DEFAULT_ROOM_EXPIRY - Duration::from_secs(1)).await;
        assert!(registry.find(info.id.as_str()).is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(registry.find(info.id.as_str()).is_none());
    }

    #[tokio::test]
    async fn test_shutdown_closes_rooms() {
        let registry = RoomRegistry::new(RoomSettings::default());
        let info = registry.create().unwrap();
        let room = registry.find(info.id.as_str()).unwrap();

        let (tx, mut rx) = mpsc::channel(OUTBOX_CAPACITY);
        let token = room.next_token();
        room.register(ClientHandle::new(ClientId::from("a"), token, tx))
            .unwrap();

        registry.shutdown();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.kind, crate::message::MessageType::RoomClosed);
        assert!(rx.recv().await.is_none());
        assert!(registry.find(info.id.as_str()).is_none());
    }
}
