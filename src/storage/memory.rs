use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    clock::{Clock, SystemClock},
    model::{ImageSelector, Message, Room, RoomUser},
};

use super::{
    messages::{MessageLog, DEFAULT_MAX_MESSAGE_CHARS},
    rooms::RoomTable,
    RoomSnapshot, Storage, StoreError, SweepReport,
};

/// Process-local backend. Locks are always taken rooms first, then messages.
pub struct MemoryStorage {
    clock: Arc<dyn Clock>,
    rooms: RwLock<RoomTable>,
    messages: RwLock<MessageLog>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), DEFAULT_MAX_MESSAGE_CHARS)
    }
}

impl MemoryStorage {
    pub fn new(clock: Arc<dyn Clock>, max_message_chars: usize) -> Self {
        Self {
            clock,
            rooms: RwLock::new(RoomTable::default()),
            messages: RwLock::new(MessageLog::new(max_message_chars)),
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    async fn create_room(
        &self,
        image: ImageSelector,
        password_hash: String,
        duration: u32,
        creator_user_id: Uuid,
    ) -> Room {
        let room = Room::new(image, password_hash, duration, creator_user_id, self.now());
        self.rooms.write().await.insert(room)
    }

    async fn live_rooms_by_match_key(&self, image: &ImageSelector) -> Vec<Room> {
        let now = self.now();
        self.rooms.read().await.live_by_match_key(image, now)
    }

    async fn get_live_room(&self, id: Uuid) -> Option<Room> {
        let now = self.now();
        self.rooms.read().await.get_live(id, now).cloned()
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<(), StoreError> {
        self.rooms.write().await.set_active(id, active)
    }

    async fn add_member(&self, room_id: Uuid, user_id: Uuid, username: String) -> Result<RoomUser, StoreError> {
        let now = self.now();
        self.rooms.write().await.add_member(room_id, user_id, username, now)
    }

    async fn list_active_members(&self, room_id: Uuid) -> Vec<RoomUser> {
        self.rooms.read().await.active_members(room_id)
    }

    async fn remove_member(&self, room_id: Uuid, user_id: Uuid) {
        self.rooms.write().await.remove_member(room_id, user_id)
    }

    async fn append_message(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        username: String,
        content: &str,
    ) -> Result<Message, StoreError> {
        // hold the room lock so a concurrent sweep cannot purge between check and append
        let rooms = self.rooms.read().await;
        let now = self.now();
        if rooms.get_live(room_id, now).is_none() {
            return Err(StoreError::RoomNotFound);
        }

        self.messages.write().await.append(room_id, user_id, username, content, now)
    }

    async fn list_messages_since(&self, room_id: Uuid, since: Option<OffsetDateTime>) -> Vec<Message> {
        self.messages.read().await.list_since(room_id, since)
    }

    async fn room_snapshot(&self, room_id: Uuid, since: Option<OffsetDateTime>) -> Option<RoomSnapshot> {
        let rooms = self.rooms.read().await;
        let read_at = self.now();
        let room = rooms.get_live(room_id, read_at)?.clone();
        let members = rooms.active_members(room_id);
        let messages = self.messages.read().await.list_since(room_id, since);

        Some(RoomSnapshot {
            room,
            members,
            messages,
            read_at,
        })
    }

    async fn sweep_expired(&self) -> SweepReport {
        let mut rooms = self.rooms.write().await;
        let mut report = rooms.sweep(self.now());
        if !report.room_ids.is_empty() {
            report.purged_messages = self.messages.write().await.purge(&report.room_ids);
        }
        report
    }
}
