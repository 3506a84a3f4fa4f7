mod memory;
mod messages;
mod rooms;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    model::{ImageSelector, Message, Room, RoomUser},
    password::CredentialHasher,
};

pub use memory::MemoryStorage;
pub use messages::DEFAULT_MAX_MESSAGE_CHARS;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("room not found or expired")]
    RoomNotFound,
    #[error("message content must not be empty")]
    EmptyMessage,
    #[error("message content exceeds {max} characters")]
    MessageTooLong { max: usize },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub deactivated: usize,
    pub evicted_members: usize,
    pub purged_messages: usize,
    pub room_ids: Vec<Uuid>,
}

/// A room with its members and message delta, all read at one instant.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub room: Room,
    pub members: Vec<RoomUser>,
    pub messages: Vec<Message>,
    pub read_at: OffsetDateTime,
}

/// Everything the gateway and the sweeper need from a room backend.
///
/// A room that is not live is indistinguishable from one that never existed: every
/// lookup goes through liveness and reports [`StoreError::RoomNotFound`] or `None`.
#[async_trait]
pub trait Storage: Send + Sync {
    fn now(&self) -> OffsetDateTime;

    async fn create_room(
        &self,
        image: ImageSelector,
        password_hash: String,
        duration: u32,
        creator_user_id: Uuid,
    ) -> Room;

    /// Live rooms sharing the match key, oldest first.
    async fn live_rooms_by_match_key(&self, image: &ImageSelector) -> Vec<Room>;

    async fn get_live_room(&self, id: Uuid) -> Option<Room>;

    async fn set_active(&self, id: Uuid, active: bool) -> Result<(), StoreError>;

    async fn add_member(&self, room_id: Uuid, user_id: Uuid, username: String) -> Result<RoomUser, StoreError>;

    async fn list_active_members(&self, room_id: Uuid) -> Vec<RoomUser>;

    async fn remove_member(&self, room_id: Uuid, user_id: Uuid);

    async fn append_message(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        username: String,
        content: &str,
    ) -> Result<Message, StoreError>;

    async fn list_messages_since(&self, room_id: Uuid, since: Option<OffsetDateTime>) -> Vec<Message>;

    /// `None` unless the room is live at `read_at`. Nothing can change in between.
    async fn room_snapshot(&self, room_id: Uuid, since: Option<OffsetDateTime>) -> Option<RoomSnapshot>;

    async fn sweep_expired(&self) -> SweepReport;

    /// First live room with this match key whose stored hash accepts `password`.
    /// Verification runs without holding any store lock.
    async fn find_live_room_by_credentials(
        &self,
        image: &ImageSelector,
        password: &str,
        hasher: &CredentialHasher,
    ) -> Option<Room> {
        for room in self.live_rooms_by_match_key(image).await {
            if hasher.verify(password.to_owned(), room.password_hash.clone()).await {
                return Some(room);
            }
        }
        None
    }
}
