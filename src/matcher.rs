use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    model::{ImageSelector, Room},
    password::CredentialHasher,
    storage::Storage,
};

/// Resolves (image, password) to a room.
///
/// Candidates are narrowed by the image alone, then each one's stored hash is
/// checked against the password. A password that matches none of them opens a
/// brand new room, so a typo lands the user somewhere else rather than failing.
pub struct CredentialMatcher {
    storage: Arc<dyn Storage>,
    hasher: CredentialHasher,
    room_duration: u32,
    // find-or-create must not interleave per match key, or two first joiners get two rooms
    join_locks: Mutex<HashMap<ImageSelector, Arc<Mutex<()>>>>,
}

impl CredentialMatcher {
    pub fn new(storage: Arc<dyn Storage>, hasher: CredentialHasher, room_duration: u32) -> Self {
        Self {
            storage,
            hasher,
            room_duration,
            join_locks: Mutex::default(),
        }
    }

    pub async fn find_or_create(
        &self,
        image: ImageSelector,
        password: &str,
        user_id: Uuid,
    ) -> anyhow::Result<Room> {
        let lock = self.key_lock(&image).await;
        let result = {
            let _guard = lock.lock().await;
            self.find_or_create_locked(image.clone(), password, user_id).await
        };
        self.release_key_lock(&image, lock).await;
        result
    }

    async fn key_lock(&self, image: &ImageSelector) -> Arc<Mutex<()>> {
        self.join_locks.lock().await.entry(image.clone()).or_default().clone()
    }

    // drops the map entry once no other join holds or waits on it
    async fn release_key_lock(&self, image: &ImageSelector, lock: Arc<Mutex<()>>) {
        let mut locks = self.join_locks.lock().await;
        if Arc::strong_count(&lock) == 2 {
            locks.remove(image);
        }
    }

    async fn find_or_create_locked(
        &self,
        image: ImageSelector,
        password: &str,
        user_id: Uuid,
    ) -> anyhow::Result<Room> {
        if let Some(room) = self
            .storage
            .find_live_room_by_credentials(&image, password, &self.hasher)
            .await
        {
            tracing::debug!(room_id = %room.id, "matched existing room");
            return Ok(room);
        }

        let password_hash = self.hasher.hash(password.to_owned()).await?;
        let room = self
            .storage
            .create_room(image, password_hash, self.room_duration, user_id)
            .await;
        tracing::info!(
            room_id = %room.id,
            image_key = room.image.image_key(),
            expires_at = %room.expires_at,
            "room created"
        );
        Ok(room)
    }
}
