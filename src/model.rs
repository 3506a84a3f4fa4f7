use serde::Serialize;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

pub const MAX_ROOM_DURATION_MINUTES: u32 = 60;
pub const CUSTOM_IMAGE_KEY: &str = "custom";

/// What a room is "pictured" by. Together with the password this is all a user
/// needs to find a room again, so it doubles as the non-secret match key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageSelector {
    Predefined(String),
    Custom(String),
}

impl ImageSelector {
    pub fn image_key(&self) -> &str {
        match self {
            ImageSelector::Predefined(key) => key,
            ImageSelector::Custom(_) => CUSTOM_IMAGE_KEY,
        }
    }

    pub fn custom_image_url(&self) -> Option<&str> {
        match self {
            ImageSelector::Predefined(_) => None,
            ImageSelector::Custom(url) => Some(url),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id: Uuid,
    pub image: ImageSelector,
    // argon2 PHC string, never leaves the process
    pub(crate) password_hash: String,
    pub creator_user_id: Uuid,
    pub duration: u32,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub is_active: bool,
}

impl Room {
    pub(crate) fn new(
        image: ImageSelector,
        password_hash: String,
        duration: u32,
        creator_user_id: Uuid,
        now: OffsetDateTime,
    ) -> Self {
        let duration = duration.min(MAX_ROOM_DURATION_MINUTES);
        Self {
            id: Uuid::now_v7(),
            image,
            password_hash,
            creator_user_id,
            duration,
            created_at: now,
            expires_at: now + Duration::minutes(duration.into()),
            is_active: true,
        }
    }

    /// Recomputed on every read; the stored flag alone never makes a room live.
    pub fn is_live(&self, now: OffsetDateTime) -> bool {
        self.is_active && now < self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUser {
    pub id: Uuid,
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn room_at(now: OffsetDateTime, duration: u32) -> Room {
        Room::new(
            ImageSelector::Predefined("1".to_owned()),
            "hash".to_owned(),
            duration,
            Uuid::now_v7(),
            now,
        )
    }

    #[test]
    fn duration_is_capped() {
        let t0 = datetime!(2024-05-01 12:00 UTC);
        let room = room_at(t0, 240);
        assert_eq!(room.duration, 60);
        assert_eq!(room.expires_at, datetime!(2024-05-01 13:00 UTC));
    }

    #[test]
    fn not_live_at_or_after_expiry_even_if_flagged_active() {
        let t0 = datetime!(2024-05-01 12:00 UTC);
        let room = room_at(t0, 60);

        assert!(room.is_active);
        assert!(room.is_live(t0 + Duration::minutes(59)));
        assert!(!room.is_live(room.expires_at));
        assert!(!room.is_live(room.expires_at + Duration::milliseconds(1)));
    }

    #[test]
    fn inactive_room_is_never_live() {
        let t0 = datetime!(2024-05-01 12:00 UTC);
        let mut room = room_at(t0, 60);
        room.is_active = false;
        assert!(!room.is_live(t0));
    }

    #[test]
    fn selector_accessors() {
        let custom = ImageSelector::Custom("/uploads/abc".to_owned());
        assert_eq!(custom.image_key(), CUSTOM_IMAGE_KEY);
        assert_eq!(custom.custom_image_url(), Some("/uploads/abc"));

        let predefined = ImageSelector::Predefined("3".to_owned());
        assert_eq!(predefined.image_key(), "3");
        assert_eq!(predefined.custom_image_url(), None);
    }
}
