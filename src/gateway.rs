use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    config::Config,
    matcher::CredentialMatcher,
    model::{ImageSelector, Message, Room, RoomUser, CUSTOM_IMAGE_KEY},
    password::CredentialHasher,
    storage::Storage,
    AppError, AppResult,
};

pub const PREDEFINED_IMAGE_KEYS: [&str; 8] = ["1", "2", "3", "4", "5", "6", "7", "8"];
pub const MAX_CUSTOM_IMAGE_URL_CHARS: usize = 512;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub image_key: String,
    #[serde(default)]
    pub custom_image_url: Option<String>,
    pub password: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub user_id: Uuid,
    pub username: String,
    pub content: String,
}

/// The room as clients see it. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub id: Uuid,
    pub image_key: String,
    pub custom_image_url: Option<String>,
    pub duration: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub is_active: bool,
    pub is_creator: bool,
}

impl RoomView {
    fn new(room: &Room, viewer: Option<Uuid>, now: OffsetDateTime) -> Self {
        Self {
            id: room.id,
            image_key: room.image.image_key().to_owned(),
            custom_image_url: room.image.custom_image_url().map(str::to_owned),
            duration: room.duration,
            expires_at: room.expires_at,
            is_active: room.is_live(now),
            is_creator: viewer == Some(room.creator_user_id),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub room: RoomView,
    pub user_id: Uuid,
    pub users: Vec<RoomUser>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub room: RoomView,
    pub users: Vec<RoomUser>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub min_password_chars: usize,
    pub max_username_chars: usize,
}

impl From<&Config> for Limits {
    fn from(config: &Config) -> Self {
        Self {
            min_password_chars: config.min_password_chars,
            max_username_chars: config.max_username_chars,
        }
    }
}

/// join / poll-status / send / leave / close.
///
/// Nothing is pushed: clients learn about new members and messages only by
/// polling `status` with the timestamp of the newest message they hold. Every
/// operation is safe to repeat.
pub struct Gateway {
    storage: Arc<dyn Storage>,
    matcher: CredentialMatcher,
    limits: Limits,
}

impl Gateway {
    pub fn new(storage: Arc<dyn Storage>, hasher: CredentialHasher, config: &Config) -> Self {
        Self {
            matcher: CredentialMatcher::new(storage.clone(), hasher, config.room_duration_minutes),
            storage,
            limits: Limits::from(config),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub async fn join(&self, request: JoinRequest) -> AppResult<JoinResponse> {
        let image = parse_image(&request.image_key, request.custom_image_url.as_deref())?;
        if request.password.chars().count() < self.limits.min_password_chars {
            return Err(AppError::Validation(format!(
                "password must be at least {} characters",
                self.limits.min_password_chars
            )));
        }
        let username = self.validate_username(&request.username)?;

        let user_id = Uuid::now_v7();
        let room = self.matcher.find_or_create(image, &request.password, user_id).await?;
        self.storage.add_member(room.id, user_id, username).await?;

        let snapshot = self.storage.room_snapshot(room.id, None).await.ok_or(AppError::NotFound)?;
        tracing::info!(room_id = %room.id, user_id = %user_id, members = snapshot.members.len(), "user joined");

        Ok(JoinResponse {
            room: RoomView::new(&snapshot.room, Some(user_id), snapshot.read_at),
            user_id,
            users: snapshot.members,
            messages: snapshot.messages,
        })
    }

    /// `user_id` only decides `isCreator`; it is taken on trust.
    pub async fn poll_status(
        &self,
        room_id: Uuid,
        user_id: Option<Uuid>,
        since: Option<OffsetDateTime>,
    ) -> AppResult<StatusResponse> {
        let snapshot = self.storage.room_snapshot(room_id, since).await.ok_or(AppError::NotFound)?;

        Ok(StatusResponse {
            room: RoomView::new(&snapshot.room, user_id, snapshot.read_at),
            users: snapshot.members,
            messages: snapshot.messages,
        })
    }

    pub async fn send(&self, room_id: Uuid, request: SendRequest) -> AppResult<Message> {
        let username = self.validate_username(&request.username)?;
        let message = self
            .storage
            .append_message(room_id, request.user_id, username, &request.content)
            .await?;
        tracing::debug!(room_id = %room_id, message_id = %message.id, "message appended");
        Ok(message)
    }

    pub async fn leave(&self, room_id: Uuid, user_id: Uuid) {
        self.storage.remove_member(room_id, user_id).await;
        tracing::debug!(room_id = %room_id, user_id = %user_id, "user left");
    }

    pub async fn close(&self, room_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let room = self.storage.get_live_room(room_id).await.ok_or(AppError::NotFound)?;
        if room.creator_user_id != user_id {
            return Err(AppError::Forbidden);
        }

        self.storage.set_active(room_id, false).await?;
        tracing::info!(room_id = %room_id, "room closed by creator");
        Ok(())
    }

    fn validate_username(&self, username: &str) -> AppResult<String> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("username is required".to_owned()));
        }
        if username.chars().count() > self.limits.max_username_chars {
            return Err(AppError::Validation(format!(
                "username must be at most {} characters",
                self.limits.max_username_chars
            )));
        }
        Ok(username.to_owned())
    }
}

fn parse_image(image_key: &str, custom_image_url: Option<&str>) -> AppResult<ImageSelector> {
    let custom_image_url = custom_image_url.map(str::trim).filter(|url| !url.is_empty());

    match (image_key.trim(), custom_image_url) {
        (CUSTOM_IMAGE_KEY, Some(url)) if url.chars().count() <= MAX_CUSTOM_IMAGE_URL_CHARS => {
            Ok(ImageSelector::Custom(url.to_owned()))
        }
        (CUSTOM_IMAGE_KEY, Some(_)) => Err(AppError::Validation("custom image reference is too long".to_owned())),
        (CUSTOM_IMAGE_KEY, None) => Err(AppError::Validation("custom image reference is required".to_owned())),
        (key, None) if PREDEFINED_IMAGE_KEYS.contains(&key) => Ok(ImageSelector::Predefined(key.to_owned())),
        (key, Some(_)) if PREDEFINED_IMAGE_KEYS.contains(&key) => Err(AppError::Validation(
            "choose either a gallery image or a custom image, not both".to_owned(),
        )),
        _ => Err(AppError::Validation("please select an image".to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_selection_rules() {
        assert_eq!(parse_image("3", None).unwrap(), ImageSelector::Predefined("3".to_owned()));
        assert_eq!(parse_image("3", Some("  ")).unwrap(), ImageSelector::Predefined("3".to_owned()));
        assert_eq!(
            parse_image("custom", Some("/uploads/abc")).unwrap(),
            ImageSelector::Custom("/uploads/abc".to_owned())
        );

        assert!(matches!(parse_image("custom", None), Err(AppError::Validation(_))));
        assert!(matches!(parse_image("3", Some("/uploads/abc")), Err(AppError::Validation(_))));
        assert!(matches!(parse_image("42", None), Err(AppError::Validation(_))));
        assert!(matches!(parse_image("", None), Err(AppError::Validation(_))));

        let long = "x".repeat(MAX_CUSTOM_IMAGE_URL_CHARS + 1);
        assert!(matches!(parse_image("custom", Some(&long)), Err(AppError::Validation(_))));
    }
}
