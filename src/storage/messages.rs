use std::collections::HashMap;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::model::Message;

use super::StoreError;

pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 2000;

/// Per-room append-only logs. Timestamps within a room are strictly increasing,
/// so "everything after the last timestamp I saw" never skips or repeats.
#[derive(Debug)]
pub(crate) struct MessageLog {
    max_chars: usize,
    rooms: HashMap<Uuid, Vec<Message>>,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_CHARS)
    }
}

impl MessageLog {
    pub(crate) fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            rooms: HashMap::new(),
        }
    }

    pub(crate) fn append(
        &mut self,
        room_id: Uuid,
        user_id: Uuid,
        username: String,
        content: &str,
        now: OffsetDateTime,
    ) -> Result<Message, StoreError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(StoreError::EmptyMessage);
        }
        if content.chars().count() > self.max_chars {
            return Err(StoreError::MessageTooLong { max: self.max_chars });
        }

        let log = self.rooms.entry(room_id).or_default();
        let created_at = match log.last() {
            Some(last) if last.created_at >= now => last.created_at + Duration::milliseconds(1),
            _ => now,
        };

        let message = Message {
            id: Uuid::now_v7(),
            room_id,
            user_id,
            username,
            content: content.to_owned(),
            created_at,
        };
        log.push(message.clone());
        Ok(message)
    }

    pub(crate) fn list_since(&self, room_id: Uuid, since: Option<OffsetDateTime>) -> Vec<Message> {
        let Some(log) = self.rooms.get(&room_id) else {
            return Vec::new();
        };

        let start = match since {
            Some(cursor) => log.partition_point(|m| m.created_at <= cursor),
            None => 0,
        };
        log[start..].to_vec()
    }

    pub(crate) fn purge(&mut self, room_ids: &[Uuid]) -> usize {
        room_ids
            .iter()
            .filter_map(|id| self.rooms.remove(id))
            .map(|log| log.len())
            .sum()
    }
}
