use std::collections::HashMap;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::{ImageSelector, Room, RoomUser};

use super::{StoreError, SweepReport};

/// Rooms and their memberships. Lives behind a single lock in `MemoryStorage`.
#[derive(Debug, Default)]
pub(crate) struct RoomTable {
    rooms: HashMap<Uuid, Room>,
    // rooms not yet swept, in creation order
    order: Vec<Uuid>,
    // a room keeps an entry here until it has been swept
    members: HashMap<Uuid, Vec<RoomUser>>,
}

impl RoomTable {
    pub(crate) fn insert(&mut self, room: Room) -> Room {
        self.order.push(room.id);
        self.members.insert(room.id, Vec::new());
        self.rooms.insert(room.id, room.clone());
        room
    }

    pub(crate) fn live_by_match_key(&self, image: &ImageSelector, now: OffsetDateTime) -> Vec<Room> {
        self.order
            .iter()
            .filter_map(|id| self.rooms.get(id))
            .filter(|room| room.is_live(now) && &room.image == image)
            .cloned()
            .collect()
    }

    pub(crate) fn get_live(&self, id: Uuid, now: OffsetDateTime) -> Option<&Room> {
        self.rooms.get(&id).filter(|room| room.is_live(now))
    }

    pub(crate) fn set_active(&mut self, id: Uuid, active: bool) -> Result<(), StoreError> {
        let room = self.rooms.get_mut(&id).ok_or(StoreError::RoomNotFound)?;
        // a swept room is gone for good
        if active && !self.members.contains_key(&id) {
            return Err(StoreError::RoomNotFound);
        }
        room.is_active = active;
        Ok(())
    }

    pub(crate) fn add_member(
        &mut self,
        room_id: Uuid,
        user_id: Uuid,
        username: String,
        now: OffsetDateTime,
    ) -> Result<RoomUser, StoreError> {
        if self.get_live(room_id, now).is_none() {
            return Err(StoreError::RoomNotFound);
        }

        let members = self.members.entry(room_id).or_default();
        if let Some(existing) = members.iter_mut().find(|m| m.user_id == user_id) {
            existing.username = username;
            existing.is_active = true;
            return Ok(existing.clone());
        }

        let member = RoomUser {
            id: Uuid::now_v7(),
            room_id,
            user_id,
            username,
            joined_at: now,
            is_active: true,
        };
        members.push(member.clone());
        Ok(member)
    }

    pub(crate) fn active_members(&self, room_id: Uuid) -> Vec<RoomUser> {
        let mut members: Vec<RoomUser> = self
            .members
            .get(&room_id)
            .map(|members| members.iter().filter(|m| m.is_active).cloned().collect())
            .unwrap_or_default();
        members.sort_by_key(|m| m.joined_at);
        members
    }

    pub(crate) fn remove_member(&mut self, room_id: Uuid, user_id: Uuid) {
        if let Some(members) = self.members.get_mut(&room_id) {
            members.retain(|m| m.user_id != user_id);
        }
    }

    /// Deactivates every room that is no longer live and drops its membership in
    /// one step. Swept rooms leave the scan order, so each is reported once and
    /// later scans only walk rooms that have not been swept yet.
    pub(crate) fn sweep(&mut self, now: OffsetDateTime) -> SweepReport {
        let mut report = SweepReport::default();
        let rooms = &mut self.rooms;
        let members = &mut self.members;

        self.order.retain(|id| {
            let Some(room) = rooms.get_mut(id) else {
                return false;
            };
            if room.is_live(now) {
                return true;
            }

            if room.is_active {
                room.is_active = false;
                report.deactivated += 1;
            }
            if let Some(evicted) = members.remove(id) {
                report.evicted_members += evicted.len();
            }
            report.room_ids.push(*id);
            false
        });

        report
    }

    #[cfg(test)]
    pub(crate) fn unswept_rooms(&self) -> usize {
        self.order.len()
    }

    #[cfg(test)]
    pub(crate) fn member_rows(&self, room_id: Uuid) -> usize {
        self.members.get(&room_id).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use time::{macros::datetime, Duration};

    use super::*;

    const T0: OffsetDateTime = datetime!(2024-05-01 12:00 UTC);

    fn selector(key: &str) -> ImageSelector {
        ImageSelector::Predefined(key.to_owned())
    }

    fn table_with_room() -> (RoomTable, Room) {
        let mut table = RoomTable::default();
        let room = table.insert(Room::new(selector("1"), "h".to_owned(), 60, Uuid::now_v7(), T0));
        (table, room)
    }

    #[test]
    fn match_key_scan_is_in_creation_order_and_skips_dead_rooms() {
        let mut table = RoomTable::default();
        let first = table.insert(Room::new(selector("1"), "a".to_owned(), 60, Uuid::now_v7(), T0));
        let closed = table.insert(Room::new(selector("1"), "b".to_owned(), 60, Uuid::now_v7(), T0));
        let third = table.insert(Room::new(selector("1"), "c".to_owned(), 60, Uuid::now_v7(), T0));
        table.insert(Room::new(selector("2"), "d".to_owned(), 60, Uuid::now_v7(), T0));
        table.set_active(closed.id, false).unwrap();

        let ids: Vec<Uuid> = table.live_by_match_key(&selector("1"), T0).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first.id, third.id]);
        assert!(table.live_by_match_key(&selector("1"), T0 + Duration::hours(1)).is_empty());
    }

    #[test]
    fn add_member_twice_keeps_one_row() {
        let (mut table, room) = table_with_room();
        let user = Uuid::now_v7();

        table.add_member(room.id, user, "alice".to_owned(), T0).unwrap();
        let again = table.add_member(room.id, user, "alice2".to_owned(), T0 + Duration::seconds(5)).unwrap();

        let members = table.active_members(room.id);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].username, "alice2");
        assert_eq!(again.joined_at, T0);
    }

    #[test]
    fn members_ordered_by_join_time() {
        let (mut table, room) = table_with_room();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        table.add_member(room.id, b, "b".to_owned(), T0 + Duration::seconds(2)).unwrap();
        table.add_member(room.id, a, "a".to_owned(), T0 + Duration::seconds(1)).unwrap();

        let names: Vec<String> = table.active_members(room.id).into_iter().map(|m| m.username).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn cannot_join_dead_room() {
        let (mut table, room) = table_with_room();
        let err = table
            .add_member(room.id, Uuid::now_v7(), "late".to_owned(), T0 + Duration::minutes(60))
            .unwrap_err();
        assert!(matches!(err, StoreError::RoomNotFound));
    }

    #[test]
    fn remove_member_is_idempotent() {
        let (mut table, room) = table_with_room();
        let user = Uuid::now_v7();
        table.add_member(room.id, user, "alice".to_owned(), T0).unwrap();

        table.remove_member(room.id, user);
        table.remove_member(room.id, user);
        table.remove_member(Uuid::now_v7(), user);
        assert!(table.active_members(room.id).is_empty());
    }

    #[test]
    fn set_active_is_idempotent() {
        let (mut table, room) = table_with_room();
        table.set_active(room.id, false).unwrap();
        table.set_active(room.id, false).unwrap();
        assert!(table.get_live(room.id, T0).is_none());
        assert!(matches!(table.set_active(Uuid::now_v7(), false), Err(StoreError::RoomNotFound)));
    }

    #[test]
    fn sweep_deactivates_and_evicts_once() {
        let (mut table, room) = table_with_room();
        table.add_member(room.id, Uuid::now_v7(), "a".to_owned(), T0).unwrap();
        table.add_member(room.id, Uuid::now_v7(), "b".to_owned(), T0).unwrap();

        let early = table.sweep(T0 + Duration::minutes(59));
        assert_eq!(early, SweepReport::default());

        let report = table.sweep(T0 + Duration::minutes(61));
        assert_eq!(report.deactivated, 1);
        assert_eq!(report.evicted_members, 2);
        assert_eq!(report.room_ids, vec![room.id]);
        assert_eq!(table.member_rows(room.id), 0);
        assert!(!table.rooms[&room.id].is_active);

        assert_eq!(table.sweep(T0 + Duration::minutes(62)), SweepReport::default());
    }

    #[test]
    fn swept_rooms_leave_the_scan_order() {
        let mut table = RoomTable::default();
        let short = table.insert(Room::new(selector("1"), "a".to_owned(), 10, Uuid::now_v7(), T0));
        let long = table.insert(Room::new(selector("1"), "b".to_owned(), 60, Uuid::now_v7(), T0));
        assert_eq!(table.unswept_rooms(), 2);

        let report = table.sweep(T0 + Duration::minutes(30));
        assert_eq!(report.room_ids, vec![short.id]);
        assert_eq!(table.unswept_rooms(), 1);

        let ids: Vec<Uuid> = table.live_by_match_key(&selector("1"), T0 + Duration::minutes(30)).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![long.id]);

        // the record survives, inactive, and cannot be revived
        assert!(!table.rooms[&short.id].is_active);
        assert!(matches!(table.set_active(short.id, true), Err(StoreError::RoomNotFound)));

        table.sweep(T0 + Duration::minutes(61));
        assert_eq!(table.unswept_rooms(), 0);
        assert_eq!(table.sweep(T0 + Duration::minutes(62)), SweepReport::default());
    }

    #[test]
    fn sweep_reclaims_closed_rooms() {
        let (mut table, room) = table_with_room();
        table.add_member(room.id, Uuid::now_v7(), "a".to_owned(), T0).unwrap();
        table.set_active(room.id, false).unwrap();

        let report = table.sweep(T0 + Duration::minutes(1));
        assert_eq!(report.deactivated, 0);
        assert_eq!(report.evicted_members, 1);
        assert_eq!(report.room_ids, vec![room.id]);
    }
}
