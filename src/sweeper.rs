use std::{sync::Arc, time::Duration};

use tokio::{sync::oneshot, task::JoinHandle, time::MissedTickBehavior};

use crate::storage::{Storage, SweepReport};

/// Periodically deactivates dead rooms and reclaims their members and messages.
///
/// Reads never depend on it; it only bounds memory.
pub struct Sweeper {
    storage: Arc<dyn Storage>,
    interval: Duration,
}

/// Stops the sweep task when told to. Dropping it also stops the task.
pub struct SweeperHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Sweeper {
    pub fn new(storage: Arc<dyn Storage>, interval: Duration) -> Self {
        Self { storage, interval }
    }

    pub async fn sweep_once(&self) -> SweepReport {
        let report = self.storage.sweep_expired().await;
        if !report.room_ids.is_empty() {
            tracing::info!(
                rooms = report.room_ids.len(),
                deactivated = report.deactivated,
                evicted_members = report.evicted_members,
                purged_messages = report.purged_messages,
                "swept expired rooms"
            );
        } else {
            tracing::trace!("sweep found nothing to reclaim");
        }
        report
    }

    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(self.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick fires immediately
            timer.tick().await;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = timer.tick() => {
                        self.sweep_once().await;
                    }
                }
            }
            tracing::debug!("sweeper stopped");
        });

        SweeperHandle {
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }
}

impl SweeperHandle {
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(err) = (&mut self.task).await {
            tracing::error!("sweeper task failed: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;
    use crate::{
        clock::ManualClock,
        model::ImageSelector,
        storage::{MemoryStorage, DEFAULT_MAX_MESSAGE_CHARS},
    };

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_interval_until_stopped() {
        let clock = Arc::new(ManualClock::new(datetime!(2024-05-01 12:00 UTC)));
        let storage = Arc::new(MemoryStorage::new(clock.clone(), DEFAULT_MAX_MESSAGE_CHARS));
        let image = ImageSelector::Predefined("1".to_owned());
        let room = storage.create_room(image, "h".to_owned(), 60, Uuid::now_v7()).await;
        storage.add_member(room.id, Uuid::now_v7(), "a".to_owned()).await.unwrap();

        let handle = Sweeper::new(storage.clone(), Duration::from_secs(60)).spawn();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(storage.list_active_members(room.id).await.len(), 1);

        clock.advance(time::Duration::minutes(61));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(storage.list_active_members(room.id).await.is_empty());

        handle.stop().await;
    }

    #[tokio::test]
    async fn sweep_once_reports_nothing_for_live_rooms() {
        let storage = Arc::new(MemoryStorage::default());
        let image = ImageSelector::Predefined("1".to_owned());
        storage.create_room(image, "h".to_owned(), 60, Uuid::now_v7()).await;

        let report = Sweeper::new(storage, Duration::from_secs(60)).sweep_once().await;
        assert_eq!(report, SweepReport::default());
    }
}
