use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use shared_database::NotificationRepository;
use shared_models::notification::{NewNotification, Notification};

use crate::models::{Inbox, NotificationError};

pub const INBOX_LIMIT: usize = 20;

pub struct NotificationService {
    repository: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    pub fn new(repository: Arc<dyn NotificationRepository>) -> Self {
        Self { repository }
    }

    pub async fn notify(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, NotificationError> {
        debug!(
            "Notifying user {} ({}): {}",
            notification.user_id, notification.kind, notification.title
        );
        Ok(self.repository.insert_notification(notification).await?)
    }

    /// Delivers to every recipient independently. Returns how many were stored.
    #[instrument(skip(self, notifications), fields(recipients = notifications.len()))]
    pub async fn notify_many(&self, notifications: Vec<NewNotification>) -> usize {
        let results = join_all(notifications.into_iter().map(|notification| async move {
            let user_id = notification.user_id;
            (user_id, self.notify(notification).await)
        }))
        .await;

        results
            .into_iter()
            .filter(|(user_id, result)| match result {
                Ok(_) => true,
                Err(e) => {
                    warn!("Failed to notify user {}: {}", user_id, e);
                    false
                }
            })
            .count()
    }

    pub async fn inbox(&self, user_id: Uuid) -> Result<Inbox, NotificationError> {
        let notifications = self
            .repository
            .list_notifications(user_id, INBOX_LIMIT)
            .await?;
        let unread_count = self.repository.count_unread(user_id).await?;

        Ok(Inbox {
            notifications,
            unread_count,
        })
    }

    pub async fn mark_read(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), NotificationError> {
        if self.repository.mark_read(notification_id, user_id).await? {
            Ok(())
        } else {
            Err(NotificationError::NotFound)
        }
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<usize, NotificationError> {
        Ok(self.repository.mark_all_read(user_id).await?)
    }
}
