use tracing::{debug, warn};
use uuid::Uuid;

use hearth_types::events::ChangeEvent;
use hearth_types::models::{Notification, NotificationKind, Session};

use crate::Workflows;
use crate::error::WorkflowResult;
use crate::retry::retry_once;

pub const MAX_NOTIFICATIONS: u32 = 200;

impl Workflows {
    /// Record a notification for `user_id` and publish it. Best-effort: a
    /// failure is logged and never reaches the caller.
    pub(crate) fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        message: String,
        booking_id: Option<Uuid>,
    ) {
        let id = Uuid::new_v4().to_string();
        let uid = user_id.to_string();
        let bid = booking_id.map(|b| b.to_string());

        match self.db.insert_notification(
            &id,
            &uid,
            kind.as_str(),
            kind.heading(),
            &message,
            bid.as_deref(),
        ) {
            Ok(notification) => {
                debug!("Notification {} ({}) for {}", notification.id, kind.as_str(), user_id);
                self.dispatcher.publish(ChangeEvent::NotificationCreated(notification));
            }
            Err(e) => {
                warn!("Dropping {} notification for {}: {:#}", kind.as_str(), user_id, e);
            }
        }
    }

    /// The caller's notifications, newest first.
    pub fn list_notifications(&self, session: &Session, limit: u32) -> WorkflowResult<Vec<Notification>> {
        let uid = session.user_id.to_string();
        let limit = limit.clamp(1, MAX_NOTIFICATIONS);
        retry_once("list notifications", || {
            self.db.list_notifications_for_user(&uid, limit)
        })
    }
}
