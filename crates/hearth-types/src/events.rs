use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{BookingRequest, ChatMessage, Notification, Review};

/// A change to a stored document, published on the change feed after the write
/// has committed.
///
/// Removal events carry the final state of the document (a rejected booking
/// arrives with `status = rejected`) so subscribers filtering by party can
/// still tell whether the removal concerns them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChangeEvent {
    BookingRequestAdded(BookingRequest),
    BookingRequestModified(BookingRequest),
    BookingRequestRemoved(BookingRequest),
    ReviewAdded(Review),
    NotificationCreated(Notification),
    ChatMessageCreated(ChatMessage),
}

impl ChangeEvent {
    pub fn booking(&self) -> Option<&BookingRequest> {
        match self {
            Self::BookingRequestAdded(b)
            | Self::BookingRequestModified(b)
            | Self::BookingRequestRemoved(b) => Some(b),
            _ => None,
        }
    }
}

/// Which slice of the change feed a subscriber wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SubscriptionFilter {
    BookingsForRecipient(Uuid),
    BookingsForRequester(Uuid),
    ReviewsFor(Uuid),
    NotificationsFor(Uuid),
    ChatMessagesFor(Uuid),
}

impl SubscriptionFilter {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match (self, event) {
            (Self::BookingsForRecipient(uid), ev) => {
                ev.booking().is_some_and(|b| b.recipient_id == *uid)
            }
            (Self::BookingsForRequester(uid), ev) => {
                ev.booking().is_some_and(|b| b.requester_id == *uid)
            }
            (Self::ReviewsFor(uid), ChangeEvent::ReviewAdded(r)) => r.target_user_id == *uid,
            (Self::NotificationsFor(uid), ChangeEvent::NotificationCreated(n)) => {
                n.user_id == *uid
            }
            (Self::ChatMessagesFor(uid), ChangeEvent::ChatMessageCreated(m)) => {
                m.author_id == *uid || m.recipient_id == *uid
            }
            _ => false,
        }
    }
}

/// Live queries a WebSocket client can open. They are always bound to the
/// authenticated user on the server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveQuery {
    BookingsForRecipient,
    BookingsForRequester,
    ReviewsForMe,
    NotificationsForMe,
    ChatMessagesForMe,
}

impl LiveQuery {
    pub fn bind(self, user_id: Uuid) -> SubscriptionFilter {
        match self {
            Self::BookingsForRecipient => SubscriptionFilter::BookingsForRecipient(user_id),
            Self::BookingsForRequester => SubscriptionFilter::BookingsForRequester(user_id),
            Self::ReviewsForMe => SubscriptionFilter::ReviewsFor(user_id),
            Self::NotificationsForMe => SubscriptionFilter::NotificationsFor(user_id),
            Self::ChatMessagesForMe => SubscriptionFilter::ChatMessagesFor(user_id),
        }
    }
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, display_name: String },

    /// A live query was opened
    Subscribed { query: LiveQuery },

    /// A live query was closed
    Unsubscribed { query: LiveQuery },

    /// A document matching one of the client's live queries changed
    Change { query: LiveQuery, event: ChangeEvent },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    Subscribe { query: LiveQuery },
    Unsubscribe { query: LiveQuery },
}
