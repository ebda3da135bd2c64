//! Database row types. These map directly to SQLite rows and convert into the
//! hearth-types models at the edge of the crate.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hearth_types::models::{
    BookingRequest, BookingStatus, Chat, ChatMessage, Listing, Notification, NotificationKind,
    Review, User,
};
use uuid::Uuid;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub password: String,
    pub created_at: String,
}

impl UserRow {
    pub fn into_model(self) -> Result<User> {
        Ok(User {
            id: parse_uuid(&self.id, "users.id")?,
            username: self.username,
            display_name: self.display_name,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub struct ListingRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub monthly_rent: i64,
    pub created_at: String,
}

impl ListingRow {
    pub fn into_model(self) -> Result<Listing> {
        Ok(Listing {
            id: parse_uuid(&self.id, "listings.id")?,
            owner_id: parse_uuid(&self.owner_id, "listings.owner_id")?,
            title: self.title,
            description: self.description,
            location: self.location,
            monthly_rent: self.monthly_rent,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub struct BookingRequestRow {
    pub id: String,
    pub requester_id: String,
    pub recipient_id: String,
    pub listing_id: Option<String>,
    pub message: String,
    pub status: String,
    pub proofs_approved_at: Option<String>,
    pub created_at: String,
}

pub struct PaymentProofRow {
    pub booking_id: String,
    pub url: String,
    pub legit: bool,
}

impl BookingRequestRow {
    /// `proofs` must be this booking's proof rows in `seq` order.
    pub fn into_model(self, proofs: Vec<PaymentProofRow>) -> Result<BookingRequest> {
        let status: BookingStatus = self
            .status
            .parse()
            .map_err(|e: String| anyhow::anyhow!("booking {}: {}", self.id, e))?;

        let legit_proofs = self.proofs_approved_at.as_ref().map(|_| {
            proofs
                .iter()
                .filter(|p| p.legit)
                .map(|p| p.url.clone())
                .collect::<Vec<_>>()
        });

        Ok(BookingRequest {
            id: parse_uuid(&self.id, "booking_requests.id")?,
            requester_id: parse_uuid(&self.requester_id, "booking_requests.requester_id")?,
            recipient_id: parse_uuid(&self.recipient_id, "booking_requests.recipient_id")?,
            listing_id: self
                .listing_id
                .as_deref()
                .map(|id| parse_uuid(id, "booking_requests.listing_id"))
                .transpose()?,
            message: self.message,
            status,
            payment_proofs: proofs.into_iter().map(|p| p.url).collect(),
            legit_proofs,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub struct ReviewRow {
    pub id: String,
    pub target_user_id: String,
    pub author_id: String,
    pub rating: i64,
    pub comment: String,
    pub created_at: String,
}

impl ReviewRow {
    pub fn into_model(self) -> Result<Review> {
        let rating = u8::try_from(self.rating)
            .with_context(|| format!("review {} has rating {}", self.id, self.rating))?;
        Ok(Review {
            id: parse_uuid(&self.id, "reviews.id")?,
            target_user_id: parse_uuid(&self.target_user_id, "reviews.target_user_id")?,
            author_id: parse_uuid(&self.author_id, "reviews.author_id")?,
            rating,
            comment: self.comment,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub heading: String,
    pub message: String,
    pub booking_id: Option<String>,
    pub created_at: String,
}

impl NotificationRow {
    pub fn into_model(self) -> Result<Notification> {
        let kind: NotificationKind = self
            .kind
            .parse()
            .map_err(|e: String| anyhow::anyhow!("notification {}: {}", self.id, e))?;
        Ok(Notification {
            id: parse_uuid(&self.id, "notifications.id")?,
            user_id: parse_uuid(&self.user_id, "notifications.user_id")?,
            kind,
            heading: self.heading,
            message: self.message,
            booking_id: self
                .booking_id
                .as_deref()
                .map(|id| parse_uuid(id, "notifications.booking_id"))
                .transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub struct ChatRow {
    pub id: String,
    pub user_low: String,
    pub user_high: String,
    pub created_at: String,
}

impl ChatRow {
    pub fn into_model(self) -> Result<Chat> {
        Ok(Chat {
            id: parse_uuid(&self.id, "chats.id")?,
            participants: [
                parse_uuid(&self.user_low, "chats.user_low")?,
                parse_uuid(&self.user_high, "chats.user_high")?,
            ],
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub struct ChatMessageRow {
    pub id: String,
    pub chat_id: String,
    pub author_id: String,
    pub author_display_name: String,
    pub recipient_id: String,
    pub body: String,
    pub created_at: String,
}

impl ChatMessageRow {
    pub fn into_model(self) -> Result<ChatMessage> {
        Ok(ChatMessage {
            id: parse_uuid(&self.id, "chat_messages.id")?,
            chat_id: parse_uuid(&self.chat_id, "chat_messages.chat_id")?,
            author_id: parse_uuid(&self.author_id, "chat_messages.author_id")?,
            author_display_name: self.author_display_name,
            recipient_id: parse_uuid(&self.recipient_id, "chat recipient")?,
            body: self.body,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn parse_uuid(value: &str, column: &str) -> Result<Uuid> {
    value
        .parse()
        .with_context(|| format!("corrupt {} '{}'", column, value))
}

/// Accepts the RFC 3339 timestamps the schema writes, and the bare
/// `YYYY-MM-DD HH:MM:SS` form SQLite's `datetime('now')` produces.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("corrupt timestamp '{}'", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_timestamp_forms() {
        let rfc = parse_timestamp("2026-03-01T09:30:00.250Z").unwrap();
        assert_eq!(rfc.timestamp_subsec_millis(), 250);

        let bare = parse_timestamp("2026-03-01 09:30:00").unwrap();
        assert_eq!(bare.timestamp(), rfc.timestamp());

        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn legit_proofs_only_present_after_approval() {
        let row = |approved: Option<&str>| BookingRequestRow {
            id: Uuid::new_v4().to_string(),
            requester_id: Uuid::new_v4().to_string(),
            recipient_id: Uuid::new_v4().to_string(),
            listing_id: None,
            message: String::new(),
            status: "accepted".into(),
            proofs_approved_at: approved.map(str::to_string),
            created_at: "2026-03-01T09:30:00.000Z".into(),
        };
        let proofs = || {
            vec![PaymentProofRow {
                booking_id: String::new(),
                url: "https://cdn.example/receipt.jpg".into(),
                legit: true,
            }]
        };

        let pending = row(None).into_model(proofs()).unwrap();
        assert_eq!(pending.payment_proofs.len(), 1);
        assert!(pending.legit_proofs.is_none());

        let approved = row(Some("2026-03-02T10:00:00.000Z")).into_model(proofs()).unwrap();
        assert_eq!(approved.legit_proofs, Some(approved.payment_proofs.clone()));
    }
}
