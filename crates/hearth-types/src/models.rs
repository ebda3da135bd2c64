use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated caller. Every workflow call takes one explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub display_name: String,
}

impl Session {
    pub fn new(user_id: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
        }
    }
}

/// Public user profile. The password hash never leaves hearth-db.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    /// Minor currency units per month.
    pub monthly_rent: i64,
    pub created_at: DateTime<Utc>,
}

/// `Rejected` is only ever observed on the wire: a rejected request is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown booking status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub recipient_id: Uuid,
    pub listing_id: Option<Uuid>,
    pub message: String,
    pub status: BookingStatus,
    /// Artifact URLs in submission order.
    pub payment_proofs: Vec<String>,
    /// Set once, when the recipient approves every proof.
    pub legit_proofs: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl BookingRequest {
    pub fn proofs_approved(&self) -> bool {
        self.legit_proofs.is_some()
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.requester_id == user_id || self.recipient_id == user_id
    }
}

/// The recipient's answer to a pending booking request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub target_user_id: Uuid,
    pub author_id: Uuid,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub count: usize,
    pub average: Option<f64>,
}

impl ReviewSummary {
    pub fn from_reviews(reviews: &[Review]) -> Self {
        if reviews.is_empty() {
            return Self {
                count: 0,
                average: None,
            };
        }
        let total: u32 = reviews.iter().map(|r| r.rating as u32).sum();
        Self {
            count: reviews.len(),
            average: Some(total as f64 / reviews.len() as f64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingRequest,
    BookingAccepted,
    BookingRejected,
    PaymentProof,
    ProofsApproved,
    Review,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BookingRequest => "booking_request",
            Self::BookingAccepted => "booking_accepted",
            Self::BookingRejected => "booking_rejected",
            Self::PaymentProof => "payment_proof",
            Self::ProofsApproved => "proofs_approved",
            Self::Review => "review",
        }
    }

    pub fn heading(&self) -> &'static str {
        match self {
            Self::BookingRequest => "New Booking Request",
            Self::BookingAccepted => "Booking Accepted",
            Self::BookingRejected => "Booking Declined",
            Self::PaymentProof => "Payment Proof Submitted",
            Self::ProofsApproved => "Payment Confirmed",
            Self::Review => "New Review",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booking_request" => Ok(Self::BookingRequest),
            "booking_accepted" => Ok(Self::BookingAccepted),
            "booking_rejected" => Ok(Self::BookingRejected),
            "payment_proof" => Ok(Self::PaymentProof),
            "proofs_approved" => Ok(Self::ProofsApproved),
            "review" => Ok(Self::Review),
            other => Err(format!("unknown notification kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub heading: String,
    pub message: String,
    pub booking_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A two-person conversation. There is at most one per pair of users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub participants: [Uuid; 2],
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    /// The participant that is not `user_id`.
    pub fn other(&self, user_id: Uuid) -> Uuid {
        if self.participants[0] == user_id {
            self.participants[1]
        } else {
            self.participants[0]
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub author_id: Uuid,
    pub author_display_name: String,
    /// The other participant, so the change feed can route the message.
    pub recipient_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
