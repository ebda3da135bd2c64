//! Booking lifecycle for hearth.
//!
//! A tenant sends a booking request, the owner accepts (or rejects, which
//! deletes it), the tenant attaches payment proof, the owner approves the
//! proofs in bulk, and either party can then leave a review. Listings,
//! favorites, profiles and two-person chats round out the marketplace. Every call takes
//! an explicit [`Session`](hearth_types::models::Session) and is synchronous:
//! callers on an async runtime should run them on a blocking thread.

pub mod bookings;
pub mod chats;
pub mod error;
pub mod listings;
pub mod notifications;
pub mod payments;
pub mod reviews;
pub mod users;

mod retry;

use std::sync::Arc;

use hearth_db::Database;
use hearth_gateway::Dispatcher;

pub use bookings::{BookingRole, NewBookingRequest};
pub use error::{WorkflowError, WorkflowResult};
pub use listings::{ListingUpdate, NewListing};
pub use payments::ProofSet;
pub use reviews::NewReview;
pub use users::Credentials;

/// Entry point to every workflow. Cheap to clone.
#[derive(Clone)]
pub struct Workflows {
    db: Arc<Database>,
    dispatcher: Dispatcher,
}

impl Workflows {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher) -> Self {
        Self { db, dispatcher }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
