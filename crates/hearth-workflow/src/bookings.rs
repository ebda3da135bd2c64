use tracing::info;
use uuid::Uuid;

use hearth_db::queries::BookingParty;
use hearth_gateway::Subscription;
use hearth_types::events::{ChangeEvent, SubscriptionFilter};
use hearth_types::models::{BookingRequest, BookingStatus, Decision, NotificationKind, Session};

use crate::Workflows;
use crate::error::{WorkflowError, WorkflowResult};
use crate::retry::retry_once;

pub const MAX_MESSAGE_LEN: usize = 2000;

#[derive(Debug, Clone)]
pub struct NewBookingRequest {
    pub requester_id: Uuid,
    pub recipient_id: Uuid,
    pub listing_id: Option<Uuid>,
    pub message: String,
}

/// Which side of a booking request the caller is looking from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingRole {
    Requester,
    Recipient,
}

impl BookingRole {
    fn party(self) -> BookingParty {
        match self {
            Self::Requester => BookingParty::Requester,
            Self::Recipient => BookingParty::Recipient,
        }
    }

    fn filter(self, user_id: Uuid) -> SubscriptionFilter {
        match self {
            Self::Requester => SubscriptionFilter::BookingsForRequester(user_id),
            Self::Recipient => SubscriptionFilter::BookingsForRecipient(user_id),
        }
    }
}

impl Workflows {
    /// Send a booking request. There is no duplicate check: a tenant may have
    /// any number of pending requests to the same owner.
    pub fn create_booking_request(
        &self,
        session: &Session,
        req: NewBookingRequest,
    ) -> WorkflowResult<BookingRequest> {
        if req.requester_id != session.user_id {
            return Err(WorkflowError::forbidden(
                "booking requests can only be sent on your own behalf",
            ));
        }
        if req.requester_id == req.recipient_id {
            return Err(WorkflowError::validation("cannot send a booking request to yourself"));
        }
        if req.message.chars().count() > MAX_MESSAGE_LEN {
            return Err(WorkflowError::validation(format!(
                "message is longer than {} characters",
                MAX_MESSAGE_LEN
            )));
        }

        self.require_user(req.recipient_id)?;
        if let Some(listing_id) = req.listing_id {
            let listing = self.get_listing(listing_id)?;
            if listing.owner_id != req.recipient_id {
                return Err(WorkflowError::validation(
                    "listing does not belong to the recipient",
                ));
            }
        }

        let id = Uuid::new_v4().to_string();
        let requester = req.requester_id.to_string();
        let recipient = req.recipient_id.to_string();
        let listing = req.listing_id.map(|l| l.to_string());
        let booking = retry_once("insert booking request", || {
            self.db.insert_booking_request(
                &id,
                &requester,
                &recipient,
                listing.as_deref(),
                &req.message,
            )
        })?;

        info!(
            "Booking request {} created: {} -> {}",
            booking.id, booking.requester_id, booking.recipient_id
        );
        self.dispatcher.publish(ChangeEvent::BookingRequestAdded(booking.clone()));
        self.notify(
            booking.recipient_id,
            NotificationKind::BookingRequest,
            format!("{} sent you a booking request", session.display_name),
            Some(booking.id),
        );

        Ok(booking)
    }

    pub fn list_booking_requests(
        &self,
        session: &Session,
        role: BookingRole,
    ) -> WorkflowResult<Vec<BookingRequest>> {
        let uid = session.user_id.to_string();
        retry_once("list booking requests", || {
            self.db.list_booking_requests(role.party(), &uid)
        })
    }

    /// Requests the caller has received.
    pub fn list_for_recipient(&self, session: &Session) -> WorkflowResult<Vec<BookingRequest>> {
        self.list_booking_requests(session, BookingRole::Recipient)
    }

    /// Requests the caller has sent.
    pub fn list_for_requester(&self, session: &Session) -> WorkflowResult<Vec<BookingRequest>> {
        self.list_booking_requests(session, BookingRole::Requester)
    }

    /// Live query: the current requests for `role` plus a subscription to
    /// every later change. The subscription is opened before the snapshot is
    /// read, so a change can show up in both but never in neither.
    pub fn watch_booking_requests(
        &self,
        session: &Session,
        role: BookingRole,
    ) -> WorkflowResult<(Vec<BookingRequest>, Subscription)> {
        let sub = self.dispatcher.subscribe(role.filter(session.user_id));
        let snapshot = self.list_booking_requests(session, role)?;
        Ok((snapshot, sub))
    }

    /// Either party may read a request.
    pub fn get_booking_request(&self, session: &Session, id: Uuid) -> WorkflowResult<BookingRequest> {
        let booking = self.load_booking(id)?;
        if !booking.involves(session.user_id) {
            return Err(WorkflowError::forbidden("not a party to this booking request"));
        }
        Ok(booking)
    }

    /// Accept or reject a pending request. Only the recipient may answer.
    ///
    /// Accepting updates the status. Rejecting deletes the request; the
    /// returned value is its final state with `status = rejected`.
    pub fn respond_to_booking_request(
        &self,
        session: &Session,
        id: Uuid,
        decision: Decision,
    ) -> WorkflowResult<BookingRequest> {
        let booking = self.load_booking(id)?;
        if booking.recipient_id != session.user_id {
            return Err(WorkflowError::forbidden(
                "only the recipient can respond to a booking request",
            ));
        }
        if booking.status != BookingStatus::Pending {
            return Err(WorkflowError::invalid_state(format!(
                "booking request is already {}",
                booking.status
            )));
        }

        let bid = id.to_string();
        match decision {
            Decision::Accept => {
                let accepted = retry_once("accept booking request", || {
                    self.db.accept_booking_request(&bid)
                })?
                .ok_or_else(|| WorkflowError::invalid_state("booking request is no longer pending"))?;

                info!("Booking request {} accepted", id);
                self.dispatcher.publish(ChangeEvent::BookingRequestModified(accepted.clone()));
                self.notify(
                    accepted.requester_id,
                    NotificationKind::BookingAccepted,
                    format!("{} accepted your booking request", session.display_name),
                    Some(accepted.id),
                );
                Ok(accepted)
            }
            Decision::Reject => {
                let mut removed = retry_once("delete booking request", || {
                    self.db.delete_pending_booking_request(&bid)
                })?
                .ok_or_else(|| WorkflowError::invalid_state("booking request is no longer pending"))?;
                removed.status = BookingStatus::Rejected;

                info!("Booking request {} rejected and removed", id);
                self.dispatcher.publish(ChangeEvent::BookingRequestRemoved(removed.clone()));
                self.notify(
                    removed.requester_id,
                    NotificationKind::BookingRejected,
                    format!("{} declined your booking request", session.display_name),
                    None,
                );
                Ok(removed)
            }
        }
    }

    pub(crate) fn load_booking(&self, id: Uuid) -> WorkflowResult<BookingRequest> {
        let bid = id.to_string();
        retry_once("load booking request", || self.db.get_booking_request(&bid))?
            .ok_or_else(|| WorkflowError::NotFound(format!("booking request {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hearth_db::Database;
    use hearth_gateway::Dispatcher;

    use super::*;

    fn setup() -> (Workflows, Session, Session) {
        let db = Database::open_in_memory().unwrap();
        let tenant = Session::new(Uuid::new_v4(), "Amira");
        let owner = Session::new(Uuid::new_v4(), "Jonas");
        for s in [&tenant, &owner] {
            db.create_user(&s.user_id.to_string(), &s.display_name, &s.display_name, "x")
                .unwrap();
        }
        (Workflows::new(Arc::new(db), Dispatcher::new()), tenant, owner)
    }

    fn request(from: &Session, to: &Session) -> NewBookingRequest {
        NewBookingRequest {
            requester_id: from.user_id,
            recipient_id: to.user_id,
            listing_id: None,
            message: "Looking for six months from September".into(),
        }
    }

    #[test]
    fn create_requires_sending_as_yourself() {
        let (wf, tenant, owner) = setup();
        let forged = request(&owner, &tenant);
        let err = wf.create_booking_request(&tenant, forged).unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));
        assert!(wf.list_for_recipient(&tenant).unwrap().is_empty());
    }

    #[test]
    fn create_rejects_unknown_recipient_and_self() {
        let (wf, tenant, _) = setup();
        let ghost = Session::new(Uuid::new_v4(), "ghost");
        let err = wf.create_booking_request(&tenant, request(&tenant, &ghost)).unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));

        let err = wf.create_booking_request(&tenant, request(&tenant, &tenant)).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn duplicate_requests_are_allowed() {
        let (wf, tenant, owner) = setup();
        let a = wf.create_booking_request(&tenant, request(&tenant, &owner)).unwrap();
        let b = wf.create_booking_request(&tenant, request(&tenant, &owner)).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(wf.list_for_recipient(&owner).unwrap().len(), 2);
        assert_eq!(wf.list_for_requester(&tenant).unwrap().len(), 2);
    }

    #[test]
    fn only_recipient_can_respond_and_only_once() {
        let (wf, tenant, owner) = setup();
        let booking = wf.create_booking_request(&tenant, request(&tenant, &owner)).unwrap();

        let err = wf
            .respond_to_booking_request(&tenant, booking.id, Decision::Accept)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));

        wf.respond_to_booking_request(&owner, booking.id, Decision::Accept).unwrap();
        let err = wf
            .respond_to_booking_request(&owner, booking.id, Decision::Reject)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidState(_)));
        assert_eq!(
            wf.get_booking_request(&tenant, booking.id).unwrap().status,
            BookingStatus::Accepted
        );
    }

    #[test]
    fn outsiders_cannot_read_a_request() {
        let (wf, tenant, owner) = setup();
        let booking = wf.create_booking_request(&tenant, request(&tenant, &owner)).unwrap();
        let stranger = Session::new(Uuid::new_v4(), "Lee");
        let err = wf.get_booking_request(&stranger, booking.id).unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));
    }

    #[test]
    fn listing_must_belong_to_recipient() {
        let (wf, tenant, owner) = setup();
        let listing = wf
            .create_listing(
                &tenant,
                crate::NewListing {
                    title: "Room in shared flat".into(),
                    description: String::new(),
                    location: "Leipzig".into(),
                    monthly_rent: 45_000,
                },
            )
            .unwrap();

        let mut req = request(&tenant, &owner);
        req.listing_id = Some(listing.id);
        let err = wf.create_booking_request(&tenant, req).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn creating_notifies_the_recipient() {
        let (wf, tenant, owner) = setup();
        let booking = wf.create_booking_request(&tenant, request(&tenant, &owner)).unwrap();

        let inbox = wf.list_notifications(&owner, 50).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::BookingRequest);
        assert_eq!(inbox[0].booking_id, Some(booking.id));
        assert!(wf.list_notifications(&tenant, 50).unwrap().is_empty());
    }
}
