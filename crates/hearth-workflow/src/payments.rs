use tracing::info;
use uuid::Uuid;

use hearth_types::events::ChangeEvent;
use hearth_types::models::{BookingRequest, BookingStatus, NotificationKind, Session};

use crate::Workflows;
use crate::error::{WorkflowError, WorkflowResult};
use crate::retry::retry_once;

pub const MAX_PROOFS_PER_SUBMISSION: usize = 20;
pub const MAX_PROOF_URL_LEN: usize = 2048;

/// Proofs attached to one booking request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofSet {
    pub payment_proofs: Vec<String>,
    /// Set once, when the recipient approves.
    pub legit_proofs: Option<Vec<String>>,
}

impl From<&BookingRequest> for ProofSet {
    fn from(booking: &BookingRequest) -> Self {
        Self {
            payment_proofs: booking.payment_proofs.clone(),
            legit_proofs: booking.legit_proofs.clone(),
        }
    }
}

fn validate_urls(urls: &[String]) -> WorkflowResult<()> {
    if urls.is_empty() {
        return Err(WorkflowError::validation("at least one proof URL is required"));
    }
    if urls.len() > MAX_PROOFS_PER_SUBMISSION {
        return Err(WorkflowError::validation(format!(
            "at most {} proofs per submission",
            MAX_PROOFS_PER_SUBMISSION
        )));
    }
    for url in urls {
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"));
        match rest {
            Some(host_and_path) if !host_and_path.is_empty() => {}
            _ => {
                return Err(WorkflowError::validation(format!(
                    "proof URL must be http(s): {:?}",
                    url
                )));
            }
        }
        if url.len() > MAX_PROOF_URL_LEN || url.chars().any(char::is_whitespace) {
            return Err(WorkflowError::validation(format!("invalid proof URL: {:?}", url)));
        }
    }
    Ok(())
}

impl Workflows {
    /// Attach proof URLs to an accepted request. The append is atomic: a
    /// concurrent submission is never lost, and a failed one adds nothing.
    pub fn submit_payment_proofs(
        &self,
        session: &Session,
        booking_id: Uuid,
        urls: Vec<String>,
    ) -> WorkflowResult<BookingRequest> {
        let booking = self.load_booking(booking_id)?;
        if booking.requester_id != session.user_id {
            return Err(WorkflowError::forbidden("only the requester can submit payment proof"));
        }
        check_open_for_proofs(&booking)?;
        validate_urls(&urls)?;

        let bid = booking_id.to_string();
        let updated = retry_once("append payment proofs", || {
            self.db.append_payment_proofs(&bid, &urls)
        })?
        .ok_or_else(|| {
            WorkflowError::invalid_state("booking request no longer accepts payment proof")
        })?;

        info!(
            "{} payment proof(s) added to booking {} ({} total)",
            urls.len(),
            booking_id,
            updated.payment_proofs.len()
        );
        self.dispatcher.publish(ChangeEvent::BookingRequestModified(updated.clone()));
        self.notify(
            updated.recipient_id,
            NotificationKind::PaymentProof,
            format!("{} submitted payment proof", session.display_name),
            Some(updated.id),
        );

        Ok(updated)
    }

    pub fn list_payment_proofs(&self, session: &Session, booking_id: Uuid) -> WorkflowResult<ProofSet> {
        let booking = self.get_booking_request(session, booking_id)?;
        Ok(ProofSet::from(&booking))
    }

    /// Bulk approval: every proof present at the moment of the write becomes
    /// legit. There is no per-proof approval and no way to undo it.
    pub fn approve_payment_proofs(
        &self,
        session: &Session,
        booking_id: Uuid,
    ) -> WorkflowResult<BookingRequest> {
        let booking = self.load_booking(booking_id)?;
        if booking.recipient_id != session.user_id {
            return Err(WorkflowError::forbidden("only the recipient can approve payment proof"));
        }
        check_open_for_proofs(&booking)?;
        if booking.payment_proofs.is_empty() {
            return Err(WorkflowError::NoProofs);
        }

        let bid = booking_id.to_string();
        let approved = retry_once("approve payment proofs", || {
            self.db.approve_payment_proofs(&bid)
        })?
        .ok_or_else(|| {
            WorkflowError::invalid_state("booking request changed before approval")
        })?;

        info!(
            "Payment proofs approved for booking {} ({} legit)",
            booking_id,
            approved.legit_proofs.as_ref().map_or(0, Vec::len)
        );
        self.dispatcher.publish(ChangeEvent::BookingRequestModified(approved.clone()));
        self.notify(
            approved.requester_id,
            NotificationKind::ProofsApproved,
            format!("{} approved your payment proof", session.display_name),
            Some(approved.id),
        );

        Ok(approved)
    }
}

fn check_open_for_proofs(booking: &BookingRequest) -> WorkflowResult<()> {
    if booking.status != BookingStatus::Accepted {
        return Err(WorkflowError::invalid_state(format!(
            "booking request is {}, not accepted",
            booking.status
        )));
    }
    if booking.proofs_approved() {
        return Err(WorkflowError::invalid_state("payment proofs are already approved"));
    }
    Ok(())
}
