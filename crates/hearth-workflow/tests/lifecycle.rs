use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hearth_db::Database;
use hearth_gateway::Dispatcher;
use hearth_types::events::ChangeEvent;
use hearth_types::models::{BookingStatus, Decision, NotificationKind, Session};
use hearth_workflow::{BookingRole, NewBookingRequest, NewReview, WorkflowError, Workflows};
use uuid::Uuid;

struct World {
    wf: Workflows,
    tenant: Session,
    owner: Session,
}

fn world() -> World {
    let db = Database::open_in_memory().unwrap();
    let tenant = Session::new(Uuid::new_v4(), "Mara");
    let owner = Session::new(Uuid::new_v4(), "Teodor");
    db.create_user(&tenant.user_id.to_string(), "mara", "Mara", "hash")
        .unwrap();
    db.create_user(&owner.user_id.to_string(), "teodor", "Teodor", "hash")
        .unwrap();
    World {
        wf: Workflows::new(Arc::new(db), Dispatcher::new()),
        tenant,
        owner,
    }
}

fn send_request(w: &World) -> hearth_types::models::BookingRequest {
    w.wf.create_booking_request(
        &w.tenant,
        NewBookingRequest {
            requester_id: w.tenant.user_id,
            recipient_id: w.owner.user_id,
            listing_id: None,
            message: "Is the flat still free in March?".into(),
        },
    )
    .unwrap()
}

fn accepted_request(w: &World) -> Uuid {
    let booking = send_request(w);
    w.wf.respond_to_booking_request(&w.owner, booking.id, Decision::Accept)
        .unwrap();
    booking.id
}

fn proof(name: &str) -> String {
    format!("https://files.hearth.test/artifacts/{}", name)
}

#[test]
fn new_requests_are_pending_with_distinct_ids() {
    let w = world();
    let a = send_request(&w);
    let b = send_request(&w);

    assert_ne!(a.id, b.id);
    for booking in [&a, &b] {
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.payment_proofs.is_empty());
        assert!(booking.legit_proofs.is_none());
    }

    let incoming = w.wf.list_for_recipient(&w.owner).unwrap();
    assert_eq!(incoming.iter().map(|b| b.id).collect::<Vec<_>>(), vec![a.id, b.id]);
}

#[test]
fn accept_persists_and_reject_removes() {
    let w = world();
    let keep = send_request(&w);
    let gone = send_request(&w);

    let accepted = w
        .wf
        .respond_to_booking_request(&w.owner, keep.id, Decision::Accept)
        .unwrap();
    assert_eq!(accepted.status, BookingStatus::Accepted);
    assert_eq!(
        w.wf.get_booking_request(&w.tenant, keep.id).unwrap().status,
        BookingStatus::Accepted
    );

    let rejected = w
        .wf
        .respond_to_booking_request(&w.owner, gone.id, Decision::Reject)
        .unwrap();
    assert_eq!(rejected.status, BookingStatus::Rejected);

    let incoming = w.wf.list_for_recipient(&w.owner).unwrap();
    let outgoing = w.wf.list_for_requester(&w.tenant).unwrap();
    assert!(incoming.iter().all(|b| b.id != gone.id));
    assert!(outgoing.iter().all(|b| b.id != gone.id));
    assert!(matches!(
        w.wf.get_booking_request(&w.tenant, gone.id),
        Err(WorkflowError::NotFound(_))
    ));
}

#[test]
fn pending_requests_take_no_proofs() {
    let w = world();
    let booking = send_request(&w);

    let err = w
        .wf
        .submit_payment_proofs(&w.tenant, booking.id, vec![proof("receipt.jpg")])
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState(_)));

    let proofs = w.wf.list_payment_proofs(&w.owner, booking.id).unwrap();
    assert!(proofs.payment_proofs.is_empty());
}

#[test]
fn only_the_requester_submits_proofs() {
    let w = world();
    let id = accepted_request(&w);
    let err = w
        .wf
        .submit_payment_proofs(&w.owner, id, vec![proof("fake.jpg")])
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
}

#[test]
fn concurrent_proof_submissions_both_survive() {
    let w = world();
    let id = accepted_request(&w);

    let handles: Vec<_> = (0..2)
        .map(|i| {
            let wf = w.wf.clone();
            let tenant = w.tenant.clone();
            thread::spawn(move || {
                wf.submit_payment_proofs(&tenant, id, vec![proof(&format!("transfer-{}.png", i))])
                    .unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let mut proofs = w.wf.list_payment_proofs(&w.tenant, id).unwrap().payment_proofs;
    proofs.sort();
    assert_eq!(proofs, vec![proof("transfer-0.png"), proof("transfer-1.png")]);
}

#[test]
fn approval_copies_every_current_proof() {
    let w = world();
    let id = accepted_request(&w);

    assert!(matches!(
        w.wf.approve_payment_proofs(&w.owner, id),
        Err(WorkflowError::NoProofs)
    ));

    w.wf.submit_payment_proofs(&w.tenant, id, vec![proof("a.jpg"), proof("b.jpg")])
        .unwrap();
    w.wf.submit_payment_proofs(&w.tenant, id, vec![proof("c.pdf")])
        .unwrap();

    let approved = w.wf.approve_payment_proofs(&w.owner, id).unwrap();
    assert_eq!(
        approved.payment_proofs,
        vec![proof("a.jpg"), proof("b.jpg"), proof("c.pdf")]
    );
    assert_eq!(approved.legit_proofs.as_ref(), Some(&approved.payment_proofs));

    // Frozen once approved.
    assert!(matches!(
        w.wf.approve_payment_proofs(&w.owner, id),
        Err(WorkflowError::InvalidState(_))
    ));
    assert!(matches!(
        w.wf.submit_payment_proofs(&w.tenant, id, vec![proof("late.jpg")]),
        Err(WorkflowError::InvalidState(_))
    ));
}

#[test]
fn only_the_recipient_approves() {
    let w = world();
    let id = accepted_request(&w);
    w.wf.submit_payment_proofs(&w.tenant, id, vec![proof("a.jpg")])
        .unwrap();
    assert!(matches!(
        w.wf.approve_payment_proofs(&w.tenant, id),
        Err(WorkflowError::Forbidden(_))
    ));
}

#[test]
fn unrated_reviews_are_rejected_without_a_write() {
    let w = world();
    for rating in [None, Some(0)] {
        let err = w
            .wf
            .submit_review(
                &w.tenant,
                NewReview {
                    target_user_id: w.owner.user_id,
                    rating,
                    comment: "Nice place".into(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(ref m) if m == "rating is required"));
    }
    assert!(w.wf.list_reviews_for_user(w.owner.user_id).unwrap().is_empty());
}

#[test]
fn rated_reviews_are_retrievable_by_target() {
    let w = world();
    for (rating, comment) in [(5, ""), (2, "Heating broke twice")] {
        w.wf.submit_review(
            &w.tenant,
            NewReview {
                target_user_id: w.owner.user_id,
                rating: Some(rating),
                comment: comment.into(),
            },
        )
        .unwrap();
    }

    let reviews = w.wf.list_reviews_for_user(w.owner.user_id).unwrap();
    assert_eq!(reviews.len(), 2);
    assert_eq!(reviews[0].rating, 5);
    assert_eq!(reviews[0].comment, "");
    assert!(reviews.iter().all(|r| r.author_id == w.tenant.user_id));

    let summary = w.wf.review_summary(w.owner.user_id).unwrap();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.average, Some(3.5));
    assert!(w.wf.list_reviews_for_user(w.tenant.user_id).unwrap().is_empty());
}

#[test]
fn self_reviews_are_rejected() {
    let w = world();
    let err = w
        .wf
        .submit_review(
            &w.owner,
            NewReview {
                target_user_id: w.owner.user_id,
                rating: Some(5),
                comment: String::new(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
}

#[test]
fn full_lifecycle_leaves_a_notification_trail() {
    let w = world();
    let id = accepted_request(&w);
    w.wf.submit_payment_proofs(&w.tenant, id, vec![proof("deposit.jpg")])
        .unwrap();
    w.wf.approve_payment_proofs(&w.owner, id).unwrap();
    w.wf.submit_review(
        &w.tenant,
        NewReview {
            target_user_id: w.owner.user_id,
            rating: Some(4),
            comment: "Quick to answer".into(),
        },
    )
    .unwrap();

    let owner_kinds: Vec<_> = w
        .wf
        .list_notifications(&w.owner, 50)
        .unwrap()
        .into_iter()
        .map(|n| n.kind)
        .collect();
    assert_eq!(
        owner_kinds,
        vec![
            NotificationKind::Review,
            NotificationKind::PaymentProof,
            NotificationKind::BookingRequest,
        ]
    );

    let tenant_kinds: Vec<_> = w
        .wf
        .list_notifications(&w.tenant, 50)
        .unwrap()
        .into_iter()
        .map(|n| n.kind)
        .collect();
    assert_eq!(
        tenant_kinds,
        vec![NotificationKind::ProofsApproved, NotificationKind::BookingAccepted]
    );
}

#[tokio::test]
async fn watch_sees_snapshot_then_changes() {
    let w = world();
    let existing = send_request(&w);

    let (snapshot, mut sub) = w
        .wf
        .watch_booking_requests(&w.owner, BookingRole::Recipient)
        .unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, existing.id);

    let fresh = send_request(&w);
    w.wf.respond_to_booking_request(&w.owner, fresh.id, Decision::Reject)
        .unwrap();

    let added = tokio::time::timeout(Duration::from_secs(1), sub.next())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(added, ChangeEvent::BookingRequestAdded(ref b) if b.id == fresh.id));

    match sub.try_next() {
        Some(ChangeEvent::BookingRequestRemoved(b)) => {
            assert_eq!(b.id, fresh.id);
            assert_eq!(b.status, BookingStatus::Rejected);
        }
        other => panic!("expected removal, got {:?}", other),
    }
    assert!(sub.try_next().is_none());
    sub.unsubscribe();
}

#[tokio::test]
async fn watch_is_scoped_to_the_role() {
    let w = world();
    let (_, mut as_requester) = w
        .wf
        .watch_booking_requests(&w.owner, BookingRole::Requester)
        .unwrap();
    let (_, mut reviews) = w.wf.watch_reviews(&w.owner).unwrap();

    send_request(&w);
    assert!(as_requester.try_next().is_none());

    w.wf.submit_review(
        &w.tenant,
        NewReview {
            target_user_id: w.owner.user_id,
            rating: Some(3),
            comment: String::new(),
        },
    )
    .unwrap();
    assert!(matches!(reviews.try_next(), Some(ChangeEvent::ReviewAdded(_))));
}
