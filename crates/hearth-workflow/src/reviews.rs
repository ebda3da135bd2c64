use tracing::info;
use uuid::Uuid;

use hearth_gateway::Subscription;
use hearth_types::events::{ChangeEvent, SubscriptionFilter};
use hearth_types::models::{NotificationKind, Review, ReviewSummary, Session};

use crate::Workflows;
use crate::error::{WorkflowError, WorkflowResult};
use crate::retry::retry_once;

pub const MAX_COMMENT_LEN: usize = 4000;

#[derive(Debug, Clone)]
pub struct NewReview {
    pub target_user_id: Uuid,
    /// `None` and `0` both mean the reviewer never picked a rating.
    pub rating: Option<u8>,
    pub comment: String,
}

fn validate_rating(rating: Option<u8>) -> WorkflowResult<u8> {
    match rating {
        None | Some(0) => Err(WorkflowError::validation("rating is required")),
        Some(r) if r > 5 => Err(WorkflowError::validation(format!(
            "rating must be between 1 and 5, got {}",
            r
        ))),
        Some(r) => Ok(r),
    }
}

impl Workflows {
    /// Write a review of another user. Reviews are never edited.
    pub fn submit_review(&self, session: &Session, review: NewReview) -> WorkflowResult<Review> {
        let rating = validate_rating(review.rating)?;
        if review.target_user_id == session.user_id {
            return Err(WorkflowError::validation("cannot review yourself"));
        }
        if review.comment.chars().count() > MAX_COMMENT_LEN {
            return Err(WorkflowError::validation(format!(
                "comment is longer than {} characters",
                MAX_COMMENT_LEN
            )));
        }
        self.require_user(review.target_user_id)?;

        let id = Uuid::new_v4().to_string();
        let target = review.target_user_id.to_string();
        let author = session.user_id.to_string();
        let saved = retry_once("insert review", || {
            self.db.insert_review(&id, &target, &author, rating, &review.comment)
        })?;

        info!(
            "Review {} ({} stars) written by {} for {}",
            saved.id, saved.rating, saved.author_id, saved.target_user_id
        );
        self.dispatcher.publish(ChangeEvent::ReviewAdded(saved.clone()));
        self.notify(
            saved.target_user_id,
            NotificationKind::Review,
            format!("{} left you a {}-star review", session.display_name, saved.rating),
            None,
        );

        Ok(saved)
    }

    /// Reviews of `target_user_id`, oldest first.
    pub fn list_reviews_for_user(&self, target_user_id: Uuid) -> WorkflowResult<Vec<Review>> {
        let target = target_user_id.to_string();
        retry_once("list reviews", || self.db.list_reviews_for_user(&target))
    }

    pub fn review_summary(&self, target_user_id: Uuid) -> WorkflowResult<ReviewSummary> {
        let reviews = self.list_reviews_for_user(target_user_id)?;
        Ok(ReviewSummary::from_reviews(&reviews))
    }

    /// Reviews of the caller plus a live subscription to new ones.
    pub fn watch_reviews(&self, session: &Session) -> WorkflowResult<(Vec<Review>, Subscription)> {
        let sub = self
            .dispatcher
            .subscribe(SubscriptionFilter::ReviewsFor(session.user_id));
        let snapshot = self.list_reviews_for_user(session.user_id)?;
        Ok((snapshot, sub))
    }
}
