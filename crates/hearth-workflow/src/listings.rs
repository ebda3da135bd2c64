use tracing::info;
use uuid::Uuid;

use hearth_types::models::{Listing, Session};

use crate::Workflows;
use crate::error::{WorkflowError, WorkflowResult};
use crate::retry::retry_once;

pub const MAX_TITLE_LEN: usize = 120;
pub const DEFAULT_PAGE: u32 = 50;
pub const MAX_PAGE: u32 = 200;

#[derive(Debug, Clone)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub location: String,
    /// Minor currency units per month.
    pub monthly_rent: i64,
}

/// Owner edit of a listing. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ListingUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub monthly_rent: Option<i64>,
}

fn validate_title(title: &str) -> WorkflowResult<&str> {
    let title = title.trim();
    if title.is_empty() {
        return Err(WorkflowError::validation("title is required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(WorkflowError::validation(format!(
            "title is longer than {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title)
}

fn validate_rent(monthly_rent: i64) -> WorkflowResult<i64> {
    if monthly_rent <= 0 {
        return Err(WorkflowError::validation("monthly rent must be positive"));
    }
    Ok(monthly_rent)
}

impl Workflows {
    pub fn create_listing(&self, session: &Session, listing: NewListing) -> WorkflowResult<Listing> {
        let title = validate_title(&listing.title)?;
        validate_rent(listing.monthly_rent)?;

        let id = Uuid::new_v4().to_string();
        let owner = session.user_id.to_string();
        let saved = retry_once("insert listing", || {
            self.db.insert_listing(
                &id,
                &owner,
                title,
                &listing.description,
                listing.location.trim(),
                listing.monthly_rent,
            )
        })?;

        info!("Listing {} created by {}", saved.id, saved.owner_id);
        Ok(saved)
    }

    pub fn get_listing(&self, id: Uuid) -> WorkflowResult<Listing> {
        let lid = id.to_string();
        retry_once("load listing", || self.db.get_listing(&lid))?
            .ok_or_else(|| WorkflowError::NotFound(format!("listing {}", id)))
    }

    /// Newest first. `limit` is clamped to `1..=MAX_PAGE`.
    pub fn list_listings(&self, limit: Option<u32>) -> WorkflowResult<Vec<Listing>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
        retry_once("list listings", || self.db.list_listings(limit))
    }

    pub fn list_listings_for_owner(&self, owner_id: Uuid) -> WorkflowResult<Vec<Listing>> {
        let owner = owner_id.to_string();
        retry_once("list owner listings", || self.db.list_listings_for_owner(&owner))
    }

    /// Owner only. Validates the merged result the same way `create_listing`
    /// validates a new one.
    pub fn update_listing(
        &self,
        session: &Session,
        id: Uuid,
        update: ListingUpdate,
    ) -> WorkflowResult<Listing> {
        let current = self.get_listing(id)?;
        if current.owner_id != session.user_id {
            return Err(WorkflowError::forbidden("only the owner can edit a listing"));
        }

        let title = validate_title(update.title.as_deref().unwrap_or(&current.title))?;
        let monthly_rent = validate_rent(update.monthly_rent.unwrap_or(current.monthly_rent))?;
        let description = update.description.unwrap_or(current.description);
        let location = update.location.unwrap_or(current.location);

        let lid = id.to_string();
        let saved = retry_once("update listing", || {
            self.db
                .update_listing(&lid, title, &description, location.trim(), monthly_rent)
        })?
        .ok_or_else(|| WorkflowError::NotFound(format!("listing {}", id)))?;

        info!("Listing {} edited by {}", id, session.user_id);
        Ok(saved)
    }

    /// Booking requests that pointed at the listing keep existing with no
    /// listing attached.
    pub fn delete_listing(&self, session: &Session, id: Uuid) -> WorkflowResult<()> {
        let listing = self.get_listing(id)?;
        if listing.owner_id != session.user_id {
            return Err(WorkflowError::forbidden("only the owner can delete a listing"));
        }
        let lid = id.to_string();
        if !retry_once("delete listing", || self.db.delete_listing(&lid))? {
            return Err(WorkflowError::NotFound(format!("listing {}", id)));
        }
        info!("Listing {} deleted", id);
        Ok(())
    }

    // -- Favorites --

    /// Idempotent.
    pub fn add_favorite(&self, session: &Session, listing_id: Uuid) -> WorkflowResult<()> {
        self.get_listing(listing_id)?;
        let (uid, lid) = (session.user_id.to_string(), listing_id.to_string());
        if retry_once("add favorite", || self.db.add_favorite(&uid, &lid))? {
            info!("User {} saved listing {}", session.user_id, listing_id);
        }
        Ok(())
    }

    /// Idempotent: removing a listing that is not a favorite is not an error.
    pub fn remove_favorite(&self, session: &Session, listing_id: Uuid) -> WorkflowResult<()> {
        let (uid, lid) = (session.user_id.to_string(), listing_id.to_string());
        retry_once("remove favorite", || self.db.remove_favorite(&uid, &lid))?;
        Ok(())
    }

    /// The caller's saved listings, most recently saved first.
    pub fn list_favorites(&self, session: &Session) -> WorkflowResult<Vec<Listing>> {
        let uid = session.user_id.to_string();
        retry_once("list favorites", || self.db.list_favorite_listings(&uid))
    }
}
