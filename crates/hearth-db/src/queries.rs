use std::collections::HashMap;

use crate::Database;
use crate::models::{
    BookingRequestRow, ChatMessageRow, ChatRow, ListingRow, NotificationRow, PaymentProofRow,
    ReviewRow, UserRow,
};
use anyhow::{Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use hearth_types::models::{BookingRequest, Chat, ChatMessage, Listing, Notification, Review};
use rusqlite::{Connection, Row};

const BOOKING_COLUMNS: &str = "id, requester_id, recipient_id, listing_id, message, status, proofs_approved_at, created_at";
const LISTING_COLUMNS: &str =
    "id, owner_id, title, description, location, monthly_rent, created_at";
const REVIEW_COLUMNS: &str = "id, target_user_id, author_id, rating, comment, created_at";
const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, heading, message, booking_id, created_at";
const CHAT_COLUMNS: &str = "id, user_low, user_high, created_at";
const CHAT_MESSAGE_SELECT: &str = "SELECT m.id, m.chat_id, m.author_id, u.display_name,
        CASE WHEN m.author_id = c.user_low THEN c.user_high ELSE c.user_low END,
        m.body, m.created_at
     FROM chat_messages m
     JOIN chats c ON c.id = m.chat_id
     JOIN users u ON u.id = m.author_id";

/// Party column used when listing a user's booking requests.
#[derive(Debug, Clone, Copy)]
pub enum BookingParty {
    Requester,
    Recipient,
}

impl BookingParty {
    fn column(&self) -> &'static str {
        match self {
            Self::Requester => "requester_id",
            Self::Recipient => "recipient_id",
        }
    }
}

impl Database {
    // -- Users --

    /// Returns false, writing nothing, when the username is already taken.
    /// The check and the insert are one statement.
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        display_name: &str,
        password_hash: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "INSERT INTO users (id, username, display_name, password) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(username) DO NOTHING",
                (id, username, display_name, password_hash),
            )?;
            Ok(n > 0)
        })
    }

    pub fn update_display_name(&self, id: &str, display_name: &str) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE users SET display_name = ?2 WHERE id = ?1",
                (id, display_name),
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_user(conn, "id", id)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn user_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM users WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            Ok(found.is_some())
        })
    }

    // -- Listings --

    pub fn insert_listing(
        &self,
        id: &str,
        owner_id: &str,
        title: &str,
        description: &str,
        location: &str,
        monthly_rent: i64,
    ) -> Result<Listing> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO listings (id, owner_id, title, description, location, monthly_rent)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, owner_id, title, description, location, monthly_rent],
            )?;
            query_listing(conn, id)?.ok_or_else(|| anyhow!("listing {} vanished after insert", id))
        })
    }

    pub fn get_listing(&self, id: &str) -> Result<Option<Listing>> {
        self.with_conn(|conn| query_listing(conn, id))
    }

    /// Newest first.
    pub fn list_listings(&self, limit: u32) -> Result<Vec<Listing>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM listings ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                LISTING_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([limit], listing_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(ListingRow::into_model).collect()
        })
    }

    pub fn list_listings_for_owner(&self, owner_id: &str) -> Result<Vec<Listing>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM listings WHERE owner_id = ?1 ORDER BY rowid",
                LISTING_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([owner_id], listing_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(ListingRow::into_model).collect()
        })
    }

    /// Overwrites the editable fields. `None` when the listing is gone.
    pub fn update_listing(
        &self,
        id: &str,
        title: &str,
        description: &str,
        location: &str,
        monthly_rent: i64,
    ) -> Result<Option<Listing>> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE listings SET title = ?2, description = ?3, location = ?4, monthly_rent = ?5
                 WHERE id = ?1",
                rusqlite::params![id, title, description, location, monthly_rent],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_listing(conn, id)
        })
    }

    /// Returns false if there was nothing to delete.
    pub fn delete_listing(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM listings WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    // -- Favorites --

    /// Idempotent. Returns false if the listing was already a favorite.
    pub fn add_favorite(&self, user_id: &str, listing_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "INSERT INTO favorites (user_id, listing_id) VALUES (?1, ?2)
                 ON CONFLICT(user_id, listing_id) DO NOTHING",
                (user_id, listing_id),
            )?;
            Ok(n > 0)
        })
    }

    pub fn remove_favorite(&self, user_id: &str, listing_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM favorites WHERE user_id = ?1 AND listing_id = ?2",
                (user_id, listing_id),
            )?;
            Ok(n > 0)
        })
    }

    /// Most recently added first. Deleted listings drop out with their rows.
    pub fn list_favorite_listings(&self, user_id: &str) -> Result<Vec<Listing>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM listings
                 JOIN favorites ON favorites.listing_id = listings.id
                 WHERE favorites.user_id = ?1
                 ORDER BY favorites.added_at DESC, favorites.rowid DESC",
                LISTING_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], listing_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(ListingRow::into_model).collect()
        })
    }

    // -- Booking requests --

    pub fn insert_booking_request(
        &self,
        id: &str,
        requester_id: &str,
        recipient_id: &str,
        listing_id: Option<&str>,
        message: &str,
    ) -> Result<BookingRequest> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO booking_requests (id, requester_id, recipient_id, listing_id, message)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, requester_id, recipient_id, listing_id, message],
            )?;
            query_booking(conn, id)?
                .ok_or_else(|| anyhow!("booking request {} vanished after insert", id))
        })
    }

    pub fn get_booking_request(&self, id: &str) -> Result<Option<BookingRequest>> {
        self.with_conn(|conn| query_booking(conn, id))
    }

    /// Insertion order.
    pub fn list_booking_requests(
        &self,
        party: BookingParty,
        user_id: &str,
    ) -> Result<Vec<BookingRequest>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM booking_requests WHERE {} = ?1 ORDER BY rowid",
                BOOKING_COLUMNS,
                party.column()
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], booking_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut proofs = query_proofs(conn, party.column(), user_id)?;

            rows.into_iter()
                .map(|row| {
                    let own = proofs.remove(&row.id).unwrap_or_default();
                    row.into_model(own)
                })
                .collect()
        })
    }

    /// Compare-and-set `pending -> accepted`. Returns `None` when the request
    /// is gone or no longer pending.
    pub fn accept_booking_request(&self, id: &str) -> Result<Option<BookingRequest>> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE booking_requests SET status = 'accepted'
                 WHERE id = ?1 AND status = 'pending'",
                [id],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_booking(conn, id)
        })
    }

    /// Deletes a request that is still pending and returns its final state.
    /// Returns `None` when the request is gone or no longer pending.
    pub fn delete_pending_booking_request(&self, id: &str) -> Result<Option<BookingRequest>> {
        self.with_conn_mut(|conn| {
            let Some(last) = query_booking(conn, id)? else {
                return Ok(None);
            };
            let n = conn.execute(
                "DELETE FROM booking_requests WHERE id = ?1 AND status = 'pending'",
                [id],
            )?;
            Ok((n > 0).then_some(last))
        })
    }

    // -- Payment proofs --

    /// Atomically appends `urls` to the request's proofs, all or nothing.
    /// Only succeeds while the request is accepted and its proofs are not yet
    /// approved. Returns the updated request, or `None` if the guard failed.
    pub fn append_payment_proofs(
        &self,
        booking_id: &str,
        urls: &[String],
    ) -> Result<Option<BookingRequest>> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            for url in urls {
                let n = tx.execute(
                    "INSERT INTO payment_proofs (booking_id, url)
                     SELECT ?1, ?2 WHERE EXISTS (
                         SELECT 1 FROM booking_requests
                         WHERE id = ?1 AND status = 'accepted' AND proofs_approved_at IS NULL
                     )",
                    (booking_id, url),
                )?;
                if n == 0 {
                    // Dropping the transaction rolls back earlier inserts.
                    return Ok(None);
                }
            }
            let updated = query_booking(&tx, booking_id)?;
            tx.commit()?;
            Ok(updated)
        })
    }

    /// Marks every current proof as legit and stamps the request approved, in
    /// one transaction. Returns `None` if the request is not accepted, is already
    /// approved, or has no proofs.
    pub fn approve_payment_proofs(&self, booking_id: &str) -> Result<Option<BookingRequest>> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let n = tx.execute(
                "UPDATE booking_requests
                 SET proofs_approved_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'accepted' AND proofs_approved_at IS NULL
                   AND EXISTS (SELECT 1 FROM payment_proofs WHERE booking_id = ?1)",
                [booking_id],
            )?;
            if n == 0 {
                return Ok(None);
            }
            tx.execute(
                "UPDATE payment_proofs SET legit = 1 WHERE booking_id = ?1",
                [booking_id],
            )?;
            let updated = query_booking(&tx, booking_id)?;
            tx.commit()?;
            Ok(updated)
        })
    }

    // -- Reviews --

    pub fn insert_review(
        &self,
        id: &str,
        target_user_id: &str,
        author_id: &str,
        rating: u8,
        comment: &str,
    ) -> Result<Review> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO reviews (id, target_user_id, author_id, rating, comment)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, target_user_id, author_id, rating, comment],
            )?;
            let sql = format!("SELECT {} FROM reviews WHERE id = ?1", REVIEW_COLUMNS);
            let row = conn.query_row(&sql, [id], review_row)?;
            row.into_model()
        })
    }

    /// Oldest first.
    pub fn list_reviews_for_user(&self, target_user_id: &str) -> Result<Vec<Review>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM reviews WHERE target_user_id = ?1 ORDER BY rowid",
                REVIEW_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([target_user_id], review_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(ReviewRow::into_model).collect()
        })
    }

    // -- Notifications --

    pub fn insert_notification(
        &self,
        id: &str,
        user_id: &str,
        kind: &str,
        heading: &str,
        message: &str,
        booking_id: Option<&str>,
    ) -> Result<Notification> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, kind, heading, message, booking_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, user_id, kind, heading, message, booking_id],
            )?;
            let sql = format!("SELECT {} FROM notifications WHERE id = ?1", NOTIFICATION_COLUMNS);
            let row = conn.query_row(&sql, [id], notification_row)?;
            row.into_model()
        })
    }

    /// Newest first.
    pub fn list_notifications_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM notifications WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                NOTIFICATION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit], notification_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(NotificationRow::into_model).collect()
        })
    }

    // -- Chats --

    /// Get-or-create the chat between two users. The boolean is true when
    /// this call created it.
    pub fn open_chat(&self, id: &str, user_a: &str, user_b: &str) -> Result<(Chat, bool)> {
        let (low, high) = if user_a < user_b { (user_a, user_b) } else { (user_b, user_a) };
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "INSERT INTO chats (id, user_low, user_high) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_low, user_high) DO NOTHING",
                (id, low, high),
            )?;
            let sql = format!(
                "SELECT {} FROM chats WHERE user_low = ?1 AND user_high = ?2",
                CHAT_COLUMNS
            );
            let chat = conn.query_row(&sql, (low, high), chat_row)?.into_model()?;
            Ok((chat, n > 0))
        })
    }

    pub fn get_chat(&self, id: &str) -> Result<Option<Chat>> {
        self.with_conn(|conn| query_chat(conn, id))
    }

    /// Most recent activity first.
    pub fn list_chats_for_user(&self, user_id: &str) -> Result<Vec<Chat>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM chats c
                 WHERE c.user_low = ?1 OR c.user_high = ?1
                 ORDER BY COALESCE(
                     (SELECT MAX(created_at) FROM chat_messages WHERE chat_id = c.id),
                     c.created_at
                 ) DESC, c.rowid DESC",
                CHAT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], chat_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(ChatRow::into_model).collect()
        })
    }

    pub fn insert_chat_message(
        &self,
        id: &str,
        chat_id: &str,
        author_id: &str,
        body: &str,
    ) -> Result<ChatMessage> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (id, chat_id, author_id, body) VALUES (?1, ?2, ?3, ?4)",
                (id, chat_id, author_id, body),
            )?;
            let sql = format!("{} WHERE m.id = ?1", CHAT_MESSAGE_SELECT);
            conn.query_row(&sql, [id], chat_message_row)?.into_model()
        })
    }

    /// Newest first. `before` pages backwards from a previous page's oldest
    /// `created_at`.
    pub fn list_chat_messages(
        &self,
        chat_id: &str,
        limit: u32,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChatMessage>> {
        let before = before.as_ref().map(timestamp_text);
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE m.chat_id = ?1 AND (?2 IS NULL OR m.created_at < ?2)
                 ORDER BY m.created_at DESC, m.rowid DESC LIMIT ?3",
                CHAT_MESSAGE_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![chat_id, before, limit], chat_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(ChatMessageRow::into_model).collect()
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, display_name, password, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                display_name: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_listing(conn: &Connection, id: &str) -> Result<Option<Listing>> {
    let sql = format!("SELECT {} FROM listings WHERE id = ?1", LISTING_COLUMNS);
    conn.query_row(&sql, [id], listing_row)
        .optional()?
        .map(ListingRow::into_model)
        .transpose()
}

fn query_booking(conn: &Connection, id: &str) -> Result<Option<BookingRequest>> {
    let sql = format!("SELECT {} FROM booking_requests WHERE id = ?1", BOOKING_COLUMNS);
    let Some(row) = conn.query_row(&sql, [id], booking_row).optional()? else {
        return Ok(None);
    };
    let mut proofs = query_proofs(conn, "id", &row.id)?;
    let own = proofs.remove(&row.id).unwrap_or_default();
    row.into_model(own).map(Some)
}

/// Proofs of every booking whose `column` equals `value`, grouped by booking
/// in `seq` order. Binds one parameter however many bookings match.
fn query_proofs(
    conn: &Connection,
    column: &str,
    value: &str,
) -> Result<HashMap<String, Vec<PaymentProofRow>>> {
    let sql = format!(
        "SELECT p.booking_id, p.url, p.legit FROM payment_proofs p
         JOIN booking_requests b ON b.id = p.booking_id
         WHERE b.{} = ?1 ORDER BY p.seq",
        column
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([value], |row| {
            Ok(PaymentProofRow {
                booking_id: row.get(0)?,
                url: row.get(1)?,
                legit: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut grouped: HashMap<String, Vec<PaymentProofRow>> = HashMap::new();
    for proof in rows {
        grouped.entry(proof.booking_id.clone()).or_default().push(proof);
    }
    Ok(grouped)
}

fn query_chat(conn: &Connection, id: &str) -> Result<Option<Chat>> {
    let sql = format!("SELECT {} FROM chats WHERE id = ?1", CHAT_COLUMNS);
    conn.query_row(&sql, [id], chat_row)
        .optional()?
        .map(ChatRow::into_model)
        .transpose()
}

/// Same format the schema's `strftime` defaults write, so text comparison
/// orders correctly.
fn timestamp_text(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn listing_row(row: &Row<'_>) -> rusqlite::Result<ListingRow> {
    Ok(ListingRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        location: row.get(4)?,
        monthly_rent: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn booking_row(row: &Row<'_>) -> rusqlite::Result<BookingRequestRow> {
    Ok(BookingRequestRow {
        id: row.get(0)?,
        requester_id: row.get(1)?,
        recipient_id: row.get(2)?,
        listing_id: row.get(3)?,
        message: row.get(4)?,
        status: row.get(5)?,
        proofs_approved_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn review_row(row: &Row<'_>) -> rusqlite::Result<ReviewRow> {
    Ok(ReviewRow {
        id: row.get(0)?,
        target_user_id: row.get(1)?,
        author_id: row.get(2)?,
        rating: row.get(3)?,
        comment: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn notification_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        heading: row.get(3)?,
        message: row.get(4)?,
        booking_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn chat_row(row: &Row<'_>) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        id: row.get(0)?,
        user_low: row.get(1)?,
        user_high: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn chat_message_row(row: &Row<'_>) -> rusqlite::Result<ChatMessageRow> {
    Ok(ChatMessageRow {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        author_id: row.get(2)?,
        author_display_name: row.get(3)?,
        recipient_id: row.get(4)?,
        body: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_types::models::BookingStatus;
    use uuid::Uuid;

    fn user(db: &Database, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(&id, name, name, "not-a-real-hash").unwrap();
        id
    }

    fn accepted_booking(db: &Database) -> (String, String, String) {
        let tenant = user(db, "tenant");
        let owner = user(db, "owner");
        let id = Uuid::new_v4().to_string();
        db.insert_booking_request(&id, &tenant, &owner, None, "hello").unwrap();
        db.accept_booking_request(&id).unwrap().unwrap();
        (id, tenant, owner)
    }

    #[test]
    fn insert_assigns_pending_and_timestamp() {
        let db = Database::open_in_memory().unwrap();
        let tenant = user(&db, "tenant");
        let owner = user(&db, "owner");
        let id = Uuid::new_v4().to_string();

        let booking = db
            .insert_booking_request(&id, &tenant, &owner, None, "Two months from June")
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.payment_proofs.is_empty());
        assert!(booking.legit_proofs.is_none());
        assert_eq!(booking.message, "Two months from June");
    }

    #[test]
    fn accept_is_compare_and_set() {
        let db = Database::open_in_memory().unwrap();
        let (id, _, _) = accepted_booking(&db);
        assert!(db.accept_booking_request(&id).unwrap().is_none());
        assert!(db.delete_pending_booking_request(&id).unwrap().is_none());
        assert!(db.get_booking_request(&id).unwrap().is_some());
    }

    #[test]
    fn delete_pending_removes_from_both_sides() {
        let db = Database::open_in_memory().unwrap();
        let tenant = user(&db, "tenant");
        let owner = user(&db, "owner");
        let id = Uuid::new_v4().to_string();
        db.insert_booking_request(&id, &tenant, &owner, None, "hi").unwrap();

        let last = db.delete_pending_booking_request(&id).unwrap().unwrap();
        assert_eq!(last.id.to_string(), id);
        assert!(db.get_booking_request(&id).unwrap().is_none());
        assert!(db.list_booking_requests(BookingParty::Recipient, &owner).unwrap().is_empty());
        assert!(db.list_booking_requests(BookingParty::Requester, &tenant).unwrap().is_empty());
    }

    #[test]
    fn proofs_keep_submission_order_and_batch_by_booking() {
        let db = Database::open_in_memory().unwrap();
        let (id, tenant, _) = accepted_booking(&db);

        db.append_payment_proofs(&id, &["https://a/1.jpg".into(), "https://a/2.jpg".into()])
            .unwrap()
            .unwrap();
        let updated = db
            .append_payment_proofs(&id, &["https://a/3.jpg".into()])
            .unwrap()
            .unwrap();
        assert_eq!(
            updated.payment_proofs,
            vec!["https://a/1.jpg", "https://a/2.jpg", "https://a/3.jpg"]
        );

        let listed = db.list_booking_requests(BookingParty::Requester, &tenant).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].payment_proofs.len(), 3);
    }

    #[test]
    fn append_is_refused_while_pending() {
        let db = Database::open_in_memory().unwrap();
        let tenant = user(&db, "tenant");
        let owner = user(&db, "owner");
        let id = Uuid::new_v4().to_string();
        db.insert_booking_request(&id, &tenant, &owner, None, "hi").unwrap();

        assert!(db.append_payment_proofs(&id, &["https://a/1.jpg".into()]).unwrap().is_none());
        let booking = db.get_booking_request(&id).unwrap().unwrap();
        assert!(booking.payment_proofs.is_empty());
    }

    #[test]
    fn approval_freezes_proofs() {
        let db = Database::open_in_memory().unwrap();
        let (id, _, _) = accepted_booking(&db);

        assert!(db.approve_payment_proofs(&id).unwrap().is_none(), "no proofs yet");

        db.append_payment_proofs(&id, &["https://a/1.jpg".into()]).unwrap().unwrap();
        let approved = db.approve_payment_proofs(&id).unwrap().unwrap();
        assert_eq!(approved.legit_proofs, Some(vec!["https://a/1.jpg".to_string()]));

        assert!(db.approve_payment_proofs(&id).unwrap().is_none());
        assert!(db.append_payment_proofs(&id, &["https://a/2.jpg".into()]).unwrap().is_none());
    }

    #[test]
    fn rating_out_of_range_is_rejected_by_schema() {
        let db = Database::open_in_memory().unwrap();
        let author = user(&db, "author");
        let target = user(&db, "target");
        let id = Uuid::new_v4().to_string();

        assert!(db.insert_review(&id, &target, &author, 0, "").is_err());
        assert!(db.list_reviews_for_user(&target).unwrap().is_empty());

        let review = db.insert_review(&id, &target, &author, 5, "").unwrap();
        assert_eq!(review.rating, 5);
        assert_eq!(db.list_reviews_for_user(&target).unwrap().len(), 1);
    }

    #[test]
    fn recipient_listing_survives_more_bookings_than_bind_slots() {
        // SQLite's default limit on bound parameters is 32,766.
        const BOOKINGS: usize = 33_000;

        let db = Database::open_in_memory().unwrap();
        let tenant = user(&db, "tenant");
        let owner = user(&db, "owner");
        let first = Uuid::new_v4().to_string();
        db.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO booking_requests (id, requester_id, recipient_id, message, status)
                     VALUES (?1, ?2, ?3, '', 'accepted')",
                )?;
                stmt.execute((&first, &tenant, &owner))?;
                for _ in 1..BOOKINGS {
                    stmt.execute((Uuid::new_v4().to_string(), &tenant, &owner))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .unwrap();
        db.append_payment_proofs(&first, &["https://a/1.jpg".into()]).unwrap().unwrap();

        let incoming = db.list_booking_requests(BookingParty::Recipient, &owner).unwrap();
        assert_eq!(incoming.len(), BOOKINGS);
        assert_eq!(incoming[0].id.to_string(), first);
        assert_eq!(incoming[0].payment_proofs, vec!["https://a/1.jpg"]);
        assert!(incoming[1..].iter().all(|b| b.payment_proofs.is_empty()));

        let outgoing = db.list_booking_requests(BookingParty::Requester, &tenant).unwrap();
        assert_eq!(outgoing.len(), BOOKINGS);
    }

    #[test]
    fn taken_usernames_are_refused_without_a_write() {
        let db = Database::open_in_memory().unwrap();
        let first = Uuid::new_v4().to_string();
        assert!(db.create_user(&first, "mara", "Mara", "h1").unwrap());
        assert!(!db.create_user(&Uuid::new_v4().to_string(), "mara", "Impostor", "h2").unwrap());

        let stored = db.get_user_by_username("mara").unwrap().unwrap();
        assert_eq!(stored.id, first);
        assert_eq!(stored.display_name, "Mara");
    }

    #[test]
    fn display_name_updates_in_place() {
        let db = Database::open_in_memory().unwrap();
        let id = user(&db, "teodor");
        let updated = db.update_display_name(&id, "Teo").unwrap().unwrap();
        assert_eq!(updated.display_name, "Teo");
        assert_eq!(updated.username, "teodor");
        assert!(db.update_display_name(&Uuid::new_v4().to_string(), "x").unwrap().is_none());
    }

    #[test]
    fn listing_update_overwrites_editable_fields() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner");
        let id = Uuid::new_v4().to_string();
        let original = db.insert_listing(&id, &owner, "Loft", "", "Riga", 700_00).unwrap();

        let edited = db
            .update_listing(&id, "Sunny loft", "Top floor", "Riga", 650_00)
            .unwrap()
            .unwrap();
        assert_eq!(edited.title, "Sunny loft");
        assert_eq!(edited.description, "Top floor");
        assert_eq!(edited.monthly_rent, 650_00);
        assert_eq!(edited.created_at, original.created_at);

        let missing = Uuid::new_v4().to_string();
        assert!(db.update_listing(&missing, "t", "", "", 1).unwrap().is_none());
    }

    #[test]
    fn favorites_are_idempotent_and_follow_deletes() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner");
        let fan = user(&db, "fan");
        let a = Uuid::new_v4().to_string();
        let b = Uuid::new_v4().to_string();
        db.insert_listing(&a, &owner, "A", "", "", 1).unwrap();
        db.insert_listing(&b, &owner, "B", "", "", 1).unwrap();

        assert!(db.add_favorite(&fan, &a).unwrap());
        assert!(!db.add_favorite(&fan, &a).unwrap());
        assert!(db.add_favorite(&fan, &b).unwrap());
        let titles: Vec<_> = db
            .list_favorite_listings(&fan)
            .unwrap()
            .into_iter()
            .map(|l| l.title)
            .collect();
        assert_eq!(titles, vec!["B", "A"]);

        assert!(db.remove_favorite(&fan, &b).unwrap());
        assert!(!db.remove_favorite(&fan, &b).unwrap());
        db.delete_listing(&a).unwrap();
        assert!(db.list_favorite_listings(&fan).unwrap().is_empty());
    }

    #[test]
    fn one_chat_per_pair_whichever_side_opens_it() {
        let db = Database::open_in_memory().unwrap();
        let tenant = user(&db, "tenant");
        let owner = user(&db, "owner");

        let (chat, created) = db.open_chat(&Uuid::new_v4().to_string(), &tenant, &owner).unwrap();
        assert!(created);
        let (again, created) = db.open_chat(&Uuid::new_v4().to_string(), &owner, &tenant).unwrap();
        assert!(!created);
        assert_eq!(again.id, chat.id);
        assert_eq!(db.list_chats_for_user(&owner).unwrap().len(), 1);
    }

    #[test]
    fn chat_messages_page_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let tenant = user(&db, "tenant");
        let owner = user(&db, "owner");
        let (chat, _) = db.open_chat(&Uuid::new_v4().to_string(), &tenant, &owner).unwrap();
        let chat_id = chat.id.to_string();

        let sent = db
            .insert_chat_message(&Uuid::new_v4().to_string(), &chat_id, &tenant, "hello")
            .unwrap();
        assert_eq!(sent.author_display_name, "tenant");
        assert_eq!(sent.recipient_id.to_string(), owner);

        db.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE chat_messages SET created_at = '2000-01-01T10:00:00.000Z' WHERE id = ?1",
                [sent.id.to_string()],
            )?;
            Ok(())
        })
        .unwrap();
        db.insert_chat_message(&Uuid::new_v4().to_string(), &chat_id, &owner, "hi, still free")
            .unwrap();

        let page = db.list_chat_messages(&chat_id, 50, None).unwrap();
        let bodies: Vec<_> = page.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["hi, still free", "hello"]);

        let older = db.list_chat_messages(&chat_id, 50, Some(page[0].created_at)).unwrap();
        assert_eq!(older.len(), 1);
        assert_eq!(older[0].body, "hello");
        assert_eq!(db.list_chat_messages(&chat_id, 1, None).unwrap().len(), 1);
    }
}
