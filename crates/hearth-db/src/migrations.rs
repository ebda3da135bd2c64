use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                display_name    TEXT NOT NULL,
                password        TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE listings (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL REFERENCES users(id),
                title           TEXT NOT NULL,
                description     TEXT NOT NULL,
                location        TEXT NOT NULL,
                monthly_rent    INTEGER NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_listings_owner ON listings(owner_id);

            -- Rejected requests are deleted, so only two statuses are ever stored.
            CREATE TABLE booking_requests (
                id                  TEXT PRIMARY KEY,
                requester_id        TEXT NOT NULL REFERENCES users(id),
                recipient_id        TEXT NOT NULL REFERENCES users(id),
                listing_id          TEXT REFERENCES listings(id) ON DELETE SET NULL,
                message             TEXT NOT NULL,
                status              TEXT NOT NULL DEFAULT 'pending'
                                    CHECK (status IN ('pending', 'accepted')),
                proofs_approved_at  TEXT,
                created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_booking_requests_recipient ON booking_requests(recipient_id);
            CREATE INDEX idx_booking_requests_requester ON booking_requests(requester_id);

            -- Append-only. seq gives submission order.
            CREATE TABLE payment_proofs (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                booking_id  TEXT NOT NULL REFERENCES booking_requests(id) ON DELETE CASCADE,
                url         TEXT NOT NULL,
                legit       INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_payment_proofs_booking ON payment_proofs(booking_id, seq);

            CREATE TABLE reviews (
                id              TEXT PRIMARY KEY,
                target_user_id  TEXT NOT NULL REFERENCES users(id),
                author_id       TEXT NOT NULL REFERENCES users(id),
                rating          INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                comment         TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_reviews_target ON reviews(target_user_id);

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                kind        TEXT NOT NULL,
                heading     TEXT NOT NULL,
                message     TEXT NOT NULL,
                booking_id  TEXT,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (favorites, chats)");
        conn.execute_batch(
            "
            CREATE TABLE favorites (
                user_id     TEXT NOT NULL REFERENCES users(id),
                listing_id  TEXT NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
                added_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (user_id, listing_id)
            );

            -- One chat per pair. The pair is stored sorted.
            CREATE TABLE chats (
                id          TEXT PRIMARY KEY,
                user_low    TEXT NOT NULL REFERENCES users(id),
                user_high   TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE (user_low, user_high),
                CHECK (user_low < user_high)
            );

            CREATE INDEX idx_chats_high ON chats(user_high);

            CREATE TABLE chat_messages (
                id          TEXT PRIMARY KEY,
                chat_id     TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
                author_id   TEXT NOT NULL REFERENCES users(id),
                body        TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_chat_messages_chat ON chat_messages(chat_id, created_at);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rerunning_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: Vec<i64> = conn
            .prepare("SELECT version FROM schema_version ORDER BY version")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(versions, vec![1, 2]);
    }
}
