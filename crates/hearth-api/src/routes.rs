use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post, put},
};

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{bookings, chats, favorites, files, listings, notifications, payments, reviews, users};

/// Every REST route. The WebSocket gateway is mounted next to this by the
/// server.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/artifacts/{name}", get(files::download_artifact));

    let protected = Router::new()
        .route("/profile", patch(users::update_profile))
        .route("/users/{user_id}", get(users::get_user))
        .route("/users/{user_id}/listings", get(listings::list_user_listings))
        .route("/users/{user_id}/reviews", get(reviews::list_user_reviews))
        .route("/listings", post(listings::create_listing).get(listings::list_listings))
        .route(
            "/listings/{listing_id}",
            get(listings::get_listing)
                .patch(listings::update_listing)
                .delete(listings::delete_listing),
        )
        .route("/favorites", get(favorites::list_favorites))
        .route(
            "/favorites/{listing_id}",
            put(favorites::add_favorite).delete(favorites::remove_favorite),
        )
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/incoming", get(bookings::list_incoming))
        .route("/bookings/outgoing", get(bookings::list_outgoing))
        .route("/bookings/{booking_id}", get(bookings::get_booking))
        .route("/bookings/{booking_id}/respond", post(bookings::respond))
        .route(
            "/bookings/{booking_id}/proofs",
            get(payments::list_proofs).post(payments::submit_proofs),
        )
        .route("/bookings/{booking_id}/proofs/approve", post(payments::approve_proofs))
        .route(
            "/artifacts",
            post(files::upload_artifact).layer(DefaultBodyLimit::max(state.max_artifact_bytes)),
        )
        .route("/reviews", post(reviews::create_review))
        .route("/notifications", get(notifications::list_notifications))
        .route("/chats", post(chats::open_chat).get(chats::list_chats))
        .route(
            "/chats/{chat_id}/messages",
            get(chats::list_messages).post(chats::send_message),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    public.merge(protected).with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
