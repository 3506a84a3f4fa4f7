mod join;
mod membership;
mod msg;
mod status;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/join", post(join::join))
        .route("/{room_id}/status", get(status::status))
        .route("/{room_id}/messages", post(msg::send_msg))
        .route("/{room_id}/leave", post(membership::leave))
        .route("/{room_id}/close", post(membership::close))
}
