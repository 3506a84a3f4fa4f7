use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{rejection::{JsonRejection, PathRejection}, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{gateway::Gateway, AppResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserBody {
    user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub(crate) struct Ack {
    message: &'static str,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn leave(
    State(gateway): State<Arc<Gateway>>,
    room_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UserBody>, JsonRejection>,
) -> AppResult<Json<Ack>> {
    let ack = Json(Ack { message: "left the room" });

    // nobody can be a member of a room whose id does not parse
    let Ok(Path(room_id)) = room_id else {
        return Ok(ack);
    };
    let Json(UserBody { user_id }) = body?;

    gateway.leave(room_id, user_id).await;
    Ok(ack)
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn close(
    State(gateway): State<Arc<Gateway>>,
    room_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UserBody>, JsonRejection>,
) -> AppResult<Json<Ack>> {
    let Path(room_id) = room_id?;
    let Json(UserBody { user_id }) = body?;

    gateway.close(room_id, user_id).await?;
    Ok(Json(Ack { message: "room closed" }))
}
