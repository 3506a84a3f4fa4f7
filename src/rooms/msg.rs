use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{rejection::{JsonRejection, PathRejection}, Path, State},
    Json,
};
use uuid::Uuid;

use crate::{gateway::{Gateway, SendRequest}, model::Message, AppResult};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn send_msg(
    State(gateway): State<Arc<Gateway>>,
    room_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<SendRequest>, JsonRejection>,
) -> AppResult<Json<Message>> {
    let Path(room_id) = room_id?;
    let Json(request) = body?;

    Ok(Json(gateway.send(room_id, request).await?))
}
