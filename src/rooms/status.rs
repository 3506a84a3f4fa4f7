use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{rejection::{PathRejection, QueryRejection}, Path, Query, State},
    Json,
};
use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{gateway::{Gateway, StatusResponse}, AppResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusQuery {
    user_id: Option<Uuid>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    since: Option<OffsetDateTime>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn status(
    State(gateway): State<Arc<Gateway>>,
    room_id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> AppResult<Json<StatusResponse>> {
    let Path(room_id) = room_id?;
    let Query(StatusQuery { user_id, since }) = query?;

    Ok(Json(gateway.poll_status(room_id, user_id, since).await?))
}
