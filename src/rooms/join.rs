use std::sync::Arc;

use axum::{debug_handler, extract::{rejection::JsonRejection, State}, Json};

use crate::{gateway::{Gateway, JoinRequest, JoinResponse}, AppResult};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn join(
    State(gateway): State<Arc<Gateway>>,
    body: Result<Json<JoinRequest>, JsonRejection>,
) -> AppResult<Json<JoinResponse>> {
    let Json(request) = body?;
    Ok(Json(gateway.join(request).await?))
}
