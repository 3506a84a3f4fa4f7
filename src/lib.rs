pub mod appresult;
pub mod clock;
pub mod config;
pub mod gateway;
pub mod matcher;
pub mod model;
pub mod password;
pub mod rooms;
pub mod storage;
pub mod sweeper;
pub mod uploads;

use std::sync::Arc;

use axum::{extract::FromRef, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult};

use crate::{
    config::Config, gateway::Gateway, password::CredentialHasher, storage::Storage, uploads::UploadSettings,
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub uploads: Arc<UploadSettings>,
}

impl AppState {
    pub fn new(config: &Config, storage: Arc<dyn Storage>, hasher: CredentialHasher) -> Self {
        Self {
            gateway: Arc::new(Gateway::new(storage, hasher, config)),
            uploads: Arc::new(UploadSettings::from(config)),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let uploads = uploads::router(&state.uploads);

    Router::new()
        .nest("/api/rooms", rooms::router())
        .merge(uploads)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
