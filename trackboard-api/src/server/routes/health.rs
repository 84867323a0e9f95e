use crate::server::{ServerError, ServerRouter, StartedAt, extract::Json};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(ping).typed_get(status)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/ping", rejection(ServerError))]
struct PingPath();

async fn ping(PingPath(): PingPath) -> StatusCode {
    StatusCode::OK
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/status", rejection(ServerError))]
struct StatusPath();

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct Status {
    uptime_seconds: u64,
}

async fn status(StatusPath(): StatusPath, State(started_at): State<StartedAt>) -> Json<Status> {
    Json(Status {
        uptime_seconds: started_at.0.elapsed().as_secs(),
    })
}
