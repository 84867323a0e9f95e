use crate::{
    import::{ImportError, TrackImporter},
    pages::{PageError, ViewAggregator},
};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{FormRejection, PathRejection},
    },
    http::{StatusCode, Uri, header::LOCATION},
    response::{IntoResponse, Response},
};
use extract::Json;
use serde::Serialize;
use std::{sync::Arc, time::Instant};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::error;
use trackboard_common::session::{PermissionCheck, SessionAuthenticator, SessionError};
use trackboard_db::{DbError, repository::Repository};

mod auth;
mod extract;
mod routes;

pub use auth::SESSION_COOKIE;

pub type ServerRouter = Router<ServerState>;

#[derive(Copy, Clone, Debug)]
pub struct StartedAt(pub Instant);

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub repository: Arc<dyn Repository>,
    pub authenticator: Arc<SessionAuthenticator>,
    pub permissions: Arc<dyn PermissionCheck>,
    pub importer: Arc<TrackImporter>,
    pub pages: ViewAggregator,
    pub started_at: StartedAt,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

/// The full application: routes, request tracing and state.
pub fn app(state: ServerState) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

/// `302 Found`, used after a successful form submission.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_owned())]).into_response()
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Form rejected: {0}")]
    FormRejection(#[from] FormRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("RSS feed could not be rendered: {0}")]
    Rss(#[from] time::error::Format),
    #[error("The session token was rejected: {0}")]
    InvalidSession(#[from] SessionError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    Import(ImportError),
    #[error(transparent)]
    Page(#[from] PageError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::Page(PageError::UserNotFound(_) | PageError::PostNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ServerError::FormRejection(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::Rss(_)
            | ServerError::InvalidSession(_)
            | ServerError::Database(_)
            | ServerError::Import(_)
            | ServerError::Page(PageError::Database(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
struct ErrorResponse {
    status: u16,
    error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
            error: self.to_string(),
        };
        (status, Json(error_response)).into_response()
    }
}
