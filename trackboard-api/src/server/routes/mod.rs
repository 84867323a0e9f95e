use crate::server::ServerRouter;
use axum::Router;

mod health;
mod home;
mod posts;
mod users;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(home::routes())
        .merge(posts::routes())
        .merge(users::routes())
        .merge(health::routes())
}
