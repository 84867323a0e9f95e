use crate::{
    pages::{Identity, ViewAggregator},
    server::{
        Result, ServerError, ServerRouter,
        extract::{Form, Json},
        found,
    },
};
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use trackboard_common::model::user::UserNames;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_profile)
        .typed_get(settings_form)
        .typed_post(submit_settings)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/u/{slug}", rejection(ServerError))]
struct ProfilePath {
    slug: String,
}

async fn get_profile(
    ProfilePath { slug }: ProfilePath,
    State(pages): State<ViewAggregator>,
    identity: Identity,
) -> Result<Response> {
    let page = pages.profile_page(&identity, &slug).await?;

    Ok(Json(page).into_response())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/settings", rejection(ServerError))]
struct SettingsPath();

async fn settings_form(
    SettingsPath(): SettingsPath,
    State(pages): State<ViewAggregator>,
    identity: Identity,
) -> Response {
    if !identity.is_authenticated() {
        return Redirect::temporary("/").into_response();
    }

    Json(pages.settings_page(&identity)).into_response()
}

async fn submit_settings(
    SettingsPath(): SettingsPath,
    State(pages): State<ViewAggregator>,
    identity: Identity,
    Form(names): Form<UserNames>,
) -> Result<Response> {
    let Some(user_id) = identity.user_id else {
        return Ok(Redirect::temporary("/").into_response());
    };
    pages.update_settings(user_id, &names).await?;

    Ok(found("/settings"))
}
