use crate::{
    import::TrackImporter,
    pages::{EditOutcome, Identity, NewPage, PostEditForm, ViewAggregator},
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
use std::sync::Arc;
use tracing::debug;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(new_post_form)
        .typed_post(submit_new_post)
        .typed_get(get_post)
        .typed_get(sync_post)
        .typed_get(edit_post_form)
        .typed_post(submit_post_edit)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/new", rejection(ServerError))]
struct NewPostPath();

async fn new_post_form(
    NewPostPath(): NewPostPath,
    State(pages): State<ViewAggregator>,
    identity: Identity,
) -> Response {
    if !identity.is_authenticated() {
        return Redirect::temporary("/").into_response();
    }

    Json(pages.plain_page(&identity, NewPage::default())).into_response()
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct NewPostForm {
    #[serde(default)]
    url: String,
    /// `draft` saves the track as a draft.
    #[serde(default)]
    submit: Option<String>,
}

async fn submit_new_post(
    NewPostPath(): NewPostPath,
    State(pages): State<ViewAggregator>,
    State(importer): State<Arc<TrackImporter>>,
    identity: Identity,
    Form(form): Form<NewPostForm>,
) -> Result<Response> {
    let Some(user_id) = identity.user_id else {
        return Ok(Redirect::temporary("/").into_response());
    };

    let save_as_draft = form.submit.as_deref() == Some("draft");
    match importer.import_track(&form.url, user_id, save_as_draft).await {
        Ok(track) => Ok(found(&track.canonical_url())),
        Err(err) if err.is_user_facing() => {
            debug!(%user_id, error = %err, "Rejected track submission");
            let page = NewPage {
                url_value: form.url,
                url_invalid_msg: Some(err.to_string()),
            };
            Ok(Json(pages.plain_page(&identity, page)).into_response())
        }
        Err(err) => Err(ServerError::Import(err)),
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/p/{slug_or_id}", rejection(ServerError))]
struct PostPath {
    slug_or_id: String,
}

async fn get_post(
    PostPath { slug_or_id }: PostPath,
    State(pages): State<ViewAggregator>,
    identity: Identity,
) -> Result<Response> {
    let page = pages.post_page(&identity, &slug_or_id).await?;

    Ok(Json(page).into_response())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/p/{slug_or_id}/sync", rejection(ServerError))]
struct SyncPostPath {
    slug_or_id: String,
}

// TODO: refresh the stored metadata from the provider before redirecting.
async fn sync_post(
    SyncPostPath { slug_or_id }: SyncPostPath,
    State(pages): State<ViewAggregator>,
    identity: Identity,
) -> Result<Response> {
    if !identity.is_authenticated() {
        return Ok(Redirect::temporary("/").into_response());
    }
    let post = pages.manageable_post(&identity, &slug_or_id).await?;

    Ok(found(&post.canonical_url))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/p/{slug_or_id}/edit", rejection(ServerError))]
struct EditPostPath {
    slug_or_id: String,
}

async fn edit_post_form(
    EditPostPath { slug_or_id }: EditPostPath,
    State(pages): State<ViewAggregator>,
    identity: Identity,
) -> Result<Response> {
    if !identity.is_authenticated() {
        return Ok(Redirect::temporary("/").into_response());
    }
    let page = pages.post_edit_page(&identity, &slug_or_id).await?;

    Ok(Json(page).into_response())
}

async fn submit_post_edit(
    EditPostPath { slug_or_id }: EditPostPath,
    State(pages): State<ViewAggregator>,
    identity: Identity,
    Form(form): Form<PostEditForm>,
) -> Result<Response> {
    if !identity.is_authenticated() {
        return Ok(Redirect::temporary("/").into_response());
    }

    match pages.apply_post_edit(&identity, &slug_or_id, form).await? {
        EditOutcome::Saved(canonical_url) => Ok(found(&canonical_url)),
        EditOutcome::Rejected(page) => Ok(Json(page).into_response()),
    }
}
