use crate::{
    pages::{HomePage, Identity, OpenPage, PageModel, ViewAggregator},
    rss::{RSS_TRACKS, render_feed},
    server::{Result, ServerError, ServerRouter, extract::Json},
};
use axum::extract::State;
use axum_extra::{
    TypedHeader,
    routing::{RouterExt, TypedPath},
};
use headers::ContentType;
use serde::Deserialize;
use std::sync::Arc;
use trackboard_db::repository::{Repository, TrackFilter, TrackOrder, TrackQuery};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(home)
        .typed_get(rss)
        .typed_get(open)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/", rejection(ServerError))]
struct HomePath();

async fn home(
    HomePath(): HomePath,
    State(pages): State<ViewAggregator>,
    identity: Identity,
) -> Json<PageModel<HomePage>> {
    Json(pages.home_page(&identity).await)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/rss", rejection(ServerError))]
struct RssPath();

/// Same tracks as the home page; not tracked as a view.
async fn rss(
    RssPath(): RssPath,
    State(pages): State<ViewAggregator>,
    State(repository): State<Arc<dyn Repository>>,
) -> Result<(TypedHeader<ContentType>, String)> {
    let tracks = repository
        .fetch_tracks(&TrackQuery {
            filter: TrackFilter::public(),
            order: TrackOrder::SortDateDesc,
            limit: RSS_TRACKS,
        })
        .await?;
    let feed = render_feed(pages.settings(), &tracks)?;

    Ok((TypedHeader(ContentType::xml()), feed))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/open", rejection(ServerError))]
struct OpenPath();

async fn open(
    OpenPath(): OpenPath,
    State(pages): State<ViewAggregator>,
    identity: Identity,
) -> Json<PageModel<OpenPage>> {
    Json(pages.open_page(&identity).await)
}
