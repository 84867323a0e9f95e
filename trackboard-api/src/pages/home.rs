use crate::pages::{Identity, PageModel, ViewAggregator};
use serde::Serialize;
use trackboard_common::model::{event::PostKind, track::FullTrack, user::User};
use trackboard_db::repository::{TrackFilter, TrackOrder, TrackQuery};

pub const HOME_TRACKS: u32 = 50;
pub const HOME_USERS: u32 = 10;

#[derive(Clone, PartialEq, Debug, Default, Serialize)]
pub struct HomePage {
    pub last_tracks: Vec<FullTrack>,
    pub last_users: Vec<User>,
}

impl ViewAggregator {
    pub async fn home_page(&self, identity: &Identity) -> PageModel<HomePage> {
        let mut context = self.begin(identity);
        let tracks_query = TrackQuery {
            filter: TrackFilter::public(),
            order: TrackOrder::SortDateDesc,
            limit: HOME_TRACKS,
        };

        let (event, last_tracks, last_users) = tokio::join!(
            self.recorder
                .record_event(PostKind::ViewHome, identity.user_id, None, None),
            self.repository.fetch_tracks(&tracks_query),
            self.repository.fetch_recent_users(HOME_USERS),
        );

        context.errors.check("Cannot write activity", event);
        let page = HomePage {
            last_tracks: context
                .errors
                .or_default("Cannot fetch last tracks", last_tracks),
            last_users: context
                .errors
                .or_default("Cannot fetch last users", last_users),
        };

        context.finish(page)
    }
}
