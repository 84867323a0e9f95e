use crate::pages::{Identity, PageError, PageModel, ViewAggregator};
use serde::Serialize;
use std::collections::BTreeMap;
use time::UtcDateTime;
use tracing::debug;
use trackboard_common::model::{
    Id,
    event::PostKind,
    track::FullTrack,
    user::{User, UserMarker, UserNames},
};
use trackboard_db::{
    DbError,
    repository::{TrackFilter, TrackOrder, TrackQuery},
};

pub const PROFILE_TRACKS: u32 = 50;

#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct ProfilePage {
    pub user: User,
    pub tracks: i64,
    pub last_tracks: Vec<FullTrack>,
    /// Unix timestamp of each UTC day start mapped to the tracks dated that day.
    pub calendar_heatmap: BTreeMap<i64, i64>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct SettingsPage {
    pub names: UserNames,
}

fn calendar_heatmap(dates: &[UtcDateTime]) -> BTreeMap<i64, i64> {
    let mut heatmap = BTreeMap::new();
    for date in dates {
        let day = date.date().midnight().as_utc().unix_timestamp();
        *heatmap.entry(day).or_default() += 1;
    }
    heatmap
}

impl ViewAggregator {
    /// Fails with [`PageError::UserNotFound`] for an unknown slug, before anything is recorded.
    pub async fn profile_page(
        &self,
        identity: &Identity,
        slug: &str,
    ) -> Result<PageModel<ProfilePage>, PageError> {
        let mut context = self.begin(identity);
        let user = self
            .repository
            .fetch_user_by_slug(slug)
            .await?
            .ok_or_else(|| PageError::UserNotFound(slug.to_owned()))?;
        let filter = TrackFilter::public().by_author(user.id);

        let (event, tracks) = tokio::join!(
            self.recorder
                .record_event(PostKind::ViewProfile, identity.user_id, Some(user.id), None),
            self.repository.count_tracks(&filter),
        );
        context.errors.check("Cannot write activity", event);
        let tracks = context.errors.or_default("Cannot fetch last tracks", tracks);

        let mut last_tracks = Vec::new();
        let mut heatmap = BTreeMap::new();
        if tracks > 0 {
            let listed_query = TrackQuery {
                filter,
                order: TrackOrder::SortDateDesc,
                limit: PROFILE_TRACKS,
            };
            let (listed, dates) = tokio::join!(
                self.repository.fetch_tracks(&listed_query),
                self.repository.fetch_track_sort_dates(&filter),
            );
            last_tracks = context.errors.or_default("Cannot fetch last tracks", listed);
            if let Some(dates) = context.errors.check("Cannot fetch post timestamps", dates) {
                heatmap = calendar_heatmap(&dates);
            }
        }

        Ok(context.finish(ProfilePage {
            user,
            tracks,
            last_tracks,
            calendar_heatmap: heatmap,
        }))
    }
}

impl ViewAggregator {
    #[must_use]
    pub fn settings_page(&self, identity: &Identity) -> PageModel<SettingsPage> {
        let names = identity
            .user
            .as_ref()
            .map(|user| UserNames {
                firstname: user.firstname.clone(),
                lastname: user.lastname.clone(),
            })
            .unwrap_or_default();

        self.plain_page(identity, SettingsPage { names })
    }

    /// Users may only change their own names.
    pub async fn update_settings(
        &self,
        user_id: Id<UserMarker>,
        names: &UserNames,
    ) -> Result<(), DbError> {
        let names = UserNames {
            firstname: names.firstname.trim().to_owned(),
            lastname: names.lastname.trim().to_owned(),
        };
        self.repository.update_user_names(user_id, &names).await?;
        debug!(%user_id, ?names, "Updated settings");
        Ok(())
    }
}
