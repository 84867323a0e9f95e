use crate::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use time::UtcDateTime;
use trackboard_common::model::{
    Id,
    event::{ActivityEvent, CreateEvent, FullActivityEvent, PostKind},
    track::{CreateTrack, FullTrack, Track, TrackEdit, TrackMarker, Visibility},
    user::{CreateUser, User, UserMarker, UserNames},
};

/// Which tracks a query covers. `None` fields do not filter.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct TrackFilter {
    pub author_id: Option<Id<UserMarker>>,
    pub visibility: Option<Visibility>,
}

impl TrackFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn public() -> Self {
        Self {
            visibility: Some(Visibility::Public),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn drafts() -> Self {
        Self {
            visibility: Some(Visibility::Draft),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn by_author(self, author_id: Id<UserMarker>) -> Self {
        Self {
            author_id: Some(author_id),
            ..self
        }
    }

    #[must_use]
    pub fn matches(&self, track: &Track) -> bool {
        self.author_id.is_none_or(|author_id| track.author_id == author_id)
            && self.visibility.is_none_or(|visibility| track.visibility == visibility)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub enum TrackOrder {
    /// Ranking order: provider creation time when known, import time otherwise.
    #[default]
    SortDateDesc,
    CreatedAtDesc,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct TrackQuery {
    pub filter: TrackFilter,
    pub order: TrackOrder,
    pub limit: u32,
}

/// Which events show up in the public activity feed.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct ActivityFilter {
    pub excluded_kinds: Vec<PostKind>,
    pub exclude_anonymous: bool,
    pub excluded_actor: Option<Id<UserMarker>>,
}

impl ActivityFilter {
    /// Drops page views, account-linking noise, anonymous visitors and
    /// everything done by the system account.
    #[must_use]
    pub fn public_feed(system_account: Option<Id<UserMarker>>) -> Self {
        let mut excluded_kinds = PostKind::VIEWS.to_vec();
        excluded_kinds.push(PostKind::LinkDiscordAccount);

        Self {
            excluded_kinds,
            exclude_anonymous: true,
            excluded_actor: system_account,
        }
    }

    #[must_use]
    pub fn matches(&self, event: &ActivityEvent) -> bool {
        if self.excluded_kinds.contains(&event.kind) {
            return false;
        }
        match event.actor_id {
            None => !self.exclude_anonymous,
            Some(actor) => self.excluded_actor != Some(actor),
        }
    }
}

/// Number of tracks whose sort date falls on a weekday (0 = Sunday).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct WeekdayCount {
    pub weekday: i64,
    pub count: i64,
}

/// Persistence capability the site logic is written against.
#[async_trait]
pub trait Repository: Debug + Send + Sync {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_user_by_slug(&self, slug: &str) -> Result<Option<User>>;

    async fn create_user(&self, user: &CreateUser) -> Result<User>;

    async fn update_user_names(&self, user_id: Id<UserMarker>, names: &UserNames) -> Result<()>;

    async fn fetch_recent_users(&self, limit: u32) -> Result<Vec<User>>;

    async fn count_users(&self) -> Result<i64>;

    async fn create_track(&self, track: &CreateTrack) -> Result<Track>;

    async fn fetch_track(&self, track_id: Id<TrackMarker>) -> Result<Option<FullTrack>>;

    async fn fetch_track_by_slug(&self, slug: &str) -> Result<Option<FullTrack>>;

    async fn update_track(&self, track_id: Id<TrackMarker>, edit: &TrackEdit) -> Result<()>;

    async fn fetch_tracks(&self, query: &TrackQuery) -> Result<Vec<FullTrack>>;

    async fn count_tracks(&self, filter: &TrackFilter) -> Result<i64>;

    /// Sum of track durations in milliseconds.
    async fn sum_track_duration(&self, filter: &TrackFilter) -> Result<i64>;

    async fn count_tracks_by_weekday(&self, filter: &TrackFilter) -> Result<Vec<WeekdayCount>>;

    async fn fetch_track_sort_dates(&self, filter: &TrackFilter) -> Result<Vec<UtcDateTime>>;

    async fn create_event(&self, event: &CreateEvent) -> Result<ActivityEvent>;

    /// Newest events matching `filter`, joined with their actor, target user, and
    /// public target post.
    async fn fetch_events(
        &self,
        filter: &ActivityFilter,
        limit: u32,
    ) -> Result<Vec<FullActivityEvent>>;
}
