//! In-process [`Repository`] used when no database is configured and in tests.

use crate::{
    DbError, Result,
    repository::{ActivityFilter, Repository, TrackFilter, TrackOrder, TrackQuery, WeekdayCount},
};
use async_trait::async_trait;
use std::{collections::BTreeMap, sync::Arc};
use time::UtcDateTime;
use tokio::sync::Mutex;
use trackboard_common::{
    clock::Clock,
    model::{
        Id, ModelValidationError, TrackboardSnowflakeGenerator,
        event::{ActivityEvent, CreateEvent, FullActivityEvent},
        track::{CreateTrack, FullTrack, Track, TrackEdit, TrackMarker},
        user::{CreateUser, User, UserMarker, UserNames},
    },
    snowflake::GeneratorOrigin,
};

#[derive(Debug)]
struct State {
    snowflake_generator: TrackboardSnowflakeGenerator,
    users: BTreeMap<Id<UserMarker>, User>,
    tracks: BTreeMap<Id<TrackMarker>, Track>,
    events: Vec<ActivityEvent>,
}

impl State {
    fn full_track(&self, track: &Track) -> Result<FullTrack> {
        let author = self
            .users
            .get(&track.author_id)
            .ok_or(DbError::NotFound("user", track.author_id.get()))?;

        Ok(FullTrack::new(track.clone(), author.clone()))
    }

    fn full_event(&self, event: &ActivityEvent) -> Result<FullActivityEvent> {
        let user = |user_id: Option<Id<UserMarker>>| {
            user_id.and_then(|user_id| self.users.get(&user_id).cloned())
        };
        let target_post = event
            .target_post_id
            .and_then(|track_id| self.tracks.get(&track_id))
            .filter(|track| track.is_public())
            .map(|track| self.full_track(track))
            .transpose()?;

        Ok(FullActivityEvent {
            event: event.clone(),
            actor: user(event.actor_id),
            target_user: user(event.target_user_id),
            target_post,
        })
    }

    fn filtered_tracks<'a>(&'a self, filter: &'a TrackFilter) -> impl Iterator<Item = &'a Track> {
        self.tracks.values().filter(|track| filter.matches(track))
    }
}

#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(origin: GeneratorOrigin, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State {
                snowflake_generator: TrackboardSnowflakeGenerator::new(origin),
                users: BTreeMap::new(),
                tracks: BTreeMap::new(),
                events: Vec::new(),
            }),
            clock,
        }
    }

    /// Every stored event, oldest first.
    pub async fn events(&self) -> Vec<ActivityEvent> {
        self.state.lock().await.events.clone()
    }

    /// Every stored track, in id order.
    pub async fn tracks(&self) -> Vec<Track> {
        self.state.lock().await.tracks.values().cloned().collect()
    }
}

fn truncate<T>(mut items: Vec<T>, limit: u32) -> Vec<T> {
    items.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    items
}

#[async_trait]
impl Repository for MemoryStore {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn fetch_user_by_slug(&self, slug: &str) -> Result<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|user| user.slug.get() == slug)
            .cloned())
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        if state.users.values().any(|existing| existing.slug == user.slug) {
            return Err(DbError::Conflict(format!("user slug {}", user.slug.get())));
        }

        let user = User {
            id: state.snowflake_generator.generate_at(now)?.into(),
            slug: user.slug.clone(),
            firstname: user.firstname.clone(),
            lastname: user.lastname.clone(),
            created_at: now,
        };
        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn update_user_names(&self, user_id: Id<UserMarker>, names: &UserNames) -> Result<()> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or(DbError::NotFound("user", user_id.get()))?;

        user.firstname.clone_from(&names.firstname);
        user.lastname.clone_from(&names.lastname);
        Ok(())
    }

    async fn fetch_recent_users(&self, limit: u32) -> Result<Vec<User>> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(truncate(users, limit))
    }

    async fn count_users(&self) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(i64::try_from(state.users.len()).unwrap_or(i64::MAX))
    }

    async fn create_track(&self, track: &CreateTrack) -> Result<Track> {
        track.validate().map_err(ModelValidationError::from)?;

        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let track = Track {
            id: state.snowflake_generator.generate_at(now)?.into(),
            slug: None,
            author_id: track.author_id,
            visibility: track.visibility,
            provider: track.provider,
            provider_id: track.provider_id,
            secret_token: track.secret_token.clone(),
            provider_metadata: track.provider_metadata.clone(),
            provider_created_at: track.provider_created_at,
            sort_date: track.sort_date,
            title: track.title.clone(),
            body: track.body.clone(),
            provider_description: track.provider_description.clone(),
            genre: track.genre.clone(),
            duration_ms: track.duration_ms,
            artwork_url: track.artwork_url.clone(),
            download_url: track.download_url.clone(),
            isrc: track.isrc.clone(),
            bpm: track.bpm,
            key_signature: track.key_signature.clone(),
            url: track.url.clone(),
            created_at: now,
        };
        state.tracks.insert(track.id, track.clone());

        Ok(track)
    }

    async fn fetch_track(&self, track_id: Id<TrackMarker>) -> Result<Option<FullTrack>> {
        let state = self.state.lock().await;
        state
            .tracks
            .get(&track_id)
            .map(|track| state.full_track(track))
            .transpose()
    }

    async fn fetch_track_by_slug(&self, slug: &str) -> Result<Option<FullTrack>> {
        let state = self.state.lock().await;
        state
            .tracks
            .values()
            .find(|track| track.slug.as_deref() == Some(slug))
            .map(|track| state.full_track(track))
            .transpose()
    }

    async fn update_track(&self, track_id: Id<TrackMarker>, edit: &TrackEdit) -> Result<()> {
        let mut state = self.state.lock().await;
        let track = state
            .tracks
            .get_mut(&track_id)
            .ok_or(DbError::NotFound("track", track_id.get()))?;

        track.title.clone_from(&edit.title);
        track.body.clone_from(&edit.body);
        track.visibility = edit.visibility;
        Ok(())
    }

    async fn fetch_tracks(&self, query: &TrackQuery) -> Result<Vec<FullTrack>> {
        let state = self.state.lock().await;
        let mut tracks: Vec<&Track> = state.filtered_tracks(&query.filter).collect();
        match query.order {
            TrackOrder::SortDateDesc => {
                tracks.sort_by(|a, b| b.sort_date.cmp(&a.sort_date).then(b.id.cmp(&a.id)));
            }
            TrackOrder::CreatedAtDesc => {
                tracks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            }
        }

        let tracks = truncate(tracks, query.limit)
            .into_iter()
            .map(|track| state.full_track(track))
            .collect::<Result<_>>()?;
        Ok(tracks)
    }

    async fn count_tracks(&self, filter: &TrackFilter) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(i64::try_from(state.filtered_tracks(filter).count()).unwrap_or(i64::MAX))
    }

    async fn sum_track_duration(&self, filter: &TrackFilter) -> Result<i64> {
        let state = self.state.lock().await;
        let total: u64 = state
            .filtered_tracks(filter)
            .map(|track| track.duration_ms)
            .sum();

        i64::try_from(total).map_err(|_| ModelValidationError::OutOfRange("duration_ms").into())
    }

    async fn count_tracks_by_weekday(&self, filter: &TrackFilter) -> Result<Vec<WeekdayCount>> {
        let state = self.state.lock().await;
        let mut counts: BTreeMap<i64, i64> = BTreeMap::new();
        for track in state.filtered_tracks(filter) {
            let weekday = i64::from(track.sort_date.weekday().number_days_from_sunday());
            *counts.entry(weekday).or_default() += 1;
        }

        Ok(counts
            .into_iter()
            .map(|(weekday, count)| WeekdayCount { weekday, count })
            .collect())
    }

    async fn fetch_track_sort_dates(&self, filter: &TrackFilter) -> Result<Vec<UtcDateTime>> {
        let state = self.state.lock().await;
        Ok(state
            .filtered_tracks(filter)
            .map(|track| track.sort_date)
            .collect())
    }

    async fn create_event(&self, event: &CreateEvent) -> Result<ActivityEvent> {
        event.validate().map_err(ModelValidationError::from)?;

        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let event = ActivityEvent {
            id: state.snowflake_generator.generate_at(now)?.into(),
            kind: event.kind,
            actor_id: event.actor_id,
            target_user_id: event.target_user_id,
            target_post_id: event.target_post_id,
            created_at: now,
        };
        state.events.push(event.clone());

        Ok(event)
    }

    async fn fetch_events(
        &self,
        filter: &ActivityFilter,
        limit: u32,
    ) -> Result<Vec<FullActivityEvent>> {
        let state = self.state.lock().await;
        let mut events: Vec<&ActivityEvent> = state
            .events
            .iter()
            .filter(|event| filter.matches(event))
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        truncate(events, limit)
            .into_iter()
            .map(|event| state.full_event(event))
            .collect()
    }
}
